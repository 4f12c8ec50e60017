// SPDX-License-Identifier: Apache-2.0

//! Delimited-text import. The delimiter is picked from the header line:
//! comma when present, then semicolon, otherwise tab.

use rollcall_model::Record;
use std::fs;
use std::path::Path;

#[must_use]
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains(',') {
        b','
    } else if header_line.contains(';') {
        b';'
    } else {
        b'\t'
    }
}

/// Parses the whole text into records keyed by the trimmed header cells.
/// Short rows are padded, surplus cells dropped, all-blank rows skipped.
pub fn parse_records(text: &str) -> Result<Vec<Record>, String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let header_line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| "input has no header line".to_string())?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(header_line))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("failed to read header line: {e}"))?
        .iter()
        .map(ToString::to_string)
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err("header line has no field names".to_string());
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| format!("failed to read data row {}: {e}", index + 2))?;
        let record: Record = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), row.get(i).unwrap_or_default().to_string()))
            .collect();
        if !record.is_blank() {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn read_records(path: &Path) -> Result<Vec<Record>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    parse_records(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_preference_follows_header_line() {
        assert_eq!(detect_delimiter("NRP,Nama;x"), b',');
        assert_eq!(detect_delimiter("NRP;Nama"), b';');
        assert_eq!(detect_delimiter("NRP\tNama"), b'\t');
        assert_eq!(detect_delimiter("NRP"), b'\t');
    }

    #[test]
    fn semicolon_files_are_trimmed_and_padded() {
        let records = parse_records("NRP ; Nama ; Unit\n 001 ; Andi \n;;\n002;Budi;Reskrim;extra\n")
            .expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("NRP"), "001");
        assert_eq!(records[0].get("Nama"), "Andi");
        assert_eq!(records[0].get("Unit"), "");
        assert_eq!(records[1].len(), 3);
        assert_eq!(records[1].get("Unit"), "Reskrim");
    }

    #[test]
    fn quoted_commas_survive() {
        let records =
            parse_records("NRP,Deskripsi\n001,\"Dinas luar, Bandung\"\n").expect("records");
        assert_eq!(records[0].get("Deskripsi"), "Dinas luar, Bandung");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(parse_records("").is_err());
        assert!(parse_records("\n\n").is_err());
    }
}
