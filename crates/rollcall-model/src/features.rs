// SPDX-License-Identifier: Apache-2.0

//! Per-personnel behavioural features derived from attendance records.
//!
//! Only entry records (`Jenis Absensi == "Masuk"`) contribute. The numeric
//! vector handed to clustering is `[present, late, mean accuracy, distinct
//! ips, distinct devices]`.

use crate::{
    Record, FIELD_ACCURACY, FIELD_ADDRESS_IP, FIELD_DEVICE_ID, FIELD_KIND, FIELD_NRP,
    FIELD_STATUS, FIELD_TIME,
};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

pub const ENTRY_KIND: &str = "Masuk";
pub const UNKNOWN_NRP: &str = "UNKNOWN_NRP";
/// 08:00 expressed in minutes after midnight.
pub const DEFAULT_ARRIVAL_MINUTES: f64 = 480.0;
pub const DEFAULT_ACCURACY_METERS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSet {
    pub nrp: String,
    /// First entry record seen for this person.
    pub record: Record,
    pub total_hadir: u32,
    pub total_terlambat: u32,
    pub total_izin: u32,
    pub total_masuk: u32,
    pub avg_arrival_minutes: f64,
    pub tardiness_rate: f64,
    pub avg_location_accuracy: f64,
    pub distinct_ip_count: usize,
    pub distinct_device_count: usize,
    pub features: Vec<f64>,
}

#[derive(Default)]
struct Tally<'a> {
    first: Option<&'a Record>,
    hadir: u32,
    terlambat: u32,
    izin: u32,
    masuk: u32,
    arrivals: Vec<u32>,
    accuracies: Vec<f64>,
    ips: IndexSet<&'a str>,
    devices: IndexSet<&'a str>,
}

/// Aggregates entry records by NRP, in order of first appearance.
#[must_use]
pub fn calculate_features(records: &[Record]) -> Vec<FeatureSet> {
    let mut by_nrp: IndexMap<&str, Tally<'_>> = IndexMap::new();
    for record in records.iter().filter(|r| r.get(FIELD_KIND) == ENTRY_KIND) {
        let nrp = match record.get(FIELD_NRP) {
            "" => UNKNOWN_NRP,
            value => value,
        };
        let tally = by_nrp.entry(nrp).or_default();
        tally.first.get_or_insert(record);
        tally.masuk += 1;
        match record.get(FIELD_STATUS) {
            "Hadir" | "Tepat Waktu" => tally.hadir += 1,
            "Terlambat" => tally.terlambat += 1,
            "Izin" => tally.izin += 1,
            _ => {}
        }
        if let Some(minutes) = parse_clock_minutes(record.get(FIELD_TIME)) {
            tally.arrivals.push(minutes);
        }
        if let Some(meters) = parse_accuracy_meters(record.get(FIELD_ACCURACY)) {
            tally.accuracies.push(meters);
        }
        let ip = record.get(FIELD_ADDRESS_IP);
        if !ip.is_empty() {
            tally.ips.insert(ip);
        }
        let device = record.get(FIELD_DEVICE_ID);
        if !device.is_empty() {
            tally.devices.insert(device);
        }
    }

    by_nrp
        .into_iter()
        .map(|(nrp, tally)| {
            let avg_arrival_minutes = mean(tally.arrivals.iter().map(|m| f64::from(*m)))
                .unwrap_or(DEFAULT_ARRIVAL_MINUTES);
            let avg_location_accuracy =
                mean(tally.accuracies.iter().copied()).unwrap_or(DEFAULT_ACCURACY_METERS);
            let tardiness_rate = if tally.masuk > 0 {
                f64::from(tally.terlambat) / f64::from(tally.masuk) * 100.0
            } else {
                0.0
            };
            let features = vec![
                f64::from(tally.hadir),
                f64::from(tally.terlambat),
                avg_location_accuracy,
                tally.ips.len() as f64,
                tally.devices.len() as f64,
            ];
            FeatureSet {
                nrp: nrp.to_string(),
                record: tally.first.cloned().unwrap_or_default(),
                total_hadir: tally.hadir,
                total_terlambat: tally.terlambat,
                total_izin: tally.izin,
                total_masuk: tally.masuk,
                avg_arrival_minutes,
                tardiness_rate,
                avg_location_accuracy,
                distinct_ip_count: tally.ips.len(),
                distinct_device_count: tally.devices.len(),
                features,
            }
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_u32), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / f64::from(count))
}

/// Parses `HH:MM` (seconds ignored) into minutes after midnight.
#[must_use]
pub fn parse_clock_minutes(raw: &str) -> Option<u32> {
    let mut parts = raw.trim().split(':');
    let hours = leading_digits(parts.next()?)?;
    let minutes = leading_digits(parts.next()?)?;
    Some(hours * 60 + minutes)
}

fn leading_digits(part: &str) -> Option<u32> {
    let trimmed = part.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

/// Parses values such as `"12,5 M"` into meters. Non-positive readings
/// are discarded.
#[must_use]
pub fn parse_accuracy_meters(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    if let Some(stripped) = s.strip_suffix(['M', 'm']) {
        s = stripped.trim_end();
    }
    let normalized = s.replace(',', ".");
    let value: f64 = normalized.parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}
