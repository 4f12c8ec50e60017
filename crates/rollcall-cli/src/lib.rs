// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

pub mod import;

use clap::{error::ErrorKind, ArgAction, Parser, Subcommand, ValueEnum};
use rollcall_model::{IngestMode, SheetName};
use rollcall_store::{store_from_env, RecordStore, StoreError, ENV_FAKE_BACKEND};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const CRATE_NAME: &str = "rollcall-cli";

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Attendance spreadsheet operations CLI")]
#[command(
    after_help = "Environment:\n  GOOGLE_SHEETS_CLIENT_EMAIL  Service account email\n  GOOGLE_SHEETS_PRIVATE_KEY   Service account PEM key\n  GOOGLE_SHEETS_ID            Target spreadsheet\n  ROLLCALL_FAKE_BACKEND       Use an in-memory spreadsheet"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Run against an in-memory spreadsheet.
    #[arg(long, global = true, default_value_t = false)]
    fake: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk-load a delimited file into a sheet.
    Ingest {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long, value_enum, default_value_t = ModeCli::Append)]
        mode: ModeCli,
    },
    /// Print the header row of a sheet.
    Headers {
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Print per-personnel attendance features.
    Features {
        #[arg(long)]
        sheet: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeCli {
    Append,
    Replace,
}

impl From<ModeCli> for IngestMode {
    fn from(mode: ModeCli) -> Self {
        match mode {
            ModeCli::Append => Self::Append,
            ModeCli::Replace => Self::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ExitCode {
    Success = 0,
    Internal = 1,
    Usage = 2,
    DependencyFailure = 3,
}

#[derive(Debug)]
struct CliError {
    exit_code: ExitCode,
    code: &'static str,
    message: String,
}

impl CliError {
    fn usage(message: impl Into<String>) -> Self {
        Self {
            exit_code: ExitCode::Usage,
            code: "usage_error",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            exit_code: ExitCode::Internal,
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let exit_code = match err.kind() {
            rollcall_store::ErrorKind::Upstream => ExitCode::DependencyFailure,
            rollcall_store::ErrorKind::Validation | rollcall_store::ErrorKind::NotFound => {
                ExitCode::Usage
            }
            _ => ExitCode::Internal,
        };
        Self {
            exit_code,
            code: err.kind().as_str(),
            message: err.message().to_string(),
        }
    }
}

pub fn main_entry() -> ProcessExitCode {
    let wants_json = std::env::args().any(|arg| arg == "--json");
    match run() {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            emit_error(&err, wants_json);
            ProcessExitCode::from(err.exit_code as u8)
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(());
            }
            _ => return Err(CliError::usage(err.to_string())),
        },
    };
    init_logging(cli.verbose);
    let command = cli
        .command
        .ok_or_else(|| CliError::usage("missing command; see --help"))?;
    let fake = cli.fake
        || std::env::var(ENV_FAKE_BACKEND)
            .is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::internal(format!("failed to start runtime: {e}")))?;
    let store = store_from_env(fake)?;
    let payload = runtime.block_on(execute(&store, command))?;
    emit_ok(cli.json, &payload)
}

async fn execute(store: &RecordStore, command: Commands) -> Result<Value, CliError> {
    match command {
        Commands::Ingest { file, sheet, mode } => {
            let sheet = store.resolve_sheet(sheet.as_deref())?;
            let records = import::read_records(&file).map_err(CliError::usage)?;
            info!(file = %file.display(), records = records.len(), "file parsed");
            let outcome = store.append_bulk(&sheet, records, mode.into()).await?;
            Ok(json!({
                "command": "ingest",
                "sheet": sheet,
                "mode": outcome.mode,
                "recordsWritten": outcome.records_written,
                "duplicatesSkipped": outcome.duplicates_skipped,
            }))
        }
        Commands::Headers { sheet } => {
            let sheet = store.resolve_sheet(sheet.as_deref())?;
            let headers = store.schema().get_headers(sheet.as_str()).await?;
            Ok(json!({"command": "headers", "sheet": sheet, "headers": headers}))
        }
        Commands::Features { sheet } => {
            let sheet: SheetName = store.resolve_sheet(sheet.as_deref())?;
            let features = store.features(&sheet).await?;
            Ok(json!({"command": "features", "sheet": sheet, "features": features}))
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn emit_ok(machine_json: bool, payload: &Value) -> Result<(), CliError> {
    let text = if machine_json {
        serde_json::to_string(payload)
    } else {
        serde_json::to_string_pretty(payload)
    }
    .map_err(|e| CliError::internal(e.to_string()))?;
    println!("{text}");
    Ok(())
}

fn emit_error(error: &CliError, machine_json: bool) {
    if machine_json {
        eprintln!(
            "{}",
            json!({"code": error.code, "message": error.message})
        );
    } else {
        eprintln!("{}: {}", error.code, error.message);
    }
}
