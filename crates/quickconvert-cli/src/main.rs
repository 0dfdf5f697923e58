//! quickconvert: batch file converter.
//!
//! Configuration comes from QUICKCONVERT_* environment variables (or `.env`).
//! Without a subcommand, starts the interactive shell.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use quickconvert_cli::{load_files, print_file_table, report_error, ShellCommand, SHELL_HELP};
use quickconvert_core::{AppError, Config, ConversionRequest, FileRecord, FileStatus, LogFormat, RecordId};
use quickconvert_infra::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use quickconvert_services::{ConversionHandle, ConversionOutcome, ConverterSession};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "quickconvert", about = "Batch file converter", version)]
struct Cli {
    /// Directory holding the saved file list (overrides QUICKCONVERT_STATE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Directory downloads are saved to (overrides QUICKCONVERT_OUTPUT_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive shell (default)
    Shell,
    /// Show the saved file list
    List,
    /// Remove one file from the saved list
    Remove {
        /// Position shown by `list`
        index: usize,
    },
    /// Remove every file from the saved list
    Clear,
    /// Add files, convert them all to one format and download the results
    Batch {
        /// Files to convert
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Target format, e.g. webp, png, jpeg
        #[arg(long)]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    init_telemetry(&TelemetryConfig::new(config.log_format))
        .map_err(|e| anyhow!("Failed to initialize telemetry: {}", e))?;

    let session = ConverterSession::open(&config)?;
    let json_errors = config.log_format == LogFormat::Json;
    if session.store().is_degraded() {
        report_error(
            AppError::Persistence(format!(
                "state in {} is unavailable",
                config.state_dir.display()
            )),
            json_errors,
        );
    }

    let result = match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => run_shell(&session, json_errors).await,
        Commands::List => {
            print_file_table(&session.store().snapshot());
            Ok(())
        }
        Commands::Remove { index } => {
            match session.store().remove(index) {
                Some(record) => println!("Removed {}", record.original_name()),
                None => println!("No file at position {}", index),
            }
            Ok(())
        }
        Commands::Clear => {
            let count = session.store().clear();
            println!("Removed {} file(s)", count);
            Ok(())
        }
        Commands::Batch { paths, format } => run_batch(&session, &paths, &format, json_errors).await,
    };

    shutdown_telemetry();
    result
}

async fn run_batch(
    session: &ConverterSession,
    paths: &[PathBuf],
    format: &str,
    json_errors: bool,
) -> anyhow::Result<()> {
    let files = load_files(paths).await?;
    let ids = session.ingest(files);
    let _warm_up = session.warm_up();

    let mut handles = Vec::with_capacity(ids.len());
    for id in &ids {
        let Some(record) = session.store().get(*id) else {
            continue;
        };
        let request = ConversionRequest {
            target_format: format.to_string(),
            ..ConversionRequest::defaults_for(&record)
        };
        match session.orchestrator().convert_id(*id, &request) {
            Ok(handle) => handles.push((record, handle)),
            Err(e) => report_error(e, json_errors),
        }
    }

    let mut failed = ids.len() - handles.len();
    for (record, handle) in handles {
        let id = handle.id();
        match handle.wait().await {
            ConversionOutcome::Converted { .. } => match session.downloads().download_id(id) {
                Ok(delivered) => println!(
                    "{} -> {}",
                    record.original_name(),
                    delivered
                        .path
                        .map(|p| p.display().to_string())
                        .unwrap_or(delivered.file_name)
                ),
                Err(e) => {
                    failed += 1;
                    report_error(e, json_errors);
                }
            },
            ConversionOutcome::Failed(e) => {
                failed += 1;
                eprintln!("{}: conversion failed", record.original_name());
                report_error(e, json_errors);
            }
            ConversionOutcome::Discarded => failed += 1,
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} file(s) failed", failed, ids.len()));
    }
    Ok(())
}

async fn run_shell(session: &ConverterSession, json_errors: bool) -> anyhow::Result<()> {
    let _warm_up = session.warm_up();
    let watcher = spawn_status_watcher(session);

    print_file_table(&session.store().snapshot());
    println!("Type `help` for commands.");

    let mut pending: Vec<ConversionHandle> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };
        pending.retain(|handle| !handle.is_finished());

        match command {
            ShellCommand::Add(paths) => match load_files(&paths).await {
                Ok(files) => {
                    let count = session.ingest(files).len();
                    println!("Added {} file(s)", count);
                }
                Err(e) => report_error(e, json_errors),
            },
            ShellCommand::List => print_file_table(&session.store().snapshot()),
            ShellCommand::Convert {
                index,
                base_name,
                format,
            } => {
                let Some(record) = session.store().snapshot().into_iter().nth(index) else {
                    report_error(AppError::InvalidIndex(index), json_errors);
                    continue;
                };
                let defaults = ConversionRequest::defaults_for(&record);
                let request = ConversionRequest::new(
                    base_name.unwrap_or(defaults.target_base_name),
                    format.unwrap_or(defaults.target_format),
                );
                match session.convert(index, &request) {
                    Ok(handle) => pending.push(handle),
                    Err(e) => report_error(e, json_errors),
                }
            }
            ShellCommand::Download(index) => match session.download(index) {
                Ok(delivered) => match delivered.path {
                    Some(path) => println!("Saved {}", path.display()),
                    None => println!("Delivered {}", delivered.file_name),
                },
                Err(e) => report_error(e, json_errors),
            },
            ShellCommand::Remove(index) => {
                if !session.remove(index) {
                    println!("No file at position {}", index);
                }
            }
            ShellCommand::Wait => {
                for handle in pending.drain(..) {
                    handle.wait().await;
                }
            }
            ShellCommand::Help => println!("{}", SHELL_HELP),
            ShellCommand::Quit => break,
        }
    }

    if !pending.is_empty() {
        println!("Waiting for {} conversion(s) to finish...", pending.len());
        for handle in pending {
            handle.wait().await;
        }
    }
    watcher.abort();
    Ok(())
}

/// Print a line whenever a record's status changes.
fn spawn_status_watcher(session: &ConverterSession) -> tokio::task::JoinHandle<()> {
    let mut changes = session.store().subscribe();
    let mut last_seen: HashMap<RecordId, FileStatus> = changes
        .borrow_and_update()
        .iter()
        .map(|r| (r.id(), r.status()))
        .collect();

    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let records: Vec<FileRecord> = changes.borrow_and_update().clone();
            for (index, record) in records.iter().enumerate() {
                let previous = last_seen.insert(record.id(), record.status());
                if previous.is_some_and(|status| status != record.status()) {
                    print_status_change(index, record);
                }
            }
            last_seen.retain(|id, _| records.iter().any(|r| r.id() == *id));
        }
    })
}

fn print_status_change(index: usize, record: &FileRecord) {
    match record.status() {
        FileStatus::Converted => println!(
            "[{}] {} -> {} ({} bytes)",
            index,
            record.original_name(),
            record.output_full_name(),
            record.output_size_bytes()
        ),
        FileStatus::Error => println!(
            "[{}] {}: conversion failed (see `list`)",
            index,
            record.original_name()
        ),
        status => println!("[{}] {}: {}", index, record.original_name(), status),
    }
}
