//! Helpers for the `quickconvert` binary: reading input files, rendering the
//! file list, parsing shell commands and reporting errors.

use anyhow::{Context, Result};
use bytes::Bytes;
use quickconvert_core::{AppError, FileRecord, FileStatus, IngestFile};
use quickconvert_infra::{log_error, ErrorReport};
use std::path::Path;

/// Read files from disk, guessing each MIME type from its extension.
pub async fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<IngestFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", path.display()))?;
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        files.push(IngestFile::from_bytes(name, mime_type, Bytes::from(data)));
    }
    Ok(files)
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Status column text. Rows restored without their payloads are marked stale.
pub fn status_label(record: &FileRecord) -> String {
    if record.is_stale() {
        format!("{} (stale)", record.status())
    } else if record.needs_reupload() && record.status() != FileStatus::Downloaded {
        format!("{} (re-add)", record.status())
    } else {
        record.status().to_string()
    }
}

/// Size change column, e.g. "-75%" or "+12%"
pub fn size_change(record: &FileRecord) -> String {
    match record.size_ratio_percent() {
        Some(percent) if percent >= 100 => format!("+{}%", percent - 100),
        Some(percent) => format!("-{}%", 100 - percent),
        None => String::new(),
    }
}

pub fn print_file_table(records: &[FileRecord]) {
    if records.is_empty() {
        println!("No files. Use `add <paths...>` to add some.");
        return;
    }

    println!(
        "{:>3}  {:<30} {:>10}  {:<18} {:<30} {:>10} {:>7}",
        "#", "File", "Size", "Status", "Output", "Out size", "Change"
    );
    println!("{}", "-".repeat(116));

    for (index, record) in records.iter().enumerate() {
        let (output, output_size) = if record.output_size_bytes() > 0 {
            (
                record.output_full_name().to_string(),
                format_size(record.output_size_bytes()),
            )
        } else {
            (String::new(), String::new())
        };
        println!(
            "{:>3}  {:<30} {:>10}  {:<18} {:<30} {:>10} {:>7}",
            index,
            truncate_string(record.original_name(), 30),
            format_size(record.original_size_bytes()),
            status_label(record),
            truncate_string(&output, 30),
            output_size,
            size_change(record)
        );
        if record.status() == FileStatus::Error {
            if let Some(cause) = record.last_error() {
                println!("     {}", truncate_string(cause, 100));
            }
        }
    }
}

/// Log an error with full detail and print the user-facing report to stderr.
pub fn report_error(error: impl Into<AppError>, json: bool) {
    let error = error.into();
    log_error(&error);
    let report = ErrorReport::from_error(&error);
    if json {
        eprintln!("{}", report.to_json());
    } else {
        eprintln!("{}", report);
    }
}

/// One line typed into the interactive shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(Vec<String>),
    List,
    Convert {
        index: usize,
        base_name: Option<String>,
        format: Option<String>,
    },
    Download(usize),
    Remove(usize),
    Wait,
    Help,
    Quit,
}

pub const SHELL_HELP: &str = "\
Commands:
  add <paths...>                    add files to the list
  list                              show the file list
  convert <index> [name] [format]   convert a file (defaults to its current name and type)
  download <index>                  save a converted file to the output directory
  remove <index>                    remove a file from the list
  wait                              wait for running conversions
  help                              show this help
  quit                              leave the shell";

impl ShellCommand {
    /// Parse a shell line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match command.to_lowercase().as_str() {
            "add" => {
                if args.is_empty() {
                    return Err("usage: add <paths...>".to_string());
                }
                ShellCommand::Add(args.iter().map(|a| a.to_string()).collect())
            }
            "list" | "ls" => ShellCommand::List,
            "convert" => {
                if args.is_empty() || args.len() > 3 {
                    return Err("usage: convert <index> [name] [format]".to_string());
                }
                ShellCommand::Convert {
                    index: parse_index(args[0])?,
                    base_name: args.get(1).map(|s| s.to_string()),
                    format: args.get(2).map(|s| s.to_string()),
                }
            }
            "download" => ShellCommand::Download(single_index(&args, "download")?),
            "remove" | "rm" => ShellCommand::Remove(single_index(&args, "remove")?),
            "wait" => ShellCommand::Wait,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("unknown command: {} (try `help`)", other)),
        };
        Ok(Some(command))
    }
}

fn parse_index(arg: &str) -> Result<usize, String> {
    arg.parse()
        .map_err(|_| format!("not a file index: {}", arg))
}

fn single_index(args: &[&str], command: &str) -> Result<usize, String> {
    match args {
        [index] => parse_index(index),
        _ => Err(format!("usage: {} <index>", command)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickconvert_core::TransitionError;

    fn record(name: &str, size: usize) -> FileRecord {
        FileRecord::from_ingest(IngestFile::from_bytes(
            name,
            "image/png",
            Bytes::from(vec![0u8; size]),
        ))
    }

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_multibyte() {
        assert_eq!(truncate_string("日本語のファイル名.png", 8), "日本語のフ...");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(2_000_000), "1.9 MB");
    }

    #[test]
    fn test_size_change() -> Result<(), TransitionError> {
        let mut smaller = record("a.png", 2_000);
        smaller.begin_conversion()?;
        smaller.complete_conversion("a.webp", Bytes::from(vec![0u8; 500]))?;
        assert_eq!(size_change(&smaller), "-75%");

        let mut larger = record("b.png", 100);
        larger.begin_conversion()?;
        larger.complete_conversion("b.bmp", Bytes::from(vec![0u8; 112]))?;
        assert_eq!(size_change(&larger), "+12%");

        assert_eq!(size_change(&record("c.png", 10)), "");
        Ok(())
    }

    #[test]
    fn test_status_label_marks_stale_rows() -> Result<(), TransitionError> {
        let mut converted = record("a.png", 10);
        converted.begin_conversion()?;
        converted.complete_conversion("a.webp", Bytes::from_static(b"x"))?;
        assert_eq!(status_label(&converted), "converted");

        let restored = FileRecord::from_persisted(converted.to_persisted());
        assert_eq!(status_label(&restored), "converted (stale)");

        let ready = FileRecord::from_persisted(record("b.png", 10).to_persisted());
        assert_eq!(status_label(&ready), "ready (re-add)");
        Ok(())
    }

    #[test]
    fn test_parse_shell_commands() {
        assert_eq!(ShellCommand::parse("   "), Ok(None));
        assert_eq!(
            ShellCommand::parse("add a.png b.jpg"),
            Ok(Some(ShellCommand::Add(vec![
                "a.png".to_string(),
                "b.jpg".to_string()
            ])))
        );
        assert_eq!(
            ShellCommand::parse("convert 2 holiday webp"),
            Ok(Some(ShellCommand::Convert {
                index: 2,
                base_name: Some("holiday".to_string()),
                format: Some("webp".to_string()),
            }))
        );
        assert_eq!(
            ShellCommand::parse("CONVERT 0"),
            Ok(Some(ShellCommand::Convert {
                index: 0,
                base_name: None,
                format: None,
            }))
        );
        assert_eq!(ShellCommand::parse("rm 1"), Ok(Some(ShellCommand::Remove(1))));
        assert_eq!(ShellCommand::parse("quit"), Ok(Some(ShellCommand::Quit)));
    }

    #[test]
    fn test_parse_shell_errors() {
        assert!(ShellCommand::parse("add").is_err());
        assert!(ShellCommand::parse("download").is_err());
        assert!(ShellCommand::parse("download x").is_err());
        assert!(ShellCommand::parse("remove 1 2").is_err());
        assert!(ShellCommand::parse("frobnicate").is_err());
    }

    #[tokio::test]
    async fn test_load_files_guesses_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("photo.png");
        let unknown = dir.path().join("data.zzqx");
        std::fs::write(&png, b"png bytes").unwrap();
        std::fs::write(&unknown, b"??").unwrap();

        let files = load_files(&[png, unknown]).await.unwrap();
        assert_eq!(files[0].name, "photo.png");
        assert_eq!(files[0].mime_type, "image/png");
        assert_eq!(files[0].size_bytes, 9);
        assert_eq!(files[1].mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_load_files_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_files(&[dir.path().join("missing.png")]).await;
        assert!(result.is_err());
    }
}
