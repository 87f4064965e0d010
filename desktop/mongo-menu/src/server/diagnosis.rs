//! Log-based diagnosis of unexpected server exits.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Number of trailing log lines inspected after a crash.
pub const DIAGNOSIS_LINES: usize = 50;

/// Upper bound on how much of the log is read from the end.
const TAIL_BYTES: u64 = 256 * 1024;

const PORT_SIGNATURES: [&str; 2] = ["Address already in use", "port"];
const PERMISSION_SIGNATURE: &str = "Permission denied";

/// Categorized cause of a server failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnosis {
    PortConflict,
    PermissionDenied,
    Unknown { log_path: PathBuf },
}

impl Diagnosis {
    pub fn title(&self) -> &'static str {
        "MongoDB Error"
    }

    pub fn message(&self) -> String {
        match self {
            Self::PortConflict => "MongoDB failed to start because the port is already in use. \
                 Another instance may be running."
                .into(),
            Self::PermissionDenied => "MongoDB failed to start due to permission issues \
                 accessing the data or log directories."
                .into(),
            Self::Unknown { log_path } => format!(
                "MongoDB failed to start. Check the log file for details: {}",
                log_path.display()
            ),
        }
    }
}

/// Whether a log line reports an error.
///
/// Covers both the legacy plain-text format and the JSON format
/// (`"s":"E"` / `"s":"F"` severities).
fn is_error_line(line: &str) -> bool {
    line.contains("ERROR")
        || line.contains("exception")
        || line.contains(r#""s":"E""#)
        || line.contains(r#""s":"F""#)
}

/// Classify a single error line, `None` when no signature matches.
pub fn classify_line(line: &str) -> Option<Diagnosis> {
    if PORT_SIGNATURES.iter().any(|sig| line.contains(sig)) {
        Some(Diagnosis::PortConflict)
    } else if line.contains(PERMISSION_SIGNATURE) {
        Some(Diagnosis::PermissionDenied)
    } else {
        None
    }
}

/// Scan the last lines of the server log for a known failure signature.
///
/// The most recent error line decides the category; anything
/// unrecognized (including an unreadable log) yields `Unknown`.
pub fn diagnose_log(log_path: &Path) -> Diagnosis {
    let unknown = || Diagnosis::Unknown {
        log_path: log_path.to_path_buf(),
    };

    let lines = match tail_lines(log_path, DIAGNOSIS_LINES) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!("Error reading MongoDB log {}: {e}", log_path.display());
            return unknown();
        }
    };

    match lines.iter().rev().find(|line| is_error_line(line)) {
        Some(line) => {
            tracing::warn!("Found error in MongoDB log: {line}");
            classify_line(line).unwrap_or_else(unknown)
        }
        None => unknown(),
    }
}

/// Read the last `count` lines of a file without loading all of it.
pub fn tail_lines(path: &Path, count: usize) -> std::io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL_BYTES);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let content = String::from_utf8_lossy(&buf);

    let mut lines: Vec<&str> = content.lines().collect();
    // First line is likely partial when reading from the middle
    if start > 0 && !lines.is_empty() {
        lines.remove(0);
    }

    let skip = lines.len().saturating_sub(count);
    Ok(lines.into_iter().skip(skip).map(String::from).collect())
}
