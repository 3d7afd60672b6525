//! Persisted processed-commit ledger.
//!
//! An append-only JSONL file, one record per processed commit. When a ledger
//! is configured, its shas seed the in-memory collection state at startup,
//! so a restarted collector does not re-fetch commits it already handled.
//! Without one, dedup lives for the process lifetime only.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CollectError, Result};

/// One ledger line: a commit that completed processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedRecord {
    pub sha: String,
    pub slug: String,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only JSONL file of processed commits.
///
/// Loading is strict: an unreadable file or corrupt line fails `open`, since
/// silently dropping ledger entries would re-collect commits. Appending
/// reports errors honestly; whether they are fatal is the caller's policy.
pub struct ProcessedLedger {
    path: PathBuf,
    file: Mutex<File>,
    seeded: Vec<String>,
}

impl ProcessedLedger {
    /// Open the ledger at `path`, creating it if missing, and load every
    /// recorded sha.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut seeded = Vec::new();
        if path.exists() {
            let reader =
                BufReader::new(File::open(&path).map_err(|e| persistence(&path, e))?);
            for line in reader.lines() {
                let line = line.map_err(|e| persistence(&path, e))?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: ProcessedRecord = serde_json::from_str(&line)?;
                seeded.push(record.sha);
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| persistence(&path, e))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            seeded,
        })
    }

    /// Shas recorded by earlier sessions, in file order.
    pub fn seeded(&self) -> &[String] {
        &self.seeded
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it.
    pub fn record(&self, slug: &str, sha: &str) -> Result<()> {
        let record = ProcessedRecord {
            sha: sha.to_string(),
            slug: slug.to_string(),
            recorded_at: Utc::now(),
        };
        let line = serde_json::to_string(&record)?;

        let mut file = self.file.lock().unwrap();
        writeln!(file, "{}", line).map_err(|e| persistence(&self.path, e))?;
        file.flush().map_err(|e| persistence(&self.path, e))?;
        Ok(())
    }
}

fn persistence(path: &Path, source: std::io::Error) -> CollectError {
    CollectError::persistence(path, source)
}
