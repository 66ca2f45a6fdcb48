//! Append-only history of completed searches, stored as JSON lines.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{config::Settings, patents::SourceKind};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("history lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub search_key: String,
    pub source_kind: SourceKind,
    pub display_name: String,
    pub export_url: Option<String>,
    pub export_id: Option<String>,
    pub output_location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fields supplied by the caller; id and timestamp are assigned on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub search_key: String,
    pub source_kind: SourceKind,
    pub display_name: Option<String>,
    pub export_url: Option<String>,
    pub export_id: Option<String>,
    pub output_location: Option<String>,
}

/// File-backed history. Clones share the same lock.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Arc::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.join_data("search_history.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, HistoryError> {
        self.append_at(entry, Utc::now())
    }

    /// Append with an explicit timestamp.
    pub fn append_at(
        &self,
        entry: NewHistoryEntry,
        timestamp: DateTime<Utc>,
    ) -> Result<HistoryEntry, HistoryError> {
        let _guard = self.lock.lock().map_err(|_| HistoryError::Poisoned)?;
        let next_id = self.read_all()?.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let stored = HistoryEntry {
            id: next_id,
            display_name: entry
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| entry.search_key.clone()),
            search_key: entry.search_key,
            source_kind: entry.source_kind,
            export_url: entry.export_url,
            export_id: entry.export_id,
            output_location: entry.output_location,
            timestamp,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(&stored)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        info!(id = stored.id, source = %stored.source_kind, name = %stored.display_name, "added search to history");
        Ok(stored)
    }

    /// Most recent first.
    pub fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let _guard = self.lock.lock().map_err(|_| HistoryError::Poisoned)?;
        let mut entries = self.read_all()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn get(&self, id: u64) -> Result<Option<HistoryEntry>, HistoryError> {
        let _guard = self.lock.lock().map_err(|_| HistoryError::Poisoned)?;
        Ok(self.read_all()?.into_iter().find(|e| e.id == id))
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, id: u64) -> Result<bool, HistoryError> {
        Ok(self.retain(|e| e.id != id)? > 0)
    }

    /// Remove every entry, returning how many were removed.
    pub fn clear(&self) -> Result<usize, HistoryError> {
        self.retain(|_| false)
    }

    /// Drop entries older than `retention_days`. A window reaching past the
    /// representable date range keeps everything.
    pub fn cleanup(&self, retention_days: i64) -> Result<usize, HistoryError> {
        let Some(cutoff) = Duration::try_days(retention_days.max(0))
            .and_then(|window| Utc::now().checked_sub_signed(window))
        else {
            warn!(retention_days, "retention window out of range; keeping all history");
            return Ok(0);
        };
        let removed = self.retain(|e| e.timestamp >= cutoff)?;
        if removed > 0 {
            info!(removed, retention_days, "cleaned up search history");
        }
        Ok(removed)
    }

    fn retain<F>(&self, keep: F) -> Result<usize, HistoryError>
    where
        F: Fn(&HistoryEntry) -> bool,
    {
        let _guard = self.lock.lock().map_err(|_| HistoryError::Poisoned)?;
        let entries = self.read_all()?;
        let before = entries.len();
        let kept: Vec<HistoryEntry> = entries.into_iter().filter(|e| keep(e)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.write_all(&kept)?;
        }
        Ok(removed)
    }

    fn read_all(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(line = line_no + 1, %err, "skipping unreadable history line"),
            }
        }
        Ok(entries)
    }

    fn write_all(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for entry in entries {
                serde_json::to_writer(&mut writer, entry)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
