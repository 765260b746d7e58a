//! Append-only audit log.
//!
//! One JSON object per line: `{ts, action, payload}` with a UTC RFC-3339
//! timestamp at second precision. Collaborators append an event per notable
//! action (`generate_ok`, `generate_infeasible`, …); the scheduling core
//! itself never reads the log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: String,
    pub action: String,
    pub payload: Value,
}

/// Handle on the audit file; appends are serialised through a mutex.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event, stamped now.
    pub fn append(&self, action: &str, payload: Value) -> StoreResult<()> {
        let event = AuditEvent {
            ts: now_iso(),
            action: action.to_string(),
            payload,
        };
        let line = serde_json::to_string(&event)?;

        let _guard = self.append_lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// The most recent `limit` events, oldest first. Undecodable lines are
    /// skipped; a missing file reads as empty.
    pub fn read_recent(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let lines: Vec<&str> = raw.lines().collect();
        let keep = limit.max(1).min(lines.len());
        Ok(lines[lines.len() - keep..]
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_log() -> (tempfile::TempDir, AuditLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit_log.jsonl"));
        (dir, log)
    }

    #[test]
    fn test_append_and_read_back() {
        let (_dir, log) = temp_log();
        log.append("generate_ok", json!({"assignments_count": 8}))
            .unwrap();
        log.append("generate_infeasible", json!({"reason": "Période invalide"}))
            .unwrap();

        let events = log.read_recent(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "generate_ok");
        assert_eq!(events[1].payload["reason"], "Période invalide");
        // Second-precision UTC timestamps with a Z suffix.
        assert!(events[0].ts.ends_with('Z'));
        assert_eq!(events[0].ts.len(), "2026-02-09T07:00:00Z".len());
    }

    #[test]
    fn test_read_recent_limits_and_orders() {
        let (_dir, log) = temp_log();
        for i in 0..5 {
            log.append("tick", json!({ "i": i })).unwrap();
        }
        let events = log.read_recent(2).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload["i"], 3);
        assert_eq!(events[1].payload["i"], 4);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let (_dir, log) = temp_log();
        assert!(log.read_recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_lines_are_skipped() {
        let (_dir, log) = temp_log();
        log.append("ok", json!({})).unwrap();
        fs::write(
            log.path(),
            format!(
                "{}\nnot json\n",
                fs::read_to_string(log.path()).unwrap().trim_end()
            ),
        )
        .unwrap();
        let events = log.read_recent(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "ok");
    }
}
