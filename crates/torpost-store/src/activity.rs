//! Append-only per-peer activity log.
//!
//! Every stored or relayed message is appended to a plain-text file named
//! after the peer id, one line per message:
//!
//! ```text
//! {[2026-08-27 10:15:00] | [7a73izkph3wutuh6.onion]}:	hello
//! ```
//!
//! A failure to open or write a log file is not recoverable for the daemon;
//! the caller escalates it to process exit.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;

use torpost_shared::constants::DATE_FORMAT;

use crate::error::{Result, StoreError};

/// Writes activity lines under a fixed directory.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    dir: PathBuf,
}

impl ActivityLog {
    /// Create the log directory if missing and return the log handle.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::ActivityLog {
            peer: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Append one message line to the peer's log file.
    pub fn append(&self, peer_id: &str, msg: &str) -> Result<()> {
        let path = self.dir.join(peer_id);
        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            let date = Utc::now().format(DATE_FORMAT);
            writeln!(file, "{{[{date}] | [{peer_id}]}}:\t{msg}")
        };
        write().map_err(|source| StoreError::ActivityLog {
            peer: peer_id.to_string(),
            source,
        })
    }
}
