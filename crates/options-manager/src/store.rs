//! JSON file persistence for the ledger.
//!
//! Snapshots are written to a temp file next to the target and renamed over
//! it, so a crash mid-write leaves the previous ledger intact. Writers from
//! different processes serialize on an advisory lock file next to the ledger.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gex_desk_core::{DeskError, ExitPolicyConfig, Position, PricingMode, Result};

/// Current on-disk layout version.
pub const STORE_VERSION: u32 = 1;

/// Everything the desk restores on start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLedger {
    pub version: u32,
    /// Bumped by every committed mutation; lets a desk notice writes made by
    /// another process.
    #[serde(default)]
    pub revision: u64,
    pub saved_at: DateTime<Utc>,
    pub starting_cash: Decimal,
    pub pricing_mode: PricingMode,
    pub exit_policy: ExitPolicyConfig,
    pub positions: Vec<Position>,
}

/// Exclusive hold on the ledger's lock file, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Ledger persisted as one pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonLedgerStore {
    path: PathBuf,
}

impl JsonLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Blocks until this process holds the writer lock for the ledger.
    ///
    /// Hold it across load, mutate and save so a concurrent writer cannot
    /// overwrite changes it has not seen.
    ///
    /// # Errors
    /// `Persistence` if the lock file cannot be created or locked.
    pub fn lock(&self) -> Result<StoreLock> {
        let lock_path = self.lock_path();
        let persistence = |what: &str, e: &dyn std::fmt::Display| {
            DeskError::Persistence(format!("failed to {what} {}: {e}", lock_path.display()))
        };

        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence("create directory for", &e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| persistence("open", &e))?;
        file.lock_exclusive().map_err(|e| persistence("lock", &e))?;
        Ok(StoreLock { file })
    }

    /// Loads the stored ledger, or `None` if nothing has been saved yet.
    ///
    /// # Errors
    /// `Persistence` if the file exists but cannot be read or decoded, or was
    /// written by a newer layout version.
    pub fn load(&self) -> Result<Option<StoredLedger>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DeskError::Persistence(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let stored: StoredLedger = serde_json::from_slice(&bytes).map_err(|e| {
            DeskError::Persistence(format!("failed to decode {}: {e}", self.path.display()))
        })?;

        if stored.version > STORE_VERSION {
            return Err(DeskError::Persistence(format!(
                "unsupported ledger version {} (max {STORE_VERSION})",
                stored.version
            )));
        }

        debug!(
            path = %self.path.display(),
            positions = stored.positions.len(),
            "Loaded ledger"
        );
        Ok(Some(stored))
    }

    /// Writes the ledger atomically.
    ///
    /// # Errors
    /// `Persistence` on any I/O or encoding failure.
    pub fn save(&self, ledger: &StoredLedger) -> Result<()> {
        let persistence = |what: &str, e: &dyn std::fmt::Display| {
            DeskError::Persistence(format!("failed to {what} {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence("create directory for", &e))?;
        }

        let json = serde_json::to_vec_pretty(ledger).map_err(|e| persistence("encode", &e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| persistence("write", &e))?;
        fs::rename(&tmp, &self.path).map_err(|e| persistence("replace", &e))?;

        debug!(
            path = %self.path.display(),
            positions = ledger.positions.len(),
            "Saved ledger"
        );
        Ok(())
    }
}
