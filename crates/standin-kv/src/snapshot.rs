// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The on-disk snapshot: one JSON object mapping parameter names to values.
//!
//! Every write replaces the whole file (temp file, fsync, rename), and every access of one
//! [`SnapshotFile`] is serialized through its lock, so discovery replies never observe a
//! half-written store. A missing or unparsable file reads as an empty snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::constants::SNAPSHOT_LIMIT;
use crate::errors::KvError;

/// Parameter name to value.
pub type Snapshot = BTreeMap<String, String>;

/// Parses snapshot bytes, treating anything malformed as empty.
pub fn decode(bytes: &[u8]) -> Snapshot {
    match serde_json::from_slice(bytes) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Ignoring unreadable snapshot ({} bytes): {}", bytes.len(), e);
            Snapshot::new()
        }
    }
}

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, KvError> {
    Ok(serde_json::to_vec(snapshot)?)
}

/// A snapshot file guarded by a per-instance lock.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current snapshot.
    pub fn load(&self) -> Snapshot {
        let _guard = self.guard();
        self.read()
    }

    /// Serialized form of the current snapshot, as sent in discovery replies.
    pub fn serialized(&self) -> Vec<u8> {
        let snapshot = self.load();
        encode(&snapshot).unwrap_or_else(|e| {
            warn!("Failed to encode snapshot for discovery reply: {}", e);
            b"{}".to_vec()
        })
    }

    /// Applies `change` to the current snapshot and writes the result back.
    ///
    /// Nothing is written if `change` fails or the result is larger than [`SNAPSHOT_LIMIT`].
    pub fn update<F>(&self, change: F) -> Result<(), KvError>
    where
        F: FnOnce(&mut Snapshot) -> Result<(), KvError>,
    {
        let _guard = self.guard();
        let mut snapshot = self.read();
        change(&mut snapshot)?;

        let bytes = encode(&snapshot)?;
        if bytes.len() > SNAPSHOT_LIMIT {
            return Err(KvError::CapacityExceeded {
                size: bytes.len(),
                limit: SNAPSHOT_LIMIT,
            });
        }
        self.replace(&bytes)?;
        debug!(
            "Wrote snapshot of {} parameters ({} bytes) to {}",
            snapshot.len(),
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    // The lock guards no data of its own, so a poisoned lock is still usable.
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Snapshot {
        match fs::read(&self.path) {
            Ok(bytes) => decode(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Snapshot::new(),
            Err(e) => {
                warn!("Failed to read snapshot {}: {}", self.path.display(), e);
                Snapshot::new()
            }
        }
    }

    fn replace(&self, bytes: &[u8]) -> io::Result<()> {
        let tmp_path = self.tmp_path();
        let written = fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, &self.path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
