// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pair store — one directory per capture under the archive root:
//
//   <root>/<id>/original.jpg
//   <root>/<id>/corrected.jpg
//   <root>/<id>/pair.json
//
// Ids are millisecond UTC timestamps, bumped until unused.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagscan_core::error::{Result, TagscanError};
use tagscan_core::{Quad, RejectReason};
use tracing::{debug, info, instrument, warn};

use crate::integrity::{hash_bytes, verify_hash};

pub const ORIGINAL_FILE: &str = "original.jpg";
pub const CORRECTED_FILE: &str = "corrected.jpg";
pub const SIDECAR_FILE: &str = "pair.json";

/// URL prefix under which archived files are served.
pub const FILES_URL_PREFIX: &str = "/files";

/// One archived pair as returned by save and list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub id: String,
    pub original_url: String,
    pub corrected_url: String,
    pub original_size: u64,
    pub corrected_size: u64,
}

impl ArchiveEntry {
    fn new(id: &str, original_size: u64, corrected_size: u64) -> Self {
        Self {
            id: id.to_owned(),
            original_url: format!("{FILES_URL_PREFIX}/{id}/{ORIGINAL_FILE}"),
            corrected_url: format!("{FILES_URL_PREFIX}/{id}/{CORRECTED_FILE}"),
            original_size,
            corrected_size,
        }
    }
}

/// Detection metadata stored with a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub used_perspective: bool,
    pub reason: Option<RejectReason>,
    pub quad: Option<Quad>,
}

impl PairRecord {
    pub fn rectified(quad: Quad) -> Self {
        Self {
            used_perspective: true,
            reason: None,
            quad: Some(quad),
        }
    }

    pub fn fallback(reason: RejectReason) -> Self {
        Self {
            used_perspective: false,
            reason: Some(reason),
            quad: None,
        }
    }
}

/// Contents of `pair.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSidecar {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub original_sha256: String,
    pub corrected_sha256: String,
    pub original_size: u64,
    pub corrected_size: u64,
    #[serde(flatten)]
    pub record: PairRecord,
}

/// Storage and listing of original/corrected image pairs.
pub trait PairStore {
    /// Store both encoded images and return the new entry.
    fn save_pair(&self, original: &[u8], corrected: &[u8], record: &PairRecord) -> Result<ArchiveEntry>;

    /// Complete pairs, newest first.
    fn list(&self) -> Result<Vec<ArchiveEntry>>;

    /// Re-hash both images of `id` against its sidecar.
    fn verify(&self, id: &str) -> Result<PairSidecar>;
}

/// [`PairStore`] on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
    max_payload_bytes: u64,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>, max_payload_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_payload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_payload(&self, label: &str, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(TagscanError::Archive(format!("{label} image is empty")));
        }
        let size = data.len() as u64;
        if size > self.max_payload_bytes {
            return Err(TagscanError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    fn pair_dir(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(TagscanError::NotFound(format!("archive entry {id:?}")));
        }
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(TagscanError::NotFound(format!("archive entry {id}")));
        }
        Ok(dir)
    }
}

impl PairStore for FsArchive {
    #[instrument(skip_all, fields(
        root = %self.root.display(),
        original_len = original.len(),
        corrected_len = corrected.len(),
    ))]
    fn save_pair(&self, original: &[u8], corrected: &[u8], record: &PairRecord) -> Result<ArchiveEntry> {
        self.check_payload("original", original)?;
        self.check_payload("corrected", corrected)?;

        fs::create_dir_all(&self.root)?;
        let created_at = Utc::now();
        let (id, dir) = allocate_pair_dir(&self.root, created_at.timestamp_millis())?;

        let sidecar = PairSidecar {
            id: id.clone(),
            created_at,
            original_sha256: hash_bytes(original),
            corrected_sha256: hash_bytes(corrected),
            original_size: original.len() as u64,
            corrected_size: corrected.len() as u64,
            record: *record,
        };
        write_pair_or_discard(&dir, original, corrected, &sidecar)?;

        info!(%id, used_perspective = record.used_perspective, "Pair archived");
        Ok(ArchiveEntry::new(&id, sidecar.original_size, sidecar.corrected_size))
    }

    #[instrument(skip_all, fields(root = %self.root.display()))]
    fn list(&self) -> Result<Vec<ArchiveEntry>> {
        let reader = match fs::read_dir(&self.root) {
            Ok(reader) => reader,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for item in reader {
            let item = item?;
            if !item.file_type()?.is_dir() {
                continue;
            }
            let Some(id) = item.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !is_valid_id(&id) {
                continue;
            }
            let dir = item.path();
            let (Ok(original), Ok(corrected), true) = (
                fs::metadata(dir.join(ORIGINAL_FILE)),
                fs::metadata(dir.join(CORRECTED_FILE)),
                dir.join(SIDECAR_FILE).is_file(),
            ) else {
                debug!(%id, "Skipping incomplete pair");
                continue;
            };
            entries.push(ArchiveEntry::new(&id, original.len(), corrected.len()));
        }

        // Newest first. Ids are decimal timestamps, so compare numerically.
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.id.parse::<u64>().unwrap_or(0)));
        debug!(count = entries.len(), "Archive listed");
        Ok(entries)
    }

    #[instrument(skip(self))]
    fn verify(&self, id: &str) -> Result<PairSidecar> {
        let dir = self.pair_dir(id)?;
        let sidecar_bytes = fs::read(dir.join(SIDECAR_FILE)).map_err(|err| match err.kind() {
            ErrorKind::NotFound => TagscanError::Archive(format!("pair {id} has no {SIDECAR_FILE}")),
            _ => err.into(),
        })?;
        let sidecar: PairSidecar = serde_json::from_slice(&sidecar_bytes)?;

        for (file, expected) in [
            (ORIGINAL_FILE, &sidecar.original_sha256),
            (CORRECTED_FILE, &sidecar.corrected_sha256),
        ] {
            let data = fs::read(dir.join(file))?;
            if let Err(err) = verify_hash(&data, expected) {
                warn!(%id, file, "Archived image failed integrity check");
                return Err(err);
            }
        }
        info!(%id, "Pair verified");
        Ok(sidecar)
    }
}

/// Images first, sidecar last. On any failure the whole `dir` is removed so
/// no half-written entry is left behind.
fn write_pair_or_discard(dir: &Path, original: &[u8], corrected: &[u8], sidecar: &PairSidecar) -> Result<()> {
    let written = (|| -> Result<()> {
        fs::write(dir.join(ORIGINAL_FILE), original)?;
        fs::write(dir.join(CORRECTED_FILE), corrected)?;
        fs::write(dir.join(SIDECAR_FILE), serde_json::to_vec_pretty(sidecar)?)?;
        Ok(())
    })();

    if let Err(err) = written {
        warn!(id = %sidecar.id, error = %err, "Pair write failed, removing partial entry");
        if let Err(cleanup) = fs::remove_dir_all(dir) {
            warn!(id = %sidecar.id, error = %cleanup, "Could not remove partial entry");
        }
        return Err(err);
    }
    Ok(())
}

/// Decimal digits only: rejects path separators and `..`.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// Create `<root>/<id>` for the first unused id at or after `start_millis`.
fn allocate_pair_dir(root: &Path, start_millis: i64) -> Result<(String, PathBuf)> {
    let mut candidate = start_millis.max(0);
    loop {
        let id = candidate.to_string();
        let dir = root.join(&id);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((id, dir)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(%id, "Archive id taken, bumping");
                candidate += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
