// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tagscan-archive — Storage and listing of captured tag pairs.
//
// Each capture is stored as an original/corrected JPEG pair in its own
// directory, alongside a JSON sidecar with SHA-256 digests and the
// detection metadata.

pub mod integrity;
pub mod store;

pub use integrity::{hash_bytes, verify_hash};
pub use store::{ArchiveEntry, FsArchive, PairRecord, PairSidecar, PairStore};
