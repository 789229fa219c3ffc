// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pair integrity — SHA-256 digests recorded at archive time and checked on
// verification.

use sha2::{Digest, Sha256};
use tagscan_core::error::TagscanError;

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against a recorded hex digest.
///
/// Returns `Err(TagscanError::IntegrityMismatch)` carrying both digests when
/// the image on disk no longer matches what was archived.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<(), TagscanError> {
    let actual = hash_bytes(data);
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(TagscanError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}
