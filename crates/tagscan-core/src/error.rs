// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tagscan.

use thiserror::Error;

/// Top-level error type for all Tagscan operations.
///
/// Expected detection outcomes (no region, rejected shape, degenerate
/// geometry) are *not* errors; they travel as [`crate::RejectReason`] inside
/// a detection outcome. This enum covers faults and collaborator failures.
#[derive(Debug, Error)]
pub enum TagscanError {
    // -- Frame / vision errors --
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("segmentation failed: {0}")]
    Segmentation(String),

    #[error("vision engine is not ready")]
    NotReady,

    #[error("vision engine failed to initialise: {0}")]
    EngineFailed(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Archive --
    #[error("archive error: {0}")]
    Archive(String),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("not found: {0}")]
    NotFound(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TagscanError>;
