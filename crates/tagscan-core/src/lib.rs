// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tagscan — Core types and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use config::{AppConfig, PipelineConfig, SegmenterStrategy};
pub use error::TagscanError;
pub use types::*;
