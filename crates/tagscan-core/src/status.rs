// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language status messages for capture outcomes and errors.
//
// The capture screen shows one sentence after every capture. Detection
// fallbacks are normal outcomes, so they get a friendly line rather than an
// error banner; real faults map to a message plus a suggestion.

use crate::error::TagscanError;
use crate::types::RejectReason;

/// How the UI should present a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Everything worked.
    Success,
    /// The capture was kept but not straightened.
    Degraded,
    /// The user has to do something (pick another file, retake).
    ActionRequired,
    /// Cannot be fixed by retrying.
    Permanent,
}

/// A status line with an optional hint for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub suggestion: Option<String>,
    pub severity: Severity,
}

/// Describe a finished capture. `None` means the tag was straightened.
pub fn describe_outcome(reason: Option<RejectReason>) -> StatusMessage {
    match reason {
        None => StatusMessage {
            message: "Captured and auto-straightened. Tag is now aligned like a straight-on shot."
                .into(),
            suggestion: None,
            severity: Severity::Success,
        },
        Some(RejectReason::ProcessingError) => StatusMessage {
            message: "Captured, but auto-straighten failed. Showing uncorrected preview.".into(),
            suggestion: Some("Retake the photo; the saved copy is still usable.".into()),
            severity: Severity::Degraded,
        },
        Some(RejectReason::NoRegionFound) => StatusMessage {
            message: "Captured, but could not confidently find the tag edges. Showing best grayscale capture."
                .into(),
            suggestion: Some("Place the tag on a plain, contrasting background.".into()),
            severity: Severity::Degraded,
        },
        Some(RejectReason::ShapeRejected) => StatusMessage {
            message: "Captured, but could not confidently find the tag edges. Showing best grayscale capture."
                .into(),
            suggestion: Some("Move closer so the tag fills more of the frame.".into()),
            severity: Severity::Degraded,
        },
        Some(RejectReason::DegenerateGeometry) => StatusMessage {
            message: "Captured, but could not confidently find the tag edges. Showing best grayscale capture."
                .into(),
            suggestion: Some("Hold the camera more square to the tag.".into()),
            severity: Severity::Degraded,
        },
    }
}

/// Convert a `TagscanError` into a status line.
pub fn humanize_error(err: &TagscanError) -> StatusMessage {
    match err {
        TagscanError::NotReady | TagscanError::EngineFailed(_) => StatusMessage {
            message: "Advanced processing not available.".into(),
            suggestion: Some("Wait a moment for the image engine to load, then capture again.".into()),
            severity: Severity::ActionRequired,
        },
        TagscanError::InvalidFrame(_) | TagscanError::ImageError(_) => StatusMessage {
            message: "Failed to load image.".into(),
            suggestion: Some("Please choose an image file (JPEG or PNG).".into()),
            severity: Severity::ActionRequired,
        },
        TagscanError::PayloadTooLarge { limit, .. } => StatusMessage {
            message: "This image is too large to save.".into(),
            suggestion: Some(format!("Images up to {} can be archived.", format_bytes(*limit))),
            severity: Severity::Permanent,
        },
        TagscanError::Archive(_) | TagscanError::Io(_) | TagscanError::Serialization(_) => {
            StatusMessage {
                message: "Failed to save images.".into(),
                suggestion: Some("Check that the archive folder is writable, then try again.".into()),
                severity: Severity::ActionRequired,
            }
        }
        TagscanError::IntegrityMismatch { .. } => StatusMessage {
            message: "An archived image has been modified or damaged.".into(),
            suggestion: None,
            severity: Severity::Permanent,
        },
        TagscanError::NotFound(detail) => StatusMessage {
            message: "That archived pair could not be found.".into(),
            suggestion: Some(format!("Refresh the archive list. ({detail})")),
            severity: Severity::ActionRequired,
        },
        TagscanError::Config(detail) => StatusMessage {
            message: "The settings file has an invalid value.".into(),
            suggestion: Some(detail.clone()),
            severity: Severity::ActionRequired,
        },
        TagscanError::Segmentation(_) => StatusMessage {
            message: "Captured, but auto-straighten failed. Showing uncorrected preview.".into(),
            suggestion: None,
            severity: Severity::Degraded,
        },
    }
}

/// Render a byte count as `"12.3 KB"` or `"1.25 MB"`.
pub fn format_bytes(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{kb:.1} KB");
    }
    format!("{:.2} MB", kb / 1024.0)
}
