// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ROI selector — restrict the search to the caller's overlay rectangle.

use tagscan_core::RoiRect;
use tracing::debug;

use crate::frame::Frame;

/// The frame the rest of the pipeline searches, plus where it sits in the
/// source frame.
#[derive(Debug)]
pub struct RoiSelection {
    pub frame: Frame,
    /// The clamped ROI actually applied, `None` when searching the full frame.
    pub rect: Option<RoiRect>,
}

impl RoiSelection {
    /// Offset of the searched frame's origin in source-pixel space.
    pub fn offset(&self) -> (f32, f32) {
        match self.rect {
            Some(rect) => (rect.x as f32, rect.y as f32),
            None => (0.0, 0.0),
        }
    }
}

/// Crop `frame` to `roi`.
///
/// A missing, degenerate (`w <= 0` or `h <= 0`), or non-overlapping ROI, or
/// one covering the whole frame, leaves the full frame in place. This never
/// fails.
pub fn select_roi(frame: Frame, roi: Option<RoiRect>) -> RoiSelection {
    let (width, height) = frame.dimensions();
    let clamped = roi.and_then(|rect| rect.clamp_to(width, height));
    match clamped {
        Some(rect) if !rect.covers(width, height) => {
            debug!(roi = %rect, "Restricting search to ROI");
            RoiSelection {
                frame: frame.crop(rect),
                rect: Some(rect),
            }
        }
        _ => {
            if roi.is_some() {
                debug!(?roi, "ROI collapsed or spans the frame; searching full frame");
            }
            RoiSelection { frame, rect: None }
        }
    }
}
