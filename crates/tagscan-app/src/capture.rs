// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture service — decode, straighten, encode, and archive one photo.
//
// Owns the vision engine and the archive so the CLI only has to parse
// arguments and print results.

use serde::Serialize;
use tagscan_archive::{ArchiveEntry, FsArchive, PairRecord, PairStore};
use tagscan_core::error::{Result, TagscanError};
use tagscan_core::status::{StatusMessage, describe_outcome};
use tagscan_core::{AppConfig, PipelineConfig, Quad, RejectReason, RoiRect};
use tagscan_vision::{DetectionOutcome, Frame, FrameDecoder, FrameEncoder, ImageCodec, VisionEngine};
use tracing::{info, instrument};

/// Where the caller's ROI was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiSpace {
    /// Already in source-pixel coordinates.
    Source,
    /// Drawn over a preview of the given `(width, height)`.
    Display(u32, u32),
}

/// Result of one capture.
#[derive(Debug)]
pub struct CaptureReport {
    pub entry: ArchiveEntry,
    pub used_perspective: bool,
    pub reason: Option<RejectReason>,
    pub quad: Option<Quad>,
    pub status: StatusMessage,
    /// The straightened (or fallback) image that was archived.
    pub corrected: Frame,
}

/// JSON view of a [`CaptureReport`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary<'a> {
    #[serde(flatten)]
    pub entry: &'a ArchiveEntry,
    pub used_perspective: bool,
    pub reason: Option<RejectReason>,
    pub quad: Option<Quad>,
    pub status: &'a str,
}

impl CaptureReport {
    pub fn summary(&self) -> CaptureSummary<'_> {
        CaptureSummary {
            entry: &self.entry,
            used_perspective: self.used_perspective,
            reason: self.reason,
            quad: self.quad,
            status: &self.status.message,
        }
    }
}

pub struct CaptureService {
    engine: VisionEngine,
    archive: FsArchive,
    config: AppConfig,
}

impl CaptureService {
    pub fn new(config: AppConfig) -> Self {
        let archive = FsArchive::new(config.archive_dir.clone(), config.max_upload_bytes);
        Self {
            engine: VisionEngine::new(),
            archive,
            config,
        }
    }

    pub fn archive(&self) -> &FsArchive {
        &self.archive
    }

    /// Straighten `bytes` and archive the original/corrected pair.
    ///
    /// Detection fallbacks are not errors: the report carries the reason and
    /// a status line. Errors are reserved for undecodable input, an engine
    /// that failed its self-test, and archive failures.
    #[instrument(skip_all, fields(input_len = bytes.len(), roi = ?roi))]
    pub fn capture(
        &mut self,
        bytes: &[u8],
        roi: Option<(RoiRect, RoiSpace)>,
        pipeline: &PipelineConfig,
    ) -> Result<CaptureReport> {
        let size = bytes.len() as u64;
        if size > self.config.max_upload_bytes {
            return Err(TagscanError::PayloadTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }
        pipeline.validate()?;
        let handle = self.engine.initialize()?;

        let codec = ImageCodec::jpeg(self.config.jpeg_quality);
        let frame = codec.decode(bytes)?;
        let roi = roi.and_then(|(rect, space)| match space {
            RoiSpace::Source => Some(rect),
            RoiSpace::Display(w, h) => RoiRect::from_display(rect, (w, h), frame.dimensions()),
        });
        let original = codec.encode(&frame)?;

        let outcome = handle.detect_and_rectify(frame, roi, pipeline);
        let corrected = codec.encode(outcome.image())?;
        let record = match &outcome {
            DetectionOutcome::Rectified { quad, .. } => PairRecord::rectified(*quad),
            DetectionOutcome::Fallback { reason, .. } => PairRecord::fallback(*reason),
        };
        let entry = self.archive.save_pair(&original, &corrected, &record)?;

        let status = describe_outcome(outcome.reason());
        info!(id = %entry.id, used_perspective = record.used_perspective, "Capture complete");
        Ok(CaptureReport {
            entry,
            used_perspective: record.used_perspective,
            reason: record.reason,
            quad: record.quad,
            status,
            corrected: outcome.into_image(),
        })
    }
}
