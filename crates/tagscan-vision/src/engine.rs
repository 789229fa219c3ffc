// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vision engine — readiness state machine guarding the detection pipeline.
//
// The engine starts `Uninitialized`, runs a self-test on `initialize`, and
// moves to `Ready` or `Failed`. Detection is only reachable through a
// `VisionHandle`, which can only be obtained from a `Ready` engine.

use std::panic::{self, AssertUnwindSafe};

use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::geometric_transformations::Projection;
use tagscan_core::error::TagscanError;
use tagscan_core::{PipelineConfig, RoiRect};
use tracing::{info, instrument, warn};

use crate::frame::Frame;
use crate::pipeline::{self, DetectionOutcome};
use crate::segment::segmenter_for;

/// Lifecycle of the vision capability.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Ready,
    /// Initialisation failed; `initialize` may be retried.
    Failed(String),
}

/// Owner of the vision capability.
#[derive(Debug, Default)]
pub struct VisionEngine {
    state: EngineState,
}

impl VisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    /// Run the built-in self-test and move to `Ready` or `Failed`.
    pub fn initialize(&mut self) -> Result<VisionHandle, TagscanError> {
        self.initialize_with(self_test)
    }

    /// Initialise with a caller-supplied self-check. A `Ready` engine returns its
    /// handle without checking again; `Uninitialized` and `Failed` engines run
    /// the self-check.
    #[instrument(skip_all, fields(state = ?self.state))]
    pub fn initialize_with<F>(&mut self, check: F) -> Result<VisionHandle, TagscanError>
    where
        F: FnOnce() -> Result<(), String>,
    {
        if self.is_ready() {
            return Ok(VisionHandle { _private: () });
        }

        let result = panic::catch_unwind(AssertUnwindSafe(check))
            .unwrap_or_else(|_| Err("self-test panicked".to_string()));

        match result {
            Ok(()) => {
                self.state = EngineState::Ready;
                info!("Vision engine ready");
                Ok(VisionHandle { _private: () })
            }
            Err(message) => {
                warn!(%message, "Vision engine failed to initialise");
                self.state = EngineState::Failed(message.clone());
                Err(TagscanError::EngineFailed(message))
            }
        }
    }

    /// A handle to the pipeline, or a typed error naming why none is
    /// available.
    pub fn handle(&self) -> Result<VisionHandle, TagscanError> {
        match &self.state {
            EngineState::Ready => Ok(VisionHandle { _private: () }),
            EngineState::Uninitialized => Err(TagscanError::NotReady),
            EngineState::Failed(message) => Err(TagscanError::EngineFailed(message.clone())),
        }
    }

    /// Convenience wrapper: fetch the handle and run the pipeline.
    pub fn detect_and_rectify(
        &self,
        frame: Frame,
        roi: Option<RoiRect>,
        config: &PipelineConfig,
    ) -> Result<DetectionOutcome, TagscanError> {
        Ok(self.handle()?.detect_and_rectify(frame, roi, config))
    }
}

/// Proof that the vision engine initialised successfully.
#[derive(Debug, Clone, Copy)]
pub struct VisionHandle {
    _private: (),
}

impl VisionHandle {
    /// Detect the tag in `frame` (optionally within `roi`) and rectify it,
    /// using the segmenter `config` selects.
    pub fn detect_and_rectify(
        &self,
        frame: Frame,
        roi: Option<RoiRect>,
        config: &PipelineConfig,
    ) -> DetectionOutcome {
        let segmenter = segmenter_for(config);
        pipeline::run(segmenter.as_ref(), frame, roi, config)
    }
}

/// Exercise the homography solver and the edge detector once.
fn self_test() -> Result<(), String> {
    let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    let skewed = [(0.0, 0.0), (2.0, 0.1), (2.1, 2.0), (-0.1, 1.9)];
    if Projection::from_control_points(skewed, square).is_none() {
        return Err("homography solver rejected a valid quad".into());
    }

    let mut sample = GrayImage::new(16, 16);
    for y in 4..12 {
        for x in 4..12 {
            sample.put_pixel(x, y, Luma([255]));
        }
    }
    let edges = canny(&sample, 50.0, 150.0);
    if !edges.pixels().any(|p| p.0[0] > 0) {
        return Err("edge detector found no edges in the sample image".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flat_frame, tag_scene};
    use tagscan_core::RejectReason;

    #[test]
    fn new_engine_is_not_ready() {
        let engine = VisionEngine::new();
        assert_eq!(engine.state(), &EngineState::Uninitialized);
        assert!(matches!(engine.handle(), Err(TagscanError::NotReady)));
        let err = engine
            .detect_and_rectify(flat_frame(10, 10, 0), None, &PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, TagscanError::NotReady));
    }

    #[test]
    fn self_test_passes() {
        let mut engine = VisionEngine::new();
        engine.initialize().expect("self-test");
        assert!(engine.is_ready());
        assert!(engine.handle().is_ok());
    }

    #[test]
    fn failed_self_check_reports_engine_failed() {
        let mut engine = VisionEngine::new();
        let err = engine
            .initialize_with(|| Err("no vision runtime".into()))
            .unwrap_err();
        assert!(matches!(err, TagscanError::EngineFailed(ref m) if m == "no vision runtime"));
        assert_eq!(engine.state(), &EngineState::Failed("no vision runtime".into()));
        assert!(matches!(engine.handle(), Err(TagscanError::EngineFailed(_))));
    }

    #[test]
    fn panicking_self_check_is_contained() {
        let mut engine = VisionEngine::new();
        let result = engine.initialize_with(|| panic!("driver crashed"));
        assert!(result.is_err());
        assert!(matches!(engine.state(), EngineState::Failed(_)));
    }

    #[test]
    fn failed_engine_can_retry() {
        let mut engine = VisionEngine::new();
        let _ = engine.initialize_with(|| Err("first attempt".into()));
        engine.initialize_with(|| Ok(())).expect("second attempt");
        assert!(engine.is_ready());
    }

    #[test]
    fn ready_engine_does_not_check_again() {
        let mut engine = VisionEngine::new();
        engine.initialize_with(|| Ok(())).expect("ready");
        engine
            .initialize_with(|| Err("should not run".into()))
            .expect("still ready");
        assert!(engine.is_ready());
    }

    #[test]
    fn handle_runs_pipeline() {
        let mut engine = VisionEngine::new();
        let handle = engine.initialize().expect("ready");
        let config = PipelineConfig::default();

        let outcome = handle.detect_and_rectify(tag_scene(400, 400, 100, 200, 10.0), None, &config);
        assert!(outcome.used_perspective(), "{:?}", outcome.reason());

        let outcome = engine
            .detect_and_rectify(flat_frame(64, 48, 200), None, &config)
            .expect("ready");
        assert_eq!(outcome.reason(), Some(RejectReason::NoRegionFound));
        assert_eq!(outcome.image().dimensions(), (64, 48));
    }
}
