// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confidence gate — runs ROI selection, segmentation, quad selection and
// rectification, and turns every rejection or internal fault into a
// fallback image so the caller always receives something usable.

use std::panic::{self, AssertUnwindSafe};

use image::GrayImage;
use tagscan_core::{PipelineConfig, Quad, RejectReason, RoiRect};
use tracing::{debug, info, instrument, warn};

use crate::frame::Frame;
use crate::quad::select_quad;
use crate::rectify::{crop_margin, rectify};
use crate::roi::select_roi;
use crate::segment::Segmenter;

/// Result of one detect-and-rectify invocation. Both variants carry a valid
/// grayscale image.
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    /// The tag was found and straightened. `quad` is in source-frame pixels.
    Rectified { image: Frame, quad: Quad },
    /// Detection was not confident; `image` is a scaled grayscale copy of
    /// the ROI (or full frame).
    Fallback { image: Frame, reason: RejectReason },
}

impl DetectionOutcome {
    /// Whether a perspective correction was applied.
    pub fn used_perspective(&self) -> bool {
        matches!(self, Self::Rectified { .. })
    }

    pub fn image(&self) -> &Frame {
        match self {
            Self::Rectified { image, .. } | Self::Fallback { image, .. } => image,
        }
    }

    pub fn into_image(self) -> Frame {
        match self {
            Self::Rectified { image, .. } | Self::Fallback { image, .. } => image,
        }
    }

    /// Why detection fell back, `None` when rectified.
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rectified { .. } => None,
            Self::Fallback { reason, .. } => Some(*reason),
        }
    }

    /// The detected quad, `None` on fallback.
    pub fn quad(&self) -> Option<Quad> {
        match self {
            Self::Rectified { quad, .. } => Some(*quad),
            Self::Fallback { .. } => None,
        }
    }
}

/// Run the full pipeline on `frame`.
///
/// Never fails: a segmenter error, an invalid mask, or a panic inside any
/// detection stage becomes `Fallback(ProcessingError)`. Masks, contours and
/// the warped buffer are owned by this call and dropped on every path.
#[instrument(skip_all, fields(
    segmenter = segmenter.name(),
    width = frame.width(),
    height = frame.height(),
    roi = ?roi,
))]
pub(crate) fn run(
    segmenter: &dyn Segmenter,
    frame: Frame,
    roi: Option<RoiRect>,
    config: &PipelineConfig,
) -> DetectionOutcome {
    let selection = select_roi(frame, roi);
    let (dx, dy) = selection.offset();

    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        detect(segmenter, &selection.frame, config)
    }));
    let result = attempt.unwrap_or_else(|_| {
        warn!("Detection stage panicked");
        Err(RejectReason::ProcessingError)
    });

    match result {
        Ok((rectified, quad)) => {
            let image = crop_margin(rectified, config.margin_crop_fraction, config.min_crop_side);
            let quad = quad.translate(dx, dy);
            info!(
                width = image.width(),
                height = image.height(),
                "Tag rectified"
            );
            DetectionOutcome::Rectified {
                image: Frame::wrap_gray(image),
                quad,
            }
        }
        Err(reason) => {
            let image = fallback_image(selection.frame, config);
            warn!(
                %reason,
                width = image.width(),
                height = image.height(),
                "Falling back to grayscale copy"
            );
            DetectionOutcome::Fallback { image, reason }
        }
    }
}

/// Segment, select, rectify. Every intermediate buffer lives in this frame.
fn detect(
    segmenter: &dyn Segmenter,
    frame: &Frame,
    config: &PipelineConfig,
) -> Result<(GrayImage, Quad), RejectReason> {
    let mask = segmenter.segment(frame).map_err(|err| {
        warn!(segmenter = segmenter.name(), %err, "Segmenter failed");
        RejectReason::ProcessingError
    })?;
    if mask.dimensions() != frame.dimensions() {
        warn!(
            mask_width = mask.width(),
            mask_height = mask.height(),
            "Mask does not match frame dimensions"
        );
        return Err(RejectReason::ProcessingError);
    }

    let candidate = select_quad(&mask, config)?;
    drop(mask);
    debug!(source = ?candidate.source, quad = ?candidate.quad, "Quad accepted");

    let rectified = rectify(frame, &candidate.quad, config)?;
    Ok((rectified, candidate.quad))
}

/// Scaled grayscale copy of `frame`, with the margin crop applied when the
/// configuration asks for it on this branch too.
pub fn fallback_image(frame: Frame, config: &PipelineConfig) -> Frame {
    let gray = frame.scale_to_fit(config.max_dimension).grayscale();
    if !config.crop_fallback || config.margin_crop_fraction.is_none() {
        return gray;
    }
    let cropped = crop_margin(
        gray.into_dynamic().into_luma8(),
        config.margin_crop_fraction,
        config.min_crop_side,
    );
    Frame::wrap_gray(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segmenter_for;
    use crate::testing::{color_scene, flat_frame, rgb_frame, tag_scene, tag_scene_at};
    use image::{Luma, Rgb, RgbImage};
    use tagscan_core::error::TagscanError;
    use tagscan_core::{PixelLayout, Point};

    fn detect_with_config(frame: Frame, roi: Option<RoiRect>, config: &PipelineConfig) -> DetectionOutcome {
        let segmenter = segmenter_for(config);
        run(segmenter.as_ref(), frame, roi, config)
    }

    fn assert_near(actual: u32, expected: u32, tolerance: u32) {
        assert!(
            actual.abs_diff(expected) <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    struct FailingSegmenter;

    impl Segmenter for FailingSegmenter {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn segment(&self, _frame: &Frame) -> Result<GrayImage, TagscanError> {
            Err(TagscanError::Segmentation("colour conversion failed".into()))
        }
    }

    struct PanickingSegmenter;

    impl Segmenter for PanickingSegmenter {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn segment(&self, _frame: &Frame) -> Result<GrayImage, TagscanError> {
            panic!("segmenter blew up")
        }
    }

    struct WrongSizeSegmenter;

    impl Segmenter for WrongSizeSegmenter {
        fn name(&self) -> &'static str {
            "wrong-size"
        }

        fn segment(&self, _frame: &Frame) -> Result<GrayImage, TagscanError> {
            Ok(GrayImage::new(1, 1))
        }
    }

    /// Emits a single horizontal line across the frame.
    struct LineSegmenter;

    impl Segmenter for LineSegmenter {
        fn name(&self) -> &'static str {
            "line"
        }

        fn segment(&self, frame: &Frame) -> Result<GrayImage, TagscanError> {
            let (w, h) = frame.dimensions();
            let mut mask = GrayImage::new(w, h);
            for x in w / 4..3 * w / 4 {
                mask.put_pixel(x, h / 2, Luma([255]));
            }
            Ok(mask)
        }
    }

    #[test]
    fn rotated_tag_is_rectified() {
        let frame = tag_scene(1000, 1000, 200, 400, 15.0);
        let outcome = detect_with_config(frame, None, &PipelineConfig::default());
        assert!(outcome.used_perspective(), "{:?}", outcome.reason());
        let image = outcome.image();
        assert_eq!(image.layout(), PixelLayout::Gray);
        assert_near(image.width(), 200, 2);
        assert_near(image.height(), 400, 2);

        let quad = outcome.quad().expect("quad");
        assert!(!quad.is_degenerate());
        // The tag is centred in the frame.
        let centre = quad
            .corners()
            .iter()
            .fold(Point::new(0.0, 0.0), |acc, p| Point::new(acc.x + p.x / 4.0, acc.y + p.y / 4.0));
        assert!(centre.distance(&Point::new(500.0, 500.0)) < 3.0, "{centre:?}");
    }

    #[test]
    fn uniform_frame_falls_back_unchanged_in_size() {
        let outcome = detect_with_config(flat_frame(500, 500, 128), None, &PipelineConfig::default());
        assert!(!outcome.used_perspective());
        assert_eq!(outcome.reason(), Some(RejectReason::NoRegionFound));
        assert_eq!(outcome.image().dimensions(), (500, 500));
        assert_eq!(outcome.image().layout(), PixelLayout::Gray);
    }

    #[test]
    fn fallback_is_idempotent() {
        let config = PipelineConfig::default();
        let first = detect_with_config(flat_frame(700, 300, 60), None, &config);
        let dims = first.image().dimensions();
        let second = detect_with_config(first.into_image(), None, &config);
        assert_eq!(second.reason(), Some(RejectReason::NoRegionFound));
        assert_eq!(second.image().dimensions(), dims);
    }

    #[test]
    fn fallback_is_clamped_to_max_dimension() {
        let frame = rgb_frame(RgbImage::from_pixel(2000, 1000, Rgb([80, 80, 80])));
        let outcome = detect_with_config(frame, None, &PipelineConfig::default());
        assert_eq!(outcome.reason(), Some(RejectReason::NoRegionFound));
        assert_eq!(outcome.image().dimensions(), (1600, 800));
    }

    #[test]
    fn lowering_min_area_only_turns_rejections_into_success() {
        // 60x120 tag covers 4.5% of the frame.
        let mut accepted = false;
        for fraction in [0.25, 0.10, 0.05, 0.04, 0.01, 0.0] {
            let config = PipelineConfig {
                min_area_fraction: fraction,
                ..PipelineConfig::default()
            };
            let outcome = detect_with_config(tag_scene(400, 400, 60, 120, 0.0), None, &config);
            match outcome.reason() {
                None => accepted = true,
                Some(reason) => {
                    assert!(!accepted, "rejected at {fraction} after being accepted");
                    assert_eq!(reason, RejectReason::ShapeRejected);
                }
            }
        }
        assert!(accepted);
    }

    #[test]
    fn square_tag_fails_tall_aspect_band() {
        let frame = tag_scene(400, 400, 150, 150, 0.0);
        let outcome = detect_with_config(frame.clone(), None, &PipelineConfig::default());
        assert_eq!(outcome.reason(), Some(RejectReason::ShapeRejected));

        let config = PipelineConfig {
            aspect_ratio_bounds: None,
            ..PipelineConfig::default()
        };
        assert!(detect_with_config(frame, None, &config).used_perspective());
    }

    #[test]
    fn upright_tag_corners_land_on_the_tag() {
        for (tag_w, tag_h) in [(100u32, 200u32), (60, 120)] {
            let frame = tag_scene_at(500, 500, 250.0, 250.0, tag_w, tag_h, 0.0);
            let outcome = detect_with_config(frame, None, &PipelineConfig::default());
            let quad = outcome.quad().expect("upright tag accepted");

            let left = 250.0 - tag_w as f32 / 2.0;
            let top = 250.0 - tag_h as f32 / 2.0;
            let right = left + tag_w as f32 - 1.0;
            let bottom = top + tag_h as f32 - 1.0;
            let expected = [
                (quad.top_left, Point::new(left, top)),
                (quad.top_right, Point::new(right, top)),
                (quad.bottom_right, Point::new(right, bottom)),
                (quad.bottom_left, Point::new(left, bottom)),
            ];
            for (actual, want) in expected {
                assert!(
                    (actual.x - want.x).abs() <= 1.0 && (actual.y - want.y).abs() <= 1.0,
                    "{tag_w}x{tag_h}: corner {actual:?} vs {want:?} in {quad:?}"
                );
            }
        }
    }

    #[test]
    fn roi_restricts_search_and_quad_is_in_source_pixels() {
        // Large tag on the left, small tag on the right.
        let mut img = RgbImage::from_pixel(600, 600, crate::testing::BACKGROUND);
        crate::testing::paint_tag(&mut img, 150.0, 300.0, 100.0, 200.0, 0.0, crate::testing::TAG);
        crate::testing::paint_tag(&mut img, 450.0, 300.0, 60.0, 120.0, 0.0, crate::testing::TAG);
        let frame = rgb_frame(img);
        let config = PipelineConfig::default();

        let whole = detect_with_config(frame.clone(), None, &config);
        let quad = whole.quad().expect("large tag found");
        assert!(quad.top_left.x < 300.0);

        let roi = RoiRect::new(380, 200, 140, 200);
        let restricted = detect_with_config(frame, Some(roi), &config);
        let quad = restricted.quad().expect("small tag found");
        assert!((quad.top_left.x - 420.0).abs() <= 1.0, "{quad:?}");
        assert!((quad.top_left.y - 240.0).abs() <= 1.0, "{quad:?}");
        assert_near(restricted.image().width(), 60, 2);
        assert_near(restricted.image().height(), 120, 2);
    }

    #[test]
    fn roi_fallback_uses_roi_size() {
        let roi = RoiRect::new(10, 20, 120, 90);
        let outcome = detect_with_config(flat_frame(400, 300, 40), Some(roi), &PipelineConfig::default());
        assert_eq!(outcome.reason(), Some(RejectReason::NoRegionFound));
        assert_eq!(outcome.image().dimensions(), (120, 90));
    }

    #[test]
    fn degenerate_roi_searches_full_frame() {
        let frame = tag_scene_at(500, 500, 250.0, 250.0, 100, 200, 0.0);
        let roi = RoiRect::new(40, 40, 0, 100);
        let outcome = detect_with_config(frame, Some(roi), &PipelineConfig::default());
        assert!(outcome.used_perspective(), "{:?}", outcome.reason());
        assert_near(outcome.image().width(), 100, 2);
    }

    #[test]
    fn segmenter_faults_become_processing_errors() {
        let config = PipelineConfig::default();
        let segmenters: [&dyn Segmenter; 3] = [&FailingSegmenter, &PanickingSegmenter, &WrongSizeSegmenter];
        for segmenter in segmenters {
            let outcome = run(segmenter, tag_scene(200, 300, 60, 120, 0.0), None, &config);
            assert_eq!(
                outcome.reason(),
                Some(RejectReason::ProcessingError),
                "{}",
                segmenter.name()
            );
            assert_eq!(outcome.image().dimensions(), (200, 300));
        }
    }

    #[test]
    fn line_mask_is_degenerate() {
        let outcome = run(&LineSegmenter, flat_frame(200, 200, 10), None, &PipelineConfig::default());
        assert_eq!(outcome.reason(), Some(RejectReason::DegenerateGeometry));
    }

    #[test]
    fn colour_blob_is_rectified_and_margin_cropped() {
        let frame = color_scene(300, 300, (100, 60, 100, 180));
        let outcome = detect_with_config(frame, None, &PipelineConfig::color_based());
        assert!(outcome.used_perspective(), "{:?}", outcome.reason());
        // 99x179 between pixel centres, less 5% / 8% per side.
        assert_near(outcome.image().width(), 89, 2);
        assert_near(outcome.image().height(), 151, 2);
    }

    #[test]
    fn fallback_margin_crop_follows_config() {
        let cropping = PipelineConfig {
            margin_crop_fraction: Some((0.05, 0.08)),
            ..PipelineConfig::default()
        };
        let image = fallback_image(flat_frame(100, 200, 0), &cropping);
        assert_eq!(image.dimensions(), (90, 168));

        let keep = PipelineConfig {
            crop_fallback: false,
            ..cropping
        };
        let image = fallback_image(flat_frame(100, 200, 0), &keep);
        assert_eq!(image.dimensions(), (100, 200));
    }
}
