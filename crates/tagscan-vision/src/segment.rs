// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmenters — turn the ROI frame into a binary mask of tag-like pixels.
//
// Two interchangeable strategies share one trait: an edge map (blur + Canny)
// and a colour-region blob (Lab channel + Otsu + closing). Both emit a mask
// of the input's size holding only 0 and 255.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{self, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate};
use palette::{FromColor, Lab, Srgb};
use tagscan_core::config::{EdgeParams, Foreground, RegionParams};
use tagscan_core::error::TagscanError;
use tagscan_core::{PipelineConfig, SegmenterStrategy};
use tracing::{debug, instrument};

use crate::frame::Frame;

/// Frames smaller than this on either side cannot be blurred meaningfully.
const MIN_SEGMENT_SIDE: u32 = 3;

/// Mask value for tag-like pixels.
pub const MASK_ON: u8 = 255;

/// Produces a binary mask the contour stage can trace.
pub trait Segmenter {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Segment `frame`. The mask must have the frame's dimensions.
    fn segment(&self, frame: &Frame) -> Result<GrayImage, TagscanError>;
}

/// Build the segmenter `config` selects.
pub fn segmenter_for(config: &PipelineConfig) -> Box<dyn Segmenter> {
    match config.segmenter {
        SegmenterStrategy::EdgeBased => Box::new(EdgeSegmenter::new(config.edge)),
        SegmenterStrategy::ColorBased => Box::new(RegionSegmenter::new(config.region)),
    }
}

fn check_frame(frame: &Frame) -> Result<(), TagscanError> {
    let (w, h) = frame.dimensions();
    if w < MIN_SEGMENT_SIDE || h < MIN_SEGMENT_SIDE {
        return Err(TagscanError::Segmentation(format!(
            "frame {w}x{h} is too small to segment"
        )));
    }
    Ok(())
}

fn check_sigma(sigma: f32) -> Result<(), TagscanError> {
    if sigma > 0.0 && sigma.is_finite() {
        Ok(())
    } else {
        Err(TagscanError::Segmentation(format!(
            "blur sigma must be positive, got {sigma}"
        )))
    }
}

// -- Edge-based -----------------------------------------------------------------

/// Grayscale, Gaussian blur, then a two-threshold Canny edge map.
#[derive(Debug, Clone, Copy)]
pub struct EdgeSegmenter {
    params: EdgeParams,
}

impl EdgeSegmenter {
    pub fn new(params: EdgeParams) -> Self {
        Self { params }
    }
}

impl Default for EdgeSegmenter {
    fn default() -> Self {
        Self::new(EdgeParams::default())
    }
}

impl Segmenter for EdgeSegmenter {
    fn name(&self) -> &'static str {
        "edge"
    }

    #[instrument(skip_all, fields(low = self.params.low_threshold, high = self.params.high_threshold))]
    fn segment(&self, frame: &Frame) -> Result<GrayImage, TagscanError> {
        check_frame(frame)?;
        check_sigma(self.params.blur_sigma)?;

        let gray = frame.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.params.blur_sigma);
        let edges = canny(
            &blurred,
            self.params.low_threshold,
            self.params.high_threshold,
        );
        let mask = if self.params.dilate_radius > 0 {
            dilate(&edges, Norm::LInf, self.params.dilate_radius)
        } else {
            edges
        };

        debug!(
            edge_pixels = mask.pixels().filter(|p| p.0[0] > 0).count(),
            "Edge mask computed"
        );
        Ok(mask)
    }
}

// -- Region-based ---------------------------------------------------------------

/// Lab channel with the strongest two-class split, blurred, Otsu-binarized,
/// then closed with a square structuring element.
#[derive(Debug, Clone, Copy)]
pub struct RegionSegmenter {
    params: RegionParams,
}

impl RegionSegmenter {
    pub fn new(params: RegionParams) -> Self {
        Self { params }
    }
}

impl Default for RegionSegmenter {
    fn default() -> Self {
        Self::new(RegionParams::default())
    }
}

impl Segmenter for RegionSegmenter {
    fn name(&self) -> &'static str {
        "region"
    }

    #[instrument(skip_all, fields(closing_radius = self.params.closing_radius))]
    fn segment(&self, frame: &Frame) -> Result<GrayImage, TagscanError> {
        check_frame(frame)?;
        check_sigma(self.params.blur_sigma)?;

        let (width, height) = frame.dimensions();
        let channels = lab_channels(&frame.to_rgb8());

        // Pick the channel whose histogram splits most cleanly in two.
        let mut best: Option<(usize, OtsuLevel)> = None;
        for (index, channel) in channels.iter().enumerate() {
            let level = otsu_level(channel);
            if best.is_none_or(|(_, current)| level.separability > current.separability) {
                best = Some((index, level));
            }
        }
        let Some((index, level)) = best else {
            return Ok(GrayImage::new(width, height));
        };
        if level.separability <= 0.0 {
            debug!("All channels are flat; mask is empty");
            return Ok(GrayImage::new(width, height));
        }

        let blurred = gaussian_blur_f32(&channels[index], self.params.blur_sigma);
        let threshold = otsu_level(&blurred).threshold;
        let bright = blurred.pixels().filter(|p| p.0[0] > threshold).count();
        let total = width as usize * height as usize;
        let take_bright = match self.params.foreground {
            Foreground::Bright => true,
            Foreground::Dark => false,
            Foreground::Auto => bright <= total - bright,
        };
        debug!(
            channel = ["L", "a", "b"][index],
            separability = level.separability,
            threshold,
            take_bright,
            "Region channel selected"
        );

        let kind = if take_bright {
            ThresholdType::Binary
        } else {
            ThresholdType::BinaryInverted
        };
        let binary = contrast::threshold(&blurred, threshold, kind);

        if self.params.closing_radius == 0 {
            return Ok(binary);
        }
        Ok(close(&binary, Norm::LInf, self.params.closing_radius))
    }
}

// -- Colour space ---------------------------------------------------------------

/// Split an sRGB image into CIE L*, a*, b* channels scaled to 8 bits.
///
/// L* (0..100) maps to 0..255; a* and b* are offset by 128.
pub fn lab_channels(rgb: &RgbImage) -> [GrayImage; 3] {
    let (width, height) = rgb.dimensions();
    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;

    let mut l_chan = GrayImage::new(width, height);
    let mut a_chan = GrayImage::new(width, height);
    let mut b_chan = GrayImage::new(width, height);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let lab: Lab = Lab::from_color(Srgb::new(r, g, b).into_format::<f32>());

        l_chan.put_pixel(x, y, Luma([to_u8(lab.l * 2.55)]));
        a_chan.put_pixel(x, y, Luma([to_u8(lab.a + 128.0)]));
        b_chan.put_pixel(x, y, Luma([to_u8(lab.b + 128.0)]));
    }

    [l_chan, a_chan, b_chan]
}

// -- Otsu -------------------------------------------------------------------------

/// Result of Otsu's method on one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtsuLevel {
    /// Pixels `<= threshold` form the dark class.
    pub threshold: u8,
    /// Between-class variance over total variance, in `[0, 1]`.
    pub separability: f64,
}

/// Otsu's threshold for a grayscale image, with its separability score.
///
/// Finds the threshold value that maximises the between-class variance of
/// the dark and bright pixel groups. A flat image scores 0.
pub fn otsu_level(gray: &GrayImage) -> OtsuLevel {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return OtsuLevel {
            threshold: 128,
            separability: 0.0,
        };
    }
    let n = total_pixels as f64;

    let mut sum_total = 0.0f64;
    let mut sum_sq_total = 0.0f64;
    for (i, &count) in histogram.iter().enumerate() {
        sum_total += i as f64 * count as f64;
        sum_sq_total += (i * i) as f64 * count as f64;
    }
    let mean = sum_total / n;
    let total_variance = sum_sq_total / n - mean * mean;

    let mut sum_background = 0.0f64;
    let mut weight_background: u64 = 0;
    let mut max_variance = 0.0f64;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = (weight_background as f64 / n)
            * (weight_foreground as f64 / n)
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    let separability = if total_variance > 0.0 {
        (max_variance / total_variance).clamp(0.0, 1.0)
    } else {
        0.0
    };
    OtsuLevel {
        threshold: best_threshold,
        separability,
    }
}
