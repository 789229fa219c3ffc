// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline and application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagscanError};

/// Which mask producer the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmenterStrategy {
    /// Blur + Canny edge map.
    #[default]
    EdgeBased,
    /// Perceptual colour channel + Otsu threshold + morphological closing.
    ColorBased,
}

/// Which side of the automatic threshold counts as tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Foreground {
    /// Pixels above the threshold.
    Bright,
    /// Pixels at or below the threshold.
    Dark,
    /// Whichever class holds fewer pixels.
    #[default]
    Auto,
}

/// Tuning for the edge-based segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    /// Gaussian sigma; 1.1 matches a 5x5 kernel.
    pub blur_sigma: f32,
    /// Canny hysteresis low threshold.
    pub low_threshold: f32,
    /// Canny hysteresis high threshold.
    pub high_threshold: f32,
    /// Square dilation radius applied to the edge map (0 disables).
    pub dilate_radius: u8,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            low_threshold: 50.0,
            high_threshold: 150.0,
            dilate_radius: 0,
        }
    }
}

/// Tuning for the region-based segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionParams {
    pub blur_sigma: f32,
    /// Closing radius; 12 gives a 25x25 square structuring element.
    pub closing_radius: u8,
    pub foreground: Foreground,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            closing_radius: 12,
            foreground: Foreground::Auto,
        }
    }
}

/// Options for one detect-and-rectify invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cap on the longest side of any output image.
    pub max_dimension: u32,
    pub segmenter: SegmenterStrategy,
    /// Minimum quad area as a fraction of the ROI area.
    pub min_area_fraction: f64,
    /// Accepted `height / width` band for the detected quad.
    pub aspect_ratio_bounds: Option<(f64, f64)>,
    /// Symmetric `(horizontal, vertical)` margin removed from each side.
    pub margin_crop_fraction: Option<(f64, f64)>,
    /// Apply the margin crop to fallback images as well.
    pub crop_fallback: bool,
    /// Images with a side shorter than this are never margin-cropped.
    pub min_crop_side: u32,
    /// Polygon simplification tolerance as a fraction of the perimeter.
    pub polygon_epsilon_fraction: f64,
    pub edge: EdgeParams,
    pub region: RegionParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::edge_based()
    }
}

impl PipelineConfig {
    pub const DEFAULT_MAX_DIMENSION: u32 = 1600;

    /// Edge-map search over the whole frame: small tags allowed, tall shape
    /// enforced, no margin crop.
    pub fn edge_based() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            segmenter: SegmenterStrategy::EdgeBased,
            min_area_fraction: 0.01,
            aspect_ratio_bounds: Some((1.2, 4.0)),
            margin_crop_fraction: None,
            crop_fallback: true,
            min_crop_side: 40,
            polygon_epsilon_fraction: 0.02,
            edge: EdgeParams::default(),
            region: RegionParams::default(),
        }
    }

    /// Colour-blob search inside an overlay ROI: the tag is expected to
    /// fill a good part of the ROI, edges are trimmed.
    pub fn color_based() -> Self {
        Self {
            segmenter: SegmenterStrategy::ColorBased,
            min_area_fraction: 0.05,
            aspect_ratio_bounds: None,
            margin_crop_fraction: Some((0.05, 0.08)),
            ..Self::edge_based()
        }
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 {
            return Err(TagscanError::Config("max_dimension must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_area_fraction) {
            return Err(TagscanError::Config(format!(
                "min_area_fraction must be within [0, 1], got {}",
                self.min_area_fraction
            )));
        }
        if let Some((lo, hi)) = self.aspect_ratio_bounds {
            if !(lo > 0.0 && lo <= hi) {
                return Err(TagscanError::Config(format!(
                    "aspect_ratio_bounds must satisfy 0 < min <= max, got ({lo}, {hi})"
                )));
            }
        }
        if let Some((fx, fy)) = self.margin_crop_fraction {
            if !(0.0..0.5).contains(&fx) || !(0.0..0.5).contains(&fy) {
                return Err(TagscanError::Config(format!(
                    "margin_crop_fraction must be within [0, 0.5), got ({fx}, {fy})"
                )));
            }
        }
        if !(self.polygon_epsilon_fraction > 0.0) {
            return Err(TagscanError::Config(
                "polygon_epsilon_fraction must be positive".into(),
            ));
        }
        if !(self.edge.blur_sigma > 0.0) || !(self.region.blur_sigma > 0.0) {
            return Err(TagscanError::Config("blur_sigma must be positive".into()));
        }
        if !(self.edge.low_threshold >= 0.0 && self.edge.low_threshold <= self.edge.high_threshold) {
            return Err(TagscanError::Config(format!(
                "edge thresholds must satisfy 0 <= low <= high, got ({}, {})",
                self.edge.low_threshold, self.edge.high_threshold
            )));
        }
        Ok(())
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding one sub-directory per archived pair.
    pub archive_dir: PathBuf,
    /// JPEG quality (1-100) for both archived images.
    pub jpeg_quality: u8,
    /// Largest encoded image the archive accepts, in bytes.
    pub max_upload_bytes: u64,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("uploads").join("archive"),
            jpeg_quality: 85,
            max_upload_bytes: 20 * 1024 * 1024,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(TagscanError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(TagscanError::Config("max_upload_bytes must be positive".into()));
        }
        self.pipeline.validate()
    }
}
