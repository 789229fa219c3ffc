// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame — an owned pixel buffer with explicit dimensions and channel layout.
// Stages hand frames to each other by value; nothing aliases a frame across
// stages.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use tagscan_core::error::TagscanError;
use tagscan_core::{PixelLayout, RoiRect};
use tracing::{debug, info, instrument};

/// A single still frame: 8-bit gray, RGB, or RGBA, never zero-sized.
///
/// ```ignore
/// let frame = Frame::from_bytes(&jpeg)?
///     .scale_to_fit(1600)
///     .grayscale();
/// let png = frame.to_png_bytes()?;
/// ```
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    // -- Construction ---------------------------------------------------------

    /// Wrap a raw interleaved buffer, e.g. a camera frame.
    ///
    /// `data` must hold exactly `width * height * layout.channels()` bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, TagscanError> {
        if width == 0 || height == 0 {
            return Err(TagscanError::InvalidFrame(format!(
                "frame must not be empty ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(TagscanError::InvalidFrame(format!(
                "{layout:?} frame of {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        let image = match layout {
            PixelLayout::Gray => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            PixelLayout::Rgb => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            PixelLayout::Rgba => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
        }
        .ok_or_else(|| TagscanError::InvalidFrame("pixel buffer does not match dimensions".into()))?;
        Ok(Self { image })
    }

    /// Wrap an already-decoded `DynamicImage`, normalising it to one of the
    /// three 8-bit layouts.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, TagscanError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(TagscanError::InvalidFrame(format!(
                "frame must not be empty ({}x{})",
                image.width(),
                image.height()
            )));
        }
        let image = match &image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                image
            }
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
                DynamicImage::ImageLuma8(image.to_luma8())
            }
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_) => {
                DynamicImage::ImageRgb8(image.to_rgb8())
            }
            _ => DynamicImage::ImageRgba8(image.to_rgba8()),
        };
        Ok(Self { image })
    }

    /// Wrap a grayscale buffer.
    pub fn from_gray(gray: GrayImage) -> Result<Self, TagscanError> {
        Self::from_dynamic(DynamicImage::ImageLuma8(gray))
    }

    /// Decode encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, TagscanError> {
        let image = image::load_from_memory(data).map_err(|err| {
            TagscanError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = image.width(),
            height = image.height(),
            "Image decoded from bytes"
        );
        Self::from_dynamic(image)
    }

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, TagscanError> {
        let image = image::open(path.as_ref()).map_err(|err| {
            TagscanError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = image.width(), height = image.height(), "Image loaded");
        Self::from_dynamic(image)
    }

    /// Callers guarantee a non-empty buffer.
    pub(crate) fn wrap_gray(gray: GrayImage) -> Self {
        debug_assert!(gray.width() > 0 && gray.height() > 0);
        Self {
            image: DynamicImage::ImageLuma8(gray),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn layout(&self) -> PixelLayout {
        match self.image {
            DynamicImage::ImageLuma8(_) => PixelLayout::Gray,
            DynamicImage::ImageRgb8(_) => PixelLayout::Rgb,
            _ => PixelLayout::Rgba,
        }
    }

    /// Consume the frame and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Luma copy of the frame (or the buffer itself for gray frames).
    pub fn to_luma8(&self) -> GrayImage {
        self.image.to_luma8()
    }

    pub fn to_rgb8(&self) -> RgbImage {
        self.image.to_rgb8()
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Cut out `roi`, which must already be clamped to the frame.
    pub fn crop(self, roi: RoiRect) -> Self {
        let x = roi.x.max(0) as u32;
        let y = roi.y.max(0) as u32;
        let w = (roi.width.max(1) as u32).min(self.width().saturating_sub(x)).max(1);
        let h = (roi.height.max(1) as u32).min(self.height().saturating_sub(y)).max(1);
        debug!(x, y, w, h, "Cropping frame");
        Self {
            image: self.image.crop_imm(x, y, w, h),
        }
    }

    /// Shrink so the long side is at most `max_dimension`; never enlarges.
    #[instrument(skip(self))]
    pub fn scale_to_fit(self, max_dimension: u32) -> Self {
        let (w, h) = self.dimensions();
        let (target_w, target_h) = fit_within(w, h, max_dimension);
        if (target_w, target_h) == (w, h) {
            return self;
        }
        info!(from_w = w, from_h = h, target_w, target_h, "Scaling frame down");
        Self {
            image: self.image.resize_exact(target_w, target_h, FilterType::Triangle),
        }
    }

    /// Convert to single-channel luma.
    pub fn grayscale(self) -> Self {
        if self.layout() == PixelLayout::Gray {
            return self;
        }
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the frame as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, TagscanError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image.write_to(&mut cursor, ImageFormat::Png).map_err(|err| {
            TagscanError::ImageError(format!("PNG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Encode the frame as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, TagscanError> {
        let mut buffer = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        let result = match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.write_with_encoder(encoder),
            other => other.to_rgb8().write_with_encoder(encoder),
        };
        result.map_err(|err| TagscanError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }

    /// Write the frame to a file. The format is inferred from the extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), TagscanError> {
        self.image.save(path.as_ref()).map_err(|err| {
            TagscanError::ImageError(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

/// Dimensions scaled down proportionally so the long side is at most
/// `max_dimension`. Sizes already within the cap are returned unchanged.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    let long_side = width.max(height);
    if long_side <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / long_side as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}
