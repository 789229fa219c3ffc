// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectifier — perspective warp of the tag quad into an upright rectangle.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tagscan_core::{PipelineConfig, Quad, RejectReason};
use tracing::{debug, instrument};

use crate::frame::{Frame, fit_within};

/// Fill for destination pixels that map outside the source.
const OUTSIDE_FILL: Luma<u8> = Luma([255]);

/// Destination rectangle for `quad`.
///
/// Width is the longer of the top and bottom edges, height the longer of
/// the left and right edges, rounded and then scaled down so the long side
/// does not exceed `max_dimension`. `None` when either side rounds below two
/// pixels, since no projection can be fitted to it.
pub fn destination_size(quad: &Quad, max_dimension: u32) -> Option<(u32, u32)> {
    let edges = quad.edge_lengths();
    let width = edges.width().round();
    let height = edges.height().round();
    if !width.is_finite() || !height.is_finite() || width < 2.0 || height < 2.0 {
        return None;
    }
    Some(fit_within(width as u32, height as u32, max_dimension))
}

/// Warp `gray` so `quad` maps onto a `size` rectangle with corners at
/// `(0, 0)`, `(W-1, 0)`, `(W-1, H-1)`, `(0, H-1)`.
pub fn warp_to_rectangle(gray: &GrayImage, quad: &Quad, size: (u32, u32)) -> Option<GrayImage> {
    let (width, height) = size;
    if width < 2 || height < 2 {
        return None;
    }
    let (right, bottom) = ((width - 1) as f32, (height - 1) as f32);
    let from = quad.corners().map(|p| (p.x, p.y));
    let to = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
    let projection = Projection::from_control_points(from, to)?;

    let mut out = GrayImage::new(width, height);
    warp_into(gray, &projection, Interpolation::Bilinear, OUTSIDE_FILL, &mut out);
    Some(out)
}

/// Trim a symmetric `(horizontal, vertical)` margin.
///
/// Each side loses `round(w * horizontal)` and `round(h * vertical)` pixels.
/// The crop is skipped for images with a side shorter than `min_side`, and
/// whenever it would leave nothing.
pub fn crop_margin(image: GrayImage, margin: Option<(f64, f64)>, min_side: u32) -> GrayImage {
    let Some((horizontal, vertical)) = margin else {
        return image;
    };
    let (width, height) = image.dimensions();
    let dx = (width as f64 * horizontal.max(0.0)).round() as u32;
    let dy = (height as f64 * vertical.max(0.0)).round() as u32;
    let cropped_w = width.saturating_sub(dx.saturating_mul(2));
    let cropped_h = height.saturating_sub(dy.saturating_mul(2));
    if width < min_side || height < min_side || cropped_w == 0 || cropped_h == 0 {
        debug!(width, height, min_side, "Image too small for margin crop");
        return image;
    }
    if (cropped_w, cropped_h) == (width, height) {
        return image;
    }
    image::imageops::crop_imm(&image, dx, dy, cropped_w, cropped_h).to_image()
}

/// Rectify `quad` out of `frame` (grayscale output, clamped to the
/// configured maximum dimension). Margin cropping is left to the caller so
/// both pipeline branches share it.
#[instrument(skip_all, fields(max_dimension = config.max_dimension))]
pub fn rectify(frame: &Frame, quad: &Quad, config: &PipelineConfig) -> Result<GrayImage, RejectReason> {
    let size = destination_size(quad, config.max_dimension).ok_or(RejectReason::DegenerateGeometry)?;
    let gray = frame.to_luma8();
    let warped = warp_to_rectangle(&gray, quad, size).ok_or(RejectReason::DegenerateGeometry)?;
    debug!(width = size.0, height = size.1, "Quad rectified");
    Ok(warped)
}
