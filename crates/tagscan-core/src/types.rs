// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: source-pixel geometry, pixel layouts, and the reasons a
// detection can be rejected.

use serde::{Deserialize, Serialize};

use crate::error::TagscanError;

/// Edge lengths below this are treated as collapsed.
const MIN_EDGE_LENGTH: f32 = 1e-3;

/// A 2D coordinate in source-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f32, f32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Four corners in canonical order: top-left, top-right, bottom-right,
/// bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

/// Side lengths of a [`Quad`], measured between adjacent corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeLengths {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl EdgeLengths {
    /// The longer of the two horizontal sides.
    pub fn width(&self) -> f32 {
        self.top.max(self.bottom)
    }

    /// The longer of the two vertical sides.
    pub fn height(&self) -> f32 {
        self.left.max(self.right)
    }

    pub fn shortest(&self) -> f32 {
        self.top.min(self.bottom).min(self.left).min(self.right)
    }
}

impl Quad {
    pub const fn new(top_left: Point, top_right: Point, bottom_right: Point, bottom_left: Point) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Corners as an array in `(TL, TR, BR, BL)` order.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn edge_lengths(&self) -> EdgeLengths {
        EdgeLengths {
            top: self.top_left.distance(&self.top_right),
            bottom: self.bottom_left.distance(&self.bottom_right),
            left: self.top_left.distance(&self.bottom_left),
            right: self.top_right.distance(&self.bottom_right),
        }
    }

    /// Polygon area via the shoelace formula.
    pub fn area(&self) -> f32 {
        let corners = self.corners();
        let mut twice_area = 0.0f32;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice_area += corners[i].x * corners[j].y;
            twice_area -= corners[j].x * corners[i].y;
        }
        twice_area.abs() / 2.0
    }

    /// Shift every corner by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        let shift = |p: Point| Point::new(p.x + dx, p.y + dy);
        Self::new(
            shift(self.top_left),
            shift(self.top_right),
            shift(self.bottom_right),
            shift(self.bottom_left),
        )
    }

    /// True when two corners coincide, a side has zero length, or the
    /// outline crosses itself.
    pub fn is_degenerate(&self) -> bool {
        if self.edge_lengths().shortest() < MIN_EDGE_LENGTH {
            return true;
        }
        let [tl, tr, br, bl] = self.corners();
        if tl.distance(&br) < MIN_EDGE_LENGTH || tr.distance(&bl) < MIN_EDGE_LENGTH {
            return true;
        }
        // Opposite sides must not cross.
        segments_cross(tl, tr, br, bl) || segments_cross(tr, br, bl, tl)
    }
}

/// Proper intersection test for segments `a1-a2` and `b1-b2`.
fn segments_cross(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let orient = |p: Point, q: Point, r: Point| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
    let d1 = orient(b1, b2, a1);
    let d2 = orient(b1, b2, a2);
    let d3 = orient(a1, a2, b1);
    let d4 = orient(a1, a2, b2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Integer pixel rectangle restricting the search area.
///
/// Values come from callers and may be negative or overhang the frame;
/// [`RoiRect::clamp_to`] produces the contained rectangle actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RoiRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    /// Intersect with a `frame_w` x `frame_h` frame.
    ///
    /// Returns `None` when the rectangle is degenerate or does not overlap
    /// the frame at all.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<RoiRect> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        let x0 = (self.x as i64).max(0);
        let y0 = (self.y as i64).max(0);
        let x1 = (self.x as i64 + self.width as i64).min(frame_w as i64);
        let y1 = (self.y as i64 + self.height as i64).min(frame_h as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(RoiRect::new(
            x0 as i32,
            y0 as i32,
            (x1 - x0) as i32,
            (y1 - y0) as i32,
        ))
    }

    /// True when the rectangle spans the whole `frame_w` x `frame_h` frame.
    pub fn covers(&self, frame_w: u32, frame_h: u32) -> bool {
        self.x <= 0
            && self.y <= 0
            && self.x as i64 + self.width as i64 >= frame_w as i64
            && self.y as i64 + self.height as i64 >= frame_h as i64
    }

    /// Translate an overlay rectangle drawn over a scaled preview into the
    /// source frame's pixel space.
    ///
    /// `display` is the preview size the overlay was measured against and
    /// `frame` the size of the captured buffer. Returns `None` when either
    /// size is zero.
    pub fn from_display(overlay: RoiRect, display: (u32, u32), frame: (u32, u32)) -> Option<RoiRect> {
        let (display_w, display_h) = display;
        let (frame_w, frame_h) = frame;
        if display_w == 0 || display_h == 0 || frame_w == 0 || frame_h == 0 {
            return None;
        }
        let sx = frame_w as f64 / display_w as f64;
        let sy = frame_h as f64 / display_h as f64;
        Some(RoiRect::new(
            (overlay.x as f64 * sx).round() as i32,
            (overlay.y as f64 * sy).round() as i32,
            (overlay.width as f64 * sx).round() as i32,
            (overlay.height as f64 * sy).round() as i32,
        ))
    }
}

impl std::fmt::Display for RoiRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for RoiRect {
    type Err = TagscanError;

    /// Parse `"x,y,w,h"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(TagscanError::Config(format!(
                "ROI must be four comma-separated integers, got {s:?}"
            )));
        }
        let mut values = [0i32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|err| {
                TagscanError::Config(format!("invalid ROI component {part:?}: {err}"))
            })?;
        }
        Ok(RoiRect::new(values[0], values[1], values[2], values[3]))
    }
}

/// Channel layout of a raw pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    /// One 8-bit luma channel.
    Gray,
    /// Interleaved 8-bit red, green, blue.
    Rgb,
    /// Interleaved 8-bit red, green, blue, alpha (camera/canvas frames).
    Rgba,
}

impl PixelLayout {
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Why a detection fell back to the plain grayscale copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// The mask held no external boundary at all.
    NoRegionFound,
    /// The best boundary failed the area or aspect thresholds.
    ShapeRejected,
    /// The quad collapsed (zero-length side, crossed outline, empty output).
    DegenerateGeometry,
    /// Segmentation or another internal stage faulted.
    ProcessingError,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NoRegionFound => "no region found",
            Self::ShapeRejected => "shape rejected",
            Self::DegenerateGeometry => "degenerate geometry",
            Self::ProcessingError => "processing error",
        };
        f.write_str(label)
    }
}
