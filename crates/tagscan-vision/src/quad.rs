// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quad selection — contour extraction, corner reduction, and shape gating.
//
// Traces the external boundaries of the mask, keeps the one enclosing the
// largest area, and reduces it to four corners: a polygon simplification when
// that yields exactly four vertices, otherwise the minimum-area enclosing
// rectangle. The resulting quad is then gated on size and aspect.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull, min_area_rect};
use imageproc::point::Point as PixelPoint;
use tagscan_core::{PipelineConfig, Point, Quad, RejectReason};
use tracing::{debug, instrument};

use crate::corners::order_corners;

/// How the four corners were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CornerSource {
    /// Polygon simplification produced exactly four vertices.
    Polygon,
    /// Minimum-area enclosing rectangle of the boundary.
    MinAreaRect,
}

/// One external boundary traced from the mask.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub points: Vec<PixelPoint<i32>>,
    /// Enclosed area (shoelace over the traced points).
    pub area: f64,
}

/// The quad that passed every gate.
#[derive(Debug, Clone, Copy)]
pub struct QuadCandidate {
    pub quad: Quad,
    pub source: CornerSource,
    pub boundary_area: f64,
}

/// Outer boundaries not nested inside any other region.
pub fn external_boundaries(mask: &GrayImage) -> Vec<Boundary> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| {
            let area = polygon_area(&contour.points);
            Boundary {
                points: contour.points,
                area,
            }
        })
        .collect()
}

/// The boundary of maximum area; the first one wins ties.
pub fn largest_boundary(boundaries: &[Boundary]) -> Option<&Boundary> {
    boundaries.iter().fold(None, |best: Option<&Boundary>, candidate| match best {
        Some(current) if current.area >= candidate.area => Some(current),
        _ => Some(candidate),
    })
}

/// Four corners for `boundary`, or `None` if it is too thin to span an
/// area.
pub fn boundary_corners(boundary: &Boundary, epsilon_fraction: f64) -> Option<([Point; 4], CornerSource)> {
    let points = &boundary.points;
    if points.len() < 3 {
        return None;
    }

    let perimeter = arc_length(points, true);
    let simplified = simplify_closed(points, epsilon_fraction * perimeter);
    if let [a, b, c, d] = simplified[..] {
        return Some(([a, b, c, d].map(to_point), CornerSource::Polygon));
    }

    let hull = convex_hull(points.as_slice());
    if hull.len() < 3 {
        return None;
    }
    let rect = min_area_rect(&hull);
    Some((rect.map(to_point), CornerSource::MinAreaRect))
}

/// Select and gate the best quad in `mask`.
///
/// * no external boundary: `NoRegionFound`
/// * best boundary collapses to a line or point: `DegenerateGeometry`
/// * quad smaller than `min_area_fraction` of the mask, or outside the
///   aspect band: `ShapeRejected`
#[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
pub fn select_quad(mask: &GrayImage, config: &PipelineConfig) -> Result<QuadCandidate, RejectReason> {
    let boundaries = external_boundaries(mask);
    debug!(count = boundaries.len(), "External boundaries traced");

    let best = largest_boundary(&boundaries).ok_or(RejectReason::NoRegionFound)?;
    let (corners, source) =
        boundary_corners(best, config.polygon_epsilon_fraction).ok_or(RejectReason::DegenerateGeometry)?;
    let quad = order_corners(corners);
    debug!(?source, boundary_area = best.area, ?quad, "Best boundary reduced to quad");

    if quad.is_degenerate() {
        return Err(RejectReason::DegenerateGeometry);
    }

    let mask_area = mask.width() as f64 * mask.height() as f64;
    let area_fraction = quad.area() as f64 / mask_area;
    if area_fraction < config.min_area_fraction {
        debug!(area_fraction, min = config.min_area_fraction, "Quad too small");
        return Err(RejectReason::ShapeRejected);
    }

    if let Some((min_aspect, max_aspect)) = config.aspect_ratio_bounds {
        let edges = quad.edge_lengths();
        let aspect = edges.height() as f64 / edges.width() as f64;
        if !(min_aspect..=max_aspect).contains(&aspect) {
            debug!(aspect, min_aspect, max_aspect, "Quad aspect outside band");
            return Err(RejectReason::ShapeRejected);
        }
    }

    Ok(QuadCandidate {
        quad,
        source,
        boundary_area: best.area,
    })
}

/// Douglas-Peucker for a closed curve.
///
/// The loop is split at two anchors that lie on its diameter: `a` is the
/// point farthest from the first traced point and `b` the point farthest
/// from `a`. Both arcs between them are simplified as open curves, so the
/// anchors are always true extremes of the shape rather than wherever the
/// tracer happened to start.
pub fn simplify_closed(points: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    if points.len() < 3 || epsilon.is_nan() || epsilon <= 0.0 {
        return points.to_vec();
    }

    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    if a == b {
        return vec![points[a]];
    }

    let (first, second) = if a < b { (a, b) } else { (b, a) };
    let forward = &points[first..=second];
    let mut backward = points[second..].to_vec();
    backward.extend_from_slice(&points[..=first]);

    let mut closed: Vec<PixelPoint<i32>> = approximate_polygon_dp(forward, epsilon, false);
    let back = approximate_polygon_dp(&backward, epsilon, false);
    closed.extend(back.into_iter().skip(1));
    // The backward arc ends where the forward arc began.
    closed.pop();
    closed.dedup();
    closed
}

/// Index of the point farthest from `origin`; the first one wins ties.
fn farthest_from(points: &[PixelPoint<i32>], origin: PixelPoint<i32>) -> usize {
    let mut best = (0, -1i64);
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as i64;
        let dy = (p.y - origin.y) as i64;
        let d = dx * dx + dy * dy;
        if d > best.1 {
            best = (i, d);
        }
    }
    best.0
}

/// Absolute shoelace area of a closed polygon.
fn polygon_area(points: &[PixelPoint<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += points[i].x as i64 * points[j].y as i64;
        twice_area -= points[j].x as i64 * points[i].y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

fn to_point(p: PixelPoint<i32>) -> Point {
    Point::new(p.x as f32, p.y as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(w: u32, h: u32, x0: u32, y0: u32, rw: u32, rh: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in y0..y0 + rh {
            for x in x0..x0 + rw {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    fn config(min_area_fraction: f64, aspect: Option<(f64, f64)>) -> PipelineConfig {
        PipelineConfig {
            min_area_fraction,
            aspect_ratio_bounds: aspect,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn polygon_area_of_square() {
        let pts = [
            PixelPoint::new(0, 0),
            PixelPoint::new(10, 0),
            PixelPoint::new(10, 10),
            PixelPoint::new(0, 10),
        ];
        assert!((polygon_area(&pts) - 100.0).abs() < 1e-9);
        assert_eq!(polygon_area(&pts[..2]), 0.0);
    }

    #[test]
    fn empty_mask_has_no_boundaries() {
        let mask = GrayImage::new(50, 50);
        assert!(external_boundaries(&mask).is_empty());
        assert_eq!(
            select_quad(&mask, &PipelineConfig::default()).unwrap_err(),
            RejectReason::NoRegionFound
        );
    }

    #[test]
    fn hole_boundaries_are_not_external() {
        // A ring: outer square with a hole, plus a blob inside the hole.
        let mut mask = filled_rect(60, 60, 10, 10, 40, 40);
        for y in 20..40 {
            for x in 20..40 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 27..33 {
            for x in 27..33 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let boundaries = external_boundaries(&mask);
        assert_eq!(boundaries.len(), 1);
    }

    #[test]
    fn largest_boundary_prefers_first_on_ties() {
        let a = Boundary {
            points: vec![PixelPoint::new(0, 0)],
            area: 10.0,
        };
        let b = Boundary {
            points: vec![PixelPoint::new(1, 1)],
            area: 10.0,
        };
        let c = Boundary {
            points: vec![PixelPoint::new(2, 2)],
            area: 4.0,
        };
        let all = [c, a, b];
        let best = largest_boundary(&all).expect("non-empty");
        assert_eq!(best.points[0], PixelPoint::new(0, 0));
        assert!(largest_boundary(&[]).is_none());
    }

    #[test]
    fn simplify_rectangle_to_four_vertices() {
        let mask = filled_rect(100, 100, 20, 10, 40, 70);
        let boundaries = external_boundaries(&mask);
        let perimeter = arc_length(&boundaries[0].points, true);
        let simplified = simplify_closed(&boundaries[0].points, 0.02 * perimeter);
        assert_eq!(simplified.len(), 4, "{simplified:?}");
    }

    #[test]
    fn simplification_keeps_true_corners_when_tracing_starts_mid_edge() {
        // Loop starting in the middle of the top edge, with clipped corners.
        let mut loop_points = Vec::new();
        loop_points.extend((46..=99).map(|x| PixelPoint::new(x, 0)));
        loop_points.extend((1..=199).map(|y| PixelPoint::new(100, y)));
        loop_points.extend((1..=99).rev().map(|x| PixelPoint::new(x, 200)));
        loop_points.extend((1..=199).rev().map(|y| PixelPoint::new(0, y)));
        loop_points.extend((1..46).map(|x| PixelPoint::new(x, 0)));
        let perimeter = arc_length(&loop_points, true);
        let simplified = simplify_closed(&loop_points, 0.02 * perimeter);
        assert_eq!(simplified.len(), 4, "{simplified:?}");

        let quad = order_corners(
            [simplified[0], simplified[1], simplified[2], simplified[3]].map(to_point),
        );
        let near = |p: Point, x: f32, y: f32| (p.x - x).abs() <= 1.0 && (p.y - y).abs() <= 1.0;
        assert!(near(quad.top_left, 0.0, 0.0), "{quad:?}");
        assert!(near(quad.top_right, 100.0, 0.0), "{quad:?}");
        assert!(near(quad.bottom_right, 100.0, 200.0), "{quad:?}");
        assert!(near(quad.bottom_left, 0.0, 200.0), "{quad:?}");
    }

    #[test]
    fn min_area_rect_path_accepts_traced_points() {
        let boundary = Boundary {
            points: vec![
                PixelPoint::new(0, 0),
                PixelPoint::new(10, 0),
                PixelPoint::new(12, 5),
                PixelPoint::new(10, 10),
                PixelPoint::new(0, 10),
                PixelPoint::new(-2, 5),
            ],
            area: 120.0,
        };
        let (_, source) = boundary_corners(&boundary, 0.0001).expect("corners");
        assert_eq!(source, CornerSource::MinAreaRect);
    }

    #[test]
    fn axis_aligned_rect_is_selected() {
        let mask = filled_rect(200, 200, 50, 20, 60, 120);
        let candidate = select_quad(&mask, &config(0.01, Some((1.2, 4.0)))).expect("accepted");
        assert_eq!(candidate.source, CornerSource::Polygon);
        let quad = candidate.quad;
        assert_eq!(quad.top_left, Point::new(50.0, 20.0));
        assert_eq!(quad.bottom_right, Point::new(109.0, 139.0));
    }

    #[test]
    fn largest_region_wins() {
        let mut mask = filled_rect(300, 300, 10, 10, 30, 60);
        for y in 100..280 {
            for x in 150..240 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let candidate = select_quad(&mask, &config(0.01, None)).expect("accepted");
        assert_eq!(candidate.quad.top_left, Point::new(150.0, 100.0));
    }

    #[test]
    fn small_region_is_shape_rejected() {
        let mask = filled_rect(200, 200, 10, 10, 20, 40);
        assert_eq!(
            select_quad(&mask, &config(0.05, None)).unwrap_err(),
            RejectReason::ShapeRejected
        );
        assert!(select_quad(&mask, &config(0.01, None)).is_ok());
    }

    #[test]
    fn wide_region_fails_tall_aspect_band() {
        let mask = filled_rect(200, 200, 20, 60, 150, 60);
        assert_eq!(
            select_quad(&mask, &config(0.01, Some((1.2, 4.0)))).unwrap_err(),
            RejectReason::ShapeRejected
        );
        assert!(select_quad(&mask, &config(0.01, None)).is_ok());
    }

    #[test]
    fn line_region_is_degenerate() {
        let mut mask = GrayImage::new(100, 100);
        for x in 10..90 {
            mask.put_pixel(x, 50, Luma([255]));
        }
        assert_eq!(
            select_quad(&mask, &config(0.0, None)).unwrap_err(),
            RejectReason::DegenerateGeometry
        );
    }

    #[test]
    fn rounded_blob_falls_back_to_min_area_rect() {
        // A disc simplifies to more than four vertices.
        let mut mask = GrayImage::new(200, 200);
        for y in 0..200i32 {
            for x in 0..200i32 {
                if (x - 100).pow(2) + (y - 100).pow(2) <= 60 * 60 {
                    mask.put_pixel(x as u32, y as u32, Luma([255]));
                }
            }
        }
        let boundaries = external_boundaries(&mask);
        let (corners, source) = boundary_corners(&boundaries[0], 0.02).expect("corners");
        assert_eq!(source, CornerSource::MinAreaRect);
        let quad = order_corners(corners);
        let edges = quad.edge_lengths();
        assert!((edges.width() - 120.0).abs() < 4.0, "{edges:?}");
        assert!((edges.height() - 120.0).abs() < 4.0, "{edges:?}");
    }
}
