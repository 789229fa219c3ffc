// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner canonicalizer.

use std::cmp::Ordering;

use tagscan_core::{Point, Quad};

fn by_y_then_x(a: &Point, b: &Point) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

fn by_x_then_y(a: &Point, b: &Point) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

/// Order four unordered points as `(TL, TR, BR, BL)`.
///
/// The two smallest-y points form the top pair and the two largest-y the
/// bottom pair; each pair is then split left/right by x. Both sorts use a
/// full tie-break, so every permutation of the same four points yields the
/// same quad. Correct for axis-aligned and moderately rotated (up to 45
/// degrees) quads.
pub fn order_corners(points: [Point; 4]) -> Quad {
    let mut sorted = points;
    sorted.sort_by(by_y_then_x);

    let mut top = [sorted[0], sorted[1]];
    let mut bottom = [sorted[2], sorted[3]];
    top.sort_by(by_x_then_y);
    bottom.sort_by(by_x_then_y);

    Quad::new(top[0], top[1], bottom[1], bottom[0])
}
