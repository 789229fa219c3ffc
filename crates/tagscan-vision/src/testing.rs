// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic scenes for unit tests.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::frame::Frame;

pub const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);
pub const TAG: Rgb<u8> = Rgb([230, 230, 230]);

/// Paint a `tag_w` x `tag_h` rectangle centred on `(cx, cy)` and rotated by
/// `angle_deg` (clockwise in image coordinates).
pub fn paint_tag(img: &mut RgbImage, cx: f32, cy: f32, tag_w: f32, tag_h: f32, angle_deg: f32, color: Rgb<u8>) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (half_w, half_h) = (tag_w / 2.0, tag_h / 2.0);
    let (width, height) = img.dimensions();
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            // Rotate back into the tag's own frame.
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            if u.abs() <= half_w && v.abs() <= half_h {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Bright tag centred on a dark background.
pub fn tag_scene(width: u32, height: u32, tag_w: u32, tag_h: u32, angle_deg: f32) -> Frame {
    tag_scene_at(width, height, width as f32 / 2.0, height as f32 / 2.0, tag_w, tag_h, angle_deg)
}

pub fn tag_scene_at(width: u32, height: u32, cx: f32, cy: f32, tag_w: u32, tag_h: u32, angle_deg: f32) -> Frame {
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    paint_tag(&mut img, cx, cy, tag_w as f32, tag_h as f32, angle_deg, TAG);
    rgb_frame(img)
}

/// Orange axis-aligned blob `(x, y, w, h)` on a dark blue background.
pub fn color_scene(width: u32, height: u32, blob: (u32, u32, u32, u32)) -> Frame {
    let (bx, by, bw, bh) = blob;
    let mut img = RgbImage::from_pixel(width, height, Rgb([30, 40, 110]));
    for y in by..by + bh {
        for x in bx..bx + bw {
            img.put_pixel(x, y, Rgb([240, 150, 30]));
        }
    }
    rgb_frame(img)
}

pub fn flat_frame(width: u32, height: u32, value: u8) -> Frame {
    Frame::from_gray(GrayImage::from_pixel(width, height, Luma([value]))).expect("non-empty frame")
}

pub fn rgb_frame(img: RgbImage) -> Frame {
    Frame::from_dynamic(DynamicImage::ImageRgb8(img)).expect("non-empty frame")
}
