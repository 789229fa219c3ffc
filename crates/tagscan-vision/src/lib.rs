// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tagscan-vision — Tag detection and perspective rectification.
//
// Takes one still frame, optionally restricts it to an overlay ROI, segments
// the tag, picks the best quadrilateral, and warps it into an upright
// grayscale rectangle. When detection is not confident the pipeline falls
// back to a scaled grayscale copy, so a caller always gets an image.

pub mod codec;
pub mod corners;
pub mod engine;
pub mod frame;
pub mod pipeline;
pub mod quad;
pub mod rectify;
pub mod roi;
pub mod segment;

#[cfg(test)]
mod testing;

// Re-export the primary types so callers can use `tagscan_vision::Frame` etc.
pub use codec::{FrameDecoder, FrameEncoder, ImageCodec};
pub use corners::order_corners;
pub use engine::{EngineState, VisionEngine, VisionHandle};
pub use frame::Frame;
pub use pipeline::DetectionOutcome;
pub use segment::{EdgeSegmenter, RegionSegmenter, Segmenter};
