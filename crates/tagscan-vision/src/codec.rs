// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoder/encoder collaborators: bytes <-> Frame.

use tagscan_core::error::Result;

use crate::frame::Frame;

/// Turns encoded bytes (upload, camera still) into a [`Frame`].
pub trait FrameDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Frame>;
}

/// Turns a [`Frame`] into compressed bytes for transport or storage.
pub trait FrameEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>>;

    /// MIME type of the produced bytes.
    fn mime_type(&self) -> &'static str;
}

/// Output format for [`ImageCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Jpeg { quality: u8 },
    Png,
}

/// `image`-crate backed codec. Decodes anything the crate recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCodec {
    format: EncodeFormat,
}

impl ImageCodec {
    pub fn jpeg(quality: u8) -> Self {
        Self {
            format: EncodeFormat::Jpeg { quality },
        }
    }

    pub fn png() -> Self {
        Self {
            format: EncodeFormat::Png,
        }
    }

    pub fn format(&self) -> EncodeFormat {
        self.format
    }
}

impl FrameDecoder for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Frame> {
        Frame::from_bytes(bytes)
    }
}

impl FrameEncoder for ImageCodec {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        match self.format {
            EncodeFormat::Jpeg { quality } => frame.to_jpeg_bytes(quality),
            EncodeFormat::Png => frame.to_png_bytes(),
        }
    }

    fn mime_type(&self) -> &'static str {
        match self.format {
            EncodeFormat::Jpeg { .. } => "image/jpeg",
            EncodeFormat::Png => "image/png",
        }
    }
}
