//! Export of the captured design: crop, downscale, encode, and the persistence payload.

use std::io::Cursor;

use bevy::prelude::*;
use image::ExtendedColorType;
use image::ImageEncoder;
use image::RgbaImage;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops;
use image::imageops::FilterType;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::capture::CaptureRect;
use crate::compositor::CustomizerState;
use crate::config::CaptureConfig;
use crate::config::LabelStyle;
use crate::config::PaletteColor;

#[derive(Reflect, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    WebP,
    Png,
}

impl ExportFormat {
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Png => "image/png",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Png => "png",
        }
    }
}

/// An encoded, self-describing export image
#[derive(Reflect, Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    pub format: ExportFormat,
    pub width:  u32,
    pub height: u32,
    pub bytes:  Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("captured frame could not be read: {0}")]
    Frame(String),
    #[error("failed to encode export image: {0}")]
    Encode(#[from] image::ImageError),
}

/// What the persistence client sends alongside the exported image
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DesignPayload {
    pub label: String,
    pub color: PaletteColor,
    pub style: LabelStyle,
}

impl DesignPayload {
    pub fn from_state(state: &CustomizerState) -> Self {
        Self {
            label: state.label.trim().to_string(),
            color: state.color,
            style: state.style,
        }
    }
}

/// Converts a captured screenshot into straight RGBA8
pub fn frame_to_rgba(frame: Image) -> Result<RgbaImage, ExportError> {
    frame
        .try_into_dynamic()
        .map(|dynamic| dynamic.to_rgba8())
        .map_err(|err| ExportError::Frame(err.to_string()))
}

/// Crops `frame` to `rect` and downscales so the longer side is at most `max_long_side`.
/// The rect is clipped to the frame first; images are never upscaled.
pub fn crop_capture(frame: &RgbaImage, rect: CaptureRect, max_long_side: u32) -> RgbaImage {
    let frame_w = frame.width().max(1);
    let frame_h = frame.height().max(1);
    let x = rect.x.min(frame_w - 1);
    let y = rect.y.min(frame_h - 1);
    let width = rect.width.min(frame_w - x).max(1);
    let height = rect.height.min(frame_h - y).max(1);

    let cropped = imageops::crop_imm(frame, x, y, width, height).to_image();

    let long_side = width.max(height);
    let max_long_side = max_long_side.max(1);
    if long_side <= max_long_side {
        return cropped;
    }

    let scale = max_long_side as f32 / long_side as f32;
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, max_long_side);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, max_long_side);
    imageops::resize(&cropped, new_w, new_h, FilterType::Lanczos3)
}

/// Encodes as lossless WebP, falling back to PNG if WebP encoding fails
pub fn encode_export(image: &RgbaImage) -> Result<ExportedImage, ExportError> {
    let (width, height) = image.dimensions();

    let mut webp = Vec::new();
    match WebPEncoder::new_lossless(Cursor::new(&mut webp)).encode(
        image.as_raw(),
        width,
        height,
        ExtendedColorType::Rgba8,
    ) {
        Ok(()) => {
            return Ok(ExportedImage {
                format: ExportFormat::WebP,
                width,
                height,
                bytes: webp,
            });
        },
        Err(err) => warn!("WebP encoding failed, falling back to PNG: {err}"),
    }

    let mut png = Vec::new();
    PngEncoder::new(Cursor::new(&mut png)).write_image(
        image.as_raw(),
        width,
        height,
        ExtendedColorType::Rgba8,
    )?;

    Ok(ExportedImage {
        format: ExportFormat::Png,
        width,
        height,
        bytes: png,
    })
}

/// Crop, downscale and encode a captured frame
pub fn export_frame(
    frame: &RgbaImage,
    rect: CaptureRect,
    config: &CaptureConfig,
) -> Result<ExportedImage, ExportError> {
    encode_export(&crop_capture(frame, rect, config.max_export_side))
}
