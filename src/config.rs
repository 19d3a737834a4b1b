//! Configuration resources and the small user-facing vocabularies (palette, label style).

use bevy::color::ColorToPacked;
use bevy::prelude::*;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// Decal compositing
// ============================================================================

/// Resolution of the square working buffer the decal texture is re-rendered into
pub const DEFAULT_BUFFER_SIZE: u32 = 2048;

/// Configuration for decal location and overlay compositing
#[derive(Resource, Reflect, Debug, Clone)]
#[reflect(Resource)]
pub struct DecalConfig {
    /// Side length of the square working buffer in pixels
    pub buffer_size:          u32,
    /// Lowercase tokens that mark a mesh name as a decal candidate
    pub name_tokens:          Vec<String>,
    /// Vertical sampling convention used when a `DecalTag` doesn't override it
    pub flip_y:               bool,
    /// Horizontal safe padding on each side, as a fraction of rect width
    pub text_padding:         f32,
    /// Starting font size as a fraction of rect width
    pub start_font_fraction:  f32,
    /// Smallest font size the fitter will shrink to
    pub min_font_px:          f32,
    /// Fixed shrink decrement per fitting step
    pub font_step_px:         f32,
    /// Baseline anchor (fraction of rect height from the top) when no image is drawn
    pub baseline_text_only:   f32,
    /// Baseline anchor when an image occupies the upper portion
    pub baseline_with_image:  f32,
    /// Lower bound of the safe vertical band for the baseline
    pub baseline_min:         f32,
    /// Upper bound of the safe vertical band for the baseline
    pub baseline_max:         f32,
    /// Maximum image width as a fraction of rect width
    pub image_max_width:      f32,
    /// Maximum image height as a fraction of rect height
    pub image_max_height:     f32,
    /// Vertical center of the image as a fraction of rect height
    pub image_anchor:         f32,
    /// Label fill color
    pub text_color:           Color,
    /// Largest accepted upload in bytes
    pub max_upload_bytes:     usize,
    /// Accepted upload MIME types
    pub accepted_mime_types:  Vec<String>,
}

impl Default for DecalConfig {
    fn default() -> Self {
        Self {
            buffer_size:         DEFAULT_BUFFER_SIZE,
            name_tokens:         ["logo", "label", "decal", "text", "plane"]
                .into_iter()
                .map(String::from)
                .collect(),
            flip_y:              false,
            text_padding:        0.08,
            start_font_fraction: 0.18,
            min_font_px:         18.0,
            font_step_px:        2.0,
            baseline_text_only:  0.93,
            baseline_with_image: 0.82,
            baseline_min:        0.05,
            baseline_max:        0.98,
            image_max_width:     0.72,
            image_max_height:    0.45,
            image_anchor:        0.5,
            text_color:          Color::srgba(0.0, 0.0, 0.0, 0.75),
            max_upload_bytes:    4 * 1024 * 1024,
            accepted_mime_types: ["image/png", "image/jpeg", "image/webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl DecalConfig {
    /// Text color as straight-alpha RGBA8
    pub fn text_rgba(&self) -> [u8; 4] { self.text_color.to_srgba().to_u8_array() }

    /// Returns true if `name` contains one of the decal tokens (case-insensitive)
    pub fn is_decal_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.name_tokens.iter().any(|token| lower.contains(token.as_str()))
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Configuration for the screen-space capture rectangle and export
#[derive(Resource, Reflect, Debug, Clone)]
#[reflect(Resource)]
pub struct CaptureConfig {
    /// Padding floor in device pixels
    pub min_padding_px:   f32,
    /// Padding as a fraction of the viewport's shorter side
    pub padding_fraction: f32,
    /// Longest side of the exported image; larger crops are downscaled
    pub max_export_side:  u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_padding_px:   18.0,
            padding_fraction: 0.02,
            max_export_side:  1600,
        }
    }
}

// ============================================================================
// Vocabularies
// ============================================================================

/// Body colors offered to the user
#[derive(Reflect, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaletteColor {
    #[default]
    Yellow,
    Red,
    Blue,
    Green,
}

impl PaletteColor {
    pub const ALL: [Self; 4] = [Self::Yellow, Self::Red, Self::Blue, Self::Green];

    /// Looks up a palette entry by key. Unknown keys fall back to yellow.
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_lowercase().as_str() {
            "red" => Self::Red,
            "blue" => Self::Blue,
            "green" => Self::Green,
            _ => Self::Yellow,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
        }
    }

    pub const fn hex(self) -> &'static str {
        match self {
            Self::Yellow => "#FFD000",
            Self::Red => "#E11D48",
            Self::Blue => "#2563EB",
            Self::Green => "#16A34A",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Yellow => Color::srgb_u8(0xFF, 0xD0, 0x00),
            Self::Red => Color::srgb_u8(0xE1, 0x1D, 0x48),
            Self::Blue => Color::srgb_u8(0x25, 0x63, 0xEB),
            Self::Green => Color::srgb_u8(0x16, 0xA3, 0x4A),
        }
    }
}

/// Presentation style of the label glyphs
#[derive(Reflect, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelStyle {
    /// Heavy weight
    #[default]
    Bold,
    /// Lighter weight
    Regular,
    /// Heavy weight with slanted glyphs
    Italic,
}

impl LabelStyle {
    /// Unknown keys fall back to the bold default
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_lowercase().as_str() {
            "regular" => Self::Regular,
            "italic" => Self::Italic,
            _ => Self::Bold,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Regular => "regular",
            Self::Italic => "italic",
        }
    }

    pub const fn is_heavy(self) -> bool { matches!(self, Self::Bold | Self::Italic) }

    pub const fn is_slanted(self) -> bool { matches!(self, Self::Italic) }
}
