//! Label measurement, auto-fit sizing, and glyph rasterization into the working buffer.

use std::sync::Arc;

use ab_glyph::Font;
use ab_glyph::FontArc;
use ab_glyph::GlyphId;
use ab_glyph::ScaleFont;
use ab_glyph::point;
use bevy::prelude::*;
use image::RgbaImage;
use thiserror::Error;

use crate::config::DecalConfig;
use crate::config::LabelStyle;
use crate::surface::blend_pixel;
use crate::uv::TextureRect;

/// Horizontal shear applied per pixel of height above the baseline for slanted styles
const ITALIC_SHEAR: f32 = 0.2;
/// Heavy styles smear coverage to the right by this fraction of the font size
const BOLD_SMEAR: f32 = 0.035;

/// Coverage below this is treated as empty
const MIN_COVERAGE: f32 = 0.001;

/// A font that can measure and paint a single line of label text.
///
/// `measure` must report the full inked width `draw` will produce at the same size and style,
/// so the fitter and the painter agree.
pub trait LabelFont: Send + Sync {
    /// Width in pixels of `text` rendered at `px`
    fn measure(&self, text: &str, px: f32, style: LabelStyle) -> f32;

    /// Paints `text` horizontally centered on `center_x` with its baseline at `baseline_y`.
    /// Nothing is written outside `clip`.
    #[allow(clippy::too_many_arguments)]
    fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        px: f32,
        style: LabelStyle,
        center_x: f32,
        baseline_y: f32,
        color: [u8; 4],
        clip: TextureRect,
    );
}

/// Font used by the plugin for label text. Without it, labels are skipped.
#[derive(Resource, Clone)]
pub struct LabelFontHandle(pub Arc<dyn LabelFont>);

impl LabelFontHandle {
    pub fn new(font: impl LabelFont + 'static) -> Self { Self(Arc::new(font)) }
}

#[derive(Debug, Error)]
#[error("invalid font data: {0}")]
pub struct FontError(#[from] ab_glyph::InvalidFont);

/// Shrinks the font size in fixed steps until `measure` fits inside the padded rect width.
///
/// Starts at `start_font_fraction` of `rect_w` and stops at the first size that fits or at
/// `min_font_px`, whichever comes first. The returned size is the one to draw with.
pub fn fit_font_size(rect_w: f32, config: &DecalConfig, mut measure: impl FnMut(f32) -> f32) -> f32 {
    let available = available_text_width(rect_w, config);
    let mut size = (rect_w * config.start_font_fraction).max(config.min_font_px);
    while size > config.min_font_px && measure(size) > available {
        size = (size - config.font_step_px).max(config.min_font_px);
    }
    size
}

/// Rect width minus the safe padding on both sides
pub fn available_text_width(rect_w: f32, config: &DecalConfig) -> f32 {
    (rect_w - 2.0 * config.text_padding * rect_w).max(0.0)
}

// ============================================================================
// ab_glyph font
// ============================================================================

/// `LabelFont` backed by an outline font loaded with `ab_glyph`
#[derive(Clone)]
pub struct GlyphFont {
    font: FontArc,
}

impl GlyphFont {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FontError> {
        Ok(Self {
            font: FontArc::try_from_vec(bytes)?,
        })
    }

    /// Lays out one line starting at x = 0 on the baseline.
    /// Returns `(glyphs, advance_width, ascent, descent)`; descent is negative.
    fn layout(&self, text: &str, px: f32) -> (Vec<(GlyphId, f32)>, f32, f32, f32) {
        let scaled = self.font.as_scaled(px);
        let mut glyphs = Vec::with_capacity(text.len());
        let mut cursor_x = 0.0_f32;
        let mut last_glyph: Option<GlyphId> = None;

        for ch in text.chars() {
            let glyph_id = self.font.glyph_id(ch);
            if let Some(prev) = last_glyph {
                cursor_x += scaled.kern(prev, glyph_id);
            }
            glyphs.push((glyph_id, cursor_x));
            cursor_x += scaled.h_advance(glyph_id);
            last_glyph = Some(glyph_id);
        }

        (glyphs, cursor_x, scaled.ascent(), scaled.descent())
    }
}

/// Extra width added by style effects on top of the advance width. The shear leans
/// ascenders right of the advance and descenders left of the origin.
fn style_extent(px: f32, ascent: f32, descent: f32, style: LabelStyle) -> f32 {
    shear_left(descent, style) + shear_right(ascent, style) + bold_smear_px(px, style) as f32
}

fn shear_left(descent: f32, style: LabelStyle) -> f32 {
    if style.is_slanted() {
        descent.abs() * ITALIC_SHEAR
    } else {
        0.0
    }
}

fn shear_right(ascent: f32, style: LabelStyle) -> f32 {
    if style.is_slanted() {
        ascent * ITALIC_SHEAR
    } else {
        0.0
    }
}

fn bold_smear_px(px: f32, style: LabelStyle) -> u32 {
    if style.is_heavy() {
        (px * BOLD_SMEAR).round().max(1.0) as u32
    } else {
        0
    }
}

impl LabelFont for GlyphFont {
    fn measure(&self, text: &str, px: f32, style: LabelStyle) -> f32 {
        let (_, advance, ascent, descent) = self.layout(text, px);
        advance + style_extent(px, ascent, descent, style)
    }

    fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        px: f32,
        style: LabelStyle,
        center_x: f32,
        baseline_y: f32,
        color: [u8; 4],
        clip: TextureRect,
    ) {
        let clip = clip.clipped_to(UVec2::new(canvas.width(), canvas.height()));
        let (glyphs, advance, ascent, descent) = self.layout(text, px);
        let inked_left = center_x - (advance + style_extent(px, ascent, descent, style)) * 0.5;
        let origin_x = inked_left + shear_left(descent, style);
        let smear = bold_smear_px(px, style) as i64;

        // Coverage is accumulated first so overlapping glyph edges and the bold smear are
        // blended exactly once.
        let stride = clip.width as usize;
        let mut coverage = vec![0.0_f32; stride * clip.height as usize];

        for (glyph_id, glyph_x) in glyphs {
            let glyph = glyph_id.with_scale_and_position(px, point(origin_x + glyph_x, baseline_y));
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|x, y, cov| {
                let canvas_y = bounds.min.y + y as f32;
                let mut canvas_x = bounds.min.x + x as f32;
                if style.is_slanted() {
                    canvas_x += (baseline_y - canvas_y) * ITALIC_SHEAR;
                }
                let iy = canvas_y as i64;
                let ix = canvas_x.round() as i64;
                for dx in 0..=smear {
                    if !clip.contains(ix + dx, iy) {
                        continue;
                    }
                    let idx = (iy - clip.top as i64) as usize * stride
                        + (ix + dx - clip.left as i64) as usize;
                    coverage[idx] = coverage[idx].max(cov);
                }
            });
        }

        for (idx, cov) in coverage.into_iter().enumerate() {
            if cov <= MIN_COVERAGE {
                continue;
            }
            let x = clip.left + (idx % stride) as u32;
            let y = clip.top + (idx / stride) as u32;
            blend_pixel(canvas.get_pixel_mut(x, y), color, cov.min(1.0));
        }
    }
}

// ============================================================================
// Test support
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::BlockFont;
    use super::*;

    #[test]
    fn fitter_shrinks_in_steps_until_label_fits() {
        let config = DecalConfig::default();
        let font = BlockFont::default();
        let label = "My Bag";
        let mut measured_sizes = Vec::new();
        let size = fit_font_size(800.0, &config, |px| {
            measured_sizes.push(px);
            font.measure(label, px, LabelStyle::Bold)
        });

        // 6 chars * 0.6 * px must fit 800 - 2 * 64 = 672, so px <= 186.7 and 144 already fits
        assert_eq!(size, 144.0);
        assert_eq!(measured_sizes, vec![144.0]);
    }

    #[test]
    fn long_labels_decrement_by_two() {
        let config = DecalConfig::default();
        let font = BlockFont::default();
        let label = "Extraordinarily Long Bag Name";
        let mut measured_sizes = Vec::new();
        let size = fit_font_size(800.0, &config, |px| {
            measured_sizes.push(px);
            font.measure(label, px, LabelStyle::Bold)
        });

        let available = available_text_width(800.0, &config);
        assert!((available - 672.0).abs() < 1e-3);
        assert!(font.measure(label, size, LabelStyle::Bold) <= available);
        assert!(font.measure(label, size + 2.0, LabelStyle::Bold) > available);
        assert_eq!(measured_sizes.first(), Some(&144.0));
        for pair in measured_sizes.windows(2) {
            assert_eq!(pair[0] - pair[1], 2.0);
        }
        assert_eq!(measured_sizes.last(), Some(&size));
    }

    #[test]
    fn italic_extent_covers_ascender_and_descender_lean() {
        // (80 + 20) * 0.2 of shear plus round(100 * 0.035) = 4 smear pixels
        let italic = style_extent(100.0, 80.0, -20.0, LabelStyle::Italic);
        assert!((italic - 24.0).abs() < 1e-4);
        assert!((shear_left(-20.0, LabelStyle::Italic) - 4.0).abs() < 1e-4);
        // Bold smears but does not lean
        assert!((style_extent(100.0, 80.0, -20.0, LabelStyle::Bold) - 4.0).abs() < 1e-4);
        assert_eq!(style_extent(100.0, 80.0, -20.0, LabelStyle::Regular), 0.0);
    }

    #[test]
    fn fitter_never_goes_below_floor() {
        let config = DecalConfig::default();
        let size = fit_font_size(300.0, &config, |px| px * 1000.0);
        assert_eq!(size, config.min_font_px);
    }

    #[test]
    fn fitted_text_respects_padding_for_many_lengths() {
        let config = DecalConfig::default();
        let font = BlockFont::default();
        for rect_w in [200.0_f32, 512.0, 819.0, 1229.0] {
            let available = available_text_width(rect_w, &config);
            for len in 1..=48 {
                let label = "W".repeat(len);
                let size = fit_font_size(rect_w, &config, |px| {
                    font.measure(&label, px, LabelStyle::Regular)
                });
                if size > config.min_font_px {
                    assert!(font.measure(&label, size, LabelStyle::Regular) <= available);
                }
            }
        }
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        assert!(GlyphFont::from_bytes(vec![0, 1, 2, 3]).is_err());
    }
}
