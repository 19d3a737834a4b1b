//! Working raster surface for the decal texture.
//!
//! The surface keeps a seed copy of the pristine decal image at the working resolution and a
//! working buffer. Every redraw resets the working buffer from the seed before painting, so
//! overlays never composite onto a previous overlay.

use std::sync::Arc;

use bevy::prelude::*;
use image::Rgba;
use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;

use crate::config::DecalConfig;
use crate::config::LabelStyle;
use crate::text::LabelFont;
use crate::text::fit_font_size;
use crate::uv::TextureRect;
use crate::uv::UvRect;

/// User payload for one redraw. Rebuilt from UI state on every edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayContent {
    /// Trimmed label; empty means no text
    pub label: String,
    pub style: LabelStyle,
    pub image: Option<Arc<RgbaImage>>,
}

impl OverlayContent {
    pub fn new(label: &str, style: LabelStyle, image: Option<Arc<RgbaImage>>) -> Self {
        Self {
            label: label.trim().to_string(),
            style,
            image,
        }
    }

    pub fn has_label(&self) -> bool { !self.label.is_empty() }
}

/// Where an image lands inside the canvas, in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlacement {
    pub x:      i64,
    pub y:      i64,
    pub width:  u32,
    pub height: u32,
}

/// Fixed-resolution raster the decal is composited into
#[derive(Debug, Clone)]
pub struct OverlaySurface {
    seed:    RgbaImage,
    working: RgbaImage,
    rect:    TextureRect,
}

impl OverlaySurface {
    /// Seeds a `size`×`size` surface from the pristine image. The pristine image is only read.
    pub fn new(pristine: &RgbaImage, size: u32, uv: UvRect, flip_y: bool) -> Self {
        let size = size.max(1);
        let seed = if pristine.dimensions() == (size, size) {
            pristine.clone()
        } else {
            imageops::resize(pristine, size, size, FilterType::Triangle)
        };
        let rect = uv.to_texture_rect(UVec2::splat(size), flip_y);
        let working = seed.clone();

        Self {
            seed,
            working,
            rect,
        }
    }

    /// Decal region in buffer pixels
    pub const fn rect(&self) -> TextureRect { self.rect }

    pub const fn working(&self) -> &RgbaImage { &self.working }

    pub const fn seed(&self) -> &RgbaImage { &self.seed }

    pub fn size(&self) -> UVec2 { UVec2::new(self.working.width(), self.working.height()) }

    /// Resets the working buffer from the seed and paints `content` inside the decal rect.
    ///
    /// The image is painted first, then the label underneath it. Without a font the label is
    /// skipped.
    pub fn redraw(
        &mut self,
        content: &OverlayContent,
        font: Option<&dyn LabelFont>,
        config: &DecalConfig,
    ) -> &RgbaImage {
        self.working.clone_from(&self.seed);

        let has_image = if let Some(image) = content.image.as_deref() {
            draw_image(&mut self.working, image, self.rect, config)
        } else {
            false
        };

        if content.has_label() {
            match font {
                Some(font) => draw_label(
                    &mut self.working,
                    &content.label,
                    content.style,
                    font,
                    self.rect,
                    has_image,
                    config,
                ),
                None => debug!("No label font available, skipping label text"),
            }
        }

        &self.working
    }
}

/// Baseline y in canvas pixels, anchored to the rect and clamped into the safe band
pub fn label_baseline(rect: TextureRect, has_image: bool, config: &DecalConfig) -> f32 {
    let anchor = if has_image {
        config.baseline_with_image
    } else {
        config.baseline_text_only
    };
    let anchor = anchor.clamp(config.baseline_min, config.baseline_max);
    rect.top as f32 + rect.height as f32 * anchor
}

/// Fits an image of `image_size` inside the capped sub-region of `rect`, preserving aspect
/// ratio, horizontally centered and vertically centered on the image anchor.
pub fn image_placement(image_size: UVec2, rect: TextureRect, config: &DecalConfig) -> Option<ImagePlacement> {
    if image_size.x == 0 || image_size.y == 0 {
        return None;
    }

    let max_w = rect.width as f32 * config.image_max_width;
    let max_h = rect.height as f32 * config.image_max_height;
    let scale = (max_w / image_size.x as f32).min(max_h / image_size.y as f32);

    let width = ((image_size.x as f32 * scale).round() as u32).clamp(1, rect.width);
    let height = ((image_size.y as f32 * scale).round() as u32).clamp(1, rect.height);

    let x = rect.left as i64 + (rect.width as i64 - width as i64) / 2;
    let center_y = rect.top as f32 + rect.height as f32 * config.image_anchor;
    let y = (center_y - height as f32 * 0.5).round() as i64;
    let y = y.clamp(rect.top as i64, (rect.bottom() - height) as i64);

    Some(ImagePlacement {
        x,
        y,
        width,
        height,
    })
}

/// Returns true if anything was painted
fn draw_image(canvas: &mut RgbaImage, image: &RgbaImage, rect: TextureRect, config: &DecalConfig) -> bool {
    let Some(placement) = image_placement(UVec2::new(image.width(), image.height()), rect, config)
    else {
        return false;
    };

    let scaled = imageops::resize(image, placement.width, placement.height, FilterType::Triangle);
    for (x, y, pixel) in scaled.enumerate_pixels() {
        let canvas_x = placement.x + x as i64;
        let canvas_y = placement.y + y as i64;
        if !rect.contains(canvas_x, canvas_y) {
            continue;
        }
        blend_pixel(
            canvas.get_pixel_mut(canvas_x as u32, canvas_y as u32),
            pixel.0,
            1.0,
        );
    }
    true
}

fn draw_label(
    canvas: &mut RgbaImage,
    label: &str,
    style: LabelStyle,
    font: &dyn LabelFont,
    rect: TextureRect,
    has_image: bool,
    config: &DecalConfig,
) {
    let size = fit_font_size(rect.width as f32, config, |px| font.measure(label, px, style));
    let center_x = rect.left as f32 + rect.width as f32 * 0.5;
    let baseline = label_baseline(rect, has_image, config);

    debug!("Drawing label '{label}' at {size:.0}px, baseline {baseline:.1}");

    font.draw(
        canvas,
        label,
        size,
        style,
        center_x,
        baseline,
        config.text_rgba(),
        rect,
    );
}

/// Source-over blend of a straight-alpha color scaled by `coverage`
pub fn blend_pixel(dst: &mut Rgba<u8>, src: [u8; 4], coverage: f32) {
    let src_a = f32::from(src[3]) / 255.0 * coverage;
    if src_a <= 0.0 {
        return;
    }
    let dst_a = f32::from(dst.0[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }

    for channel in 0..3 {
        let src_c = f32::from(src[channel]);
        let dst_c = f32::from(dst.0[channel]);
        let out_c = (src_c * src_a + dst_c * dst_a * (1.0 - src_a)) / out_a;
        dst.0[channel] = out_c.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::testing::BlockFont;

    const SIZE: u32 = 256;

    fn pristine() -> RgbaImage {
        RgbaImage::from_fn(SIZE, SIZE, |x, y| Rgba([(x % 251) as u8, (y % 241) as u8, 90, 255]))
    }

    fn uv() -> UvRect {
        UvRect {
            min_u: 0.25,
            min_v: 0.25,
            max_u: 0.75,
            max_v: 0.5,
        }
    }

    fn logo() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(40, 20, Rgba([200, 10, 10, 255])))
    }

    #[test]
    fn redraw_is_idempotent_on_replay() {
        let config = DecalConfig::default();
        let font = BlockFont::default();
        let mut surface = OverlaySurface::new(&pristine(), SIZE, uv(), false);
        let content = OverlayContent::new("  My Bag ", LabelStyle::Italic, Some(logo()));

        let first = surface.redraw(&content, Some(&font), &config).clone();
        let second = surface.redraw(&content, Some(&font), &config).clone();
        assert_eq!(first, second);
        assert_ne!(&first, surface.seed());
    }

    #[test]
    fn later_edit_fully_replaces_earlier_overlay() {
        let config = DecalConfig::default();
        let font = BlockFont::default();
        let mut surface = OverlaySurface::new(&pristine(), SIZE, uv(), false);

        let short = OverlayContent::new("Hi", LabelStyle::Bold, None);
        let expected = surface.redraw(&short, Some(&font), &config).clone();

        let long = OverlayContent::new("A much longer label", LabelStyle::Bold, Some(logo()));
        surface.redraw(&long, Some(&font), &config);
        let replayed = surface.redraw(&short, Some(&font), &config).clone();

        assert_eq!(expected, replayed);
    }

    #[test]
    fn nothing_is_painted_outside_the_decal_rect() {
        let config = DecalConfig::default();
        let font = BlockFont { advance: 3.0 };
        let mut surface = OverlaySurface::new(&pristine(), SIZE, uv(), false);
        let rect = surface.rect();
        let content = OverlayContent::new("Overflowing label text", LabelStyle::Bold, Some(logo()));

        let seed = surface.seed().clone();
        let working = surface.redraw(&content, Some(&font), &config);

        for (x, y, pixel) in working.enumerate_pixels() {
            if !rect.contains(i64::from(x), i64::from(y)) {
                assert_eq!(pixel, seed.get_pixel(x, y), "pixel ({x}, {y}) leaked");
            }
        }
    }

    #[test]
    fn empty_content_restores_pristine_pixels() {
        let config = DecalConfig::default();
        let font = BlockFont::default();
        let mut surface = OverlaySurface::new(&pristine(), SIZE, uv(), false);
        surface.redraw(&OverlayContent::new("Label", LabelStyle::Bold, None), Some(&font), &config);

        let cleared = surface.redraw(&OverlayContent::new("   ", LabelStyle::Bold, None), Some(&font), &config);
        assert_eq!(cleared, &pristine());
    }

    #[test]
    fn seed_is_resampled_to_buffer_resolution() {
        let small = RgbaImage::from_pixel(32, 16, Rgba([1, 2, 3, 255]));
        let surface = OverlaySurface::new(&small, 128, uv(), false);
        assert_eq!(surface.size(), UVec2::splat(128));
        assert_eq!(surface.working().get_pixel(100, 100), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn image_is_capped_and_keeps_aspect() {
        let config = DecalConfig::default();
        let rect = TextureRect {
            left:   100,
            top:    200,
            width:  800,
            height: 400,
        };

        // Wide image is width-limited: 72% of 800 = 576
        let wide = image_placement(UVec2::new(1000, 100), rect, &config).unwrap();
        assert_eq!(wide.width, 576);
        assert_eq!(wide.height, 58);
        assert_eq!(wide.x, 100 + (800 - 576) / 2);

        // Tall image is height-limited: 45% of 400 = 180
        let tall = image_placement(UVec2::new(100, 1000), rect, &config).unwrap();
        assert_eq!(tall.height, 180);
        assert_eq!(tall.width, 18);
        assert_eq!(tall.y, 200 + 200 - 90);
    }

    #[test]
    fn baseline_depends_on_image_and_stays_in_band() {
        let rect = TextureRect {
            left:   0,
            top:    100,
            width:  500,
            height: 200,
        };
        let config = DecalConfig::default();
        assert!((label_baseline(rect, false, &config) - 286.0).abs() < 1e-3);
        assert!((label_baseline(rect, true, &config) - 264.0).abs() < 1e-3);

        let extreme = DecalConfig {
            baseline_text_only: 1.2,
            ..default()
        };
        assert!((label_baseline(rect, false, &extreme) - 296.0).abs() < 1e-3);
    }

    #[test]
    fn blend_respects_coverage() {
        let mut pixel = Rgba([255, 255, 255, 255]);
        blend_pixel(&mut pixel, [0, 0, 0, 255], 0.5);
        assert_eq!(pixel, Rgba([128, 128, 128, 255]));

        let mut untouched = Rgba([10, 20, 30, 255]);
        blend_pixel(&mut untouched, [0, 0, 0, 255], 0.0);
        assert_eq!(untouched, Rgba([10, 20, 30, 255]));
    }
}
