//! UV-space and texture-space rectangles for the decal region.

use bevy::prelude::*;

/// Bounding rectangle of a mesh's UV coordinates, clamped to the unit square.
/// Invariant: `min_u <= max_u` and `min_v <= max_v`.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub min_u: f32,
    pub min_v: f32,
    pub max_u: f32,
    pub max_v: f32,
}

impl UvRect {
    /// Builds the rectangle from a stream of UV pairs by tracking the running min/max per axis,
    /// then clamping into `[0, 1]`. Returns `None` for an empty stream or non-finite data.
    pub fn from_uvs<I>(uvs: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f32; 2]>,
    {
        let mut min_u = f32::INFINITY;
        let mut min_v = f32::INFINITY;
        let mut max_u = f32::NEG_INFINITY;
        let mut max_v = f32::NEG_INFINITY;

        for [u, v] in uvs {
            min_u = min_u.min(u);
            min_v = min_v.min(v);
            max_u = max_u.max(u);
            max_v = max_v.max(v);
        }

        if !(min_u.is_finite() && min_v.is_finite() && max_u.is_finite() && max_v.is_finite()) {
            return None;
        }

        Some(Self {
            min_u: min_u.clamp(0.0, 1.0),
            min_v: min_v.clamp(0.0, 1.0),
            max_u: max_u.clamp(0.0, 1.0),
            max_v: max_v.clamp(0.0, 1.0),
        })
    }

    pub const fn width(&self) -> f32 { self.max_u - self.min_u }

    pub const fn height(&self) -> f32 { self.max_v - self.min_v }

    /// Maps the rectangle into the pixel space of a `size` buffer.
    ///
    /// With `flip_y` the V axis is inverted (`v = 0` samples the bottom row). Width and height
    /// are floored at one pixel so a degenerate UV range still yields a usable rectangle, and
    /// the result is clipped to the buffer.
    pub fn to_texture_rect(&self, size: UVec2, flip_y: bool) -> TextureRect {
        let buffer_w = size.x as f32;
        let buffer_h = size.y as f32;

        let left = (self.min_u * buffer_w).round() as u32;
        let top = if flip_y {
            ((1.0 - self.max_v) * buffer_h).round() as u32
        } else {
            (self.min_v * buffer_h).round() as u32
        };
        let width = ((self.width() * buffer_w).round() as u32).max(1);
        let height = ((self.height() * buffer_h).round() as u32).max(1);

        TextureRect {
            left,
            top,
            width,
            height,
        }
        .clipped_to(size)
    }
}

/// Pixel rectangle inside the working buffer covered by the decal.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRect {
    pub left:   u32,
    pub top:    u32,
    pub width:  u32,
    pub height: u32,
}

impl TextureRect {
    pub const fn right(&self) -> u32 { self.left + self.width }

    pub const fn bottom(&self) -> u32 { self.top + self.height }

    /// Returns true if the pixel lies inside the rectangle
    pub const fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.left as i64
            && y >= self.top as i64
            && x < self.right() as i64
            && y < self.bottom() as i64
    }

    /// Clips the rectangle to a buffer of `size`, keeping at least one pixel per axis
    pub fn clipped_to(self, size: UVec2) -> Self {
        let max_x = size.x.max(1);
        let max_y = size.y.max(1);
        let left = self.left.min(max_x - 1);
        let top = self.top.min(max_y - 1);
        let width = self.width.min(max_x - left).max(1);
        let height = self.height.min(max_y - top).max(1);
        Self {
            left,
            top,
            width,
            height,
        }
    }
}
