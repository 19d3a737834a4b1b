//! Screen-space capture projector.
//!
//! Projects the 8 corners of an object's world-space bounding box through the camera and
//! returns the padded, viewport-clamped pixel rectangle used to crop an export frame.

use bevy::prelude::*;

use crate::config::CaptureConfig;
use crate::support::bounds_of;
use crate::support::box_corners;
use crate::support::extract_world_vertices;

/// Corners with clip-space `w` at or below this are treated as behind the camera
const MIN_CLIP_W: f32 = 1e-5;

/// Crop window in device pixels. Invariant: `width >= 1` and `height >= 1`.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRect {
    pub x:      u32,
    pub y:      u32,
    pub width:  u32,
    pub height: u32,
}

impl CaptureRect {
    /// The whole `size` frame
    pub fn full(size: UVec2) -> Self {
        Self {
            x:      0,
            y:      0,
            width:  size.x.max(1),
            height: size.y.max(1),
        }
    }

    pub const fn right(&self) -> u32 { self.x + self.width }

    pub const fn bottom(&self) -> u32 { self.y + self.height }

    /// Shifts the rect by a viewport origin
    pub const fn offset(self, origin: UVec2) -> Self {
        Self {
            x: self.x + origin.x,
            y: self.y + origin.y,
            ..self
        }
    }
}

/// Padding on every side: `max(min_padding_px, padding_fraction * min(W, H))`
pub fn capture_padding(viewport: UVec2, config: &CaptureConfig) -> f32 {
    let short_side = viewport.x.min(viewport.y) as f32;
    config.min_padding_px.max(config.padding_fraction * short_side)
}

/// Maps normalized device coordinates to pixels; pixel rows grow downward
pub fn ndc_to_pixel(ndc: Vec2, viewport: Vec2) -> Vec2 {
    Vec2::new(
        (ndc.x * 0.5 + 0.5) * viewport.x,
        (1.0 - (ndc.y * 0.5 + 0.5)) * viewport.y,
    )
}

/// Tight padded rectangle around the projected corners.
///
/// Returns `None` if any corner is non-finite or lies behind the camera.
pub fn compute_capture_rect(
    corners: &[Vec3; 8],
    clip_from_world: Mat4,
    viewport: UVec2,
    config: &CaptureConfig,
) -> Option<CaptureRect> {
    let viewport = viewport.max(UVec2::ONE);
    let size = viewport.as_vec2();

    let mut min = Vec2::INFINITY;
    let mut max = Vec2::NEG_INFINITY;

    for corner in corners {
        if !corner.is_finite() {
            return None;
        }
        let clip = clip_from_world * corner.extend(1.0);
        if !clip.is_finite() || clip.w <= MIN_CLIP_W {
            return None;
        }
        let pixel = ndc_to_pixel(clip.truncate().truncate() / clip.w, size);
        min = min.min(pixel);
        max = max.max(pixel);
    }

    Some(pixel_rect_from_extents(
        min,
        max,
        viewport,
        capture_padding(viewport, config),
    ))
}

/// Pads the extents, rounds to whole pixels, and clamps into the viewport with 1-pixel floors
pub fn pixel_rect_from_extents(min: Vec2, max: Vec2, viewport: UVec2, padding: f32) -> CaptureRect {
    let viewport = viewport.max(UVec2::ONE);
    let (x0, x1) = clamp_span(min.x - padding, max.x + padding, viewport.x);
    let (y0, y1) = clamp_span(min.y - padding, max.y + padding, viewport.y);

    CaptureRect {
        x:      x0,
        y:      y0,
        width:  x1 - x0,
        height: y1 - y0,
    }
}

fn clamp_span(start: f32, end: f32, limit: u32) -> (u32, u32) {
    let limit_f = limit as f32;
    let start = start.round().clamp(0.0, limit_f - 1.0) as u32;
    let end = (end.round().clamp(0.0, limit_f) as u32).max(start + 1);
    (start, end)
}

/// Clip-from-world matrix for a camera at `cam_global`
pub fn clip_from_world(camera: &Camera, cam_global: &GlobalTransform) -> Mat4 {
    camera.clip_from_view() * Mat4::from(cam_global.affine().inverse())
}

/// World-space bounding-box corners of every mesh under `root`.
/// `None` when there is no geometry yet or the bounds are non-finite.
pub fn world_bounds_corners(
    root: Entity,
    children_query: &Query<&Children>,
    mesh_query: &Query<&Mesh3d>,
    global_transform_query: &Query<&GlobalTransform>,
    meshes: &Assets<Mesh>,
) -> Option<[Vec3; 8]> {
    let vertices = extract_world_vertices(
        root,
        children_query,
        mesh_query,
        global_transform_query,
        meshes,
    );
    bounds_of(&vertices).map(|(min, max)| box_corners(min, max))
}

/// Capture rect relative to the camera's physical viewport
pub fn capture_rect_in_viewport(
    camera: &Camera,
    cam_global: &GlobalTransform,
    corners: &[Vec3; 8],
    config: &CaptureConfig,
) -> Option<CaptureRect> {
    let viewport = camera.physical_viewport_size()?;
    compute_capture_rect(corners, clip_from_world(camera, cam_global), viewport, config)
}

/// Capture rect in render-target pixels, ready to crop a window screenshot
pub fn capture_rect_for_camera(
    camera: &Camera,
    cam_global: &GlobalTransform,
    corners: &[Vec3; 8],
    config: &CaptureConfig,
) -> Option<CaptureRect> {
    let origin = camera.physical_viewport_rect()?.min;
    capture_rect_in_viewport(camera, cam_global, corners, config).map(|rect| rect.offset(origin))
}
