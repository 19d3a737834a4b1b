//! Visualization system for capture debugging
//!
//! Outlines the capture rectangle of each camera's `CaptureTarget` and the world bounds of
//! every located decal mesh. Uses Bevy's `GizmoConfigGroup` pattern.

use bevy::camera::visibility::RenderLayers;
use bevy::prelude::*;

use crate::capture::CaptureRect;
use crate::capture::capture_rect_in_viewport;
use crate::capture::world_bounds_corners;
use crate::components::CaptureTarget;
use crate::compositor::DecalCompositor;
use crate::config::CaptureConfig;
use crate::support::bounds_of;
use crate::support::box_corners;
use crate::support::world_positions;

/// Gizmo config group for capture visualization.
/// Toggle via `GizmoConfigStore::config_mut::<CaptureGizmo>().enabled`
#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct CaptureGizmo {}

/// Box edges as index pairs into `box_corners` output
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Configuration for capture visualization colors and appearance
#[derive(Resource, Reflect, Debug, Clone)]
#[reflect(Resource)]
pub struct CaptureVisualizationConfig {
    pub rectangle_color: Color,
    pub bounds_color:    Color,
    pub decal_color:     Color,
    pub line_width:      f32,
}

impl Default for CaptureVisualizationConfig {
    fn default() -> Self {
        Self {
            rectangle_color: Color::srgb(1.0, 1.0, 0.0), // Yellow
            bounds_color:    Color::srgb(0.0, 1.0, 1.0), // Cyan
            decal_color:     Color::srgb(1.0, 0.0, 1.0), // Magenta
            line_width:      2.0,
        }
    }
}

/// Plugin that adds capture visualization functionality
pub struct CaptureVisualizationPlugin;

impl Plugin for CaptureVisualizationPlugin {
    fn build(&self, app: &mut App) {
        app.init_gizmo_group::<CaptureGizmo>()
            .init_resource::<CaptureVisualizationConfig>()
            .add_systems(Startup, init_capture_gizmo)
            .add_systems(
                Update,
                (sync_gizmo_render_layers, draw_capture_bounds, draw_decal_bounds).chain(),
            );
    }
}

/// Initialize the capture gizmo config (disabled by default)
fn init_capture_gizmo(
    mut config_store: ResMut<GizmoConfigStore>,
    viz_config: Res<CaptureVisualizationConfig>,
) {
    let (config, _) = config_store.config_mut::<CaptureGizmo>();
    config.enabled = false;
    config.line.width = viz_config.line_width;
    config.depth_bias = -1.0;
}

/// Syncs the gizmo render layers and line width with the capturing camera
fn sync_gizmo_render_layers(
    mut config_store: ResMut<GizmoConfigStore>,
    viz_config: Res<CaptureVisualizationConfig>,
    camera_query: Query<Option<&RenderLayers>, With<CaptureTarget>>,
) {
    let Some(render_layers) = camera_query.iter().next() else {
        return;
    };

    let (gizmo_config, _) = config_store.config_mut::<CaptureGizmo>();
    if let Some(layers) = render_layers {
        gizmo_config.render_layers = layers.clone();
    }
    gizmo_config.line.width = viz_config.line_width;
}

fn draw_box(gizmos: &mut Gizmos<CaptureGizmo>, corners: &[Vec3; 8], color: Color) {
    for (a, b) in BOX_EDGES {
        gizmos.line(corners[a], corners[b], color);
    }
}

/// Projects the viewport-relative capture rect back into the world at `depth` from the camera
fn rect_world_corners(
    rect: CaptureRect,
    cam: &Camera,
    cam_global: &GlobalTransform,
    depth: f32,
) -> Option<[Vec3; 4]> {
    let scale = cam.target_scaling_factor().unwrap_or(1.0);
    let to_world = |x: u32, y: u32| {
        let logical = Vec2::new(x as f32, y as f32) / scale;
        cam.viewport_to_world(cam_global, logical)
            .ok()
            .map(|ray| ray.get_point(depth))
    };

    Some([
        to_world(rect.x, rect.y)?,
        to_world(rect.right(), rect.y)?,
        to_world(rect.right(), rect.bottom())?,
        to_world(rect.x, rect.bottom())?,
    ])
}

/// Draws the capture bounds and crop rectangle for every camera with a capture target
fn draw_capture_bounds(
    mut gizmos: Gizmos<CaptureGizmo>,
    viz_config: Res<CaptureVisualizationConfig>,
    capture_config: Res<CaptureConfig>,
    camera_query: Query<(&Camera, &GlobalTransform, &CaptureTarget)>,
    children_query: Query<&Children>,
    mesh_query: Query<&Mesh3d>,
    global_transform_query: Query<&GlobalTransform>,
    meshes: Res<Assets<Mesh>>,
) {
    for (cam, cam_global, target) in &camera_query {
        let Some(corners) = world_bounds_corners(
            target.0,
            &children_query,
            &mesh_query,
            &global_transform_query,
            &meshes,
        ) else {
            continue;
        };
        draw_box(&mut gizmos, &corners, viz_config.bounds_color);

        let Some(rect) = capture_rect_in_viewport(cam, cam_global, &corners, &capture_config) else {
            continue;
        };
        let center = (corners[0] + corners[7]) * 0.5;
        let depth = cam_global.translation().distance(center);
        let Some(outline) = rect_world_corners(rect, cam, cam_global, depth) else {
            continue;
        };

        for i in 0..4 {
            gizmos.line(outline[i], outline[(i + 1) % 4], viz_config.rectangle_color);
        }
    }
}

/// Draws the world bounds of every located decal mesh
fn draw_decal_bounds(
    mut gizmos: Gizmos<CaptureGizmo>,
    viz_config: Res<CaptureVisualizationConfig>,
    compositor_query: Query<&DecalCompositor>,
    mesh_query: Query<(&Mesh3d, &GlobalTransform)>,
    meshes: Res<Assets<Mesh>>,
) {
    for compositor in &compositor_query {
        let Some(target) = compositor.target() else {
            continue;
        };
        let Ok((mesh3d, global_transform)) = mesh_query.get(target.mesh_entity) else {
            continue;
        };
        let Some((min, max)) = meshes
            .get(&mesh3d.0)
            .and_then(|mesh| world_positions(mesh, global_transform))
            .and_then(|positions| bounds_of(&positions))
        else {
            continue;
        };
        draw_box(&mut gizmos, &box_corners(min, max), viz_config.decal_color);
    }
}
