//! Observers that wire events to decal location and design capture.

use bevy::prelude::*;
use bevy::render::view::screenshot::Screenshot;
use bevy::render::view::screenshot::ScreenshotCaptured;

use crate::capture::CaptureRect;
use crate::capture::capture_rect_for_camera;
use crate::capture::world_bounds_corners;
use crate::components::CaptureTarget;
use crate::compositor::CustomizerState;
use crate::compositor::DecalCompositor;
use crate::compositor::refresh_compositor;
use crate::config::CaptureConfig;
use crate::config::DecalConfig;
use crate::events::CaptureDesign;
use crate::events::DecalLocated;
use crate::events::DesignExported;
use crate::events::ExportFailed;
use crate::events::LocateDecal;
use crate::export::export_frame;
use crate::export::frame_to_rgba;
use crate::locator::DecalTag;
use crate::locator::body_materials;
use crate::locator::locate_decal;
use crate::text::LabelFontHandle;

/// Observer for `LocateDecal` - finds the decal, attaches a compositor, and applies the current
/// state right away. Without a decal the compositor still recolors the body.
#[allow(clippy::too_many_arguments)]
pub fn on_locate_decal(
    locate: On<LocateDecal>,
    mut commands: Commands,
    children_query: Query<&Children>,
    mesh_query: Query<(&Mesh3d, &MeshMaterial3d<StandardMaterial>, &GlobalTransform)>,
    material_query: Query<&MeshMaterial3d<StandardMaterial>>,
    name_query: Query<&Name>,
    parent_query: Query<&ChildOf>,
    tag_query: Query<&DecalTag>,
    mut compositor_query: Query<&mut DecalCompositor>,
    meshes: Res<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    state: Res<CustomizerState>,
    font: Option<Res<LabelFontHandle>>,
    config: Res<DecalConfig>,
) {
    let root = locate.root;

    // The decal material must sample the pristine texture again before it is located
    if let Ok(mut previous) = compositor_query.get_mut(root) {
        debug!("LocateDecal: releasing previous compositor on {root:?}");
        previous.release(&mut images, &mut materials);
    }

    let target = locate_decal(
        root,
        &config,
        &children_query,
        &mesh_query,
        &name_query,
        &parent_query,
        &tag_query,
        &meshes,
        &materials,
    );

    match &target {
        Some(target) => commands.trigger(DecalLocated {
            root,
            mesh_entity: target.mesh_entity,
        }),
        None => info!("LocateDecal: no decal mesh under {root:?}, recolor only"),
    }

    let bodies = body_materials(
        root,
        target.as_ref().map(|t| &t.material),
        &children_query,
        &material_query,
    );
    let mut compositor = DecalCompositor::new(target, bodies);

    refresh_compositor(
        &mut commands,
        root,
        &mut compositor,
        &state,
        font.as_deref(),
        &mut images,
        &mut materials,
        &config,
    );

    commands.entity(root).insert(compositor);
}

/// Observer for `CaptureDesign` - computes the crop from the current camera state, then
/// requests a screenshot of the primary window and exports it when it arrives.
#[allow(clippy::too_many_arguments)]
pub fn on_capture_design(
    capture: On<CaptureDesign>,
    mut commands: Commands,
    camera_query: Query<(&Camera, &GlobalTransform)>,
    children_query: Query<&Children>,
    mesh_query: Query<&Mesh3d>,
    global_transform_query: Query<&GlobalTransform>,
    meshes: Res<Assets<Mesh>>,
    config: Res<CaptureConfig>,
) {
    let camera_entity = capture.camera_entity;
    let target = capture.target;

    let Ok((camera, cam_global)) = camera_query.get(camera_entity) else {
        commands.trigger(ExportFailed {
            camera_entity,
            reason: "capture camera not found".into(),
        });
        return;
    };

    let rect = world_bounds_corners(
        target,
        &children_query,
        &mesh_query,
        &global_transform_query,
        &meshes,
    )
    .and_then(|corners| capture_rect_for_camera(camera, cam_global, &corners, &config));

    match rect {
        Some(rect) => debug!("CaptureDesign: crop {rect:?}"),
        None => warn!("CaptureDesign: no usable bounds for {target:?}, exporting the full frame"),
    }

    commands
        .entity(camera_entity)
        .insert(CaptureTarget(target));

    let config = config.clone();
    commands.spawn(Screenshot::primary_window()).observe(
        move |captured: On<ScreenshotCaptured>, mut commands: Commands| {
            let frame = match frame_to_rgba(captured.image.clone()) {
                Ok(frame) => frame,
                Err(err) => {
                    commands.trigger(ExportFailed {
                        camera_entity,
                        reason: err.to_string(),
                    });
                    return;
                },
            };
            let rect = rect.unwrap_or_else(|| CaptureRect::full(UVec2::new(frame.width(), frame.height())));

            match export_frame(&frame, rect, &config) {
                Ok(image) => {
                    info!(
                        "Exported {}x{} {} ({} bytes)",
                        image.width,
                        image.height,
                        image.format.extension(),
                        image.bytes.len()
                    );
                    commands.trigger(DesignExported {
                        camera_entity,
                        image,
                        rect,
                    });
                },
                Err(err) => commands.trigger(ExportFailed {
                    camera_entity,
                    reason: err.to_string(),
                }),
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use bevy::asset::RenderAssetUsages;
    use bevy::mesh::PrimitiveTopology;

    use super::*;
    use crate::compositor::RedrawOutcome;
    use crate::config::PaletteColor;
    use crate::events::DecalRedrawn;

    #[derive(Resource, Default)]
    struct Seen {
        located:  Vec<Entity>,
        outcomes: Vec<RedrawOutcome>,
    }

    fn quad() -> Mesh {
        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(
                Mesh::ATTRIBUTE_POSITION,
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.1]],
            )
            .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, vec![[0.0, 0.0], [0.5, 0.0], [0.5, 0.5]])
    }

    fn world() -> World {
        let mut world = World::new();
        world.init_resource::<Assets<Mesh>>();
        world.init_resource::<Assets<Image>>();
        world.init_resource::<Assets<StandardMaterial>>();
        world.init_resource::<DecalConfig>();
        world.insert_resource(CustomizerState {
            color: PaletteColor::Green,
            ..default()
        });
        world.init_resource::<Seen>();
        world.add_observer(on_locate_decal);
        world.add_observer(|located: On<DecalLocated>, mut seen: ResMut<Seen>| {
            seen.located.push(located.mesh_entity);
        });
        world.add_observer(|redrawn: On<DecalRedrawn>, mut seen: ResMut<Seen>| {
            seen.outcomes.push(redrawn.outcome);
        });
        world
    }

    #[test]
    fn untextured_scene_gets_recolor_only_compositor() {
        let mut world = world();
        let mesh = world.resource_mut::<Assets<Mesh>>().add(quad());
        let body = world
            .resource_mut::<Assets<StandardMaterial>>()
            .add(StandardMaterial::default());

        let root = world.spawn(Name::new("bag")).id();
        world.spawn((
            Name::new("logo"),
            Mesh3d(mesh),
            MeshMaterial3d(body.clone()),
            ChildOf(root),
        ));

        world.trigger(LocateDecal { root });
        world.flush();

        let compositor = world.get::<DecalCompositor>(root).unwrap();
        assert!(compositor.target().is_none());
        let seen = world.resource::<Seen>();
        assert!(seen.located.is_empty());
        assert_eq!(seen.outcomes, vec![RedrawOutcome::RecolorOnly]);

        let materials = world.resource::<Assets<StandardMaterial>>();
        assert_eq!(materials.get(&body).unwrap().base_color, PaletteColor::Green.color());
    }

    #[test]
    fn textured_decal_is_located_and_composited() {
        let mut world = world();
        world.insert_resource(DecalConfig {
            buffer_size: 64,
            ..default()
        });
        let mesh = world.resource_mut::<Assets<Mesh>>().add(quad());
        let texture = world.resource_mut::<Assets<Image>>().add(Image::default());
        let decal = world.resource_mut::<Assets<StandardMaterial>>().add(StandardMaterial {
            base_color_texture: Some(texture),
            ..default()
        });

        let root = world.spawn(Name::new("bag")).id();
        let label = world
            .spawn((
                Name::new("LabelPlane"),
                Mesh3d(mesh),
                MeshMaterial3d(decal),
                ChildOf(root),
            ))
            .id();

        world.trigger(LocateDecal { root });
        world.flush();

        let compositor = world.get::<DecalCompositor>(root).unwrap();
        assert!(compositor.is_ready());
        let seen = world.resource::<Seen>();
        assert_eq!(seen.located, vec![label]);
        assert_eq!(seen.outcomes, vec![RedrawOutcome::Composited]);
    }

    #[test]
    fn relocating_reseeds_from_the_original_texture() {
        let mut world = world();
        world.insert_resource(DecalConfig {
            buffer_size: 64,
            ..default()
        });
        world.resource_mut::<CustomizerState>().label = "GHOST".into();
        let mesh = world.resource_mut::<Assets<Mesh>>().add(quad());
        let texture = world.resource_mut::<Assets<Image>>().add(Image::default());
        let decal = world.resource_mut::<Assets<StandardMaterial>>().add(StandardMaterial {
            base_color_texture: Some(texture.clone()),
            ..default()
        });

        let root = world.spawn(Name::new("bag")).id();
        world.spawn((
            Name::new("LabelPlane"),
            Mesh3d(mesh),
            MeshMaterial3d(decal.clone()),
            ChildOf(root),
        ));

        world.trigger(LocateDecal { root });
        world.flush();
        let first_working = world
            .get::<DecalCompositor>(root)
            .unwrap()
            .working_image()
            .unwrap()
            .id();

        world.resource_mut::<CustomizerState>().label.clear();
        world.trigger(LocateDecal { root });
        world.flush();

        let compositor = world.get::<DecalCompositor>(root).unwrap();
        assert_eq!(compositor.target().unwrap().source_image.id(), texture.id());
        let second_working = compositor.working_image().unwrap().id();
        assert_ne!(second_working, first_working);

        let images = world.resource::<Assets<Image>>();
        assert!(images.get(first_working).is_none());
        assert_eq!(images.len(), 2);

        let materials = world.resource::<Assets<StandardMaterial>>();
        let material = materials.get(&decal).unwrap();
        assert_eq!(material.base_color_texture.as_ref().map(Handle::id), Some(second_working));
    }
}
