//! Interactive bag customizer using `bevy_decal_customizer`.
//!
//! Expects `assets/models/chipsbag.glb` and `assets/fonts/label.ttf`.
//!
//! - Type to edit the label, Backspace to delete
//! - F1-F4 pick the body color, F5 cycles the label style
//! - F6 uploads `assets/uploads/logo.png`, F7 clears it
//! - F9 toggles capture debug visualization
//! - F12 exports the cropped design next to the working directory

use std::fs;

use bevy::input::ButtonState;
use bevy::input::keyboard::Key;
use bevy::input::keyboard::KeyboardInput;
use bevy::prelude::*;
use bevy::scene::SceneInstanceReady;
use bevy_decal_customizer::CaptureGizmo;
use bevy_decal_customizer::CaptureVisualizationPlugin;
use bevy_decal_customizer::prelude::*;
use bevy_decal_customizer::world_bounds_corners;
use bevy_panorbit_camera::PanOrbitCamera;
use bevy_panorbit_camera::PanOrbitCameraPlugin;

const MODEL_PATH: &str = "models/chipsbag.glb";
const FONT_PATH: &str = "assets/fonts/label.ttf";
const UPLOAD_PATH: &str = "assets/uploads/logo.png";
const TARGET_SIZE: f32 = 2.0;
const LIFT_Y: f32 = 0.9;
const MAX_LABEL_CHARS: usize = 32;

fn main() {
    let mut app = App::new();
    app.add_plugins((
        DefaultPlugins,
        PanOrbitCameraPlugin,
        DecalCustomizerPlugin,
        CaptureVisualizationPlugin,
    ));

    match fs::read(FONT_PATH).map_err(|err| err.to_string()).and_then(|bytes| {
        GlyphFont::from_bytes(bytes).map_err(|err| err.to_string())
    }) {
        Ok(font) => {
            app.insert_resource(LabelFontHandle::new(font));
        },
        Err(err) => warn!("No label font at {FONT_PATH} ({err}), labels are disabled"),
    }

    app.insert_resource(CustomizerState {
        label: "My Bag".into(),
        ..default()
    })
    .add_systems(Startup, setup)
    .add_systems(
        Update,
        (
            normalize_loaded_bag,
            edit_label,
            pick_color_and_style,
            upload_logo,
            toggle_debug_visualization,
            export_design,
        ),
    )
    .add_observer(save_exported_design)
    .add_observer(report_export_failure)
    .add_observer(report_rejected_upload)
    .run();
}

#[derive(Resource)]
struct SceneEntities {
    camera: Entity,
    bag:    Entity,
}

/// Set once the glTF scene has spawned; removed after the bag is normalized
#[derive(Component)]
struct NeedsNormalize;

fn setup(mut commands: Commands, asset_server: Res<AssetServer>) {
    commands.spawn((
        DirectionalLight {
            illuminance: 4000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(3.0, 6.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let camera = commands
        .spawn(PanOrbitCamera {
            focus: Vec3::new(0.0, LIFT_Y, 0.0),
            radius: Some(4.5),
            pitch: Some(0.15),
            ..default()
        })
        .id();

    let bag = commands
        .spawn(SceneRoot(
            asset_server.load(GltfAssetLabel::Scene(0).from_asset(MODEL_PATH)),
        ))
        .observe(|ready: On<SceneInstanceReady>, mut commands: Commands| {
            commands.entity(ready.entity).insert(NeedsNormalize);
        })
        .id();

    commands.spawn((
        Text::new("Type a label | F1-F4 color | F5 style | F6/F7 logo | F9 debug | F12 export"),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        },
    ));

    commands.insert_resource(SceneEntities { camera, bag });
}

/// Centers the bag, scales its longest axis to `TARGET_SIZE`, lifts it, then locates the decal
fn normalize_loaded_bag(
    mut commands: Commands,
    mut bag_query: Query<(Entity, &mut Transform), With<NeedsNormalize>>,
    children_query: Query<&Children>,
    mesh_query: Query<&Mesh3d>,
    global_transform_query: Query<&GlobalTransform>,
    meshes: Res<Assets<Mesh>>,
) {
    for (bag, mut transform) in &mut bag_query {
        let Some(corners) = world_bounds_corners(
            bag,
            &children_query,
            &mesh_query,
            &global_transform_query,
            &meshes,
        ) else {
            continue;
        };

        let (min, max) = (corners[0], corners[7]);
        let center = (min + max) * 0.5;
        let longest = (max - min).max_element();
        if longest > f32::EPSILON {
            let scale = TARGET_SIZE / longest;
            transform.scale = Vec3::splat(scale);
            transform.translation = -center * scale + Vec3::Y * LIFT_Y;
        }

        commands.entity(bag).remove::<NeedsNormalize>();
        commands.trigger(LocateDecal { root: bag });
    }
}

fn edit_label(mut keyboard_events: MessageReader<KeyboardInput>, mut state: ResMut<CustomizerState>) {
    for event in keyboard_events.read() {
        if event.state != ButtonState::Pressed {
            continue;
        }
        match &event.logical_key {
            Key::Character(text) if state.label.chars().count() < MAX_LABEL_CHARS => {
                state.label.push_str(text);
            },
            Key::Space => state.label.push(' '),
            Key::Backspace => {
                state.label.pop();
            },
            _ => {},
        }
    }
}

fn pick_color_and_style(keyboard: Res<ButtonInput<KeyCode>>, mut state: ResMut<CustomizerState>) {
    let colors = [KeyCode::F1, KeyCode::F2, KeyCode::F3, KeyCode::F4];
    for (key, color) in colors.into_iter().zip(PaletteColor::ALL) {
        if keyboard.just_pressed(key) {
            state.color = color;
        }
    }

    if keyboard.just_pressed(KeyCode::F5) {
        state.style = match state.style {
            LabelStyle::Bold => LabelStyle::Regular,
            LabelStyle::Regular => LabelStyle::Italic,
            LabelStyle::Italic => LabelStyle::Bold,
        };
    }
}

fn upload_logo(mut commands: Commands, keyboard: Res<ButtonInput<KeyCode>>) {
    if keyboard.just_pressed(KeyCode::F6) {
        match fs::read(UPLOAD_PATH) {
            Ok(bytes) => commands.trigger(UploadImage {
                bytes,
                mime: "image/png".into(),
            }),
            Err(err) => warn!("Could not read {UPLOAD_PATH}: {err}"),
        }
    }
    if keyboard.just_pressed(KeyCode::F7) {
        commands.trigger(ClearUploadedImage);
    }
}

fn toggle_debug_visualization(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut config_store: ResMut<GizmoConfigStore>,
) {
    if keyboard.just_pressed(KeyCode::F9) {
        let (config, _) = config_store.config_mut::<CaptureGizmo>();
        config.enabled = !config.enabled;
    }
}

fn export_design(mut commands: Commands, keyboard: Res<ButtonInput<KeyCode>>, scene: Res<SceneEntities>) {
    if keyboard.just_pressed(KeyCode::F12) {
        commands.trigger(CaptureDesign {
            camera_entity: scene.camera,
            target:        scene.bag,
        });
    }
}

fn save_exported_design(exported: On<DesignExported>, state: Res<CustomizerState>) {
    let path = format!("design.{}", exported.image.format.extension());
    if let Err(err) = fs::write(&path, &exported.image.bytes) {
        warn!("Could not write {path}: {err}");
        return;
    }

    let payload = DesignPayload::from_state(&state);
    match serde_json::to_string_pretty(&payload) {
        Ok(json) => {
            if let Err(err) = fs::write("design.json", json) {
                warn!("Could not write design.json: {err}");
            }
        },
        Err(err) => warn!("Could not serialize design: {err}"),
    }

    info!(
        "Saved {path} ({}x{}, crop {:?})",
        exported.image.width, exported.image.height, exported.rect
    );
}

fn report_export_failure(failed: On<ExportFailed>) {
    warn!("Export failed: {}", failed.reason);
}

fn report_rejected_upload(rejected: On<UploadRejected>) {
    warn!("Upload rejected: {}", rejected.reason);
}
