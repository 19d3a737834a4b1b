//! Requests and lifecycle notifications for decal compositing, upload, and export.

use bevy::prelude::*;

use crate::capture::CaptureRect;
use crate::compositor::RedrawOutcome;
use crate::export::ExportedImage;

// ============================================================================
// Decal lifecycle
// ============================================================================

/// Locates the decal under a loaded scene root and attaches a `DecalCompositor` to it.
/// Trigger once the scene has spawned.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct LocateDecal {
    #[event_target]
    pub root: Entity,
}

/// Fired after `LocateDecal` found a decal mesh.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct DecalLocated {
    #[event_target]
    pub root:        Entity,
    pub mesh_entity: Entity,
}

/// Fired once the working buffer is seeded and bound to the decal material.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct DecalSurfaceReady {
    #[event_target]
    pub root: Entity,
}

/// Fired after every redraw.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct DecalRedrawn {
    #[event_target]
    pub root:    Entity,
    pub outcome: RedrawOutcome,
}

// ============================================================================
// Upload
// ============================================================================

/// A user-picked image file
#[derive(Event, Reflect)]
#[reflect(Event, FromReflect)]
pub struct UploadImage {
    pub bytes: Vec<u8>,
    pub mime:  String,
}

/// Fired when the latest upload decoded and became part of the overlay
#[derive(Event, Reflect)]
#[reflect(Event, FromReflect)]
pub struct ImageUploaded {
    pub width:  u32,
    pub height: u32,
}

/// Fired when an upload fails validation or decoding. State is unchanged.
#[derive(Event, Reflect)]
#[reflect(Event, FromReflect)]
pub struct UploadRejected {
    pub reason: String,
}

/// Removes the uploaded image from the overlay
#[derive(Event, Reflect, Default)]
#[reflect(Event, FromReflect)]
pub struct ClearUploadedImage;

// ============================================================================
// Export
// ============================================================================

/// Captures the next frame of a camera, cropped around `target`.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct CaptureDesign {
    #[event_target]
    pub camera_entity: Entity,
    pub target:        Entity,
}

/// Fired with the encoded export once the screenshot arrives.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct DesignExported {
    #[event_target]
    pub camera_entity: Entity,
    pub image:         ExportedImage,
    pub rect:          CaptureRect,
}

/// Fired when a capture could not be turned into an export image.
#[derive(EntityEvent, Reflect)]
#[reflect(Event, FromReflect)]
pub struct ExportFailed {
    #[event_target]
    pub camera_entity: Entity,
    pub reason:        String,
}
