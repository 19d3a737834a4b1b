//! Components shared by the capture observers and the debug visualization.

use bevy::prelude::*;

/// Marks the entity a camera last captured.
/// Persists after the capture so the visualization can keep outlining it.
#[derive(Component, Reflect, Debug)]
#[reflect(Component)]
pub struct CaptureTarget(pub Entity);
