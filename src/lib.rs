// bevy_decal_customizer
// Live product customization for textured meshes:
// - Decal mesh location by explicit tag or name/size heuristic
// - Label and logo compositing into the decal's UV region of a working texture
// - Body recoloring from a fixed palette
// - Screen-space capture and cropped image export

use bevy::prelude::*;

mod capture;
mod components;
mod compositor;
mod config;
mod events;
mod export;
mod locator;
mod observers;
pub mod prelude;
#[cfg(feature = "submit")]
mod submit;
mod support;
mod surface;
mod text;
mod upload;
mod uv;
#[cfg(feature = "visualization")]
mod visualization;

// Public API - Events
pub use events::CaptureDesign;
pub use events::ClearUploadedImage;
pub use events::DecalLocated;
pub use events::DecalRedrawn;
pub use events::DecalSurfaceReady;
pub use events::DesignExported;
pub use events::ExportFailed;
pub use events::ImageUploaded;
pub use events::LocateDecal;
pub use events::UploadImage;
pub use events::UploadRejected;

// Public API - Components
pub use components::CaptureTarget;
pub use compositor::DecalCompositor;
pub use locator::DecalTag;

// Public API - Configuration resources
pub use config::CaptureConfig;
pub use config::DEFAULT_BUFFER_SIZE;
pub use config::DecalConfig;
pub use upload::UploadTracker;

// Public API - State and vocabularies
pub use compositor::CustomizerState;
pub use compositor::RedrawOutcome;
pub use config::LabelStyle;
pub use config::PaletteColor;

// Public API - Decal location
pub use locator::DecalCandidate;
pub use locator::DecalTarget;
pub use locator::locate_decal;
pub use locator::mesh_uv_rect;
pub use locator::select_decal;
pub use uv::TextureRect;
pub use uv::UvRect;

// Public API - Compositing
pub use surface::OverlayContent;
pub use surface::OverlaySurface;
pub use text::FontError;
pub use text::GlyphFont;
pub use text::LabelFont;
pub use text::LabelFontHandle;
pub use text::fit_font_size;

// Public API - Upload
pub use upload::UploadError;
pub use upload::decode_upload;
pub use upload::validate_upload;

// Public API - Capture and export
pub use capture::CaptureRect;
pub use capture::capture_padding;
pub use capture::capture_rect_for_camera;
pub use capture::compute_capture_rect;
pub use capture::world_bounds_corners;
pub use export::DesignPayload;
pub use export::ExportError;
pub use export::ExportFormat;
pub use export::ExportedImage;
pub use export::crop_capture;
pub use export::encode_export;
pub use export::frame_to_rgba;

// Public API - Persistence
#[cfg(feature = "submit")]
pub use submit::SubmitConfig;
#[cfg(feature = "submit")]
pub use submit::SubmitError;
#[cfg(feature = "submit")]
pub use submit::submit_design;

// Public API - Gizmo groups and plugins
#[cfg(feature = "visualization")]
pub use visualization::CaptureGizmo;
#[cfg(feature = "visualization")]
pub use visualization::CaptureVisualizationConfig;
#[cfg(feature = "visualization")]
pub use visualization::CaptureVisualizationPlugin;

// Internal - used by plugin, not for external use
use compositor::redraw_on_state_change;
use compositor::release_on_compositor_removed;
use compositor::seed_surfaces_on_image_events;
use observers::on_capture_design;
use observers::on_locate_decal;
use upload::on_clear_uploaded_image;
use upload::on_upload_image;
use upload::poll_image_decodes;

/// Plugin that adds decal customization. Insert `DecalConfig`, `CaptureConfig` or
/// `LabelFontHandle` before adding it to override the defaults.
pub struct DecalCustomizerPlugin;

impl Plugin for DecalCustomizerPlugin {
    fn build(&self, app: &mut App) {
        app
            // Register observers for component lifecycle events
            .add_observer(release_on_compositor_removed)
            // Register observers for custom events
            .add_observer(on_locate_decal)
            .add_observer(on_upload_image)
            .add_observer(on_clear_uploaded_image)
            .add_observer(on_capture_design)
            // Add systems
            .add_systems(
                Update,
                (
                    poll_image_decodes,
                    seed_surfaces_on_image_events,
                    redraw_on_state_change.run_if(resource_changed::<CustomizerState>),
                )
                    .chain(),
            )
            // Initialize resources
            .init_resource::<DecalConfig>()
            .init_resource::<CaptureConfig>()
            .init_resource::<CustomizerState>()
            .init_resource::<UploadTracker>();
    }
}
