//! Convenient re-exports for common types

pub use crate::DecalCustomizerPlugin;
pub use crate::capture::CaptureRect;
pub use crate::compositor::CustomizerState;
pub use crate::compositor::DecalCompositor;
pub use crate::config::CaptureConfig;
pub use crate::config::DecalConfig;
pub use crate::config::LabelStyle;
pub use crate::config::PaletteColor;
pub use crate::events::CaptureDesign;
pub use crate::events::ClearUploadedImage;
pub use crate::events::DecalRedrawn;
pub use crate::events::DecalSurfaceReady;
pub use crate::events::DesignExported;
pub use crate::events::ExportFailed;
pub use crate::events::LocateDecal;
pub use crate::events::UploadImage;
pub use crate::events::UploadRejected;
pub use crate::export::DesignPayload;
pub use crate::export::ExportedImage;
pub use crate::locator::DecalTag;
pub use crate::text::GlyphFont;
pub use crate::text::LabelFontHandle;
