//! Local image upload: validation at the boundary, decoding off the main thread, and
//! last-upload-wins application to `CustomizerState`.

use std::sync::Arc;

use bevy::prelude::*;
use bevy::tasks::AsyncComputeTaskPool;
use bevy::tasks::Task;
use bevy::tasks::block_on;
use bevy::tasks::futures_lite::future;
use image::ImageFormat;
use image::RgbaImage;
use thiserror::Error;

use crate::compositor::CustomizerState;
use crate::config::DecalConfig;
use crate::events::ClearUploadedImage;
use crate::events::ImageUploaded;
use crate::events::UploadImage;
use crate::events::UploadRejected;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("unsupported image type `{0}`")]
    UnsupportedType(String),
    #[error("could not decode image: {0}")]
    Decode(String),
}

/// Checks the size cap and the MIME whitelist. Parameters after `;` are ignored.
pub fn validate_upload(bytes: &[u8], mime: &str, config: &DecalConfig) -> Result<(), UploadError> {
    let essence = mime_essence(mime);
    if !config
        .accepted_mime_types
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(&essence))
    {
        return Err(UploadError::UnsupportedType(essence));
    }
    if bytes.len() > config.max_upload_bytes {
        return Err(UploadError::TooLarge {
            size:  bytes.len(),
            limit: config.max_upload_bytes,
        });
    }
    Ok(())
}

/// Decodes an upload with the codec its MIME type names
pub fn decode_upload(bytes: &[u8], mime: &str) -> Result<RgbaImage, UploadError> {
    let essence = mime_essence(mime);
    let format = ImageFormat::from_mime_type(&essence)
        .ok_or_else(|| UploadError::UnsupportedType(essence.clone()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|err| UploadError::Decode(err.to_string()))?;
    Ok(decoded.to_rgba8())
}

fn mime_essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

// ============================================================================
// Async decode
// ============================================================================

/// Hands out upload generations. Only a decode from the latest generation is applied.
#[derive(Resource, Reflect, Debug, Default)]
#[reflect(Resource)]
pub struct UploadTracker {
    latest: u64,
}

impl UploadTracker {
    pub const fn latest(&self) -> u64 { self.latest }

    /// Starts a new generation, invalidating every in-flight decode
    pub const fn advance(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub const fn is_current(&self, generation: u64) -> bool { generation == self.latest }
}

/// An in-flight decode spawned by `UploadImage`
#[derive(Component)]
pub struct PendingImageDecode {
    pub generation: u64,
    task:           Task<Result<RgbaImage, UploadError>>,
}

/// Validates the upload and starts decoding it on the async compute pool
pub fn on_upload_image(
    upload: On<UploadImage>,
    mut commands: Commands,
    mut tracker: ResMut<UploadTracker>,
    config: Res<DecalConfig>,
) {
    if let Err(err) = validate_upload(&upload.bytes, &upload.mime, &config) {
        warn!("Rejected upload: {err}");
        commands.trigger(UploadRejected {
            reason: err.to_string(),
        });
        return;
    }

    let generation = tracker.advance();
    let bytes = upload.bytes.clone();
    let mime = upload.mime.clone();
    let task = AsyncComputeTaskPool::get().spawn(async move { decode_upload(&bytes, &mime) });

    debug!("Decoding upload generation {generation} ({} bytes)", upload.bytes.len());
    commands.spawn(PendingImageDecode { generation, task });
}

/// Drops the uploaded image and any decode still in flight
pub fn on_clear_uploaded_image(
    _clear: On<ClearUploadedImage>,
    mut tracker: ResMut<UploadTracker>,
    mut state: ResMut<CustomizerState>,
) {
    tracker.advance();
    if state.image.is_some() {
        state.image = None;
    }
}

/// Applies finished decodes. Stale generations are discarded.
pub fn poll_image_decodes(
    mut commands: Commands,
    mut pending: Query<(Entity, &mut PendingImageDecode)>,
    tracker: Res<UploadTracker>,
    mut state: ResMut<CustomizerState>,
) {
    for (entity, mut decode) in &mut pending {
        let Some(result) = block_on(future::poll_once(&mut decode.task)) else {
            continue;
        };
        commands.entity(entity).despawn();

        if !tracker.is_current(decode.generation) {
            debug!(
                "Discarding stale decode {} (latest is {})",
                decode.generation,
                tracker.latest()
            );
            continue;
        }

        match result {
            Ok(image) => {
                info!("Upload decoded: {}x{}", image.width(), image.height());
                commands.trigger(ImageUploaded {
                    width:  image.width(),
                    height: image.height(),
                });
                state.image = Some(Arc::new(image));
            },
            Err(err) => {
                warn!("Rejected upload: {err}");
                commands.trigger(UploadRejected {
                    reason: err.to_string(),
                });
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bevy::ecs::system::RunSystemOnce;
    use image::Rgba;

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn rejects_oversized_uploads() {
        let config = DecalConfig {
            max_upload_bytes: 16,
            ..default()
        };
        let err = validate_upload(&[0; 17], "image/png", &config).unwrap_err();
        assert_eq!(err, UploadError::TooLarge { size: 17, limit: 16 });
        assert!(validate_upload(&[0; 16], "image/png", &config).is_ok());
    }

    #[test]
    fn rejects_non_image_types() {
        let config = DecalConfig::default();
        assert_eq!(
            validate_upload(b"%PDF", "application/pdf", &config),
            Err(UploadError::UnsupportedType("application/pdf".into()))
        );
        assert!(validate_upload(b"", "IMAGE/JPEG; charset=binary", &config).is_ok());
    }

    #[test]
    fn decodes_png_upload() {
        let image = decode_upload(&png_bytes(3, 2), "image/png").unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(1, 1), &Rgba([10, 200, 30, 255]));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_upload(b"not a png", "image/png").unwrap_err();
        assert!(matches!(err, UploadError::Decode(_)));
    }

    #[test]
    fn generations_supersede_each_other() {
        let mut tracker = UploadTracker::default();
        let first = tracker.advance();
        let second = tracker.advance();
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    #[test]
    fn stale_decode_is_discarded() {
        AsyncComputeTaskPool::get_or_init(bevy::tasks::TaskPool::default);

        let mut world = World::new();
        world.init_resource::<CustomizerState>();
        let mut tracker = UploadTracker::default();
        let stale = tracker.advance();
        let current = tracker.advance();
        world.insert_resource(tracker);

        let pool = AsyncComputeTaskPool::get();
        let old_bytes = png_bytes(8, 8);
        let new_bytes = png_bytes(4, 4);
        world.spawn(PendingImageDecode {
            generation: stale,
            task:       pool.spawn(async move { decode_upload(&old_bytes, "image/png") }),
        });
        world.spawn(PendingImageDecode {
            generation: current,
            task:       pool.spawn(async move { decode_upload(&new_bytes, "image/png") }),
        });

        for _ in 0..2000 {
            world.run_system_once(poll_image_decodes).unwrap();
            let mut remaining = world.query::<&PendingImageDecode>();
            if remaining.iter(&world).next().is_none() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let state = world.resource::<CustomizerState>();
        let applied = state.image.as_ref().unwrap();
        assert_eq!(applied.dimensions(), (4, 4));
    }
}
