//! Binds the overlay surface to Bevy assets: seeds the working image from the decal's source
//! texture, repoints the decal material at it, and pushes every redraw back to the GPU.

use std::sync::Arc;

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::render_resource::Extent3d;
use bevy::render::render_resource::TextureDimension;
use bevy::render::render_resource::TextureFormat;
use image::RgbaImage;

use crate::config::DecalConfig;
use crate::config::LabelStyle;
use crate::config::PaletteColor;
use crate::events::DecalRedrawn;
use crate::events::DecalSurfaceReady;
use crate::locator::DecalTarget;
use crate::surface::OverlayContent;
use crate::surface::OverlaySurface;
use crate::text::LabelFont;
use crate::text::LabelFontHandle;

/// What a redraw managed to do
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawOutcome {
    /// Body recolored and the decal texture re-rendered
    Composited,
    /// Body recolored only; the decal is missing or not ready
    RecolorOnly,
}

/// Current user edits. Any change redraws every compositor.
#[derive(Resource, Debug, Clone, Default)]
pub struct CustomizerState {
    pub label: String,
    pub color: PaletteColor,
    pub style: LabelStyle,
    /// Decoded upload, if any
    pub image: Option<Arc<RgbaImage>>,
}

impl CustomizerState {
    pub fn overlay_content(&self) -> OverlayContent {
        OverlayContent::new(&self.label, self.style, self.image.clone())
    }
}

/// Per-scene compositing state, inserted on the scene root by `LocateDecal`.
#[derive(Component, Debug)]
pub struct DecalCompositor {
    target:         Option<DecalTarget>,
    surface:        Option<OverlaySurface>,
    working_image:  Option<Handle<Image>>,
    body_materials: Vec<Handle<StandardMaterial>>,
    redraws:        u64,
}

impl DecalCompositor {
    pub const fn new(target: Option<DecalTarget>, body_materials: Vec<Handle<StandardMaterial>>) -> Self {
        Self {
            target,
            surface: None,
            working_image: None,
            body_materials,
            redraws: 0,
        }
    }

    pub const fn target(&self) -> Option<&DecalTarget> { self.target.as_ref() }

    pub const fn surface(&self) -> Option<&OverlaySurface> { self.surface.as_ref() }

    pub const fn working_image(&self) -> Option<&Handle<Image>> { self.working_image.as_ref() }

    pub const fn is_ready(&self) -> bool { self.surface.is_some() }

    /// Number of redraws performed so far
    pub const fn redraws(&self) -> u64 { self.redraws }

    /// Returns true if `id` is the pristine texture this compositor is waiting on
    pub fn waits_on(&self, id: AssetId<Image>) -> bool {
        !self.is_ready() && self.target.as_ref().is_some_and(|t| t.source_image.id() == id)
    }

    /// Seeds the working buffer once the source image has pixel data.
    ///
    /// Returns `false` while the source is still loading or when there is no decal. The decal
    /// material is repointed at the working image only after the buffer is seeded.
    pub fn initialize(
        &mut self,
        images: &mut Assets<Image>,
        materials: &mut Assets<StandardMaterial>,
        config: &DecalConfig,
    ) -> bool {
        if self.is_ready() {
            return true;
        }
        let Some(target) = self.target.as_ref() else {
            return false;
        };
        let Some(source) = images.get(&target.source_image) else {
            return false;
        };
        let Some(pristine) = image_to_rgba(source) else {
            debug!("Decal source image {:?} has no pixel data yet", target.source_image.id());
            return false;
        };
        let sampler = source.sampler.clone();

        let surface = OverlaySurface::new(&pristine, config.buffer_size, target.uv_rect, target.flip_y);
        let mut working = rgba_to_image(surface.working());
        working.sampler = sampler;
        let handle = images.add(working);

        let Some(material) = materials.get_mut(&target.material) else {
            warn!("Decal material {:?} is gone, cannot bind working image", target.material.id());
            images.remove(&handle);
            return false;
        };
        material.base_color_texture = Some(handle.clone());

        info!(
            "Seeded {}x{} decal surface, decal rect {:?}",
            surface.size().x,
            surface.size().y,
            surface.rect()
        );

        self.surface = Some(surface);
        self.working_image = Some(handle);
        true
    }

    /// Recolors the body, then re-renders the decal from scratch when the surface is ready.
    pub fn redraw(
        &mut self,
        content: &OverlayContent,
        color: PaletteColor,
        font: Option<&dyn LabelFont>,
        images: &mut Assets<Image>,
        materials: &mut Assets<StandardMaterial>,
        config: &DecalConfig,
    ) -> RedrawOutcome {
        recolor_materials(&self.body_materials, color, materials);
        self.redraws += 1;

        let (Some(target), Some(surface), Some(handle)) =
            (self.target.as_ref(), self.surface.as_mut(), self.working_image.as_ref())
        else {
            return RedrawOutcome::RecolorOnly;
        };

        let pixels = surface.redraw(content, font, config);
        let Some(image) = images.get_mut(handle) else {
            return RedrawOutcome::RecolorOnly;
        };
        image.data = Some(pixels.as_raw().clone());

        // Reassigning the texture marks the decal material changed so it rebinds the new pixels
        if let Some(material) = materials.get_mut(&target.material) {
            material.base_color_texture = Some(handle.clone());
        }

        RedrawOutcome::Composited
    }

    /// Points the decal material back at the pristine texture and frees the working image
    pub fn release(&mut self, images: &mut Assets<Image>, materials: &mut Assets<StandardMaterial>) {
        let Some(handle) = self.working_image.take() else {
            return;
        };
        if let Some(target) = self.target.as_ref() {
            if let Some(material) = materials.get_mut(&target.material) {
                material.base_color_texture = Some(target.source_image.clone());
            }
        }
        images.remove(&handle);
        self.surface = None;
    }
}

/// Sets the base color of every body material
pub fn recolor_materials(
    handles: &[Handle<StandardMaterial>],
    color: PaletteColor,
    materials: &mut Assets<StandardMaterial>,
) {
    for handle in handles {
        if let Some(material) = materials.get_mut(handle) {
            material.base_color = color.color();
        }
    }
}

/// Decodes a Bevy image into straight RGBA8. `None` while the image has no CPU-side data.
pub fn image_to_rgba(image: &Image) -> Option<RgbaImage> {
    let data = image.data.as_ref()?;
    match image.texture_descriptor.format {
        TextureFormat::Rgba8UnormSrgb | TextureFormat::Rgba8Unorm => {
            let len = image.width() as usize * image.height() as usize * 4;
            RgbaImage::from_raw(image.width(), image.height(), data.get(..len)?.to_vec())
        },
        _ => image
            .clone()
            .try_into_dynamic()
            .ok()
            .map(|dynamic| dynamic.to_rgba8()),
    }
}

fn rgba_to_image(pixels: &RgbaImage) -> Image {
    Image::new(
        Extent3d {
            width:                 pixels.width(),
            height:                pixels.height(),
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        pixels.as_raw().clone(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
}

/// Initializes and redraws a compositor, triggering the matching lifecycle events.
#[allow(clippy::too_many_arguments)]
pub(crate) fn refresh_compositor(
    commands: &mut Commands,
    root: Entity,
    compositor: &mut DecalCompositor,
    state: &CustomizerState,
    font: Option<&LabelFontHandle>,
    images: &mut Assets<Image>,
    materials: &mut Assets<StandardMaterial>,
    config: &DecalConfig,
) {
    let was_ready = compositor.is_ready();
    if compositor.initialize(images, materials, config) && !was_ready {
        commands.trigger(DecalSurfaceReady { root });
    }

    let outcome = compositor.redraw(
        &state.overlay_content(),
        state.color,
        font.map(|f| f.0.as_ref()),
        images,
        materials,
        config,
    );
    commands.trigger(DecalRedrawn { root, outcome });
}

// ============================================================================
// Systems
// ============================================================================

/// Seeds compositors whose source texture just finished loading
pub fn seed_surfaces_on_image_events(
    mut commands: Commands,
    mut image_events: MessageReader<AssetEvent<Image>>,
    mut compositors: Query<(Entity, &mut DecalCompositor)>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    state: Res<CustomizerState>,
    font: Option<Res<LabelFontHandle>>,
    config: Res<DecalConfig>,
) {
    for event in image_events.read() {
        let (AssetEvent::Added { id }
        | AssetEvent::LoadedWithDependencies { id }
        | AssetEvent::Modified { id }) = *event
        else {
            continue;
        };

        for (root, mut compositor) in &mut compositors {
            if !compositor.waits_on(id) {
                continue;
            }
            debug!("Decal source image {id:?} is ready, seeding {root:?}");
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
        }
    }
}

/// Full redraw of every compositor. Runs only when `CustomizerState` changed.
pub fn redraw_on_state_change(
    mut commands: Commands,
    mut compositors: Query<(Entity, &mut DecalCompositor)>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    state: Res<CustomizerState>,
    font: Option<Res<LabelFontHandle>>,
    config: Res<DecalConfig>,
) {
    for (root, mut compositor) in &mut compositors {
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
    }
}

/// Restores the pristine texture when a compositor goes away
pub fn release_on_compositor_removed(
    remove: On<Remove, DecalCompositor>,
    mut compositors: Query<&mut DecalCompositor>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Ok(mut compositor) = compositors.get_mut(remove.entity) else {
        return;
    };
    compositor.release(&mut images, &mut materials);
}
