//! Dirty-flag render cache for the canvas.
//!
//! Setters only record state and OR a bit into [`Dirty`]; textures are
//! rebuilt inside [`RenderEngine::tick`] and nowhere else. A tick rebuilds
//! what its flags name, clears them, then always draws the full stack in
//! [`DrawLayer`] order, because the marching ants move even when nothing
//! else does.

pub mod cache;
pub mod composite;
pub mod dirty;
pub mod layer;
pub mod overlay;
pub mod surface;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use egui::{Color32, ColorImage, Vec2, pos2, vec2};
use image::RgbaImage;
use uuid::Uuid;

use crate::coords::CoordinateSystem;
use crate::raster::{Mask, RasterBuffer};
use crate::{log_info, log_warn};

pub use cache::VersionCache;
pub use composite::{CompositeInput, apply_modifier_stack, blend_pixel, composite_layers};
pub use dirty::Dirty;
pub use layer::{BlendMode, Layer, Modifier, ModifierKind};
pub use overlay::SegmentTextures;
pub use surface::{CpuSurface, DrawLayer, DrawSurface};

const FRAME_SAMPLES: usize = 60;
const SLOW_REBUILD: Duration = Duration::from_millis(16);
const BORDER_COLOR: Color32 = Color32::from_rgb(0x3a, 0x3a, 0x4a);
const BACKGROUND: Color32 = Color32::from_rgb(0x12, 0x12, 0x18);

/// Rolling frame timing over the last 60 ticks.
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    samples: VecDeque<Duration>,
    last_tick: Option<Instant>,
    frames: u64,
}

impl FrameStats {
    fn record(&mut self, now: Instant) {
        if let Some(prev) = self.last_tick {
            if self.samples.len() == FRAME_SAMPLES {
                self.samples.pop_front();
            }
            self.samples.push_back(now.saturating_duration_since(prev));
        }
        self.last_tick = Some(now);
        self.frames += 1;
    }

    pub fn average_frame_time(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.samples.iter().sum::<Duration>() / self.samples.len() as u32
    }

    pub fn fps(&self) -> f32 {
        let avg = self.average_frame_time().as_secs_f32();
        if avg > 0.0 { 1.0 / avg } else { 0.0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Everything the host pushes in. Compared by value (transform, sizes) or by
/// pointer (layer snapshot, masks).
#[derive(Clone, Default)]
pub struct RenderState {
    pub coords: CoordinateSystem,
    pub layers: Arc<Vec<Layer>>,
    pub selected_layers: HashSet<Uuid>,
    pub preview_mask: Option<Arc<Mask>>,
    pub selection_mask: Option<Arc<Mask>>,
    pub dirty: Dirty,
}

/// Outcome of one [`RenderEngine::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub drawn: bool,
    /// Flags that were rebuilt this tick.
    pub rebuilt: Dirty,
}

pub struct RenderEngine {
    state: RenderState,
    attached: bool,
    running: bool,
    preview_alpha: u8,
    march_offset: u32,
    last_march: Option<Instant>,
    effective_pixels: VersionCache<Uuid, Arc<RgbaImage>>,
    segments: VersionCache<Uuid, SegmentTextures>,
    checkerboard: VersionCache<(u32, u32), ColorImage>,
    composite: Option<ColorImage>,
    composite_raster: Option<Arc<RasterBuffer>>,
    preview_texture: Option<ColorImage>,
    selection_texture: Option<ColorImage>,
    stats: FrameStats,
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine {
    pub fn new() -> Self {
        Self {
            state: RenderState::default(),
            attached: false,
            running: false,
            preview_alpha: overlay::DEFAULT_PREVIEW_ALPHA,
            march_offset: 0,
            last_march: None,
            effective_pixels: VersionCache::new(),
            segments: VersionCache::new(),
            checkerboard: VersionCache::new(),
            composite: None,
            composite_raster: None,
            preview_texture: None,
            selection_texture: None,
            stats: FrameStats::default(),
        }
    }

    // ---- lifecycle ----

    pub fn attach(&mut self, viewport_w: f32, viewport_h: f32) {
        self.attached = true;
        self.resize(viewport_w, viewport_h);
        log_info!("Render engine attached ({}x{})", viewport_w, viewport_h);
    }

    pub fn resize(&mut self, viewport_w: f32, viewport_h: f32) {
        let size = vec2(viewport_w, viewport_h);
        if self.state.coords.viewport() == size {
            return;
        }
        self.state.coords.set_viewport(pos2(0.0, 0.0), size);
        self.state.dirty |= Dirty::RESIZE | Dirty::TRANSFORM;
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running && self.attached
    }

    // ---- setters ----

    pub fn set_transform(&mut self, pan: Vec2, zoom: f32) {
        let mut next = self.state.coords;
        next.set_transform(pan, zoom);
        if next == self.state.coords {
            return;
        }
        self.state.coords = next;
        self.state.dirty |= Dirty::TRANSFORM;
    }

    pub fn set_dpr(&mut self, dpr: f32) {
        let mut next = self.state.coords;
        next.set_dpr(dpr);
        if next != self.state.coords {
            self.state.coords = next;
            self.state.dirty |= Dirty::RESIZE;
        }
    }

    pub fn set_project_size(&mut self, w: u32, h: u32) {
        if self.state.coords.project_size() == (w, h) {
            return;
        }
        self.state.coords.set_project_size(w, h);
        self.state.dirty |= Dirty::LAYERS | Dirty::TRANSFORM;
    }

    pub fn set_layers(&mut self, layers: Arc<Vec<Layer>>) {
        if Arc::ptr_eq(&self.state.layers, &layers) {
            return;
        }
        self.state.layers = layers;
        self.state.dirty |= Dirty::LAYERS;
    }

    /// Force a composite rebuild for in-place layer edits.
    pub fn mark_layers_dirty(&mut self) {
        self.state.dirty |= Dirty::LAYERS;
    }

    pub fn set_selected_layers(&mut self, ids: HashSet<Uuid>) {
        self.state.selected_layers = ids;
    }

    pub fn set_preview_mask(&mut self, mask: Option<Arc<Mask>>) {
        if same_mask(&self.state.preview_mask, &mask) {
            return;
        }
        self.state.preview_mask = mask;
        self.state.dirty |= Dirty::PREVIEW;
    }

    pub fn set_selection_mask(&mut self, mask: Option<Arc<Mask>>) {
        if same_mask(&self.state.selection_mask, &mask) {
            return;
        }
        self.state.selection_mask = mask;
        self.state.dirty |= Dirty::SELECTION;
    }

    /// Preview tint opacity, 0..=1.
    pub fn set_preview_opacity(&mut self, opacity: f32) {
        let alpha = overlay::preview_alpha(opacity);
        if alpha != self.preview_alpha {
            self.preview_alpha = alpha;
            self.state.dirty |= Dirty::PREVIEW;
        }
    }

    // ---- accessors ----

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn coords(&self) -> &CoordinateSystem {
        &self.state.coords
    }

    pub fn coords_mut(&mut self) -> &mut CoordinateSystem {
        self.state.dirty |= Dirty::TRANSFORM;
        &mut self.state.coords
    }

    pub fn dirty(&self) -> Dirty {
        self.state.dirty
    }

    pub fn layers(&self) -> &Arc<Vec<Layer>> {
        &self.state.layers
    }

    pub fn preview_mask(&self) -> Option<&Arc<Mask>> {
        self.state.preview_mask.as_ref()
    }

    pub fn selection_mask(&self) -> Option<&Arc<Mask>> {
        self.state.selection_mask.as_ref()
    }

    pub fn march_offset(&self) -> u32 {
        self.march_offset
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn effective_pixel_cache(&self) -> &VersionCache<Uuid, Arc<RgbaImage>> {
        &self.effective_pixels
    }

    pub fn segment_cache(&self) -> &VersionCache<Uuid, SegmentTextures> {
        &self.segments
    }

    /// The composited image as a raster the fill engines can read. Valid
    /// after the first tick with layers.
    pub fn composite_raster(&mut self) -> Option<Arc<RasterBuffer>> {
        if self.state.dirty.contains(Dirty::LAYERS) || self.composite_raster.is_none() {
            self.rebuild_composite();
            self.state.dirty.remove(Dirty::LAYERS);
        }
        self.composite_raster.clone()
    }

    // ---- render tick ----

    /// One display refresh. Does nothing while stopped or detached.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn DrawSurface) -> TickReport {
        if !self.is_running() {
            return TickReport::default();
        }
        self.advance_march(now);

        let dirty = self.state.dirty;
        if dirty.contains(Dirty::LAYERS) {
            self.rebuild_composite();
        }
        if dirty.contains(Dirty::PREVIEW) {
            self.preview_texture = self
                .state
                .preview_mask
                .as_deref()
                .map(|m| overlay::preview_texture(m, self.preview_alpha));
        }
        if dirty.contains(Dirty::SELECTION) {
            self.selection_texture = self
                .state
                .selection_mask
                .as_deref()
                .map(|m| overlay::selection_texture(m, self.march_offset));
        }
        self.state.dirty = Dirty::empty();

        self.draw(surface);
        self.stats.record(now);
        TickReport {
            drawn: true,
            rebuilt: dirty,
        }
    }

    fn advance_march(&mut self, now: Instant) {
        let Some(last) = self.last_march else {
            self.last_march = Some(now);
            return;
        };
        let elapsed = now.saturating_duration_since(last);
        let steps = (elapsed.as_millis() / overlay::MARCH_INTERVAL.as_millis()) as u32;
        if steps == 0 {
            return;
        }
        self.march_offset = (self.march_offset + steps) % overlay::MARCH_PERIOD;
        self.last_march = Some(last + overlay::MARCH_INTERVAL * steps);
        if self.state.selection_mask.is_some() {
            self.state.dirty |= Dirty::SELECTION;
        }
    }

    fn rebuild_composite(&mut self) {
        let started = Instant::now();
        let (w, h) = self.state.coords.project_size();
        let layers = Arc::clone(&self.state.layers);

        let mut effective = Vec::with_capacity(layers.len());
        for layer in layers.iter().filter(|l| l.visible) {
            let pixels = self.effective_pixels.get_or_build(&layer.id, layer.version(), || {
                match apply_modifier_stack(layer.pixels(), layer.modifiers()) {
                    std::borrow::Cow::Borrowed(_) => Arc::clone(layer.pixels()),
                    std::borrow::Cow::Owned(img) => Arc::new(img),
                }
            });
            effective.push((Arc::clone(pixels), layer.opacity, layer.blend_mode));
        }
        let inputs: Vec<CompositeInput<'_>> = effective
            .iter()
            .map(|(pixels, opacity, blend_mode)| CompositeInput {
                pixels,
                opacity: *opacity,
                blend_mode: *blend_mode,
            })
            .collect();
        let image = composite_layers(w, h, &inputs);

        for layer in layers.iter() {
            if let Some(color) = layer.segment_color {
                self.segments.get_or_build(&layer.id, layer.version(), || {
                    overlay::segment_textures(layer.pixels(), color)
                });
            }
        }
        self.checkerboard
            .get_or_build(&(w, h), 0, || overlay::checkerboard(w, h));

        let active: HashSet<Uuid> = layers.iter().map(|l| l.id).collect();
        let dropped = self.effective_pixels.cleanup(&active) + self.segments.cleanup(&active);
        self.checkerboard.cleanup(&HashSet::from([(w, h)]));

        self.composite = Some(overlay::image_to_texture(&image));
        self.composite_raster = RasterBuffer::from_rgba_image(image).ok().map(Arc::new);

        let took = started.elapsed();
        if took > SLOW_REBUILD {
            log_warn!(
                "Composite rebuild of {} layers took {:.1}ms ({} stale cache entries dropped)",
                layers.len(),
                took.as_secs_f64() * 1000.0,
                dropped
            );
        }
    }

    fn draw(&self, surface: &mut dyn DrawSurface) {
        surface.clear(BACKGROUND);
        let (w, h) = self.state.coords.project_size();
        let rect = self.state.coords.project_rect();

        if let Some(checker) = self.checkerboard.get(&(w, h), 0) {
            surface.draw_image(DrawLayer::Checkerboard, checker, rect, 1.0);
        }
        if let Some(composite) = &self.composite {
            surface.draw_image(DrawLayer::Composite, composite, rect, 1.0);
        }
        surface.stroke_rect(rect, 1.0, BORDER_COLOR);

        for layer in self.state.layers.iter().filter(|l| l.visible) {
            if layer.segment_color.is_none() {
                continue;
            }
            let Some(tex) = self.segments.get(&layer.id, layer.version()) else { continue };
            let selected = self.state.selected_layers.contains(&layer.id);
            let fill_opacity = if selected {
                overlay::SEGMENT_FILL_SELECTED
            } else {
                overlay::SEGMENT_FILL_IDLE
            };
            surface.draw_image(DrawLayer::SegmentHighlight, &tex.fill, rect, fill_opacity);
            if selected {
                surface.draw_image(DrawLayer::SegmentHighlight, &tex.edge, rect, overlay::SEGMENT_EDGE_SELECTED);
            }
        }

        if let Some(preview) = &self.preview_texture {
            surface.draw_image(DrawLayer::Preview, preview, rect, 1.0);
        }
        if let Some(selection) = &self.selection_texture {
            surface.draw_image(DrawLayer::Selection, selection, rect, 1.0);
        }
    }
}

fn same_mask(a: &Option<Arc<Mask>>, b: &Option<Arc<Mask>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
