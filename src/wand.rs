//! Magic wand tool: pointer events in, preview and selection masks out.

use std::sync::Arc;
use std::time::Instant;

use egui::Pos2;

use crate::config::WandConfig;
use crate::error::WandResult;
use crate::fill::fill_with_engine;
use crate::preview::{PreviewScheduler, RequestId};
use crate::raster::Mask;
use crate::render::{DrawSurface, RenderEngine, TickReport};
use crate::settings::EngineSettings;
use crate::log_info;

/// How a committed fill combines with the existing selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SelectionMode {
    #[default]
    Replace,
    Add,
    Subtract,
    Intersect,
}

/// Combine `fill` into `existing`. A missing or differently sized existing
/// selection counts as empty.
pub fn combine_masks(existing: Option<&Mask>, fill: Mask, mode: SelectionMode) -> Mask {
    let existing = existing.filter(|m| m.width() == fill.width() && m.height() == fill.height());
    match (mode, existing) {
        (SelectionMode::Replace, _) | (SelectionMode::Add, None) => fill,
        (SelectionMode::Subtract | SelectionMode::Intersect, None) => Mask::new(fill.width(), fill.height()),
        (SelectionMode::Add, Some(old)) => zip_masks(old, &fill, |a, b| a || b),
        (SelectionMode::Subtract, Some(old)) => zip_masks(old, &fill, |a, b| a && !b),
        (SelectionMode::Intersect, Some(old)) => zip_masks(old, &fill, |a, b| a && b),
    }
}

fn zip_masks(a: &Mask, b: &Mask, keep: impl Fn(bool, bool) -> bool) -> Mask {
    let mut out = Mask::new(a.width(), a.height());
    for i in 0..a.as_bytes().len() {
        if keep(a.is_set(i), b.is_set(i)) {
            out.set(i);
        }
    }
    out
}

pub struct MagicWand {
    settings: EngineSettings,
    scroll_speed: f32,
    /// Unrounded tolerance; scroll steps smaller than one unit accumulate here.
    tolerance_acc: f32,
    scheduler: PreviewScheduler,
    render: RenderEngine,
    selection: Option<Arc<Mask>>,
    /// Pixel and tolerance of the last hover that started a preview.
    hovered: Option<((i32, i32), u8)>,
}

impl MagicWand {
    pub fn new(settings: EngineSettings, mut render: RenderEngine) -> Self {
        render.set_preview_opacity(settings.preview_opacity);
        Self {
            tolerance_acc: settings.tolerance as f32,
            settings,
            scroll_speed: 0.5,
            scheduler: PreviewScheduler::new(),
            render,
            selection: None,
            hovered: None,
        }
    }

    pub fn from_config(config: &WandConfig, render: RenderEngine) -> WandResult<Self> {
        let mut wand = Self::new(config.engine_settings()?, render);
        wand.scroll_speed = config.tolerance_scroll_speed;
        if config.worker_enabled {
            wand.scheduler.enable_worker(config.worker_threshold_pixels)?;
        }
        Ok(wand)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Replace the settings; any running preview restarts on the next hover.
    pub fn set_settings(&mut self, settings: EngineSettings) {
        self.render.set_preview_opacity(settings.preview_opacity);
        self.tolerance_acc = settings.tolerance as f32;
        self.settings = settings;
        self.hovered = None;
        self.cancel_preview();
    }

    pub fn tolerance(&self) -> u8 {
        self.settings.tolerance
    }

    pub fn render(&self) -> &RenderEngine {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut RenderEngine {
        &mut self.render
    }

    pub fn scheduler(&self) -> &PreviewScheduler {
        &self.scheduler
    }

    pub fn selection(&self) -> Option<&Arc<Mask>> {
        self.selection.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.render.set_selection_mask(None);
    }

    fn pixel_at(&self, screen: Pos2) -> Option<(i32, i32)> {
        let coords = self.render.coords();
        let world = coords.screen_to_world(screen);
        coords.is_in_bounds(world).then(|| coords.world_to_pixel(world))
    }

    /// Pointer moved. Starts a preview when the pixel under it changed.
    pub fn hover(&mut self, screen: Pos2) -> Option<RequestId> {
        let Some(pixel) = self.pixel_at(screen) else {
            if self.hovered.take().is_some() {
                self.cancel_preview();
            }
            return None;
        };
        let tolerance = self.settings.tolerance;
        if self.hovered == Some((pixel, tolerance)) {
            return self.scheduler.current_request();
        }
        let raster = self.render.composite_raster()?;
        self.hovered = Some((pixel, tolerance));
        self.scheduler.start_preview(raster, pixel, tolerance, &self.settings)
    }

    /// Scroll adjusts tolerance by `-delta_y * speed`. Returns the new value.
    pub fn scroll(&mut self, delta_y: f32) -> u8 {
        let current = self.settings.tolerance;
        self.tolerance_acc = (self.tolerance_acc - delta_y * self.scroll_speed).clamp(0.0, 255.0);
        let next = self.tolerance_acc.round() as u8;
        if next == current {
            return current;
        }
        self.settings.tolerance = next;
        if let Some((pixel, _)) = self.hovered {
            self.hovered = Some((pixel, next));
            self.scheduler.update_tolerance(next);
        }
        next
    }

    /// Run a full fill at `screen` and commit it. `None` means no selection
    /// was produced.
    pub fn click(&mut self, screen: Pos2, mode: SelectionMode) -> Option<Arc<Mask>> {
        let (x, y) = self.pixel_at(screen)?;
        let raster = self.render.composite_raster()?;
        let result = fill_with_engine(&raster, x, y, &self.settings);
        if result.is_empty() {
            log_info!("Wand click at ({}, {}) selected nothing", x, y);
            return None;
        }
        let combined = combine_masks(self.selection.as_deref(), result.mask, mode);
        if combined.is_empty() {
            self.clear_selection();
            return None;
        }
        let mask = Arc::new(combined);
        self.selection = Some(Arc::clone(&mask));
        self.render.set_selection_mask(Some(Arc::clone(&mask)));
        Some(mask)
    }

    /// Pointer left the canvas or focus was lost.
    pub fn leave(&mut self) {
        self.hovered = None;
        self.cancel_preview();
    }

    fn cancel_preview(&mut self) {
        self.scheduler.cancel();
        self.render.set_preview_mask(None);
    }

    /// One frame: advance the preview, hand its mask to the renderer, draw.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn DrawSurface) -> TickReport {
        self.scheduler.tick();
        let mask = self.scheduler.latest_frame().map(|f| Arc::clone(&f.mask));
        self.render.set_preview_mask(mask);
        self.render.tick(now, surface)
    }
}
