//! Screen <-> world mapping for pointer input and drawing.
//!
//! Spaces:
//! - Screen: logical points relative to the window, as pointer events report them.
//! - Device: physical pixels (`screen * dpr`).
//! - World: image pixels, (0, 0) at the top-left of the project.
//!
//! The project is centred in the viewport, then offset by `pan` and scaled by
//! `zoom` around that centre.

use egui::{Pos2, Rect, Vec2, pos2, vec2};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateSystem {
    pan: Vec2,
    zoom: f32,
    dpr: f32,
    /// Top-left of the viewport in screen space.
    origin: Pos2,
    viewport: Vec2,
    project_w: u32,
    project_h: u32,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            dpr: 1.0,
            origin: Pos2::ZERO,
            viewport: Vec2::ZERO,
            project_w: 0,
            project_h: 0,
        }
    }
}

impl CoordinateSystem {
    pub fn new(project_w: u32, project_h: u32, viewport: Vec2) -> Self {
        Self {
            project_w,
            project_h,
            viewport,
            ..Self::default()
        }
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn dpr(&self) -> f32 {
        self.dpr
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn project_size(&self) -> (u32, u32) {
        (self.project_w, self.project_h)
    }

    /// Set pan and zoom. Zoom is clamped to `MIN_ZOOM..=MAX_ZOOM`.
    pub fn set_transform(&mut self, pan: Vec2, zoom: f32) {
        self.pan = pan;
        self.zoom = clamp_zoom(zoom);
    }

    pub fn set_project_size(&mut self, w: u32, h: u32) {
        self.project_w = w;
        self.project_h = h;
    }

    pub fn set_viewport(&mut self, origin: Pos2, size: Vec2) {
        self.origin = origin;
        self.viewport = size;
    }

    pub fn set_dpr(&mut self, dpr: f32) {
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
    }

    fn center(&self) -> Pos2 {
        self.origin + self.viewport * 0.5
    }

    fn half_project(&self) -> Vec2 {
        vec2(self.project_w as f32, self.project_h as f32) * 0.5
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        let v = (screen - self.center() - self.pan) / self.zoom + self.half_project();
        pos2(v.x, v.y)
    }

    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        self.center() + self.pan + (world.to_vec2() - self.half_project()) * self.zoom
    }

    pub fn screen_to_device(&self, screen: Pos2) -> Pos2 {
        pos2((screen.x - self.origin.x) * self.dpr, (screen.y - self.origin.y) * self.dpr)
    }

    pub fn device_to_screen(&self, device: Pos2) -> Pos2 {
        pos2(device.x / self.dpr + self.origin.x, device.y / self.dpr + self.origin.y)
    }

    pub fn is_in_bounds(&self, world: Pos2) -> bool {
        world.x >= 0.0
            && world.y >= 0.0
            && world.x < self.project_w as f32
            && world.y < self.project_h as f32
    }

    /// Integer pixel under a world point, which may lie off the project.
    pub fn world_to_pixel(&self, world: Pos2) -> (i32, i32) {
        (world.x.floor() as i32, world.y.floor() as i32)
    }

    /// Row-major index of the pixel under `world`, or `None` off the project.
    pub fn world_to_pixel_index(&self, world: Pos2) -> Option<usize> {
        if !self.is_in_bounds(world) {
            return None;
        }
        let (x, y) = (world.x.floor() as usize, world.y.floor() as usize);
        Some(y * self.project_w as usize + x)
    }

    pub fn pixel_index_to_world(&self, index: usize) -> Pos2 {
        let w = (self.project_w as usize).max(1);
        pos2((index % w) as f32, (index / w) as f32)
    }

    /// Screen rectangle covered by the whole project.
    pub fn project_rect(&self) -> Rect {
        Rect::from_min_max(
            self.world_to_screen(Pos2::ZERO),
            self.world_to_screen(pos2(self.project_w as f32, self.project_h as f32)),
        )
    }

    /// Multiply zoom by `factor`, keeping the world point under `screen` fixed.
    pub fn zoom_around(&mut self, screen: Pos2, factor: f32) {
        let anchor = self.screen_to_world(screen);
        let zoom = clamp_zoom(self.zoom * factor);
        if zoom == self.zoom {
            return;
        }
        self.zoom = zoom;
        self.pan = screen - self.center() - (anchor.to_vec2() - self.half_project()) * zoom;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() { zoom.clamp(MIN_ZOOM, MAX_ZOOM) } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Pos2, b: Pos2) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn centred_project_maps_to_viewport_centre() {
        let cs = CoordinateSystem::new(100, 50, vec2(200.0, 100.0));
        assert!(close(cs.screen_to_world(pos2(100.0, 50.0)), pos2(50.0, 25.0)));
        assert!(close(cs.world_to_screen(Pos2::ZERO), pos2(50.0, 25.0)));
    }

    #[test]
    fn screen_world_round_trip_under_pan_and_zoom() {
        let mut cs = CoordinateSystem::new(640, 480, vec2(1024.0, 768.0));
        cs.set_viewport(pos2(30.0, 40.0), vec2(1024.0, 768.0));
        cs.set_transform(vec2(-12.5, 40.0), 2.5);
        for p in [pos2(0.0, 0.0), pos2(311.0, 97.5), pos2(639.0, 479.0)] {
            assert!(close(cs.screen_to_world(cs.world_to_screen(p)), p));
        }
    }

    #[test]
    fn zoom_around_keeps_anchor_fixed() {
        let mut cs = CoordinateSystem::new(400, 300, vec2(800.0, 600.0));
        let cursor = pos2(123.0, 456.0);
        let before = cs.screen_to_world(cursor);
        cs.zoom_around(cursor, 3.0);
        assert!((cs.zoom() - 3.0).abs() < 1e-6);
        assert!(close(cs.screen_to_world(cursor), before));
        cs.zoom_around(cursor, 1000.0);
        assert_eq!(cs.zoom(), MAX_ZOOM);
    }

    #[test]
    fn bounds_and_pixel_indices() {
        let cs = CoordinateSystem::new(4, 3, vec2(4.0, 3.0));
        assert!(cs.is_in_bounds(pos2(0.0, 0.0)));
        assert!(cs.is_in_bounds(pos2(3.99, 2.99)));
        assert!(!cs.is_in_bounds(pos2(4.0, 0.0)));
        assert!(!cs.is_in_bounds(pos2(-0.01, 1.0)));
        assert_eq!(cs.world_to_pixel_index(pos2(2.7, 1.2)), Some(6));
        assert_eq!(cs.world_to_pixel_index(pos2(-1.0, 1.0)), None);
        assert_eq!(cs.pixel_index_to_world(6), pos2(2.0, 1.0));
        assert_eq!(cs.world_to_pixel(pos2(-0.5, 2.2)), (-1, 2));
    }

    #[test]
    fn device_pixels_scale_by_dpr() {
        let mut cs = CoordinateSystem::new(10, 10, vec2(10.0, 10.0));
        cs.set_dpr(2.0);
        assert_eq!(cs.screen_to_device(pos2(3.0, 4.0)), pos2(6.0, 8.0));
        assert_eq!(cs.device_to_screen(pos2(6.0, 8.0)), pos2(3.0, 4.0));
        cs.set_dpr(0.0);
        assert_eq!(cs.dpr(), 1.0);
    }
}
