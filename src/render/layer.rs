use std::sync::Arc;

use egui::Color32;
use image::RgbaImage;
use uuid::Uuid;

use crate::raster::{Bounds, Mask};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl BlendMode {
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModifierKind {
    /// Fade the layer where `mask` is set, inside `bounds`.
    TransparencyMask { mask: Arc<Mask>, bounds: Bounds },
    /// Added to each colour channel, -255..=255.
    Brightness(f32),
    /// -255..=255; 0 leaves the layer unchanged.
    Contrast(f32),
}

/// One entry in a layer's non-destructive modifier stack.
#[derive(Clone, Debug, PartialEq)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub enabled: bool,
    pub opacity: f32,
}

impl Modifier {
    pub fn new(kind: ModifierKind) -> Self {
        Self {
            kind,
            enabled: true,
            opacity: 1.0,
        }
    }
}

/// A composited layer as the render engine sees it.
///
/// `version` keys every cache built from this layer. Mutating through
/// [`pixels_mut`](Self::pixels_mut) or [`modifiers_mut`](Self::modifiers_mut)
/// bumps it; code that changes the layer some other way must call
/// [`bump_version`](Self::bump_version) itself.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Highlight colour when this layer is a segmentation result.
    pub segment_color: Option<Color32>,
    pixels: Arc<RgbaImage>,
    modifiers: Vec<Modifier>,
    version: u64,
}

impl Layer {
    pub fn new(name: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            segment_color: None,
            pixels: Arc::new(pixels),
            modifiers: Vec::new(),
            version: 0,
        }
    }

    pub fn filled(name: impl Into<String>, width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::new(name, RgbaImage::from_pixel(width, height, image::Rgba(color)))
    }

    pub fn pixels(&self) -> &Arc<RgbaImage> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        self.version += 1;
        Arc::make_mut(&mut self.pixels)
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn modifiers_mut(&mut self) -> &mut Vec<Modifier> {
        self.version += 1;
        &mut self.modifiers
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_place_mutation_bumps_version() {
        let mut layer = Layer::filled("bg", 2, 2, [0, 0, 0, 255]);
        let shared = Arc::clone(layer.pixels());
        assert_eq!(layer.version(), 0);
        layer.pixels_mut().put_pixel(0, 0, image::Rgba([9, 9, 9, 255]));
        assert_eq!(layer.version(), 1);
        // copy-on-write: earlier snapshots keep the old pixels
        assert_eq!(shared.get_pixel(0, 0).0, [0, 0, 0, 255]);
        layer.modifiers_mut().push(Modifier::new(ModifierKind::Brightness(10.0)));
        assert_eq!(layer.version(), 2);
    }
}
