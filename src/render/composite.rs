use std::borrow::Cow;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::layer::{BlendMode, Modifier, ModifierKind};

/// One visible layer's effective pixels ready for compositing.
pub struct CompositeInput<'a> {
    pub pixels: &'a RgbaImage,
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

/// Straight-alpha source-over with a colour blend for the overlapping part.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let [base_r, base_g, base_b, base_a] = base.0.map(|c| c as f32 / 255.0);
    let [top_r, top_g, top_b, top_a] = top.0.map(|c| c as f32 / 255.0);
    let top_a = top_a * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
        BlendMode::Screen => (
            1.0 - (1.0 - base_r) * (1.0 - top_r),
            1.0 - (1.0 - base_g) * (1.0 - top_g),
            1.0 - (1.0 - base_b) * (1.0 - top_b),
        ),
        BlendMode::Overlay => (
            overlay_channel(base_r, top_r),
            overlay_channel(base_g, top_g),
            overlay_channel(base_b, top_b),
        ),
        BlendMode::Darken => (base_r.min(top_r), base_g.min(top_g), base_b.min(top_b)),
        BlendMode::Lighten => (base_r.max(top_r), base_g.max(top_g), base_b.max(top_b)),
    };

    // Where the base is transparent the blend has nothing to act on.
    let (r, g, b) = (
        r * base_a + top_r * (1.0 - base_a),
        g * base_a + top_g * (1.0 - base_a),
        b * base_a + top_b * (1.0 - base_a),
    );

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([to_byte(out_r), to_byte(out_g), to_byte(out_b), to_byte(out_a)])
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Run the enabled modifiers over `base` in order. Borrows when nothing
/// would change.
pub fn apply_modifier_stack<'a>(base: &'a RgbaImage, modifiers: &[Modifier]) -> Cow<'a, RgbaImage> {
    let active: Vec<&Modifier> = modifiers
        .iter()
        .filter(|m| m.enabled && m.opacity > 0.0)
        .collect();
    if active.is_empty() {
        return Cow::Borrowed(base);
    }
    let mut out = base.clone();
    for modifier in active {
        apply_modifier(&mut out, modifier);
    }
    Cow::Owned(out)
}

fn apply_modifier(img: &mut RgbaImage, modifier: &Modifier) {
    let width = img.width();
    let row_len = width as usize * 4;
    let opacity = modifier.opacity.clamp(0.0, 1.0);
    match &modifier.kind {
        ModifierKind::TransparencyMask { mask, bounds } => {
            img.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
                let y = y as u32;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let x = x as u32;
                    if !bounds.contains(x, y) || !mask.is_set_at(x as i64, y as i64) {
                        continue;
                    }
                    let keep = 1.0 - (mask.as_bytes()[(y * mask.width() + x) as usize] as f32 / 255.0) * opacity;
                    px[3] = (px[3] as f32 * keep).round() as u8;
                }
            });
        }
        ModifierKind::Brightness(amount) => {
            let amount = *amount;
            map_channels(img, row_len, opacity, |v| v + amount);
        }
        ModifierKind::Contrast(c) => {
            let c = c.clamp(-255.0, 255.0);
            let factor = 259.0 * (c + 255.0) / (255.0 * (259.0 - c));
            map_channels(img, row_len, opacity, |v| factor * (v - 128.0) + 128.0);
        }
    }
}

fn map_channels(img: &mut RgbaImage, row_len: usize, opacity: f32, f: impl Fn(f32) -> f32 + Sync) {
    img.par_chunks_mut(row_len).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            for c in &mut px[..3] {
                let v = *c as f32;
                let mapped = f(v).clamp(0.0, 255.0);
                *c = (v + (mapped - v) * opacity).round() as u8;
            }
        }
    });
}

/// Composite `layers` bottom to top onto a transparent `width` x `height`
/// canvas. Layers smaller than the canvas cover their own extent only.
pub fn composite_layers(width: u32, height: u32, layers: &[CompositeInput<'_>]) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    let row_len = width as usize * 4;
    out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        let y = y as u32;
        for layer in layers {
            if y >= layer.pixels.height() || layer.opacity <= 0.0 {
                continue;
            }
            let span = width.min(layer.pixels.width());
            for x in 0..span {
                let i = x as usize * 4;
                let base = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                let top = *layer.pixels.get_pixel(x, y);
                let px = blend_pixel(base, top, layer.blend_mode, layer.opacity);
                row[i..i + 4].copy_from_slice(&px.0);
            }
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::raster::{Bounds, Mask};

    const GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);

    #[test]
    fn opaque_normal_replaces_and_transparent_keeps() {
        let top = Rgba([10, 20, 30, 255]);
        assert_eq!(blend_pixel(GREY, top, BlendMode::Normal, 1.0), top);
        assert_eq!(blend_pixel(GREY, Rgba([1, 2, 3, 0]), BlendMode::Multiply, 1.0), GREY);
        assert_eq!(blend_pixel(GREY, top, BlendMode::Normal, 0.0), GREY);
    }

    #[test]
    fn blend_modes_on_opaque_pixels() {
        let white = Rgba([255, 255, 255, 255]);
        let black = Rgba([0, 0, 0, 255]);
        assert_eq!(blend_pixel(GREY, white, BlendMode::Multiply, 1.0), GREY);
        assert_eq!(blend_pixel(GREY, black, BlendMode::Screen, 1.0), GREY);
        assert_eq!(blend_pixel(GREY, black, BlendMode::Lighten, 1.0), GREY);
        assert_eq!(blend_pixel(GREY, white, BlendMode::Darken, 1.0), GREY);
        assert_eq!(blend_pixel(black, white, BlendMode::Overlay, 1.0), black);
    }

    #[test]
    fn half_opacity_mixes() {
        let out = blend_pixel(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), BlendMode::Normal, 0.5);
        assert_eq!(out, Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn no_enabled_modifiers_borrows() {
        let img = RgbaImage::from_pixel(2, 2, GREY);
        let mut off = Modifier::new(ModifierKind::Brightness(50.0));
        off.enabled = false;
        assert!(matches!(apply_modifier_stack(&img, &[off]), Cow::Borrowed(_)));
    }

    #[test]
    fn brightness_then_contrast() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([100, 128, 250, 255]));
        let out = apply_modifier_stack(&img, &[Modifier::new(ModifierKind::Brightness(20.0))]);
        assert_eq!(out.get_pixel(0, 0).0, [120, 148, 255, 255]);
        let out = apply_modifier_stack(&img, &[Modifier::new(ModifierKind::Contrast(0.0))]);
        assert_eq!(out.get_pixel(0, 0).0, [100, 128, 250, 255]);
        let out = apply_modifier_stack(&img, &[Modifier::new(ModifierKind::Contrast(255.0))]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 128, 255, 255]);
    }

    #[test]
    fn transparency_mask_fades_inside_bounds() {
        let img = RgbaImage::from_pixel(2, 1, GREY);
        let mut mask = Mask::new(2, 1);
        mask.set(0);
        mask.set(1);
        let mut m = Modifier::new(ModifierKind::TransparencyMask {
            mask: Arc::new(mask),
            bounds: Bounds::new(0, 0, 1, 1),
        });
        m.opacity = 0.5;
        let out = apply_modifier_stack(&img, &[m]);
        assert_eq!(out.get_pixel(0, 0)[3], 128);
        assert_eq!(out.get_pixel(1, 0)[3], 255, "outside the modifier bounds");
    }

    #[test]
    fn composite_stacks_bottom_to_top() {
        let bottom = RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255]));
        let top = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 255]));
        let out = composite_layers(
            3,
            2,
            &[
                CompositeInput { pixels: &bottom, opacity: 1.0, blend_mode: BlendMode::Normal },
                CompositeInput { pixels: &top, opacity: 1.0, blend_mode: BlendMode::Normal },
            ],
        );
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(2, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }
}
