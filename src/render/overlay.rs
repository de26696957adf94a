//! CPU-built overlay textures: preview tint, marching-ants selection edge,
//! segment highlights and the transparency checkerboard.

use std::time::Duration;

use egui::{Color32, ColorImage};
use image::RgbaImage;
use rayon::prelude::*;

use crate::fill::rescan::is_edge;
use crate::raster::Mask;

pub const PREVIEW_RGB: [u8; 3] = [50, 200, 220];
pub const DEFAULT_PREVIEW_ALPHA: u8 = 102;

pub const MARCH_BLUE: [u8; 3] = [59, 130, 246];
pub const MARCH_ALPHA: u8 = 220;
/// Dash pattern length in pixels; half blue, half white.
pub const MARCH_PERIOD: u32 = 8;
pub const MARCH_INTERVAL: Duration = Duration::from_millis(100);

pub const CHECKER_SIZE: u32 = 16;
pub const CHECKER_DARK: Color32 = Color32::from_rgb(0x1a, 0x1a, 0x24);
pub const CHECKER_LIGHT: Color32 = Color32::from_rgb(0x23, 0x23, 0x33);

pub const SEGMENT_FILL_SELECTED: f32 = 0.35;
pub const SEGMENT_FILL_IDLE: f32 = 0.2;
pub const SEGMENT_EDGE_SELECTED: f32 = 0.8;

/// Fill and outline for one segmentation layer.
#[derive(Clone)]
pub struct SegmentTextures {
    pub fill: ColorImage,
    pub edge: ColorImage,
}

pub fn preview_alpha(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Flat translucent tint over every masked pixel.
pub fn preview_texture(mask: &Mask, alpha: u8) -> ColorImage {
    let [r, g, b] = PREVIEW_RGB;
    let tint = Color32::from_rgba_unmultiplied(r, g, b, alpha);
    let bytes = mask.as_bytes();
    let mut img = ColorImage::new([mask.width() as usize, mask.height() as usize], Color32::TRANSPARENT);
    img.pixels
        .par_iter_mut()
        .zip(bytes.par_iter())
        .for_each(|(px, &m)| {
            if m != 0 {
                *px = tint;
            }
        });
    img
}

pub fn march_color(x: u32, y: u32, offset: u32) -> Color32 {
    if (x + y + offset) % MARCH_PERIOD < MARCH_PERIOD / 2 {
        let [r, g, b] = MARCH_BLUE;
        Color32::from_rgba_unmultiplied(r, g, b, MARCH_ALPHA)
    } else {
        Color32::from_rgba_unmultiplied(255, 255, 255, MARCH_ALPHA)
    }
}

/// Edge pixels of `mask` in the dash colour for `offset`.
pub fn selection_texture(mask: &Mask, offset: u32) -> ColorImage {
    let w = mask.width() as usize;
    let mut img = ColorImage::new([w, mask.height() as usize], Color32::TRANSPARENT);
    if w == 0 {
        return img;
    }
    img.pixels.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let y = y as u32;
        for (x, px) in row.iter_mut().enumerate() {
            let x = x as u32;
            if is_edge(mask, x, y) {
                *px = march_color(x, y, offset);
            }
        }
    });
    img
}

/// Mask of pixels with non-zero alpha.
pub fn alpha_mask(pixels: &RgbaImage) -> Mask {
    let mut mask = Mask::new(pixels.width(), pixels.height());
    for (i, px) in pixels.pixels().enumerate() {
        if px[3] > 0 {
            mask.set(i);
        }
    }
    mask
}

pub fn segment_textures(pixels: &RgbaImage, color: Color32) -> SegmentTextures {
    let mask = alpha_mask(pixels);
    let w = mask.width() as usize;
    let size = [w, mask.height() as usize];
    let mut fill = ColorImage::new(size, Color32::TRANSPARENT);
    let mut edge = ColorImage::new(size, Color32::TRANSPARENT);
    if w > 0 {
        fill.pixels
            .par_chunks_mut(w)
            .zip(edge.pixels.par_chunks_mut(w))
            .enumerate()
            .for_each(|(y, (fill_row, edge_row))| {
                let y = y as u32;
                for x in 0..w {
                    let idx = y as usize * w + x;
                    if !mask.is_set(idx) {
                        continue;
                    }
                    fill_row[x] = color;
                    if is_edge(&mask, x as u32, y) {
                        edge_row[x] = color;
                    }
                }
            });
    }
    SegmentTextures { fill, edge }
}

pub fn checkerboard(width: u32, height: u32) -> ColorImage {
    let w = width as usize;
    let mut img = ColorImage::new([w, height as usize], CHECKER_DARK);
    if w == 0 {
        return img;
    }
    img.pixels.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let cy = y as u32 / CHECKER_SIZE;
        for (x, px) in row.iter_mut().enumerate() {
            if (x as u32 / CHECKER_SIZE + cy) % 2 == 1 {
                *px = CHECKER_LIGHT;
            }
        }
    });
    img
}

pub fn image_to_texture(img: &RgbaImage) -> ColorImage {
    ColorImage::from_rgba_unmultiplied([img.width() as usize, img.height() as usize], img.as_raw())
}
