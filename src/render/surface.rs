use egui::{Color32, ColorImage, Rect};
use image::RgbaImage;

/// Fixed draw order, bottom to top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrawLayer {
    Checkerboard,
    Composite,
    Border,
    SegmentHighlight,
    Preview,
    Selection,
}

/// Where the render engine draws. Destinations are in screen pixels.
///
/// An egui host forwards these to its painter with uploaded textures; the
/// headless [`CpuSurface`] rasterises them into a buffer.
pub trait DrawSurface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Color32);
    fn draw_image(&mut self, layer: DrawLayer, image: &ColorImage, dest: Rect, opacity: f32);
    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Color32);
}

/// Software framebuffer with nearest-neighbour sampling. Records the layer
/// of every draw call in order.
pub struct CpuSurface {
    width: u32,
    height: u32,
    pixels: Vec<Color32>,
    calls: Vec<DrawLayer>,
}

impl CpuSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color32::TRANSPARENT; width as usize * height as usize],
            calls: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color32 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Draw calls since the last `clear`.
    pub fn calls(&self) -> &[DrawLayer] {
        &self.calls
    }

    /// Unpremultiplied RGBA copy of the framebuffer.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (dst, src) in out.pixels_mut().zip(&self.pixels) {
            *dst = image::Rgba(src.to_srgba_unmultiplied());
        }
        out
    }

    fn blend(&mut self, x: u32, y: u32, src: Color32) {
        let dst = &mut self.pixels[(y * self.width + x) as usize];
        *dst = over(src, *dst);
    }

    /// Screen pixel range covered by `rect`, clipped to the surface.
    fn span(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.min.x.floor().max(0.0) as u32;
        let y0 = rect.min.y.floor().max(0.0) as u32;
        let x1 = (rect.max.x.ceil().max(0.0) as u32).min(self.width);
        let y1 = (rect.max.y.ceil().max(0.0) as u32).min(self.height);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }
}

/// Premultiplied source-over.
fn over(src: Color32, dst: Color32) -> Color32 {
    let inv = 255 - src.a() as u32;
    let mix = |s: u8, d: u8| (s as u32 + (d as u32 * inv + 127) / 255).min(255) as u8;
    Color32::from_rgba_premultiplied(
        mix(src.r(), dst.r()),
        mix(src.g(), dst.g()),
        mix(src.b(), dst.b()),
        mix(src.a(), dst.a()),
    )
}

impl DrawSurface for CpuSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Color32) {
        self.pixels.fill(color);
        self.calls.clear();
    }

    fn draw_image(&mut self, layer: DrawLayer, image: &ColorImage, dest: Rect, opacity: f32) {
        self.calls.push(layer);
        let [iw, ih] = image.size;
        if iw == 0 || ih == 0 || dest.width() <= 0.0 || dest.height() <= 0.0 || opacity <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.span(dest) else { return };
        for sy in y0..y1 {
            let v = (sy as f32 + 0.5 - dest.min.y) / dest.height();
            if !(0.0..1.0).contains(&v) {
                continue;
            }
            let iy = ((v * ih as f32) as usize).min(ih - 1);
            for sx in x0..x1 {
                let u = (sx as f32 + 0.5 - dest.min.x) / dest.width();
                if !(0.0..1.0).contains(&u) {
                    continue;
                }
                let ix = ((u * iw as f32) as usize).min(iw - 1);
                let src = image.pixels[iy * iw + ix];
                if src.a() == 0 {
                    continue;
                }
                let src = if opacity < 1.0 { src.gamma_multiply(opacity) } else { src };
                self.blend(sx, sy, src);
            }
        }
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Color32) {
        self.calls.push(DrawLayer::Border);
        let outer = rect.expand(width * 0.5);
        let inner = rect.shrink(width * 0.5);
        let Some((x0, y0, x1, y1)) = self.span(outer) else { return };
        for sy in y0..y1 {
            for sx in x0..x1 {
                let p = egui::pos2(sx as f32 + 0.5, sy as f32 + 0.5);
                if outer.contains(p) && !inner.contains(p) {
                    self.blend(sx, sy, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use egui::pos2;

    use super::*;

    #[test]
    fn image_is_scaled_into_dest() {
        let mut s = CpuSurface::new(8, 8);
        s.clear(Color32::BLACK);
        let mut img = ColorImage::new([2, 2], Color32::RED);
        img.pixels[1] = Color32::GREEN;
        s.draw_image(
            DrawLayer::Composite,
            &img,
            Rect::from_min_max(pos2(0.0, 0.0), pos2(4.0, 4.0)),
            1.0,
        );
        assert_eq!(s.pixel(0, 0), Color32::RED);
        assert_eq!(s.pixel(3, 0), Color32::GREEN);
        assert_eq!(s.pixel(5, 5), Color32::BLACK);
        assert_eq!(s.calls(), &[DrawLayer::Composite]);
    }

    #[test]
    fn translucent_source_blends_over() {
        let mut s = CpuSurface::new(1, 1);
        s.clear(Color32::BLACK);
        let img = ColorImage::new([1, 1], Color32::WHITE);
        s.draw_image(DrawLayer::Preview, &img, Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)), 0.5);
        let px = s.pixel(0, 0);
        assert!((120..=136).contains(&px.r()), "got {px:?}");
        assert_eq!(px.a(), 255);
    }

    #[test]
    fn stroke_touches_the_outline_only() {
        let mut s = CpuSurface::new(10, 10);
        s.clear(Color32::TRANSPARENT);
        s.stroke_rect(Rect::from_min_max(pos2(2.0, 2.0), pos2(8.0, 8.0)), 2.0, Color32::WHITE);
        assert_eq!(s.pixel(1, 5), Color32::WHITE);
        assert_eq!(s.pixel(5, 5), Color32::TRANSPARENT);
    }
}
