use std::time::{Duration, Instant};

use image::{GrayImage, RgbaImage};

use crate::error::{WandError, WandResult};

pub const MASK_ON: u8 = 255;

/// Row-major RGBA8 pixels. Read-only for every engine in the crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> WandResult<Self> {
        if width == 0 || height == 0 {
            return Err(WandError::EmptyRaster);
        }
        if data.len() != width as usize * height as usize * 4 {
            return Err(WandError::DimensionMismatch {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Caller guarantees `data.len() == width * height * 4` and non-zero size.
    pub(crate) fn from_raw_parts(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            data,
        }
    }

    /// Solid-colour raster, mostly useful for building fixtures.
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> WandResult<Self> {
        let data = color.repeat(width as usize * height as usize);
        Self::new(width, height, data)
    }

    pub fn from_rgba_image(img: RgbaImage) -> WandResult<Self> {
        let (w, h) = img.dimensions();
        Self::new(w, h, img.into_raw())
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The buffer viewed as one `[r, g, b, a]` array per pixel.
    #[inline]
    pub fn pixels(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn pixels_mut(&mut self) -> &mut [[u8; 4]] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    #[inline(always)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels()[self.index(x, y)]
    }

    #[inline(always)]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Signed point test; pointer input regularly lands off-canvas.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }
}

/// One byte per pixel, 0 or [`MASK_ON`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> WandResult<Self> {
        if data.len() != width as usize * height as usize {
            return Err(WandError::DimensionMismatch {
                width,
                height,
                len: data.len() * 4,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline(always)]
    pub fn is_set(&self, index: usize) -> bool {
        self.data[index] != 0
    }

    /// Bounds-checked lookup; anything outside the mask reads as excluded.
    #[inline]
    pub fn is_set_at(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    #[inline(always)]
    pub fn set(&mut self, index: usize) {
        self.data[index] = MASK_ON;
    }

    #[inline(always)]
    pub fn clear(&mut self, index: usize) {
        self.data[index] = 0;
    }

    pub fn clear_all(&mut self) {
        self.data.fill(0);
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Tight bounds, computed by scanning. Engines track bounds while
    /// accepting instead; this is for masks built some other way.
    pub fn bounds(&self) -> Bounds {
        let mut tracker = BoundsTracker::new();
        let w = self.width as usize;
        for (i, &v) in self.data.iter().enumerate() {
            if v != 0 {
                tracker.include((i % w) as u32, (i / w) as u32);
            }
        }
        tracker.finish()
    }

    pub fn to_gray_image(&self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Tight axis-aligned box around included pixels; all zero when empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge, saturating at `u32::MAX`.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `u32::MAX`.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    /// True when the rectangle is non-empty and lies inside a `w`x`h` raster.
    pub fn fits_within(&self, w: u32, h: u32) -> bool {
        !self.is_empty()
            && self.x as u64 + self.width as u64 <= w as u64
            && self.y as u64 + self.height as u64 <= h as u64
    }

    /// Grow by `pad` on every side, clipped to a `w`x`h` raster.
    pub fn padded(&self, pad: u32, w: u32, h: u32) -> Bounds {
        if self.is_empty() {
            return Bounds::EMPTY;
        }
        let x0 = self.x.saturating_sub(pad);
        let y0 = self.y.saturating_sub(pad);
        let x1 = self.right().saturating_add(pad).min(w);
        let y1 = self.bottom().saturating_add(pad).min(h);
        Bounds::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Bounds::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Running min/max used while pixels are accepted.
#[derive(Clone, Copy, Debug)]
pub struct BoundsTracker {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    any: bool,
}

impl Default for BoundsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundsTracker {
    pub fn new() -> Self {
        Self {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            any: false,
        }
    }

    #[inline(always)]
    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.any = true;
    }

    pub fn finish(&self) -> Bounds {
        if !self.any {
            return Bounds::EMPTY;
        }
        Bounds::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
        )
    }
}

/// Output of every fill engine.
#[derive(Clone, Debug)]
pub struct FillResult {
    pub mask: Mask,
    pub bounds: Bounds,
    /// Included pixel indices, each exactly once, in acceptance order.
    pub pixels: Vec<u32>,
    /// Rings for BFS engines, spans or passes for the others.
    pub rings: u32,
    pub elapsed: Duration,
}

impl FillResult {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            mask: Mask::new(width, height),
            bounds: Bounds::EMPTY,
            pixels: Vec::new(),
            rings: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Rebuild list and bounds from a finished mask (row-major order).
    pub fn from_mask(mask: Mask, rings: u32, started: Instant) -> Self {
        let w = mask.width();
        let mut tracker = BoundsTracker::new();
        let mut pixels = Vec::new();
        for (i, &v) in mask.as_bytes().iter().enumerate() {
            if v != 0 {
                let i = i as u32;
                tracker.include(i % w, i / w);
                pixels.push(i);
            }
        }
        Self {
            mask,
            bounds: tracker.finish(),
            pixels,
            rings,
            elapsed: started.elapsed(),
        }
    }
}

/// Accumulates mask, pixel list and bounds together so they cannot drift.
pub(crate) struct RegionBuilder {
    pub mask: Mask,
    pub pixels: Vec<u32>,
    pub bounds: BoundsTracker,
}

impl RegionBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mask: Mask::new(width, height),
            pixels: Vec::new(),
            bounds: BoundsTracker::new(),
        }
    }

    #[inline(always)]
    pub fn accept(&mut self, index: u32, x: u32, y: u32) {
        self.mask.set(index as usize);
        self.pixels.push(index);
        self.bounds.include(x, y);
    }

    pub fn finish(self, rings: u32, started: Instant) -> FillResult {
        FillResult {
            bounds: self.bounds.finish(),
            mask: self.mask,
            pixels: self.pixels,
            rings,
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_bounds_saturate_instead_of_overflowing() {
        let b = Bounds::new(u32::MAX - 2, 10, 100, u32::MAX);
        assert_eq!(b.right(), u32::MAX);
        assert!(b.contains(u32::MAX - 1, 20));
        assert!(!b.contains(u32::MAX - 3, 20));
        assert_eq!(b.padded(2, 64, 64), Bounds::new(u32::MAX - 4, 8, 0, 56));
        assert!(!b.fits_within(u32::MAX, u32::MAX));
        let u = b.union(&Bounds::new(0, 0, 1, 1));
        assert_eq!((u.x, u.right(), u.bottom()), (0, u32::MAX, u32::MAX));
    }

    #[test]
    fn rejects_mismatched_length() {
        let err = RasterBuffer::new(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, WandError::DimensionMismatch { len: 10, .. }));
        assert!(matches!(
            RasterBuffer::new(0, 4, Vec::new()),
            Err(WandError::EmptyRaster)
        ));
    }

    #[test]
    fn pixel_view_matches_bytes() {
        let mut raster = RasterBuffer::filled(3, 2, [1, 2, 3, 4]).unwrap();
        raster.pixels_mut()[4] = [9, 8, 7, 6];
        assert_eq!(raster.pixel(1, 1), [9, 8, 7, 6]);
        assert_eq!(&raster.as_bytes()[16..20], &[9, 8, 7, 6]);
        assert!(raster.contains(2, 1));
        assert!(!raster.contains(-1, 0));
        assert!(!raster.contains(3, 0));
    }

    #[test]
    fn tracker_produces_tight_box() {
        let mut t = BoundsTracker::new();
        assert_eq!(t.finish(), Bounds::EMPTY);
        t.include(3, 5);
        t.include(1, 7);
        assert_eq!(t.finish(), Bounds::new(1, 5, 3, 3));
    }

    #[test]
    fn padded_bounds_clip_to_raster() {
        let b = Bounds::new(1, 1, 2, 2).padded(2, 4, 4);
        assert_eq!(b, Bounds::new(0, 0, 4, 4));
        assert_eq!(Bounds::EMPTY.padded(2, 4, 4), Bounds::EMPTY);
        assert!(Bounds::new(0, 0, 4, 4).fits_within(4, 4));
        assert!(!Bounds::new(1, 0, 4, 4).fits_within(4, 4));
    }

    #[test]
    fn from_mask_agrees_with_mask() {
        let mut mask = Mask::new(4, 4);
        mask.set(5);
        mask.set(10);
        let result = FillResult::from_mask(mask, 1, Instant::now());
        assert_eq!(result.pixels, vec![5, 10]);
        assert_eq!(result.bounds, Bounds::new(1, 1, 2, 2));
        assert_eq!(result.mask.bounds(), result.bounds);
    }
}
