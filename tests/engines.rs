use wandfe::fill::{global_select, hybrid_fill, instant_fill, queue_fill, scanline_fill};
use wandfe::{
    fill_with_engine, Bounds, Connectivity, Engine, EngineSettings, FillResult, RasterBuffer,
    RescanParams,
};

const RED: [u8; 4] = [255, 0, 0, 255];
const CLEAR: [u8; 4] = [0, 0, 0, 0];

/// 4x4, opaque red 2x2 block top-left, transparent elsewhere.
fn red_block() -> RasterBuffer {
    let mut r = RasterBuffer::filled(4, 4, CLEAR).unwrap();
    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        let i = r.index(x, y);
        r.pixels_mut()[i] = RED;
    }
    r
}

/// Deterministic xorshift speckle over a three-colour palette.
fn speckle(w: u32, h: u32, mut state: u32) -> RasterBuffer {
    const PALETTE: [[u8; 4]; 3] = [[10, 10, 10, 255], [40, 10, 10, 255], [200, 200, 200, 255]];
    let mut r = RasterBuffer::filled(w, h, CLEAR).unwrap();
    for px in r.pixels_mut() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        *px = PALETTE[(state % 3) as usize];
    }
    r
}

fn sorted_pixels(r: &FillResult) -> Vec<u32> {
    let mut px = r.pixels.clone();
    px.sort_unstable();
    px
}

#[test]
fn red_block_from_its_corner() {
    let raster = red_block();
    for engine in Engine::all() {
        let r = fill_with_engine(&raster, 0, 0, &EngineSettings::new(engine, 0, Connectivity::Four));
        assert_eq!(sorted_pixels(&r), vec![0, 1, 4, 5], "{}", engine.name());
        assert_eq!(r.bounds, Bounds::new(0, 0, 2, 2), "{}", engine.name());
        assert_eq!(r.mask.count(), 4);
    }
}

#[test]
fn transparent_corner_reaches_the_whole_transparent_area() {
    // The clear pixels wrap around the red block, so they form one region.
    let r = queue_fill(&red_block(), 3, 3, 0, Connectivity::Four);
    assert_eq!(r.pixel_count(), 12);
    assert!(r.mask.is_set(15));
    assert!(!r.mask.is_set(0) && !r.mask.is_set(5));
    assert_eq!(r.bounds, Bounds::new(0, 0, 4, 4));
}

#[test]
fn off_canvas_seed_is_empty_for_every_engine() {
    let raster = red_block();
    for engine in Engine::all() {
        let settings = EngineSettings::new(engine, 255, Connectivity::Eight);
        let r = fill_with_engine(&raster, -1, -1, &settings);
        assert!(r.mask.is_empty(), "{}", engine.name());
        assert!(r.pixels.is_empty(), "{}", engine.name());
        assert_eq!(r.bounds, Bounds::EMPTY);
    }
}

#[test]
fn exact_engines_agree_on_speckle() {
    let raster = speckle(24, 20, 0x9e37_79b9);
    for conn in [Connectivity::Four, Connectivity::Eight] {
        for tol in [0, 30, 40, 255] {
            for (sx, sy) in [(0, 0), (11, 7), (23, 19)] {
                let reference = instant_fill(&raster, sx, sy, tol, conn);
                for engine in Engine::all() {
                    let r = fill_with_engine(&raster, sx, sy, &EngineSettings::new(engine, tol, conn));
                    assert_eq!(r.mask, reference.mask, "{} tol={tol} seed=({sx},{sy})", engine.name());
                    assert_eq!(r.bounds, reference.bounds, "{} tol={tol}", engine.name());
                    assert_eq!(sorted_pixels(&r), sorted_pixels(&reference));
                }
            }
        }
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    let raster = speckle(16, 16, 7);
    for engine in Engine::all() {
        let settings = EngineSettings::new(engine, 30, Connectivity::Eight);
        let a = fill_with_engine(&raster, 5, 5, &settings);
        let b = fill_with_engine(&raster, 5, 5, &settings);
        assert_eq!(a.mask.as_bytes(), b.mask.as_bytes(), "{}", engine.name());
    }
}

#[test]
fn seed_is_included_and_bounds_are_tight() {
    let raster = speckle(20, 12, 12345);
    for (sx, sy) in [(0, 0), (19, 11), (8, 3)] {
        let r = hybrid_fill(&raster, sx, sy, 0, Connectivity::Four);
        assert!(r.mask.is_set_at(sx as i64, sy as i64));

        let b = r.bounds;
        assert_eq!(b, r.mask.bounds());
        let row_hit = |y: u32| (b.x..b.x + b.width).any(|x| r.mask.is_set_at(x as i64, y as i64));
        let col_hit = |x: u32| (b.y..b.y + b.height).any(|y| r.mask.is_set_at(x as i64, y as i64));
        assert!(row_hit(b.y) && row_hit(b.y + b.height - 1), "top/bottom rows must be used");
        assert!(col_hit(b.x) && col_hit(b.x + b.width - 1), "left/right columns must be used");
        for &i in &r.pixels {
            assert!(b.contains(i % 20, i / 20));
        }
    }
}

#[test]
fn pixel_list_and_mask_agree() {
    let raster = speckle(15, 9, 31337);
    let r = scanline_fill(&raster, 7, 4, 40, Connectivity::Eight);
    assert_eq!(r.pixels.len(), r.mask.count());
    for &i in &r.pixels {
        assert!(r.mask.is_set(i as usize));
    }
}

#[test]
fn higher_tolerance_only_adds_pixels() {
    let raster = speckle(18, 18, 99);
    let mut previous = scanline_fill(&raster, 9, 9, 0, Connectivity::Four);
    for tol in [10, 30, 40, 120, 255] {
        let next = scanline_fill(&raster, 9, 9, tol, Connectivity::Four);
        for i in 0..previous.mask.as_bytes().len() {
            assert!(!previous.mask.is_set(i) || next.mask.is_set(i), "tol={tol} lost pixel {i}");
        }
        previous = next;
    }
}

#[test]
fn global_select_finds_disconnected_matches() {
    let mut raster = RasterBuffer::filled(5, 5, CLEAR).unwrap();
    for i in [0, 4, 12, 20, 24] {
        raster.pixels_mut()[i] = RED;
    }
    let r = global_select(&raster, 0, 0, 0);
    assert_eq!(sorted_pixels(&r), vec![0, 4, 12, 20, 24]);
    assert_eq!(r.bounds, Bounds::new(0, 0, 5, 5));

    let contiguous = queue_fill(&raster, 0, 0, 0, Connectivity::Eight);
    assert_eq!(contiguous.pixel_count(), 1);
}

#[test]
fn boundary_rescan_differs_only_inside_its_ribbon() {
    // Two colours split at a column that does not land on a proxy pixel edge.
    let (w, h, split) = (1200u32, 40u32, 601u32);
    let mut raster = RasterBuffer::filled(w, h, RED).unwrap();
    for y in 0..h {
        for x in split..w {
            let i = raster.index(x, y);
            raster.pixels_mut()[i] = [0, 0, 255, 255];
        }
    }
    let params = RescanParams::new(512, 4).unwrap();
    let settings = EngineSettings::new(Engine::BoundaryRescan(params), 0, Connectivity::Four);
    let approx = fill_with_engine(&raster, 0, 0, &settings);
    let exact = hybrid_fill(&raster, 0, 0, 0, Connectivity::Four);
    assert_eq!(exact.pixel_count(), (split * h) as usize);

    // Nearest-neighbour proxy error is under one proxy pixel (< 3 px here).
    let slack = params.buffer_radius() + 3;
    for i in 0..(w * h) as usize {
        if approx.mask.is_set(i) != exact.mask.is_set(i) {
            let x = i as u32 % w;
            assert!(x.abs_diff(split) <= slack, "pixel {i} differs far from the edge");
        }
    }
}
