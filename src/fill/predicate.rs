//! Colour-distance predicate shared by every engine.
//!
//! Distance is Euclidean over all four RGBA channels and is always measured
//! against the seed pixel itself, never a running average, so a fill is a pure
//! function of (image, seed, tolerance). A fully transparent seed is an
//! ordinary colour here.

#[inline(always)]
pub fn distance_sq(a: [u8; 4], b: [u8; 4]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    let da = a[3] as i32 - b[3] as i32;
    (dr * dr + dg * dg + db * db + da * da) as u32
}

/// `sqrt(Σ diff²) <= tolerance`, evaluated without the square root.
#[inline]
pub fn matches(candidate: [u8; 4], seed: [u8; 4], tolerance: u8) -> bool {
    distance_sq(candidate, seed) <= tolerance as u32 * tolerance as u32
}

/// Seed colour and squared threshold captured once per fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorMatcher {
    seed: [u8; 4],
    tolerance: u8,
    limit_sq: u32,
}

impl ColorMatcher {
    pub fn new(seed: [u8; 4], tolerance: u8) -> Self {
        Self {
            seed,
            tolerance,
            limit_sq: tolerance as u32 * tolerance as u32,
        }
    }

    #[inline(always)]
    pub fn matches(&self, candidate: [u8; 4]) -> bool {
        distance_sq(candidate, self.seed) <= self.limit_sq
    }

    pub fn seed(&self) -> [u8; 4] {
        self.seed
    }

    pub fn tolerance(&self) -> u8 {
        self.tolerance
    }

    pub fn with_tolerance(&self, tolerance: u8) -> Self {
        Self::new(self.seed, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_always_matches_itself() {
        for tol in [0u8, 1, 32, 255] {
            assert!(matches([10, 20, 30, 0], [10, 20, 30, 0], tol));
        }
    }

    #[test]
    fn threshold_is_inclusive_euclidean() {
        // 3-4-0-0 triangle: distance exactly 5
        let seed = [100, 100, 100, 255];
        let cand = [103, 104, 100, 255];
        assert!(matches(cand, seed, 5));
        assert!(!matches(cand, seed, 4));
    }

    #[test]
    fn alpha_counts_like_any_channel() {
        let m = ColorMatcher::new([255, 0, 0, 255], 10);
        assert!(!m.matches([255, 0, 0, 0]));
        assert!(m.matches([255, 0, 0, 250]));
        assert_eq!(m.with_tolerance(255).tolerance(), 255);
    }
}
