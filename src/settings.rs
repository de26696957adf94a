use std::time::Duration;

use crate::error::{WandError, WandResult};

pub const DEFAULT_TOLERANCE: u8 = 32;
/// Images above this many pixels are routed through the proxy/worker paths.
pub const PROXY_THRESHOLD: usize = 512 * 512;
pub const PROXY_MAX_DIM: u32 = 512;

const NEIGHBORS_4: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Connectivity {
    #[default]
    Four,
    Eight,
}

impl Connectivity {
    /// Neighbour offsets as (dx, dy). Never linear index deltas: `i ± 1`
    /// wraps across row ends.
    #[inline]
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Connectivity::Four => &NEIGHBORS_4,
            Connectivity::Eight => &NEIGHBORS_8,
        }
    }

    /// Extra columns a span must look at on adjacent rows (diagonal reach).
    #[inline]
    pub fn span_reach(self) -> u32 {
        match self {
            Connectivity::Four => 0,
            Connectivity::Eight => 1,
        }
    }

    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            4 => Some(Connectivity::Four),
            8 => Some(Connectivity::Eight),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveParams {
    time_budget_ms: u32,
    expansion_rate: u32,
}

impl WaveParams {
    pub fn new(time_budget_ms: u32, expansion_rate: u32) -> WandResult<Self> {
        if !(1..=1000).contains(&time_budget_ms) {
            return Err(WandError::InvalidParameter {
                name: "wave_time_budget_ms",
                reason: format!("{} is outside 1..=1000", time_budget_ms),
            });
        }
        if !(1..=1000).contains(&expansion_rate) {
            return Err(WandError::InvalidParameter {
                name: "wave_expansion_rate",
                reason: format!("{} is outside 1..=1000", expansion_rate),
            });
        }
        Ok(Self {
            time_budget_ms,
            expansion_rate,
        })
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms as u64)
    }

    pub fn time_budget_ms(&self) -> u32 {
        self.time_budget_ms
    }

    /// Rings processed per frame at most.
    pub fn expansion_rate(&self) -> u32 {
        self.expansion_rate
    }
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            time_budget_ms: 8,
            expansion_rate: 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RescanParams {
    proxy_max_dim: u32,
    buffer_radius: u32,
}

impl RescanParams {
    pub fn new(proxy_max_dim: u32, buffer_radius: u32) -> WandResult<Self> {
        if proxy_max_dim < 16 {
            return Err(WandError::InvalidParameter {
                name: "proxy_max_dim",
                reason: format!("{} is below the 16px minimum", proxy_max_dim),
            });
        }
        if !(1..=64).contains(&buffer_radius) {
            return Err(WandError::InvalidParameter {
                name: "buffer_radius",
                reason: format!("{} is outside 1..=64", buffer_radius),
            });
        }
        Ok(Self {
            proxy_max_dim,
            buffer_radius,
        })
    }

    /// Long-side cap of the proxy raster.
    pub fn proxy_max_dim(&self) -> u32 {
        self.proxy_max_dim
    }

    pub fn buffer_radius(&self) -> u32 {
        self.buffer_radius
    }
}

impl Default for RescanParams {
    fn default() -> Self {
        Self {
            proxy_max_dim: PROXY_MAX_DIM,
            buffer_radius: 4,
        }
    }
}

/// Fill algorithm selector. Tuning lives in the variant that uses it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Hybrid,
    Wave(WaveParams),
    Instant,
    Scanline,
    Queue,
    BoundaryRescan(RescanParams),
}

impl Engine {
    /// Every variant with default parameters.
    pub fn all() -> [Engine; 6] {
        [
            Engine::Hybrid,
            Engine::Wave(WaveParams::default()),
            Engine::Instant,
            Engine::Scanline,
            Engine::Queue,
            Engine::BoundaryRescan(RescanParams::default()),
        ]
    }

    /// The blocking engines that must agree pixel for pixel.
    pub fn exact_one_shot() -> [Engine; 4] {
        [Engine::Hybrid, Engine::Instant, Engine::Scanline, Engine::Queue]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Engine::Hybrid => "Hybrid",
            Engine::Wave(_) => "Ring Wave",
            Engine::Instant => "Instant",
            Engine::Scanline => "Scanline",
            Engine::Queue => "Queue BFS",
            Engine::BoundaryRescan(_) => "Boundary Rescan",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Engine::Hybrid => "v7-hybrid",
            Engine::Wave(_) => "v6-wave",
            Engine::Instant => "v5-instant",
            Engine::Scanline => "v4-scanline",
            Engine::Queue => "v3-queue",
            Engine::BoundaryRescan(_) => "boundary-rescan",
        }
    }

    pub fn from_tag(tag: &str) -> WandResult<Engine> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "v7-hybrid" | "hybrid" => Ok(Engine::Hybrid),
            "v6-wave" | "wave" => Ok(Engine::Wave(WaveParams::default())),
            "v5-instant" | "instant" => Ok(Engine::Instant),
            "v4-scanline" | "scanline" => Ok(Engine::Scanline),
            "v3-queue" | "queue" => Ok(Engine::Queue),
            "boundary-rescan" | "rescan" => Ok(Engine::BoundaryRescan(RescanParams::default())),
            _ => Err(WandError::UnknownEngine(tag.to_string())),
        }
    }

    /// Wave runs across frames; everything else completes in one call.
    pub fn is_incremental(&self) -> bool {
        matches!(self, Engine::Wave(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub engine: Engine,
    pub tolerance: u8,
    pub connectivity: Connectivity,
    /// false selects every matching pixel, connected or not.
    pub contiguous: bool,
    pub preview_enabled: bool,
    pub zero_latency_preview: bool,
    pub breathing_enabled: bool,
    pub preview_opacity: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine: Engine::Hybrid,
            tolerance: DEFAULT_TOLERANCE,
            connectivity: Connectivity::Four,
            contiguous: true,
            preview_enabled: true,
            zero_latency_preview: true,
            breathing_enabled: true,
            preview_opacity: 0.5,
        }
    }
}

impl EngineSettings {
    pub fn new(engine: Engine, tolerance: u8, connectivity: Connectivity) -> Self {
        Self {
            engine,
            tolerance,
            connectivity,
            ..Self::default()
        }
    }

    pub fn with_preview_opacity(mut self, opacity: f32) -> WandResult<Self> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(WandError::InvalidParameter {
                name: "preview_opacity",
                reason: format!("{} is outside 0..=1", opacity),
            });
        }
        self.preview_opacity = opacity;
        Ok(self)
    }

    /// Wave parameters, or defaults when another engine is selected.
    pub fn wave_params(&self) -> WaveParams {
        match self.engine {
            Engine::Wave(p) => p,
            _ => WaveParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_from_tag() {
        for engine in Engine::all() {
            assert_eq!(Engine::from_tag(engine.tag()).unwrap(), engine);
        }
        assert_eq!(Engine::from_tag(" Scanline ").unwrap(), Engine::Scanline);
        assert!(matches!(
            Engine::from_tag("v2-recursive"),
            Err(WandError::UnknownEngine(_))
        ));
    }

    #[test]
    fn parameters_are_validated_up_front() {
        assert!(WaveParams::new(0, 5).is_err());
        assert!(WaveParams::new(8, 0).is_err());
        assert_eq!(WaveParams::new(6, 3).unwrap().expansion_rate(), 3);
        assert!(RescanParams::new(8, 4).is_err());
        assert!(RescanParams::new(512, 0).is_err());
        assert!(EngineSettings::default().with_preview_opacity(1.5).is_err());
    }

    #[test]
    fn diagonal_offsets_only_for_eight() {
        assert_eq!(Connectivity::Four.offsets().len(), 4);
        assert_eq!(Connectivity::Eight.offsets().len(), 8);
        assert!(Connectivity::Four.offsets().iter().all(|(dx, dy)| dx.abs() + dy.abs() == 1));
        assert_eq!(Connectivity::from_u8(6), None);
    }
}
