use std::path::{Path, PathBuf};

use crate::error::WandResult;
use crate::log_warn;
use crate::settings::{
    Connectivity, DEFAULT_TOLERANCE, Engine, EngineSettings, PROXY_MAX_DIM, PROXY_THRESHOLD,
    RescanParams, WaveParams,
};

const FILE_NAME: &str = "wandfe_settings.cfg";

/// Persisted wand preferences, one `key=value` per line.
#[derive(Clone, Debug, PartialEq)]
pub struct WandConfig {
    /// Engine tag, e.g. `v7-hybrid`.
    pub engine: String,
    pub tolerance: u8,
    pub connectivity: u8,
    pub contiguous: bool,
    pub wave_time_budget_ms: u32,
    pub wave_expansion_rate: u32,
    pub proxy_max_dim: u32,
    pub buffer_radius: u32,
    pub preview_enabled: bool,
    pub zero_latency_preview: bool,
    pub breathing_enabled: bool,
    pub preview_opacity: f32,
    /// Tolerance change per unit of scroll delta.
    pub tolerance_scroll_speed: f32,
    pub worker_enabled: bool,
    pub worker_threshold_pixels: usize,
}

impl Default for WandConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Hybrid.tag().to_string(),
            tolerance: DEFAULT_TOLERANCE,
            connectivity: 4,
            contiguous: true,
            wave_time_budget_ms: 8,
            wave_expansion_rate: 20,
            proxy_max_dim: PROXY_MAX_DIM,
            buffer_radius: 4,
            preview_enabled: true,
            zero_latency_preview: true,
            breathing_enabled: true,
            preview_opacity: 0.5,
            tolerance_scroll_speed: 0.5,
            worker_enabled: true,
            worker_threshold_pixels: PROXY_THRESHOLD,
        }
    }
}

impl WandConfig {
    /// Path to the settings file.
    /// On Linux:   ~/.config/wandfe/wandfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\WandFE\wandfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/WandFE/wandfe_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("wandfe");
            return Some(config_dir.join(FILE_NAME));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("WandFE").join(FILE_NAME));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("WandFE")
                    .join(FILE_NAME),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(FILE_NAME)))
        }
    }

    /// Load from the platform path; defaults if missing or unreadable.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn save(&self) -> WandResult<()> {
        match Self::settings_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log_warn!("Cannot read {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> WandResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Unknown keys are skipped and malformed values keep their default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        let d = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "engine" => {
                    s.engine = match Engine::from_tag(val) {
                        Ok(e) => e.tag().to_string(),
                        Err(_) => d.engine.clone(),
                    };
                }
                "tolerance" => s.tolerance = val.parse().unwrap_or(d.tolerance),
                "connectivity" => {
                    s.connectivity = val
                        .parse::<u8>()
                        .ok()
                        .and_then(Connectivity::from_u8)
                        .map_or(d.connectivity, Connectivity::as_u8);
                }
                "contiguous" => s.contiguous = parse_bool(val, d.contiguous),
                "wave_time_budget_ms" => {
                    s.wave_time_budget_ms = val.parse().unwrap_or(d.wave_time_budget_ms)
                }
                "wave_expansion_rate" => {
                    s.wave_expansion_rate = val.parse().unwrap_or(d.wave_expansion_rate)
                }
                "proxy_max_dim" => s.proxy_max_dim = val.parse().unwrap_or(d.proxy_max_dim),
                "buffer_radius" => s.buffer_radius = val.parse().unwrap_or(d.buffer_radius),
                "preview_enabled" => s.preview_enabled = parse_bool(val, d.preview_enabled),
                "zero_latency_preview" => {
                    s.zero_latency_preview = parse_bool(val, d.zero_latency_preview)
                }
                "breathing_enabled" => s.breathing_enabled = parse_bool(val, d.breathing_enabled),
                "preview_opacity" => {
                    s.preview_opacity = val
                        .parse::<f32>()
                        .ok()
                        .filter(|v| (0.0..=1.0).contains(v))
                        .unwrap_or(d.preview_opacity)
                }
                "tolerance_scroll_speed" => {
                    s.tolerance_scroll_speed = val
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .unwrap_or(d.tolerance_scroll_speed)
                }
                "worker_enabled" => s.worker_enabled = parse_bool(val, d.worker_enabled),
                "worker_threshold_pixels" => {
                    s.worker_threshold_pixels = val.parse().unwrap_or(d.worker_threshold_pixels)
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "engine={}\n\
             tolerance={}\n\
             connectivity={}\n\
             contiguous={}\n\
             wave_time_budget_ms={}\n\
             wave_expansion_rate={}\n\
             proxy_max_dim={}\n\
             buffer_radius={}\n\
             preview_enabled={}\n\
             zero_latency_preview={}\n\
             breathing_enabled={}\n\
             preview_opacity={}\n\
             tolerance_scroll_speed={}\n\
             worker_enabled={}\n\
             worker_threshold_pixels={}\n",
            self.engine,
            self.tolerance,
            self.connectivity,
            self.contiguous,
            self.wave_time_budget_ms,
            self.wave_expansion_rate,
            self.proxy_max_dim,
            self.buffer_radius,
            self.preview_enabled,
            self.zero_latency_preview,
            self.breathing_enabled,
            self.preview_opacity,
            self.tolerance_scroll_speed,
            self.worker_enabled,
            self.worker_threshold_pixels,
        )
    }

    /// `engine` carrying this config's wave or rescan tuning.
    pub fn tuned(&self, engine: Engine) -> WandResult<Engine> {
        Ok(match engine {
            Engine::Wave(_) => Engine::Wave(WaveParams::new(
                self.wave_time_budget_ms,
                self.wave_expansion_rate,
            )?),
            Engine::BoundaryRescan(_) => Engine::BoundaryRescan(RescanParams::new(
                self.proxy_max_dim,
                self.buffer_radius,
            )?),
            other => other,
        })
    }

    /// Validated engine settings. Fails on out-of-range engine tuning.
    pub fn engine_settings(&self) -> WandResult<EngineSettings> {
        let engine = self.tuned(Engine::from_tag(&self.engine)?)?;
        let connectivity = Connectivity::from_u8(self.connectivity).unwrap_or_default();
        let settings = EngineSettings {
            contiguous: self.contiguous,
            preview_enabled: self.preview_enabled,
            zero_latency_preview: self.zero_latency_preview,
            breathing_enabled: self.breathing_enabled,
            ..EngineSettings::new(engine, self.tolerance, connectivity)
        };
        settings.with_preview_opacity(self.preview_opacity)
    }
}

fn parse_bool(val: &str, default: bool) -> bool {
    match val {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}
