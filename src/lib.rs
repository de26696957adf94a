//! Magic wand segmentation engine.
//!
//! Colour-tolerance region fills from a seed pixel ([`fill`]), an incremental
//! ring-by-ring variant for animated previews ([`wave`]), a scheduler that
//! keeps one preview alive across frames ([`preview`]), and the dirty-flag
//! render cache that draws previews and selections ([`render`]). [`wand`]
//! ties them to pointer input.

pub mod logger;

pub mod cli;
pub mod config;
pub mod coords;
pub mod error;
pub mod fill;
pub mod preview;
pub mod raster;
pub mod render;
pub mod settings;
pub mod wand;
pub mod wave;

pub use error::{WandError, WandResult};
pub use fill::fill_with_engine;
pub use raster::{Bounds, FillResult, Mask, RasterBuffer};
pub use settings::{Connectivity, Engine, EngineSettings, RescanParams, WaveParams};
