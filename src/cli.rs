// ============================================================================
// WandFE CLI: headless magic wand selection via command-line arguments
// ============================================================================
//
// Usage examples:
//   WandFE -i photo.png --seed 120,80 -o mask.png
//   WandFE -i photo.png --seed 0,0 --tolerance 48 --connectivity 8 --engine v4-scanline
//   WandFE -i "shots/*.png" --seed 10,10 --global
//   WandFE -i photo.png --seed 5,5 --compare -v
//   WandFE -i photo.png --seed 5,5 --render frame.png --log wand.log
//
// Fills run synchronously on the current thread. Defaults come from the saved
// wand settings; flags override them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use crate::config::WandConfig;
use crate::fill::fill_with_engine;
use crate::raster::{FillResult, RasterBuffer};
use crate::render::{CpuSurface, Layer, RenderEngine};
use crate::settings::{Connectivity, Engine, EngineSettings};
use crate::{log_err, log_info, logger};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// WandFE headless magic wand.
///
/// Select a colour region from a seed pixel and write it as a grayscale mask.
#[derive(Parser, Debug)]
#[command(
    name = "WandFE",
    version,
    about = "WandFE headless magic wand selection",
    long_about = "Run a magic wand fill on image files and write the selection mask as\n\
                  an 8-bit grayscale PNG. Supports PNG, JPEG, WEBP, BMP, TGA and TIFF input.\n\n\
                  Example:\n  \
                  WandFE --input photo.png --seed 120,80 --output mask.png\n  \
                  WandFE -i *.png --seed 0,0 --tolerance 40 --engine scanline"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Seed pixel as X,Y. Points outside the image select nothing.
    #[arg(long, value_name = "X,Y", value_parser = parse_seed, allow_hyphen_values = true)]
    pub seed: (i32, i32),

    /// Colour distance threshold, 0-255.
    #[arg(short, long, value_name = "0-255")]
    pub tolerance: Option<u8>,

    /// Neighbourhood: 4 or 8.
    #[arg(short, long, value_name = "4|8", value_parser = parse_connectivity)]
    pub connectivity: Option<Connectivity>,

    /// Engine tag: v7-hybrid, v6-wave, v5-instant, v4-scanline, v3-queue, boundary-rescan.
    #[arg(short, long, value_name = "TAG", value_parser = parse_engine)]
    pub engine: Option<Engine>,

    /// Select every matching pixel, connected or not.
    #[arg(long)]
    pub global: bool,

    /// Mask output path. Only valid for single-file input; otherwise masks
    /// are written next to each input as `<stem>_mask.png`.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Run every exact one-shot engine and check that their masks agree.
    #[arg(long)]
    pub compare: bool,

    /// Also write one rendered frame (checkerboard, image, selection edge).
    #[arg(long, value_name = "FILE")]
    pub render: Option<PathBuf>,

    /// Write a session log to this path.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if let Some(path) = &args.log
        && !logger::init_at(path)
    {
        eprintln!("warning: could not open log file '{}'.", path.display());
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 && (args.output.is_some() || args.render.is_some()) {
        eprintln!(
            "error: {} input files given but --output/--render only accept a single file path.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let settings = match build_settings(&args, &WandConfig::load()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log_info!(
        "CLI run: {} input(s), engine {}, tol {}, conn {}",
        inputs.len(),
        settings.engine.tag(),
        settings.tolerance,
        settings.connectivity.as_u8()
    );

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let output_path = match &args.output {
            Some(p) => p.clone(),
            None => match default_output_path(input_path) {
                Some(p) => p,
                None => {
                    eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
                    any_failure = true;
                    continue;
                }
            },
        };

        let job = Job {
            input: input_path,
            output: &output_path,
            render: args.render.as_deref(),
            seed: args.seed,
            settings: &settings,
            compare: args.compare,
            verbose: args.verbose,
        };
        if let Err(e) = run_one(&job) {
            eprintln!("  error: {}", e);
            log_err!("{}: {}", input_path.display(), e);
            any_failure = true;
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

struct Job<'a> {
    input: &'a Path,
    output: &'a Path,
    render: Option<&'a Path>,
    seed: (i32, i32),
    settings: &'a EngineSettings,
    compare: bool,
    verbose: bool,
}

fn run_one(job: &Job<'_>) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let img = image::open(job.input)
        .map_err(|e| format!("load failed: {}", e))?
        .into_rgba8();
    let raster = RasterBuffer::from_rgba_image(img).map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Fill ----------------------------------------------------
    let (sx, sy) = job.seed;
    let result = fill_with_engine(&raster, sx, sy, job.settings);
    println!("  {}", summary(job.settings.engine, &result));

    if job.compare {
        compare_engines(&raster, job.seed, job.settings, job.verbose)?;
    }

    // -- Step 3: Save ----------------------------------------------------
    let gray = result
        .mask
        .to_gray_image()
        .ok_or_else(|| "mask has invalid dimensions".to_string())?;
    gray.save(job.output)
        .map_err(|e| format!("save failed: {}", e))?;
    if job.verbose {
        println!("  → {}", job.output.display());
    }

    if let Some(frame_path) = job.render {
        render_frame(raster, &result, frame_path)?;
        if job.verbose {
            println!("  → {}", frame_path.display());
        }
    }
    Ok(())
}

fn summary(engine: Engine, result: &FillResult) -> String {
    let b = result.bounds;
    format!(
        "{}: {} px, bounds {}x{} at ({}, {}), {} rings, {:.2}ms",
        engine.tag(),
        result.pixel_count(),
        b.width,
        b.height,
        b.x,
        b.y,
        result.rings,
        result.elapsed.as_secs_f64() * 1000.0
    )
}

fn compare_engines(
    raster: &RasterBuffer,
    seed: (i32, i32),
    settings: &EngineSettings,
    verbose: bool,
) -> Result<(), String> {
    let mut reference: Option<FillResult> = None;
    let mut mismatched = Vec::new();
    for engine in Engine::exact_one_shot() {
        let s = EngineSettings {
            engine,
            ..settings.clone()
        };
        let result = fill_with_engine(raster, seed.0, seed.1, &s);
        if verbose {
            println!("  {}", summary(engine, &result));
        }
        if let Some(first) = &reference {
            if first.mask != result.mask || first.bounds != result.bounds {
                mismatched.push(engine.tag());
            }
        } else {
            reference = Some(result);
        }
    }
    if mismatched.is_empty() {
        println!("  engines agree");
        Ok(())
    } else {
        Err(format!("engines disagree: {}", mismatched.join(", ")))
    }
}

fn render_frame(raster: RasterBuffer, result: &FillResult, path: &Path) -> Result<(), String> {
    let (w, h) = (raster.width(), raster.height());
    let img = raster
        .to_rgba_image()
        .ok_or_else(|| "raster has invalid dimensions".to_string())?;

    let mut engine = RenderEngine::new();
    engine.attach(w as f32, h as f32);
    engine.set_project_size(w, h);
    engine.set_layers(Arc::new(vec![Layer::new("image", img)]));
    if !result.is_empty() {
        engine.set_selection_mask(Some(Arc::new(result.mask.clone())));
    }
    engine.start();

    let mut surface = CpuSurface::new(w, h);
    engine.tick(Instant::now(), &mut surface);
    surface
        .to_rgba_image()
        .save(path)
        .map_err(|e| format!("render save failed: {}", e))
}

// ============================================================================
// Helpers
// ============================================================================

fn build_settings(args: &CliArgs, config: &WandConfig) -> Result<EngineSettings, String> {
    let mut settings = config.engine_settings().map_err(|e| e.to_string())?;
    if let Some(engine) = args.engine {
        settings.engine = config.tuned(engine).map_err(|e| e.to_string())?;
    }
    if let Some(tol) = args.tolerance {
        settings.tolerance = tol;
    }
    if let Some(conn) = args.connectivity {
        settings.connectivity = conn;
    }
    if args.global {
        settings.contiguous = false;
    }
    Ok(settings)
}

fn parse_seed(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse::<i32>().map_err(|e| format!("bad X '{}': {}", x, e))?;
    let y = y.trim().parse::<i32>().map_err(|e| format!("bad Y '{}': {}", y, e))?;
    Ok((x, y))
}

fn parse_connectivity(s: &str) -> Result<Connectivity, String> {
    s.trim()
        .parse::<u8>()
        .ok()
        .and_then(Connectivity::from_u8)
        .ok_or_else(|| format!("connectivity must be 4 or 8, got '{}'", s))
}

fn parse_engine(s: &str) -> Result<Engine, String> {
    Engine::from_tag(s).map_err(|e| e.to_string())
}

/// Literal paths and glob matches, first occurrence wins. Each pattern's
/// matches are sorted so batch runs write masks in a stable order; masks
/// left by an earlier run (`*_mask.png`) are not picked up by globs.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut inputs = Vec::new();
    for pattern in patterns {
        let literal = PathBuf::from(pattern);
        let found = if literal.is_file() {
            vec![literal]
        } else {
            match glob::glob(pattern) {
                Ok(paths) => {
                    let mut found: Vec<PathBuf> = paths
                        .flatten()
                        .filter(|p| p.is_file() && !is_mask_output(p))
                        .collect();
                    found.sort();
                    found
                }
                Err(e) => {
                    eprintln!("warning: invalid glob '{}': {}", pattern, e);
                    continue;
                }
            }
        };
        if found.is_empty() {
            eprintln!("warning: '{}' matched no image files.", pattern);
        }
        for path in found {
            if seen.insert(path.clone()) {
                inputs.push(path);
            }
        }
    }
    inputs
}

fn is_mask_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with("_mask"))
}

/// `<dir>/<stem>_mask.png` next to the input.
fn default_output_path(input: &Path) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_mask.png", stem)))
}
