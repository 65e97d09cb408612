// ============================================================================
// paintfe-heal CLI: headless healing strokes via command-line arguments
// ============================================================================
//
// Usage examples:
//   paintfe-heal -i scan.png --dab 120,80 -o clean.png
//   paintfe-heal -i scan.png --path "40,40 90,45 140,60" --radius 12 -o clean.png
//   paintfe-heal -i "scans/*.jpg" --stroke dust.hst --output-dir cleaned/
//   paintfe-heal -i scan.png --dab 10,10 --dab 30,12 --record dust.hst
//
// Every input is healed by one worker session, in order, with the same stroke.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::ops::heal::stroke::space_dabs;
use crate::ops::heal::{Dab, HealParams, HealQuality};
use crate::settings::HealSettings;
use crate::stroke_file::{StrokeRecord, load_stroke, save_stroke};
use crate::worker::{HealingEngine, PixelBuffer};
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Content-aware healing brush for batch image repair.
#[derive(Parser, Debug)]
#[command(
    name = "paintfe-heal",
    about = "Headless content-aware healing brush",
    long_about = "Apply a healing stroke (dust, scratch or spot removal) to image\n\
                  files without opening an editor. Dabs come from --dab, --path\n\
                  or a recorded --stroke file.\n\n\
                  Example:\n  \
                  paintfe-heal -i scan.png --dab 120,80 -o clean.png\n  \
                  paintfe-heal -i \"scans/*.jpg\" --stroke dust.hst --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "scans/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (original file names kept).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Dab center in image pixels. Repeatable.
    #[arg(long = "dab", value_name = "X,Y", value_parser = parse_point)]
    pub dabs: Vec<(f32, f32)>,

    /// Pointer path resampled into evenly spaced dabs.
    #[arg(long, value_name = "\"X,Y X,Y ...\"", value_parser = parse_path)]
    pub path: Option<PointPath>,

    /// Replay a recorded stroke (its parameters become the base set).
    #[arg(long, value_name = "FILE.hst")]
    pub stroke: Option<PathBuf>,

    /// Save the stroke that was applied.
    #[arg(long, value_name = "FILE.hst")]
    pub record: Option<PathBuf>,

    /// Parameter preset: preview or full.
    #[arg(long, value_name = "LEVEL", value_parser = parse_quality)]
    pub quality: Option<HealQuality>,

    #[arg(long, value_name = "PX")]
    pub radius: Option<i32>,

    /// Feather fraction (0–1).
    #[arg(long, value_name = "0-1")]
    pub feather: Option<f32>,

    /// Flow / opacity (0–1).
    #[arg(long, value_name = "0-1")]
    pub flow: Option<f32>,

    /// Gap between brush edge and sampling ring.
    #[arg(long, value_name = "PX")]
    pub gap: Option<i32>,

    #[arg(long, value_name = "PX")]
    pub sample_radius: Option<i32>,

    #[arg(long, value_name = "PX")]
    pub patch_size: Option<i32>,

    #[arg(long, value_name = "N")]
    pub patchmatch_iters: Option<u32>,

    /// Poisson relaxation passes (0 disables blending).
    #[arg(long, value_name = "N")]
    pub poisson_iters: Option<u32>,

    /// Dab spacing as a fraction of the radius (used by --path).
    #[arg(long, value_name = "FACTOR")]
    pub spacing: Option<f32>,

    /// Fixed RNG seed for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Settings file to read (and write with --save-settings) instead of the
    /// per-user default.
    #[arg(long, value_name = "FILE.cfg")]
    pub settings: Option<PathBuf>,

    /// Store the effective quality, overrides and seed as the new defaults.
    #[arg(long)]
    pub save_settings: bool,

    /// Log file location (defaults to the platform data directory).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// `base` with every explicit flag written over it.
    pub fn merged_settings(&self, base: &HealSettings) -> HealSettings {
        HealSettings {
            quality: self.quality.unwrap_or(base.quality),
            brush_radius: self.radius.or(base.brush_radius),
            feather: self.feather.or(base.feather),
            flow: self.flow.or(base.flow),
            gap: self.gap.or(base.gap),
            sample_radius: self.sample_radius.or(base.sample_radius),
            patch_size: self.patch_size.or(base.patch_size),
            patchmatch_iters: self.patchmatch_iters.or(base.patchmatch_iters),
            poisson_iters: self.poisson_iters.or(base.poisson_iters),
            spacing_factor: self.spacing.or(base.spacing_factor),
            seed: self.seed.or(base.seed),
        }
    }

    /// Resolve the parameter set: settings file, then recorded stroke, then
    /// explicit flags. A recording replaces the settings entirely; `--quality`
    /// on top of it only swaps the preset-owned fields.
    pub fn resolve_params(&self, settings: &HealSettings, recorded: Option<&HealParams>) -> HealParams {
        let mut p = match (recorded, self.quality) {
            (Some(r), None) => *r,
            (Some(r), Some(q)) => HealParams {
                sample_radius: q.sample_radius(),
                patchmatch_iters: q.patchmatch_iters(),
                poisson_iters: q.poisson_iters(),
                ..*r
            },
            (None, Some(q)) => HealSettings { quality: q, ..settings.clone() }.params(),
            (None, None) => settings.params(),
        };
        if let Some(v) = self.radius {
            p.brush_radius = v;
        }
        if let Some(v) = self.feather {
            p.feather = v;
        }
        if let Some(v) = self.flow {
            p.flow = v;
        }
        if let Some(v) = self.gap {
            p.gap = v;
        }
        if let Some(v) = self.sample_radius {
            p.sample_radius = v;
        }
        if let Some(v) = self.patch_size {
            p.patch_size = v;
        }
        if let Some(v) = self.patchmatch_iters {
            p.patchmatch_iters = v;
        }
        if let Some(v) = self.poisson_iters {
            p.poisson_iters = v;
        }
        if let Some(v) = self.spacing {
            p.spacing_factor = v;
        }
        p.normalized()
    }

    /// Dab sequence: recorded dabs first, then `--dab` points, then the
    /// spaced `--path`.
    pub fn collect_dabs(&self, recorded: Option<&StrokeRecord>, params: &HealParams) -> Vec<Option<Dab>> {
        let mut dabs: Vec<Option<Dab>> = recorded.map(|r| r.dabs.clone()).unwrap_or_default();
        dabs.extend(self.dabs.iter().map(|&(x, y)| Some(Dab::new(x, y))));
        if let Some(points) = &self.path {
            dabs.extend(space_dabs(&points.0, params).into_iter().map(Some));
        }
        dabs
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    // -- Stroke setup ----------------------------------------------------
    let recorded = match &args.stroke {
        Some(path) => match load_stroke(path) {
            Ok(r) => Some(r),
            Err(e) => {
                eprintln!("error: could not read stroke '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let settings_path = args.settings.clone().or_else(HealSettings::settings_path);
    let settings = match &settings_path {
        Some(path) => HealSettings::load_from(path),
        None => HealSettings::default(),
    };
    if args.save_settings {
        let Some(path) = &settings_path else {
            eprintln!("error: no settings location available on this platform.");
            return ExitCode::FAILURE;
        };
        if let Err(e) = args.merged_settings(&settings).save_to(path) {
            eprintln!("error: could not save settings '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        log_info!("settings saved to {}", path.display());
        if args.verbose {
            println!("settings saved → {}", path.display());
        }
    }
    let params = args.resolve_params(&settings, recorded.as_ref().map(|r| &r.params));
    let dabs = args.collect_dabs(recorded.as_ref(), &params);
    if dabs.iter().flatten().next().is_none() {
        eprintln!("error: no dabs given (use --dab, --path or --stroke).");
        return ExitCode::FAILURE;
    }
    log_info!(
        "stroke: {} dabs, radius {}, {} PatchMatch / {} Poisson iterations",
        dabs.len(),
        params.brush_radius,
        params.patchmatch_iters,
        params.poisson_iters
    );

    if let Some(path) = &args.record {
        let record = StrokeRecord::new(params, dabs.clone());
        if let Err(e) = save_stroke(&record, path) {
            eprintln!("error: could not write stroke '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        if args.verbose {
            println!("recorded {} dabs → {}", record.dab_count(), path.display());
        }
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    // -- Engine ----------------------------------------------------------
    let spawned = match args.seed.or(settings.seed) {
        Some(seed) => HealingEngine::spawn_seeded(seed),
        None => HealingEngine::spawn(),
    };
    let mut engine = match spawned.and_then(|mut e| e.init().map(|_| e)) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: could not start healing worker: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(&mut engine, input_path, &output_path, &dabs, params) {
            Ok(()) => {
                log_info!("healed {} → {}", input_path.display(), output_path.display());
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    engine.terminate();
    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    engine: &mut HealingEngine,
    input:  &Path,
    output: &Path,
    dabs:   &[Option<Dab>],
    params: HealParams,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let img = image::open(input)
        .map_err(|e| format!("load failed: {}", e))?
        .to_rgba8();
    let buffer = PixelBuffer::from_image(img).map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Heal on the worker ---------------------------------------
    let healed = engine
        .apply_stroke_on_roi(buffer, dabs.to_vec(), params)
        .map_err(|e| format!("heal failed: {}", e))?;

    // -- Step 3: Save ----------------------------------------------------
    let img = healed.into_image().map_err(|e| format!("save failed: {}", e))?;
    img.save(output).map_err(|e| format!("save failed: {}", e))?;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
pub fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, keeps the input file name)
/// 3. Fallback: next to the input as `<stem>_healed.<ext>`
pub fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    if let Some(dir) = output_dir {
        return Some(dir.join(input.file_name()?));
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("png");
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_healed.{}", stem, ext)))
}

/// Parse `"X,Y"` into a point.
pub fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("bad x coordinate in '{}'", s))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("bad y coordinate in '{}'", s))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("non-finite point '{}'", s));
    }
    Ok((x, y))
}

/// Pointer path given on the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct PointPath(pub Vec<(f32, f32)>);

/// Parse a whitespace-separated list of `X,Y` points.
pub fn parse_path(s: &str) -> Result<PointPath, String> {
    let points = s.split_whitespace().map(parse_point).collect::<Result<Vec<_>, _>>()?;
    if points.is_empty() {
        return Err("path has no points".to_string());
    }
    Ok(PointPath(points))
}

fn parse_quality(s: &str) -> Result<HealQuality, String> {
    HealQuality::parse(s).ok_or_else(|| format!("unknown quality '{}' (use preview or full)", s))
}
