//! plylod - builds LOD tilesets and scene-graph archives from PLY meshes
//!
//! Usage: cargo run --release --bin plylod -- --input <PLY|LIST> [OPTIONS]
//!
//! A `.ply` input is loaded directly; any other file is read as an input list:
//!
//!   # geographic: path lon lat [alt] [crs]
//!   tiles/a.ply 116.39 39.91 45.0 EPSG:4326
//!   # geometric (with --mode geometric): path [x y z]
//!   parts/b.ply 10 0 0
//!
//! In auto mode a list with coordinates is geographic; bare paths are geometric.
//!
//! Output structure:
//!   <output>/
//!     3dtiles/tileset.json
//!     3dtiles/tiles/level_<l>_<id>.b3dm
//!     result.osgb

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use plylod::core::logging::{self, LogSettings};
use plylod::io::{InputConfig, InputMode};
use plylod::pipeline::{LodPipeline, OutputFormat, PipelineConfig, PipelineResult};
use plylod::simplify::StrategyConfig;

/// Level-of-detail builder for PLY meshes
#[derive(Parser, Debug)]
#[command(name = "plylod", version, about)]
struct Args {
    /// PLY file or input list
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory [default: output]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format, repeatable: 3dtiles, osgb [default: 3dtiles]
    #[arg(short, long = "format", value_name = "FORMAT")]
    formats: Vec<OutputFormat>,

    /// Partitioning mode: auto, geo, geometric
    #[arg(short, long)]
    mode: Option<InputMode>,

    /// Target CRS [default: EPSG:4326]
    #[arg(long)]
    crs: Option<String>,

    /// Triangle budget per tile [default: 50000]
    #[arg(long)]
    max_triangles: Option<usize>,

    /// Deepest LOD level [default: 8]
    #[arg(long)]
    max_levels: Option<u32>,

    /// Per-level triangle reduction in (0, 1) [default: 0.5]
    #[arg(long)]
    reduction_ratio: Option<f64>,

    /// Partition-guided octree construction [default: true]
    #[arg(long, value_name = "BOOL")]
    use_octree: Option<bool>,

    /// Build sibling subtrees in parallel [default: true]
    #[arg(long, value_name = "BOOL")]
    parallel: Option<bool>,

    /// Worker threads, 0 = all cores [default: 0]
    #[arg(long)]
    max_threads: Option<usize>,

    /// JSON pipeline config; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    /// Write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable progress reports
    #[arg(long)]
    no_progress: bool,

    /// Validate configuration and estimate resources only
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Merge flags into the file config (or defaults)
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(input) = &self.input {
            config.input = InputConfig::detect(input, config.mode)
                .with_context(|| format!("reading input {}", input.display()))?;
        }
        if let Some(output) = &self.output {
            config.output_directory = output.clone();
        }
        if !self.formats.is_empty() {
            config.output_formats = self.formats.clone();
        }
        if let Some(crs) = &self.crs {
            config.crs = crs.clone();
        }
        if let Some(levels) = self.max_levels {
            config.lod.max_lod_levels = levels;
        }
        if let Some(octree) = self.use_octree {
            config.lod.use_octree_subdivision = octree;
        }
        if let Some(parallel) = self.parallel {
            config.enable_parallel_processing = parallel;
        }
        if let Some(threads) = self.max_threads {
            config.max_threads = threads;
        }
        if self.no_progress {
            config.enable_progress_reporting = false;
        }
        if self.dry_run {
            config.dry_run = true;
        }

        if self.max_triangles.is_some() || self.reduction_ratio.is_some() {
            let (budget, ratio) = match config.strategy {
                Some(StrategyConfig::TriangleCount { max_triangles_per_tile, reduction_ratio }) => {
                    (max_triangles_per_tile, reduction_ratio)
                }
                _ => (50_000, 0.5),
            };
            config.strategy = Some(StrategyConfig::TriangleCount {
                max_triangles_per_tile: self.max_triangles.unwrap_or(budget),
                reduction_ratio: self.reduction_ratio.unwrap_or(ratio),
            });
        }
        Ok(config)
    }
}

fn print_summary(config: &PipelineConfig, result: &PipelineResult) {
    println!();
    if !result.success {
        let kind = result.error_kind.map(|k| k.to_string()).unwrap_or_default();
        println!("=== plylod failed: {kind} ===");
        println!("{}", result.message);
        return;
    }
    println!("=== plylod ===");
    println!("Mode:      {}", if config.is_geographic() { "geographic" } else { "geometric" });
    if let Some(stats) = &result.stats {
        println!("Nodes:     {}", stats.total_nodes);
        println!("Leaves:    {}", stats.leaf_nodes);
        println!("Triangles: {}", stats.total_triangles);
        println!("Depth:     {}", stats.max_depth);
        for (level, (nodes, tris)) in stats.nodes_per_level.iter().zip(&stats.triangles_per_level).enumerate() {
            println!("  level {level}: {nodes} nodes, {tris} triangles");
        }
    }
    println!("Time:      {:.2}s", result.elapsed.as_secs_f64());
    if result.outputs.is_empty() {
        println!("Outputs:   none ({})", result.message);
    } else {
        println!("Outputs:");
        for path in &result.outputs {
            println!("  {}", path.display());
        }
    }
}

fn run(args: &Args) -> Result<bool> {
    let mut settings = LogSettings::from_flags(args.verbose, args.quiet);
    settings.log_file = args.log_file.clone();
    logging::init_with(&settings).context("opening log file")?;

    let config = args.pipeline_config()?;
    let pipeline = LodPipeline::new(config);
    let result = pipeline.run();
    print_summary(pipeline.config(), &result);
    Ok(result.success)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
