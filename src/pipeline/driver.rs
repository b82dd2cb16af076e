//! Sequential load → preprocess → build → export driver

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::config::{OutputFormat, PipelineConfig};
use super::estimate::estimate_resources;
use crate::core::error::{Error, ErrorKind};
use crate::core::progress::{CancellationToken, ProgressReporter};
use crate::core::types::Result;
use crate::export::{SceneGraphExporter, TilesetExporter};
use crate::io::{load_input, LoadedInput};
use crate::lod::{LodBuilder, LodNode, LodStats};
use crate::mesh::Mesh;

/// Outcome of a pipeline run
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    pub stats: Option<LodStats>,
    /// Manifest and archive paths written by the exporters
    pub outputs: Vec<PathBuf>,
    pub elapsed: Duration,
}

pub struct LodPipeline {
    config: PipelineConfig,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl LodPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let progress = if config.enable_progress_reporting {
            ProgressReporter::logging()
        } else {
            ProgressReporter::silent()
        };
        Self {
            config,
            progress,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that cancels this pipeline when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every stage; failures are folded into the result
    pub fn run(&self) -> PipelineResult {
        let start = Instant::now();
        match self.run_inner() {
            Ok((stats, outputs)) => {
                let message = if self.config.dry_run {
                    "Dry run: configuration is valid".to_string()
                } else {
                    format!("Wrote {} output(s)", outputs.len())
                };
                log::info!("{message} in {:.2}s", start.elapsed().as_secs_f64());
                PipelineResult {
                    success: true,
                    error_kind: None,
                    message,
                    stats,
                    outputs,
                    elapsed: start.elapsed(),
                }
            }
            Err(e) => {
                log::error!("Pipeline failed ({}): {e}", e.kind());
                PipelineResult {
                    success: false,
                    error_kind: Some(e.kind()),
                    message: e.to_string(),
                    stats: None,
                    outputs: Vec::new(),
                    elapsed: start.elapsed(),
                }
            }
        }
    }

    fn run_inner(&self) -> Result<(Option<LodStats>, Vec<PathBuf>)> {
        self.config.validate()?;
        let estimate = estimate_resources(&self.config);
        log::info!(
            "Estimated: {}s processing, {} MB memory, {} MB output",
            estimate.time.as_secs(),
            estimate.memory_mb,
            estimate.output_mb
        );
        if self.config.dry_run {
            self.progress.report(1.0, "Dry run complete");
            return Ok((None, Vec::new()));
        }

        let threads = if self.config.max_threads > 0 {
            self.config.max_threads
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::Processing(format!("cannot create worker pool: {e}")))?;
        log::info!("Using {threads} worker thread(s)");

        pool.install(|| {
            let input = self.load()?;
            let input = self.preprocess(input)?;
            let root = self.build(&input)?;
            let outputs = self.export(&root)?;
            Ok((Some(LodStats::compute(&root)), outputs))
        })
    }

    fn load(&self) -> Result<LoadedInput> {
        self.cancel.check()?;
        self.progress.report(0.1, "Loading input");
        let crs = self.config.target_crs()?;
        let input = load_input(&self.config.input, crs, !self.config.is_geographic())?;
        self.progress.report(0.3, "Input loaded");
        Ok(input)
    }

    fn preprocess(&self, mut input: LoadedInput) -> Result<LoadedInput> {
        self.cancel.check()?;
        self.progress.report(0.4, "Preprocessing mesh");
        let cleaned = drop_degenerate(&input.mesh);
        let dropped = input.mesh.triangle_count() - cleaned.triangle_count();
        if dropped > 0 {
            log::warn!("Dropped {dropped} degenerate triangle(s)");
        }
        if cleaned.is_empty() {
            return Err(Error::Input("input has no usable triangles".into()));
        }
        input.mesh = cleaned;
        self.progress.report(0.5, "Preprocessing done");
        Ok(input)
    }

    fn build(&self, input: &LoadedInput) -> Result<LodNode> {
        self.cancel.check()?;
        self.progress.report(0.6, "Building LOD hierarchy");

        let strategy_config = self
            .config
            .strategy
            .as_ref()
            .ok_or_else(|| Error::Config("no simplification strategy configured".into()))?;
        let strategy = strategy_config.build();
        let mut lod = self.config.lod.clone();
        lod.enable_parallel_processing = self.config.enable_parallel_processing;

        let mut builder = LodBuilder::new(lod, strategy.as_ref()).with_cancellation(self.cancel.clone());
        if let Some(budget) = strategy_config.max_triangles_per_tile() {
            builder = builder.with_tile_budget(budget);
        }
        log::info!(
            "Strategy {}, {} partitioning",
            strategy.name(),
            if self.config.is_geographic() { "geographic" } else { "geometric" }
        );

        let root = if self.config.is_geographic() {
            builder.build_geographic(&input.mesh, None)?
        } else {
            builder.build_geometric(&input.mesh, None)?
        };
        self.progress.report(0.8, "LOD hierarchy built");
        Ok(root)
    }

    fn export(&self, root: &LodNode) -> Result<Vec<PathBuf>> {
        self.cancel.check()?;
        self.progress.report(0.85, "Exporting");
        let out = &self.config.output_directory;
        std::fs::create_dir_all(out)?;

        let mut seen = HashSet::new();
        let mut formats = self.config.output_formats.clone();
        formats.retain(|f| seen.insert(*f));
        let step = 0.15 / formats.len() as f64;
        let mut outputs = Vec::new();
        for (i, format) in formats.iter().enumerate() {
            self.cancel.check()?;
            match format {
                OutputFormat::Tiles3d => {
                    let exporter = TilesetExporter::new(self.config.tiles.clone());
                    let written = exporter.export(root, &out.join("3dtiles"))?;
                    outputs.push(written.tileset_path);
                }
                OutputFormat::Osgb => {
                    let exporter = SceneGraphExporter::new(self.config.scene_graph.clone());
                    let path = out.join("result.osgb");
                    exporter.export(root, &path)?;
                    outputs.push(path);
                    if self.config.scene_graph.hierarchical {
                        exporter.export_hierarchical(root, &out.join("osgb"))?;
                    }
                }
            }
            self.progress.report(0.85 + step * (i + 1) as f64, &format!("Exported {format}"));
        }
        Ok(outputs)
    }
}

/// Remove triangles that repeat a vertex index and unreferenced vertices
fn drop_degenerate(mesh: &Mesh) -> Mesh {
    let indices: Vec<u32> = mesh
        .indices()
        .chunks_exact(3)
        .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
        .flatten()
        .copied()
        .collect();
    if indices.len() == mesh.indices().len() && mesh.is_compact() {
        return mesh.clone();
    }
    mesh.compact(&indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::io::{write_ply, Encoding, InputConfig};
    use crate::simplify::StrategyConfig;
    use std::sync::{Arc, Mutex};

    fn grid(n: usize) -> Mesh {
        let mut positions = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                positions.push(Vec3::new(x as f32, y as f32, ((x * y) % 5) as f32 * 0.1));
            }
        }
        let row = (n + 1) as u32;
        let mut indices = Vec::new();
        for y in 0..n as u32 {
            for x in 0..n as u32 {
                let i = y * row + x;
                indices.extend_from_slice(&[i, i + 1, i + row + 1, i, i + row + 1, i + row]);
            }
        }
        Mesh::from_positions(positions, indices).unwrap()
    }

    fn config(dir: &std::path::Path) -> PipelineConfig {
        let ply = dir.join("scan.ply");
        write_ply(&ply, &grid(20), Encoding::BinaryLittleEndian).unwrap();
        PipelineConfig {
            input: InputConfig::Single(ply),
            output_directory: dir.join("out"),
            output_formats: vec![OutputFormat::Tiles3d, OutputFormat::Osgb],
            strategy: Some(StrategyConfig::TriangleCount {
                max_triangles_per_tile: 100,
                reduction_ratio: 0.5,
            }),
            enable_progress_reporting: false,
            max_threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_full_run_writes_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let pipeline = LodPipeline::new(config(dir.path()))
            .with_progress(ProgressReporter::with_callback(Arc::new(move |f: f64, _: &str| sink.lock().unwrap().push(f))));

        let result = pipeline.run();
        assert!(result.success, "{}", result.message);
        assert_eq!(result.error_kind, None);
        let out = dir.path().join("out");
        assert_eq!(result.outputs, vec![out.join("3dtiles/tileset.json"), out.join("result.osgb")]);
        assert!(out.join("3dtiles/tiles/level_0_0.b3dm").exists());

        let stats = result.stats.unwrap();
        assert!(stats.total_nodes > 1);
        assert!(stats.max_depth >= 1);

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.first().copied(), Some(0.1));
        assert!((seen.last().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig { dry_run: true, ..config(dir.path()) };
        let result = LodPipeline::new(cfg).run();
        assert!(result.success);
        assert!(result.outputs.is_empty());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_input_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            input: InputConfig::Single(dir.path().join("nope.ply")),
            ..config(dir.path())
        };
        let result = LodPipeline::new(cfg).run();
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Config));
    }

    #[test]
    fn test_unreadable_ply_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        std::fs::write(dir.path().join("scan.ply"), "ply\nformat ascii 9.9\nend_header\n").unwrap();
        let result = LodPipeline::new(cfg).run();
        assert_eq!(result.error_kind, Some(ErrorKind::Input));
        assert!(!dir.path().join("out/3dtiles/tileset.json").exists());
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = LodPipeline::new(config(dir.path()));
        pipeline.cancellation_token().cancel();
        let result = pipeline.run();
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    }

    #[test]
    fn test_drop_degenerate() {
        let mesh = Mesh::from_positions(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE],
            vec![0, 1, 2, 2, 2, 3],
        )
        .unwrap();
        let cleaned = drop_degenerate(&mesh);
        assert_eq!(cleaned.triangle_count(), 1);
        assert_eq!(cleaned.vertex_count(), 3);
    }
}
