//! Pipeline configuration, JSON loading and pre-flight validation

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::export::{SceneGraphExportConfig, TilesExportConfig};
use crate::geo::Crs;
use crate::io::{InputConfig, InputMode};
use crate::lod::LodConfig;
use crate::simplify::StrategyConfig;

/// Exporter selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Scene-graph archive at `<out>/result.osgb`
    #[serde(rename = "osgb", alias = "osg")]
    Osgb,
    /// 3D Tiles under `<out>/3dtiles/`
    #[serde(rename = "3dtiles")]
    Tiles3d,
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "osgb" | "osg" => Ok(OutputFormat::Osgb),
            "3dtiles" | "tiles" => Ok(OutputFormat::Tiles3d),
            other => Err(Error::Config(format!("unknown output format '{other}'"))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Osgb => "osgb",
            OutputFormat::Tiles3d => "3dtiles",
        })
    }
}

/// Everything a pipeline run needs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub lod: LodConfig,
    /// Simplification strategy; a run without one fails validation
    pub strategy: Option<StrategyConfig>,
    pub output_directory: PathBuf,
    pub output_formats: Vec<OutputFormat>,
    pub tiles: TilesExportConfig,
    pub scene_graph: SceneGraphExportConfig,
    /// Build sibling subtrees on the worker pool
    pub enable_parallel_processing: bool,
    /// Worker pool size, 0 = host parallelism
    pub max_threads: usize,
    pub enable_progress_reporting: bool,
    /// Ignore geographic metadata and partition in model space
    pub force_geometric_mode: bool,
    pub mode: InputMode,
    /// Target CRS code, e.g. `EPSG:4326`
    pub crs: String,
    /// Validate and estimate only
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            lod: LodConfig::default(),
            strategy: Some(StrategyConfig::default()),
            output_directory: PathBuf::from("output"),
            output_formats: vec![OutputFormat::Tiles3d],
            tiles: TilesExportConfig::default(),
            scene_graph: SceneGraphExportConfig::default(),
            enable_parallel_processing: true,
            max_threads: 0,
            enable_progress_reporting: true,
            force_geometric_mode: false,
            mode: InputMode::Auto,
            crs: Crs::WGS84.to_string(),
            dry_run: false,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read config {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// Target CRS, checked against the allow-list
    pub fn target_crs(&self) -> Result<Crs> {
        Crs::supported(&self.crs)
    }

    /// Partition geographically?
    pub fn is_geographic(&self) -> bool {
        if self.force_geometric_mode {
            return false;
        }
        match self.mode {
            InputMode::Auto => self.input.is_geographic(),
            InputMode::Geo => true,
            InputMode::Geometric => false,
        }
    }

    /// Pre-flight checks; every failure is a `Config` error
    pub fn validate(&self) -> Result<()> {
        let paths = self.input.paths();
        if paths.is_empty() {
            return Err(Error::Config("no input files configured".into()));
        }
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(Error::Config(format!("input {} does not exist", missing.display())));
        }
        if self.output_formats.is_empty() {
            return Err(Error::Config("no output format selected".into()));
        }
        let strategy = self
            .strategy
            .as_ref()
            .ok_or_else(|| Error::Config("no simplification strategy configured".into()))?;
        match strategy {
            StrategyConfig::TriangleCount { reduction_ratio, .. }
            | StrategyConfig::VolumeThreshold { reduction_ratio, .. }
                if !(*reduction_ratio > 0.0 && *reduction_ratio < 1.0) =>
            {
                return Err(Error::Config(format!(
                    "reduction ratio {reduction_ratio} is outside (0, 1)"
                )));
            }
            StrategyConfig::TriangleCount { max_triangles_per_tile: 0, .. } => {
                return Err(Error::Config("max triangles per tile must be positive".into()));
            }
            _ => {}
        }
        self.target_crs()?;
        Ok(())
    }
}
