//! Pipeline driver: configuration, resource estimate and stage sequencing

pub mod config;
pub mod driver;
pub mod estimate;

pub use config::{OutputFormat, PipelineConfig};
pub use driver::{LodPipeline, PipelineResult};
pub use estimate::{estimate_resources, ResourceEstimate};
