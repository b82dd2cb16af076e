//! Core types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod progress;

pub use types::*;
pub use error::{Error, ErrorKind};
pub use progress::{CancellationToken, ProgressReporter};
