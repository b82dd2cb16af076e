//! Progress reporting and cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::error::Error;
use super::types::Result;

/// Callback receiving (fraction in [0,1], message)
pub type ProgressCallback = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// Shared cancellation flag
///
/// Cloning shares the flag. Work checks it at stage boundaries and before
/// each node subdivision; in-flight node work is allowed to finish.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Return `Err(Error::Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Monotone progress sink
///
/// Reported fractions never decrease: a report below the current maximum is
/// clamped up to it. Without a callback, progress goes to the `log` facade.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    /// f64 bits of the highest fraction reported so far
    current: Arc<AtomicU64>,
    enabled: bool,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .field("current", &self.current())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ProgressReporter {
    /// Reporter that logs progress at `info` level
    pub fn logging() -> Self {
        Self {
            callback: None,
            current: Arc::new(AtomicU64::new(0f64.to_bits())),
            enabled: true,
        }
    }

    /// Reporter forwarding to a callback
    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            current: Arc::new(AtomicU64::new(0f64.to_bits())),
            enabled: true,
        }
    }

    /// Reporter that drops every report
    pub fn silent() -> Self {
        Self {
            callback: None,
            current: Arc::new(AtomicU64::new(0f64.to_bits())),
            enabled: false,
        }
    }

    /// Highest fraction reported so far
    pub fn current(&self) -> f64 {
        f64::from_bits(self.current.load(Ordering::Acquire))
    }

    /// Report progress; returns the fraction actually published
    pub fn report(&self, fraction: f64, message: &str) -> f64 {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };

        let mut prev = self.current.load(Ordering::Acquire);
        let published = loop {
            let prev_value = f64::from_bits(prev);
            if fraction <= prev_value {
                break prev_value;
            }
            match self.current.compare_exchange_weak(
                prev,
                fraction.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break fraction,
                Err(actual) => prev = actual,
            }
        };

        if self.enabled {
            match &self.callback {
                Some(callback) => callback(published, message),
                None => log::info!("[{:>5.1}%] {}", published * 100.0, message),
            }
        }
        published
    }
}
