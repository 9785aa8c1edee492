//! FOMO Common - shared configuration, errors, and logging for the scanner.
//!
//! This crate provides:
//! - Configuration types, loading, and validation
//! - The unified error type
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    BatchConfig, Bounds, CoinGeckoConfig, Config, FilterConfig, HistoricalPattern,
    ObservabilityConfig, ScannerConfig, ScoringConfig, ScoringStrategy, ServerConfig,
};
pub use error::{Error, Result, ResultExt};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ScannerConfig, ScoringStrategy};
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
}
