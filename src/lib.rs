//! Era comparison of technical-debt signals in GitHub repositories.
//!
//! Repositories are split into two cohorts by creation date. Commit messages
//! are classified against a versioned pattern table and folded into per-era
//! aggregates; the fold is order-independent and partial results merge.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod collect;
pub mod config;
pub mod era;
pub mod error;
pub mod github;
pub mod logging;
pub mod model;
pub mod report;
pub mod signal;
pub mod stats;
pub mod util;

pub use aggregate::{EraAccumulator, EraPartial};
pub use config::AnalysisConfig;
pub use era::{classify_era, Era};
pub use error::{DebtError, Result};
pub use signal::{PatternTable, SignalCategory};
