pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod types;

pub use config::Config;
pub use error::{MergeError, Result};
pub use pipeline::processing::conflation::{Linkage, Matcher};
pub use pipeline::processing::normalize::{LookupTables, Normalizer};
pub use pipeline::{MergeOrchestrator, MergeOutcome};
