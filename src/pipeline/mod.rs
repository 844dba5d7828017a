// Merge pipeline: ingestion, processing, storage, and the run that ties them together

pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod storage;
pub mod summary;

pub use orchestrator::{MergeOrchestrator, MergeOutcome};
