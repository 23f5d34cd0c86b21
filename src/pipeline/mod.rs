pub mod batch;
pub mod types;
pub mod writer;

pub use batch::{BatchOrchestrator, partition};
pub use types::{BatchProgress, EvidenceCheck, PipelineError, PipelineResult, RunSummary};
pub use writer::ResultWriter;
