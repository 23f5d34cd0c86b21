use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::verdict::{Verdict, VerdictResult};

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that stop an evaluation run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Batches must hold at least one task
    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    /// The verdict log could not be appended to
    #[error("failed to write verdicts to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A verdict could not be serialized
    #[error("failed to serialize verdict: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Progress update during an evaluation run
#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
    /// A batch is about to be dispatched (1-based number)
    Started { batch: usize, total: usize, size: usize },
    /// A batch's verdicts were appended to the log
    Written { batch: usize, total: usize, verdicts: usize },
    /// Every batch is done
    Finished(RunSummary),
}

/// Totals for one evaluation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tasks handed to the orchestrator
    pub tasks: usize,
    /// Batches processed
    pub batches: usize,
    /// Verdict lines appended to the log
    pub written: usize,
    /// ERROR verdicts, where the judge or the evidence could not be consulted
    pub errors: usize,
    /// Verdicts per result
    pub by_result: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn record(&mut self, verdicts: &[Verdict]) {
        self.batches += 1;
        self.written += verdicts.len();
        for verdict in verdicts {
            if verdict.result == VerdictResult::Error {
                self.errors += 1;
            }
            *self
                .by_result
                .entry(verdict.result.as_str().to_string())
                .or_default() += 1;
        }
    }

    pub fn count(&self, result: VerdictResult) -> usize {
        self.by_result.get(result.as_str()).copied().unwrap_or(0)
    }
}

/// Outcome of resolving evidence for every task without judging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceCheck {
    /// Tasks whose response text was found
    pub ready: usize,
    /// Of those, tasks with a screenshot attached
    pub with_screenshot: usize,
    /// Ids whose evidence could not be resolved
    pub missing: Vec<String>,
}
