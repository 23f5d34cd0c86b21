//! Voyager Judge - LLM-judged evaluation of web-agent task attempts.
//!
//! This crate provides:
//! - Task corpus loading with impossible-task filtering
//! - Evidence resolution (response text plus optional screenshot per task)
//! - A multimodal judge client classifying attempts as SUCCESS/FAILED/UNKNOWN
//! - Batched concurrent evaluation with per-batch append to a JSON-lines log
//! - Overall and per-website accuracy aggregation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use voyager_judge::{BatchOrchestrator, JudgeConfig, OpenAiJudge, load_tasks};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let tasks = load_tasks(
//!     Path::new("WebVoyager_data.jsonl"),
//!     Path::new("WebVoyagerImpossibleTasks.json"),
//! )?;
//! let judge = Arc::new(OpenAiJudge::new(JudgeConfig::default()));
//! let orchestrator = BatchOrchestrator::new(judge, 10, "results", "webvoyager_eval.jsonl")?;
//! orchestrator.run_all(&tasks).await?;
//!
//! let report = voyager_judge::compute_accuracy(Path::new("webvoyager_eval.jsonl"))?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod judge;
pub mod pipeline;
pub mod report;
pub mod tasks;
pub mod verdict;

// Re-export judge client
pub use judge::{Judge, JudgeConfig, JudgeError, JudgeResult, OpenAiJudge};

// Re-export task loading
pub use tasks::{
    EvidenceBundle, ImpossibleTaskSet, Task, TaskError, TaskResult, load_impossible_ids,
    load_task_corpus, load_tasks, resolve_evidence,
};

// Re-export pipeline types
pub use pipeline::{
    BatchOrchestrator, BatchProgress, EvidenceCheck, PipelineError, PipelineResult, ResultWriter,
    RunSummary,
};

// Re-export aggregation
pub use report::{AccuracyReport, ReportError, ReportResult, SiteAccuracy, compute_accuracy};

pub use verdict::{Verdict, VerdictResult};
