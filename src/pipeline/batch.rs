//! Batched concurrent evaluation.
//!
//! Tasks are judged in consecutive fixed-size batches. Within a batch every
//! judge call runs concurrently; the next batch starts only after the current
//! one has been joined and appended to the verdict log, so a crash loses at
//! most the batch in flight.
//!
//! There is no timeout: a judge call that never returns stalls its batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{BatchProgress, EvidenceCheck, PipelineError, PipelineResult, RunSummary};
use super::writer::ResultWriter;
use crate::judge::Judge;
use crate::tasks::{Task, resolve_evidence};
use crate::verdict::Verdict;

/// Split `tasks` into consecutive groups of `batch_size`; the last may be shorter
pub fn partition(tasks: &[Task], batch_size: usize) -> PipelineResult<Vec<&[Task]>> {
    if batch_size == 0 {
        return Err(PipelineError::ZeroBatchSize);
    }
    Ok(tasks.chunks(batch_size).collect())
}

/// Resolve one task's evidence and judge it. Never fails: evidence problems
/// become an ERROR verdict.
pub async fn evaluate_task(judge: Arc<dyn Judge>, results_dir: PathBuf, task: Task) -> Verdict {
    match resolve_evidence(&results_dir, &task.id).await {
        Ok(evidence) => {
            judge
                .judge(&task, &evidence.response_text, evidence.screenshot.as_deref())
                .await
        }
        Err(e) => {
            warn!("Exception for task {}: {}", task.id, e);
            Verdict::error(&task.id, &task.web_name, format!("Exception occurred: {}", e))
        }
    }
}

/// Drives the judge over a task list, batch by batch
pub struct BatchOrchestrator {
    judge: Arc<dyn Judge>,
    batch_size: usize,
    results_dir: PathBuf,
    writer: ResultWriter,
}

impl BatchOrchestrator {
    pub fn new(
        judge: Arc<dyn Judge>,
        batch_size: usize,
        results_dir: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> PipelineResult<Self> {
        if batch_size == 0 {
            return Err(PipelineError::ZeroBatchSize);
        }
        Ok(Self {
            judge,
            batch_size,
            results_dir: results_dir.into(),
            writer: ResultWriter::new(output),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn output(&self) -> &Path {
        self.writer.path()
    }

    /// Judge every task and append the verdicts to the log
    pub async fn run_all(&self, tasks: &[Task]) -> PipelineResult<RunSummary> {
        self.run_all_with_progress(tasks, |_| {}).await
    }

    /// Judge every task, reporting progress after each step
    pub async fn run_all_with_progress<F>(
        &self,
        tasks: &[Task],
        mut on_progress: F,
    ) -> PipelineResult<RunSummary>
    where
        F: FnMut(BatchProgress),
    {
        let batches = partition(tasks, self.batch_size)?;
        let total = batches.len();
        let mut summary = RunSummary {
            tasks: tasks.len(),
            ..Default::default()
        };

        for (index, batch) in batches.into_iter().enumerate() {
            let number = index + 1;
            info!("Processing batch {}/{} ({} tasks)", number, total, batch.len());
            on_progress(BatchProgress::Started {
                batch: number,
                total,
                size: batch.len(),
            });

            let verdicts = self.run_batch(batch).await;
            let written = self.writer.append_batch(&verdicts).await?;
            summary.record(&verdicts);

            info!("Completed batch {}/{}", number, total);
            on_progress(BatchProgress::Written {
                batch: number,
                total,
                verdicts: written,
            });
        }

        info!(
            "All processing completed! Total results: {} (written to {})",
            summary.written,
            self.writer.path().display()
        );
        on_progress(BatchProgress::Finished(summary.clone()));
        Ok(summary)
    }

    /// Judge one batch concurrently and wait for all of it.
    ///
    /// Verdicts come back in the batch's order. A judge call that panics is
    /// recorded as an ERROR verdict instead of tearing down the batch.
    pub async fn run_batch(&self, batch: &[Task]) -> Vec<Verdict> {
        let handles: Vec<_> = batch
            .iter()
            .map(|task| {
                tokio::spawn(evaluate_task(
                    Arc::clone(&self.judge),
                    self.results_dir.clone(),
                    task.clone(),
                ))
            })
            .collect();

        let mut verdicts = Vec::with_capacity(batch.len());
        for (task, handle) in batch.iter().zip(handles) {
            let verdict = match handle.await {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!("Exception for task {}: {}", task.id, e);
                    Verdict::error(&task.id, &task.web_name, format!("Exception occurred: {}", e))
                }
            };
            verdicts.push(verdict);
        }
        verdicts
    }

    /// Resolve evidence for every task without calling the judge
    pub async fn check_evidence(&self, tasks: &[Task]) -> EvidenceCheck {
        let mut check = EvidenceCheck::default();
        for task in tasks {
            match resolve_evidence(&self.results_dir, &task.id).await {
                Ok(evidence) => {
                    check.ready += 1;
                    if evidence.screenshot.is_some() {
                        check.with_screenshot += 1;
                    }
                }
                Err(e) => {
                    warn!("Missing evidence for task {}: {}", task.id, e);
                    check.missing.push(task.id.clone());
                }
            }
        }
        check
    }
}
