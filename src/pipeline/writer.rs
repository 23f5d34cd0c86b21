//! Append-only JSON-lines persistence of verdicts.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::types::{PipelineError, PipelineResult};
use crate::verdict::Verdict;

/// Appends verdicts to the log, one JSON object per line
#[derive(Debug, Clone)]
pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one batch. The file is opened, written, flushed and closed
    /// within this call; an existing log is never truncated.
    pub async fn append_batch(&self, verdicts: &[Verdict]) -> PipelineResult<usize> {
        let mut buffer = Vec::new();
        for verdict in verdicts {
            serde_json::to_writer(&mut buffer, verdict)?;
            buffer.push(b'\n');
        }

        let write_err = |source: std::io::Error| PipelineError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;
        file.write_all(&buffer).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        file.sync_data().await.map_err(write_err)?;

        tracing::info!("Wrote {} results to {}", verdicts.len(), self.path.display());
        Ok(verdicts.len())
    }
}
