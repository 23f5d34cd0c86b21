//! Accuracy aggregation over a verdict log.
//!
//! Only SUCCESS counts as a positive; FAILED, UNKNOWN and ERROR all count
//! against the website. Every verdict line weighs the same, including
//! repeated verdicts for one task id left behind by reruns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::verdict::Verdict;

/// Result type for aggregation
pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid verdict: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Overall accuracy of zero verdicts is undefined
    #[error("verdict log is empty; accuracy is undefined")]
    EmptyLog,

    /// Accuracy of a website with zero verdicts is undefined
    #[error("website {0:?} has no verdicts; accuracy is undefined")]
    EmptySite(String),
}

/// Success ratio for one website
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteAccuracy {
    pub success: usize,
    /// Everything that is not SUCCESS
    pub failed: usize,
    pub accuracy: f64,
}

/// Overall and per-website success ratios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub total: usize,
    pub success: usize,
    pub accuracy: f64,
    pub by_website: BTreeMap<String, SiteAccuracy>,
}

/// Read every verdict in the log; blank lines are skipped
pub fn read_verdict_log(path: &Path) -> ReportResult<Vec<Verdict>> {
    let content = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| ReportError::Malformed {
                line: index + 1,
                source,
            })
        })
        .collect()
}

/// Aggregate a set of verdicts
pub fn accuracy_from_verdicts(verdicts: &[Verdict]) -> ReportResult<AccuracyReport> {
    if verdicts.is_empty() {
        return Err(ReportError::EmptyLog);
    }

    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut success = 0;

    for verdict in verdicts {
        let entry = counts.entry(verdict.webname.clone()).or_default();
        if verdict.is_success() {
            success += 1;
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut by_website = BTreeMap::new();
    for (webname, (site_success, site_failed)) in counts {
        let seen = site_success + site_failed;
        if seen == 0 {
            return Err(ReportError::EmptySite(webname));
        }
        by_website.insert(
            webname,
            SiteAccuracy {
                success: site_success,
                failed: site_failed,
                accuracy: site_success as f64 / seen as f64,
            },
        );
    }

    Ok(AccuracyReport {
        total: verdicts.len(),
        success,
        accuracy: success as f64 / verdicts.len() as f64,
        by_website,
    })
}

/// Read the verdict log at `path` and aggregate it
pub fn compute_accuracy(path: &Path) -> ReportResult<AccuracyReport> {
    let verdicts = read_verdict_log(path)?;
    accuracy_from_verdicts(&verdicts)
}

impl std::fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Web Agent accuracy: {:.4} ({}/{})",
            self.accuracy, self.success, self.total
        )?;
        writeln!(f, "Web Agent accuracy by website:")?;
        for (webname, site) in &self.by_website {
            writeln!(
                f,
                "\t{}: {:.4} ({}/{})",
                webname,
                site.accuracy,
                site.success,
                site.success + site.failed
            )?;
        }
        Ok(())
    }
}
