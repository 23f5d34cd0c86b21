//! Task corpus loading and per-task evidence resolution.
//!
//! The corpus is one JSON object per line. Each task's evidence lives next to
//! the agent's other outputs:
//!
//! ```text
//! {results_dir}/{id}.txt       final textual response (required)
//! {results_dir}/{id}/*.png     screenshots (optional, first by name is used)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::verdict::{non_empty_or_unknown, unknown_field};

/// Result type for task loading and evidence resolution
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors raised while loading tasks or their evidence
#[derive(Debug, Error)]
pub enum TaskError {
    /// A file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A corpus line is not a valid task object
    #[error("{}:{line}: invalid task: {source}", .path.display())]
    Corpus {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The impossible-task list is not a JSON array of strings
    #[error("{}: invalid impossible-task list: {source}", .path.display())]
    ImpossibleList {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A task from the corpus.
///
/// Only `id` and `web_name` are interpreted; the whole object is carried
/// through in corpus key order so the judge sees the task exactly as the
/// agent did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Task {
    pub id: String,

    /// Website name; a missing or null value reads as "unknown"
    pub web_name: String,

    /// The task object as read (`id`, `web_name`, `ques`, `web`, ...)
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct TaskIdentity {
    id: String,
    #[serde(default = "unknown_field", deserialize_with = "non_empty_or_unknown")]
    web_name: String,
}

impl Task {
    pub fn new(id: impl Into<String>, web_name: impl Into<String>) -> Self {
        let id = id.into();
        let web_name = web_name.into();
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.clone()));
        fields.insert("web_name".to_string(), Value::String(web_name.clone()));
        Self {
            id,
            web_name,
            fields,
        }
    }

    /// Attach an instruction field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The task as a JSON object, for embedding in the judge prompt
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"id\":{:?}}}", self.id))
    }
}

impl TryFrom<Map<String, Value>> for Task {
    type Error = serde_json::Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let identity: TaskIdentity = serde_json::from_value(Value::Object(fields.clone()))?;
        Ok(Self {
            id: identity.id,
            web_name: identity.web_name,
            fields,
        })
    }
}

impl From<Task> for Map<String, Value> {
    fn from(task: Task) -> Self {
        let mut fields = task.fields;
        // Existing keys keep their position
        fields.insert("id".to_string(), Value::String(task.id));
        fields.insert("web_name".to_string(), Value::String(task.web_name));
        fields
    }
}

/// Ids of tasks that cannot be achieved and are never evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImpossibleTaskSet {
    ids: HashSet<String>,
}

impl ImpossibleTaskSet {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ImpossibleTaskSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Read the impossible-task list (a JSON array of ids)
pub fn load_impossible_ids(path: &Path) -> TaskResult<ImpossibleTaskSet> {
    let content = read_file(path)?;
    let ids: Vec<String> =
        serde_json::from_str(&content).map_err(|source| TaskError::ImpossibleList {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(ids.into_iter().collect())
}

/// Read every task in the corpus, in line order. Blank lines are skipped;
/// any malformed line fails the whole load.
pub fn load_task_corpus(path: &Path) -> TaskResult<Vec<Task>> {
    let content = read_file(path)?;
    let mut tasks = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(line).map_err(|source| TaskError::Corpus {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        tasks.push(task);
    }

    Ok(tasks)
}

/// Load the corpus minus impossible tasks, preserving corpus order
pub fn load_tasks(corpus_path: &Path, impossible_path: &Path) -> TaskResult<Vec<Task>> {
    let impossible = load_impossible_ids(impossible_path)?;
    let tasks = load_task_corpus(corpus_path)?;
    let total = tasks.len();

    let kept = filter_impossible(tasks, &impossible);
    debug!(
        total,
        kept = kept.len(),
        impossible = impossible.len(),
        "loaded task corpus"
    );
    Ok(kept)
}

/// Drop every task whose id is in the impossible set
pub fn filter_impossible(tasks: Vec<Task>, impossible: &ImpossibleTaskSet) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| !impossible.contains(&task.id))
        .collect()
}

fn read_file(path: &Path) -> TaskResult<String> {
    std::fs::read_to_string(path).map_err(|source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Evidence
// ============================================================================

/// What the judge gets to see for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceBundle {
    /// The agent's final textual response
    pub response_text: String,
    /// Screenshot of the final page, if one was captured
    pub screenshot: Option<PathBuf>,
}

/// Path of a task's response text file
pub fn response_text_path(results_dir: &Path, task_id: &str) -> PathBuf {
    results_dir.join(format!("{}.txt", task_id))
}

/// Path of a task's screenshot directory
pub fn screenshot_dir(results_dir: &Path, task_id: &str) -> PathBuf {
    results_dir.join(task_id)
}

/// Pick the screenshot from a task's image directory.
///
/// Returns the lexicographically first `*.png` file name, or `None` when the
/// directory is missing or holds no PNG.
pub async fn find_screenshot(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut best: Option<String> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".png") {
            continue;
        }
        if best.as_ref().is_none_or(|current| name < *current) {
            best = Some(name);
        }
    }

    Ok(best.map(|name| dir.join(name)))
}

/// Assemble the evidence for one task.
///
/// A missing response text file is an error for this task. Problems with the
/// screenshot directory only mean no image is attached.
pub async fn resolve_evidence(results_dir: &Path, task_id: &str) -> TaskResult<EvidenceBundle> {
    let text_path = response_text_path(results_dir, task_id);
    let image_dir = screenshot_dir(results_dir, task_id);

    let screenshot = match find_screenshot(&image_dir).await {
        Ok(found) => found,
        Err(e) => {
            warn!(task = task_id, error = %e, "error accessing image directory");
            None
        }
    };

    tracing::info!(
        "Processing task {}: {}, {}",
        task_id,
        text_path.display(),
        screenshot
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "no screenshot".to_string())
    );

    let response_text = tokio::fs::read_to_string(&text_path)
        .await
        .map_err(|source| TaskError::Io {
            path: text_path.clone(),
            source,
        })?;

    Ok(EvidenceBundle {
        response_text,
        screenshot,
    })
}
