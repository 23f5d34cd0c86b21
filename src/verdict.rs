//! Verdict records written to and read from the verdict log.

use serde::{Deserialize, Deserializer, Serialize, de};

/// Fallback for a verdict whose task lacked an id or website name
pub const UNKNOWN_FIELD: &str = "unknown";

/// Classification of one task attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictResult {
    /// The agent accomplished the task
    Success,
    /// The agent did not accomplish the task
    Failed,
    /// The judge could not decide
    Unknown,
    /// The judge could not be consulted
    Error,
}

impl VerdictResult {
    /// Interpret the `result` field of a judge reply.
    ///
    /// The judge may only answer SUCCESS, FAILED or UNKNOWN. The rubric also
    /// mentions "NOT SUCCESS", which is read as FAILED.
    pub fn from_judge(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "SUCCESS" => Some(VerdictResult::Success),
            "FAILED" | "NOT SUCCESS" => Some(VerdictResult::Failed),
            "UNKNOWN" => Some(VerdictResult::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictResult::Success => "SUCCESS",
            VerdictResult::Failed => "FAILED",
            VerdictResult::Unknown => "UNKNOWN",
            VerdictResult::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for VerdictResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads the judge vocabulary plus ERROR, so logs carrying a raw
/// "NOT SUCCESS" still aggregate as FAILED.
impl<'de> Deserialize<'de> for VerdictResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        if value.trim().eq_ignore_ascii_case("ERROR") {
            return Ok(VerdictResult::Error);
        }
        VerdictResult::from_judge(&value).ok_or_else(|| {
            de::Error::unknown_variant(&value, &["SUCCESS", "FAILED", "NOT SUCCESS", "UNKNOWN", "ERROR"])
        })
    }
}

/// One line of the verdict log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Task id
    #[serde(default = "unknown_field", deserialize_with = "non_empty_or_unknown")]
    pub id: String,

    /// Website the task belongs to
    #[serde(default = "unknown_field", deserialize_with = "non_empty_or_unknown")]
    pub webname: String,

    /// The classification
    pub result: VerdictResult,

    /// Free-text justification or failure description
    #[serde(default)]
    pub reason: String,
}

impl Verdict {
    pub fn new(
        id: impl Into<String>,
        webname: impl Into<String>,
        result: VerdictResult,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: or_unknown(id.into()),
            webname: or_unknown(webname.into()),
            result,
            reason: reason.into(),
        }
    }

    /// An ERROR verdict recording why the judge could not be consulted
    pub fn error(id: impl Into<String>, webname: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(id, webname, VerdictResult::Error, reason)
    }

    pub fn is_success(&self) -> bool {
        self.result == VerdictResult::Success
    }
}

pub(crate) fn unknown_field() -> String {
    UNKNOWN_FIELD.to_string()
}

fn or_unknown(value: String) -> String {
    if value.trim().is_empty() {
        unknown_field()
    } else {
        value
    }
}

pub(crate) fn non_empty_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(or_unknown(value.unwrap_or_default()))
}
