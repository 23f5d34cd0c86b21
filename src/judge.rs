//! Multimodal LLM judge client.
//!
//! Sends one task, the agent's textual response and an optional screenshot
//! to the judge model and reads back a JSON verdict. The request follows the
//! OpenAI Responses API shape (`input_text` / `input_image` parts, JSON
//! object output). Replies in chat-completions shape are also understood so
//! OpenAI-compatible local servers can stand in for the hosted API.
//!
//! # Configuration
//!
//! - `VOYAGER_JUDGE_ENDPOINT`: API endpoint URL
//! - `VOYAGER_JUDGE_MODEL`: Model name
//! - `VOYAGER_JUDGE_REFERENCE_DATE`: "Today" as stated in the rubric
//! - `OPENAI_API_KEY`: Bearer token

use async_trait::async_trait;
use base64::Engine;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config;
use crate::tasks::Task;
use crate::verdict::{Verdict, VerdictResult};

/// Result type for judge operations
pub type JudgeResult<T> = Result<T, JudgeError>;

/// Errors that can occur while consulting the judge
#[derive(Debug, Error)]
pub enum JudgeError {
    /// Transport-level failure
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("judge API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The screenshot could not be read
    #[error("failed to read screenshot {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The reply did not carry a usable verdict
    #[error("invalid judge reply: {0}")]
    InvalidReply(String),
}

/// Something that can classify a task attempt.
///
/// Implementations never fail: problems are reported as an ERROR verdict so
/// that one bad task cannot take down its batch.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, task: &Task, response_text: &str, image: Option<&Path>) -> Verdict;
}

/// Configuration for the judge client
#[derive(Clone)]
pub struct JudgeConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name to use
    pub model: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Date the rubric tells the judge it is
    pub reference_date: String,
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("reference_date", &self.reference_date)
            .finish()
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            endpoint: cfg.judge.endpoint.clone(),
            model: cfg.judge.model.clone(),
            api_key: cfg.judge.api_key.clone(),
            reference_date: cfg.judge.reference_date.clone(),
        }
    }
}

impl JudgeConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn reference_date(mut self, date: impl Into<String>) -> Self {
        self.reference_date = date.into();
        self
    }
}

/// Judge backed by an OpenAI-style HTTP API
pub struct OpenAiJudge {
    client: reqwest::Client,
    config: JudgeConfig,
}

impl OpenAiJudge {
    pub fn new(config: JudgeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    async fn try_judge(
        &self,
        task: &Task,
        response_text: &str,
        image: Option<&Path>,
    ) -> JudgeResult<Verdict> {
        let image = match image {
            Some(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| JudgeError::Image {
                    path: path.display().to_string(),
                    source,
                })?;
                Some(encode_image(&bytes))
            }
            None => None,
        };

        let request = build_request(&self.config, task, response_text, image.as_deref());

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(JudgeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| JudgeError::InvalidReply(format!("response body is not JSON: {}", e)))?;
        let text = extract_output_text(&reply)
            .ok_or_else(|| JudgeError::InvalidReply("no output text in response".to_string()))?;

        debug!(task = %task.id, reply = %text, "judge replied");
        parse_verdict(task, &text)
    }
}

#[async_trait]
impl Judge for OpenAiJudge {
    async fn judge(&self, task: &Task, response_text: &str, image: Option<&Path>) -> Verdict {
        match self.try_judge(task, response_text, image).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Error evaluating task {}: {}", task.id, e);
                Verdict::error(&task.id, &task.web_name, format!("Evaluation failed: {}", e))
            }
        }
    }
}

// ============================================================================
// Prompt and request construction
// ============================================================================

const RUBRIC: &str = r#"As an evaluator, you will be presented with three primary components to assist you in your role:

1. Web Task Instruction: a clear and specific directive in natural language describing the online activity to carry out. It may involve searching, verifying information, comparing prices, checking availability, or any other action on the specified web service (such as Amazon, Apple, ArXiv, BBC News, Booking etc).

2. Result Screenshot: a visual representation of the screen showing the result or an intermediate state of the web task. It is visual proof of the actions taken and may not show everything the agent saw.

3. Result Response: the textual response produced after executing the web task.

-- You DO NOT NEED to interact with web pages or perform actions such as booking flights or conducting searches.
-- You SHOULD NOT make assumptions based on information not presented in the screenshot. If nothing in the screenshot matches the instruction, you can believe the information in the response.
-- Your primary responsibility is to assess the web task instruction against the outcome shown in the screenshot and in the response, and decide whether the actions taken align with the instruction.
-- NOTE that the instruction may involve more than one task, for example locating a garage and summarizing its reviews. Failing either part, such as not providing the summary, is unsuccessful.
-- NOTE that the screenshot is authentic, while the response was written by an LLM at the end of browsing, so the two may disagree.

## Resolving disagreements:
1) If the response contradicts the screenshot, the screenshot prevails.
2) If the response mentions content that does not appear on the screenshot, believe the response.
3) If you are not sure whether to believe the response, answer UNKNOWN.

Explain how you arrived at your evaluation, then give a definitive verdict: 'SUCCESS', 'NOT SUCCESS', or 'UNKNOWN'.

IMPORTANT CONTEXT:
- Today's date is {date}. Newer information may be unknown to you.

Return your response in the following JSON format:
{
    "result": "SUCCESS" or "FAILED" or "UNKNOWN",
    "reason": "evaluation reason"
}"#;

/// The evaluation rubric sent as the system message
pub fn system_prompt(reference_date: &str) -> String {
    RUBRIC.replace("{date}", reference_date)
}

/// The per-task user prompt: the task object and the agent's response
pub fn build_user_prompt(task: &Task, response_text: &str) -> String {
    format!("TASK: {}\nResult Response: {}\n", task.to_json(), response_text)
}

/// Encode image bytes as a data URL, labelled with the detected format
pub fn encode_image(bytes: &[u8]) -> String {
    let mime = match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/png",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

/// Compose the judge request. `image_url` is an already-encoded data URL.
pub fn build_request(
    config: &JudgeConfig,
    task: &Task,
    response_text: &str,
    image_url: Option<&str>,
) -> serde_json::Value {
    let mut content = vec![serde_json::json!({
        "type": "input_text",
        "text": build_user_prompt(task, response_text),
    })];

    if let Some(url) = image_url {
        content.push(serde_json::json!({
            "type": "input_image",
            "image_url": url,
        }));
    }

    serde_json::json!({
        "model": config.model,
        "input": [
            {
                "role": "system",
                "content": system_prompt(&config.reference_date),
            },
            {
                "role": "user",
                "content": content,
            }
        ],
        "text": { "format": { "type": "json_object" } }
    })
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Pull the model's text out of an API response
pub fn extract_output_text(response: &serde_json::Value) -> Option<String> {
    if let Some(text) = response["output_text"].as_str() {
        return Some(text.to_string());
    }

    // Responses API: output[].content[] items of type output_text
    if let Some(items) = response["output"].as_array() {
        let text: String = items
            .iter()
            .filter_map(|item| item["content"].as_array())
            .flatten()
            .filter(|part| part["type"] == "output_text")
            .filter_map(|part| part["text"].as_str())
            .collect();
        if !text.is_empty() {
            return Some(text);
        }
    }

    // Chat completions
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

/// Turn the judge's JSON text into a verdict for `task`
pub fn parse_verdict(task: &Task, text: &str) -> JudgeResult<Verdict> {
    let value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|e| JudgeError::InvalidReply(format!("reply is not JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| JudgeError::InvalidReply("reply is not a JSON object".to_string()))?;

    let raw_result = object
        .get("result")
        .and_then(|r| r.as_str())
        .ok_or_else(|| JudgeError::InvalidReply("reply has no string `result`".to_string()))?;

    let result = VerdictResult::from_judge(raw_result).ok_or_else(|| {
        JudgeError::InvalidReply(format!("unexpected result {:?}", raw_result))
    })?;

    let reason = object
        .get("reason")
        .and_then(|r| r.as_str())
        .unwrap_or_default();

    Ok(Verdict::new(&task.id, &task.web_name, result, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config(endpoint: &str) -> JudgeConfig {
        JudgeConfig {
            endpoint: endpoint.to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            reference_date: "Sep 2025".to_string(),
        }
    }

    fn amazon_task() -> Task {
        Task::new("t1", "Amazon").with_field("ques", "Find a kettle under $30")
    }

    fn responses_body(text: &str) -> String {
        serde_json::json!({
            "output": [{
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "output_text", "text": text }]
            }]
        })
        .to_string()
    }

    #[test]
    fn test_request_without_image_has_no_image_part() {
        let config = test_config("http://localhost");
        let request = build_request(&config, &amazon_task(), "Found the item", None);

        let user = &request["input"][1]["content"];
        assert_eq!(user.as_array().unwrap().len(), 1);
        assert_eq!(user[0]["type"], "input_text");
        assert!(!request.to_string().contains("input_image"));
        assert_eq!(request["text"]["format"]["type"], "json_object");
    }

    #[test]
    fn test_request_with_image_embeds_data_url() {
        let config = test_config("http://localhost");
        let url = encode_image(b"\x89PNG\r\n\x1a\nrest");
        let request = build_request(&config, &amazon_task(), "done", Some(&url));

        let part = &request["input"][1]["content"][1];
        assert_eq!(part["type"], "input_image");
        assert!(part["image_url"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_user_prompt_embeds_task_and_response() {
        let prompt = build_user_prompt(&amazon_task(), "Found the item");
        assert!(prompt.starts_with("TASK: {"));
        assert!(prompt.contains(r#""ques":"Find a kettle under $30""#));
        assert!(prompt.contains("Result Response: Found the item"));
    }

    #[test]
    fn test_system_prompt_states_reference_date() {
        let prompt = system_prompt("Mar 2026");
        assert!(prompt.contains("Today's date is Mar 2026."));
        assert!(!prompt.contains("{date}"));
    }

    #[test]
    fn test_encode_image_detects_jpeg() {
        let url = encode_image(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_extract_output_text_shapes() {
        let direct = serde_json::json!({ "output_text": "a" });
        assert_eq!(extract_output_text(&direct).as_deref(), Some("a"));

        let responses: serde_json::Value = serde_json::from_str(&responses_body("b")).unwrap();
        assert_eq!(extract_output_text(&responses).as_deref(), Some("b"));

        let chat = serde_json::json!({ "choices": [{ "message": { "content": "c" } }] });
        assert_eq!(extract_output_text(&chat).as_deref(), Some("c"));

        assert_eq!(extract_output_text(&serde_json::json!({})), None);
    }

    #[test]
    fn test_parse_verdict_merges_task_identity() {
        let verdict = parse_verdict(
            &amazon_task(),
            r#"{"result": "NOT SUCCESS", "reason": "wrong price"}"#,
        )
        .unwrap();
        assert_eq!(
            verdict,
            Verdict::new("t1", "Amazon", VerdictResult::Failed, "wrong price")
        );
    }

    #[test]
    fn test_parse_verdict_rejects_bad_replies() {
        let task = amazon_task();
        assert!(parse_verdict(&task, "SUCCESS").is_err());
        assert!(parse_verdict(&task, "[1, 2]").is_err());
        assert!(parse_verdict(&task, r#"{"reason": "no result"}"#).is_err());
        assert!(parse_verdict(&task, r#"{"result": "ERROR"}"#).is_err());
    }

    #[tokio::test]
    async fn test_judge_success_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/responses")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::Regex("Found the item".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(responses_body(r#"{"result": "SUCCESS", "reason": "kettle shown"}"#))
            .create_async()
            .await;

        let config = test_config(&format!("{}/v1/responses", server.url()))
            .api_key(Some("sk-test".to_string()));
        let judge = OpenAiJudge::new(config);
        let verdict = judge.judge(&amazon_task(), "Found the item", None).await;

        mock.assert_async().await;
        assert_eq!(verdict.result, VerdictResult::Success);
        assert_eq!(verdict.reason, "kettle shown");
        assert_eq!(verdict.id, "t1");
        assert_eq!(verdict.webname, "Amazon");
    }

    #[tokio::test]
    async fn test_judge_http_error_becomes_error_verdict() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/responses")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let judge = OpenAiJudge::new(test_config(&format!("{}/v1/responses", server.url())));
        let verdict = judge.judge(&amazon_task(), "done", None).await;

        assert_eq!(verdict.result, VerdictResult::Error);
        assert!(verdict.reason.starts_with("Evaluation failed:"));
        assert!(verdict.reason.contains("500"));
    }

    #[tokio::test]
    async fn test_judge_malformed_reply_becomes_error_verdict() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/responses")
            .with_status(200)
            .with_body(responses_body("I think it worked"))
            .create_async()
            .await;

        let judge = OpenAiJudge::new(test_config(&format!("{}/v1/responses", server.url())));
        let verdict = judge.judge(&amazon_task(), "done", None).await;

        assert_eq!(verdict.result, VerdictResult::Error);
        assert!(verdict.reason.contains("invalid judge reply"));
    }

    #[tokio::test]
    async fn test_judge_missing_image_becomes_error_verdict() {
        // Unreachable endpoint: the image read must fail first.
        let judge = OpenAiJudge::new(test_config("http://127.0.0.1:9/v1/responses"));
        let verdict = judge
            .judge(&amazon_task(), "done", Some(Path::new("/nonexistent/shot.png")))
            .await;

        assert_eq!(verdict.result, VerdictResult::Error);
        assert!(verdict.reason.contains("failed to read screenshot"));
    }

    #[test]
    fn test_judge_config_builder() {
        let config = test_config("http://localhost:8080")
            .model("gpt-4o-mini")
            .reference_date("Jan 2026");

        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.reference_date, "Jan 2026");
        assert!(!format!("{:?}", config.api_key(Some("k".into()))).contains("\"k\""));
    }
}
