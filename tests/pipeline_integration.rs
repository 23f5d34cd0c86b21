//! End-to-end evaluation against a mock judge endpoint

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mockito::Matcher;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use voyager_judge::{
    BatchOrchestrator, Judge, JudgeConfig, OpenAiJudge, Verdict, VerdictResult, compute_accuracy,
    load_tasks,
};

fn reply(result: &str, reason: &str) -> String {
    let text = serde_json::json!({ "result": result, "reason": reason }).to_string();
    serde_json::json!({
        "output": [{
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "output_text", "text": text }]
        }]
    })
    .to_string()
}

fn write_fixture(root: &Path) {
    let tasks = [
        r#"{"id":"Amazon--0","web_name":"Amazon","ques":"Find a kettle"}"#,
        r#"{"id":"Amazon--1","web_name":"Amazon","ques":"Find a toaster"}"#,
        r#"{"id":"Apple--0","web_name":"Apple","ques":"Price of the base iPad"}"#,
        r#"{"id":"Apple--1","web_name":"Apple","ques":"Impossible request"}"#,
        r#"{"id":"Apple--2","web_name":"Apple","ques":"Trade-in value"}"#,
        r#"{"id":"Booking--0","web_name":"Booking","ques":"Hotel in Paris"}"#,
    ];
    fs::write(root.join("tasks.jsonl"), tasks.join("\n") + "\n").unwrap();
    fs::write(root.join("impossible.json"), r#"["Apple--1"]"#).unwrap();

    let results = root.join("results");
    fs::create_dir_all(results.join("Amazon--1")).unwrap();
    fs::write(results.join("Amazon--0.txt"), "Found the kettle for $25").unwrap();
    fs::write(results.join("Amazon--1.txt"), "Screenshot shows the toaster").unwrap();
    fs::write(
        results.join("Amazon--1").join("screenshot1.png"),
        b"\x89PNG\r\n\x1a\nfake",
    )
    .unwrap();
    fs::write(results.join("Apple--0.txt"), "Found the iPad at $349").unwrap();
    fs::write(results.join("Apple--1.txt"), "Found nothing").unwrap();
    fs::write(results.join("Apple--2.txt"), "could not find the trade-in page").unwrap();
    // Booking--0 has no response text on purpose.
}

#[tokio::test]
async fn test_evaluate_then_score() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let mut server = mockito::Server::new_async().await;
    let success = server
        .mock("POST", "/v1/responses")
        .match_body(Matcher::Regex("Result Response: Found the".to_string()))
        .with_status(200)
        .with_body(reply("SUCCESS", "matches the instruction"))
        .expect(2)
        .create_async()
        .await;
    let with_image = server
        .mock("POST", "/v1/responses")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("Screenshot shows".to_string()),
            Matcher::Regex("data:image/png;base64,".to_string()),
        ]))
        .with_status(200)
        .with_body(reply("SUCCESS", "screenshot confirms it"))
        .expect(1)
        .create_async()
        .await;
    let failed = server
        .mock("POST", "/v1/responses")
        .match_body(Matcher::Regex("could not find".to_string()))
        .with_status(200)
        .with_body(reply("NOT SUCCESS", "agent gave up"))
        .expect(1)
        .create_async()
        .await;

    let tasks = load_tasks(
        &dir.path().join("tasks.jsonl"),
        &dir.path().join("impossible.json"),
    )
    .unwrap();
    assert_eq!(tasks.len(), 5);

    let config = JudgeConfig {
        endpoint: format!("{}/v1/responses", server.url()),
        model: "gpt-4o".to_string(),
        api_key: None,
        reference_date: "Sep 2025".to_string(),
    };
    let judge: Arc<dyn Judge> = Arc::new(OpenAiJudge::new(config));
    let output = dir.path().join("eval.jsonl");
    let orchestrator =
        BatchOrchestrator::new(judge, 2, dir.path().join("results"), &output).unwrap();

    let summary = orchestrator.run_all(&tasks).await.unwrap();
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.written, 5);

    success.assert_async().await;
    with_image.assert_async().await;
    failed.assert_async().await;

    let logged: Vec<Verdict> = fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let results: Vec<(&str, VerdictResult)> =
        logged.iter().map(|v| (v.id.as_str(), v.result)).collect();
    assert_eq!(
        results,
        vec![
            ("Amazon--0", VerdictResult::Success),
            ("Amazon--1", VerdictResult::Success),
            ("Apple--0", VerdictResult::Success),
            ("Apple--2", VerdictResult::Failed),
            ("Booking--0", VerdictResult::Error),
        ]
    );
    assert!(logged.iter().all(|v| v.id != "Apple--1"));

    let report = compute_accuracy(&output).unwrap();
    assert_eq!(report.total, 5);
    assert_eq!(report.success, 3);
    assert_eq!(report.by_website["Amazon"].accuracy, 1.0);
    assert_eq!(report.by_website["Apple"].accuracy, 0.5);
    assert_eq!(report.by_website["Booking"].accuracy, 0.0);
}

#[tokio::test]
async fn test_rerun_appends_instead_of_replacing() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let mut server = mockito::Server::new_async().await;
    let _any = server
        .mock("POST", "/v1/responses")
        .with_status(200)
        .with_body(reply("UNKNOWN", "cannot tell"))
        .create_async()
        .await;

    let tasks = load_tasks(
        &dir.path().join("tasks.jsonl"),
        &dir.path().join("impossible.json"),
    )
    .unwrap();
    let config = JudgeConfig {
        endpoint: format!("{}/v1/responses", server.url()),
        model: "gpt-4o".to_string(),
        api_key: None,
        reference_date: "Sep 2025".to_string(),
    };
    let judge: Arc<dyn Judge> = Arc::new(OpenAiJudge::new(config));
    let output = dir.path().join("eval.jsonl");
    let orchestrator =
        BatchOrchestrator::new(judge, 10, dir.path().join("results"), &output).unwrap();

    orchestrator.run_all(&tasks).await.unwrap();
    orchestrator.run_all(&tasks).await.unwrap();

    let lines = fs::read_to_string(&output).unwrap().lines().count();
    assert_eq!(lines, 10);

    let report = compute_accuracy(&output).unwrap();
    assert_eq!(report.success, 0);
    assert_eq!(report.accuracy, 0.0);
}
