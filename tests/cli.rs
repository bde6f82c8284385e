mod common;

use common::{default_harness, start, FakeEngine, MemoryBundle};
use llm_bridge::cli::run_chat;
use llm_bridge::{GenerationHistory, ModelBridge};

async fn chat(bridge: &impl ModelBridge, history: &mut GenerationHistory, script: &str) -> String {
    let mut output = Vec::new();
    run_chat(bridge, history, script.as_bytes(), &mut output)
        .await
        .unwrap();
    String::from_utf8(output).unwrap()
}

#[tokio::test]
async fn test_chat_session() {
    let h = default_harness();
    let bridge = h.service.bridge();
    let mut history = GenerationHistory::new(5);

    let output = chat(
        &bridge,
        &mut history,
        "hello\n\n/history\n/unload\nhello again\n/state\n/quit\nnever sent\n",
    )
    .await;

    assert!(output.contains("Model loaded successfully"));
    assert!(output.contains("echo: hello [64]"));
    assert!(output.contains("#1 ["));
    assert!(output.contains("Model unloaded successfully"));
    assert!(output.contains("error [MODEL_NOT_LOADED]: Model is not loaded"));
    assert!(output.contains("state: unloaded"));
    assert!(!output.contains("never sent"));

    assert_eq!(history.len(), 1);
    assert_eq!(history.latest().unwrap().input, "hello");
    assert_eq!(h.probe.generates(), 1);
}

#[tokio::test]
async fn test_chat_reports_load_failure_with_retry_hint() {
    let engine = FakeEngine {
        failing_loads: 1,
        ..FakeEngine::new()
    };
    let h = start(engine, MemoryBundle::with_asset(common::ASSET, common::PAYLOAD));
    let bridge = h.service.bridge();
    let mut history = GenerationHistory::new(5);

    let output = chat(&bridge, &mut history, "/load\nhi\n").await;

    assert!(output.contains("error [LOAD_ERROR]"));
    assert!(output.contains("this may succeed if retried"));
    assert!(output.contains("Model loaded successfully"));
    assert!(output.contains("echo: hi [64]"));
}

#[tokio::test]
async fn test_chat_missing_asset_is_not_retryable() {
    let h = start(FakeEngine::new(), MemoryBundle::default());
    let bridge = h.service.bridge();
    let mut history = GenerationHistory::new(5);

    let output = chat(&bridge, &mut history, "/help\n").await;

    assert!(output.contains("error [ASSET_MISSING]"));
    assert!(!output.contains("this may succeed if retried"));
    assert!(output.contains("/history"));
}
