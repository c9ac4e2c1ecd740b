// End-to-end loop over the Claude provider against a mock HTTP server

mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use common::{config, corpus};
use factloop::collaborators::{CollaboratorErrorKind, LlmCollaborator};
use factloop::errors::RunError;
use factloop::providers::ClaudeProvider;
use factloop::refine::RefinementLoop;
use factloop::store::RunStore;

/// Anthropic Messages response whose single text block is `payload` as JSON
fn claude_reply(payload: serde_json::Value) -> String {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "model": "claude-test",
        "content": [{"type": "text", "text": payload.to_string()}],
        "stop_reason": "end_turn"
    })
    .to_string()
}

fn refinement(server: &Server, max_iterations: usize) -> RefinementLoop {
    let provider = ClaudeProvider::new("test-key".to_string())
        .expect("Failed to build provider")
        .with_model("claude-test")
        .with_base_url(server.url());
    RefinementLoop::with_collaborator(
        Arc::new(LlmCollaborator::new(Arc::new(provider))),
        config(max_iterations),
    )
}

fn seed_facts() -> serde_json::Value {
    json!({
        "extracted_facts": [
            {"text": "Acme Corp was founded in 1999", "source": "annual_report.txt",
             "confidence": 0.95, "category": "temporal"},
            {"text": "Revenue was $12M in 2023", "source": "annual_report.txt",
             "confidence": "0.9", "category": "financial"}
        ]
    })
}

#[tokio::test]
async fn test_claude_backed_run_converges() {
    let mut server = Server::new_async().await;
    let extract = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex("Extract every distinct".to_string()))
        .with_status(200)
        .with_body(claude_reply(seed_facts()))
        .expect(1)
        .create_async()
        .await;
    let assess = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex("Compare the extracted facts".to_string()))
        .with_status(200)
        .with_body(claude_reply(json!({
            "coverage_analysis": {
                "missing_facts": [],
                "incorrect_facts": [],
                "recommendations": ["Mention the CEO"]
            }
        })))
        .expect(1)
        .create_async()
        .await;

    let tmp = TempDir::new().unwrap();
    let store = RunStore::create(tmp.path(), Some("mock")).unwrap();
    let outcome = refinement(&server, 3).run(&corpus(), &store).await.unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 0);
    let ids: Vec<&str> = outcome.final_facts.facts().iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["fact_001", "fact_002"]);
    assert_eq!(outcome.final_facts.facts()[1].confidence, 0.9);
    assert_eq!(outcome.final_facts.extraction_metadata.model_used, "claude-test");

    extract.assert_async().await;
    assess.assert_async().await;
}

#[tokio::test]
async fn test_claude_backed_run_applies_proposed_patch() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex("Extract every distinct".to_string()))
        .with_body(claude_reply(seed_facts()))
        .create_async()
        .await;
    server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex("Compare the extracted facts".to_string()))
        .with_body(claude_reply(json!({
            "coverage_analysis": {
                "missing_facts": ["Jane Doe is the CEO"],
                "incorrect_facts": []
            }
        })))
        .create_async()
        .await;
    let patch = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex("Produce a JSON Patch".to_string()))
        .with_body(claude_reply(json!({
            "patch": [{
                "op": "add",
                "path": "/extracted_facts/-",
                "value": json!({
                    "text": "Jane Doe is the CEO",
                    "source": "annual_report.txt",
                    "confidence": 0.9,
                    "category": "person"
                }).to_string()
            }]
        })))
        .expect(1)
        .create_async()
        .await;

    let tmp = TempDir::new().unwrap();
    let store = RunStore::create(tmp.path(), None).unwrap();
    let outcome = refinement(&server, 1).run(&corpus(), &store).await.unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.final_facts.len(), 3);
    assert_eq!(outcome.final_facts.facts()[2].id, "fact_003");
    assert_eq!(outcome.remaining_gaps.missing_facts, vec!["Jane Doe is the CEO"]);

    // The stored patch keeps the string-encoded value as received
    let stored = std::fs::read_to_string(store.dir().join("patch_v0.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert!(stored["patch"][0]["value"].is_string());

    patch.assert_async().await;
}

#[tokio::test]
async fn test_non_json_reply_is_invalid_response() {
    let mut server = Server::new_async().await;
    let extract = server
        .mock("POST", "/v1/messages")
        .with_body(
            json!({
                "id": "msg_test",
                "model": "claude-test",
                "content": [{"type": "text", "text": "Sorry, I cannot help with that."}],
                "stop_reason": "end_turn"
            })
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let tmp = TempDir::new().unwrap();
    let store = RunStore::create(tmp.path(), None).unwrap();
    let failure = refinement(&server, 3)
        .run(&corpus(), &store)
        .await
        .unwrap_err();

    match failure.error {
        RunError::Collaborator(e) => assert_eq!(e.kind, CollaboratorErrorKind::InvalidResponse),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(failure.last_snapshot, None);
    extract.assert_async().await;
}
