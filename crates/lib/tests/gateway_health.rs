//! Integration test: start the gateway on a free port and exercise the probe and test
//! endpoints. Needs no Slack workspace; the backend is a local fake.

mod common;

use advisor::gateway::ROOT_TEXT;
use common::{free_port, start_fake_gemini, start_gateway, test_config};
use serde_json::{json, Value};

#[tokio::test]
async fn root_and_health_respond() {
    let gemini = start_fake_gemini().await;
    let base = start_gateway(test_config(free_port(), &gemini, None)).await;
    let client = reqwest::Client::new();

    let root = client.get(format!("{}/", base)).send().await.unwrap();
    assert!(root.status().is_success());
    assert_eq!(root.text().await.unwrap(), ROOT_TEXT);

    let head = client.head(format!("{}/", base)).send().await.unwrap();
    assert!(head.status().is_success());

    let health = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(health.status().as_u16(), 200);
    assert_eq!(health.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_backend_validates_body() {
    let gemini = start_fake_gemini().await;
    let base = start_gateway(test_config(free_port(), &gemini, None)).await;
    let client = reqwest::Client::new();
    let url = format!("{}/test-backend", base);

    let missing = client.post(&url).json(&json!({})).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 400);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "Message is required");

    let blank = client.post(&url).json(&json!({ "message": "  " })).send().await.unwrap();
    assert_eq!(blank.status().as_u16(), 400);

    let garbage = client
        .post(&url)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status().as_u16(), 400);
    let body: Value = garbage.json().await.unwrap();
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_backend_relays_model_text() {
    let gemini = start_fake_gemini().await;
    let base = start_gateway(test_config(free_port(), &gemini, None)).await;
    let res = reqwest::Client::new()
        .post(format!("{}/test-backend", base))
        .json(&json!({ "message": "is it safe to merge?" }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["response"], "echo: is it safe to merge?");
}

#[tokio::test]
async fn gateway_without_api_key_fails_to_start() {
    if std::env::var("GEMINI_API_KEY").is_ok() {
        return;
    }
    let mut config = test_config(free_port(), "http://127.0.0.1:9", None);
    config.backend.api_key = None;
    let err = advisor::gateway::run_gateway(config).await.unwrap_err();
    assert!(err.to_string().contains("API key"), "{}", err);
}
