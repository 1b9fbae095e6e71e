//! Integration tests for the agent tool endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn tool_definitions_are_listed() {
    let app = build_test_app(100);
    let json = body_json(get(&app.router, "/api/v1/tools").await).await;
    let names: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["function"]["name"].as_str())
        .collect();
    assert_eq!(
        names,
        ["create_ai_node", "update_node_settings", "analyze_canvas", "generate_content", "delete_node"]
    );
}

#[tokio::test]
async fn tool_success_and_failure_are_both_200() {
    let app = build_test_app(100);
    let uri = format!("/api/v1/canvases/{}/tools", Uuid::new_v4());

    let response = post_json(&app.router, &uri, json!({"name": "analyze_canvas"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["result"], "No AI nodes found on the canvas.");

    let response = post_json(
        &app.router,
        &uri,
        json!({"name": "generate_content", "arguments": {"node_id": "node:missing"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert_eq!(
        json["error"],
        "Error: Node with ID node:missing not found or is not an AI node"
    );
}

#[tokio::test]
async fn agent_created_node_is_visible_over_http() {
    let app = build_test_app(100);
    let canvas = Uuid::new_v4();

    let json = body_json(
        post_json(
            &app.router,
            &format!("/api/v1/canvases/{canvas}/tools"),
            json!({"name": "create_ai_node", "arguments": {"type": "video", "prompt": "surf"}}),
        )
        .await,
    )
    .await;
    assert_eq!(json["ok"], true);

    let nodes = body_json(get(&app.router, &format!("/api/v1/canvases/{canvas}/nodes")).await).await;
    assert_eq!(nodes["data"][0]["prompt"], "surf");
    assert_eq!(nodes["data"][0]["model_id"], "kling");
}
