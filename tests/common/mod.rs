#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use cosearch::{
    application::lifecycle::LifecycleManager,
    build_router,
    config::AppConfig,
    domain::activity::RetentionPolicy,
    infrastructure::in_memory_preferences_repository::InMemoryPreferencesRepository,
    state::AppState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "test-admin-secret";

pub fn test_app() -> (Router, AppState) {
    test_app_with(&[])
}

/// Router over an in-memory store, configured from `vars` on top of defaults.
pub fn test_app_with(vars: &[(&str, &str)]) -> (Router, AppState) {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let config =
        AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config should load");

    let repository = Arc::new(InMemoryPreferencesRepository::new());
    let lifecycle = Arc::new(LifecycleManager::new(
        repository.clone(),
        RetentionPolicy::default(),
    ));
    let state = AppState::new(repository, lifecycle, ADMIN_PASSWORD, "memory");

    (build_router(state.clone(), &config), state)
}

pub fn get(uri: impl AsRef<str>) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri.as_ref())
        .body(Body::empty())
        .expect("valid GET request")
}

pub fn send(method: &str, uri: impl AsRef<str>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri.as_ref())
        .body(Body::empty())
        .expect("valid request")
}

pub fn send_json(method: &str, uri: impl AsRef<str>, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri.as_ref())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid JSON request")
}

pub async fn request_status(app: Router, request: Request<Body>) -> StatusCode {
    app.oneshot(request)
        .await
        .expect("router should serve request")
        .status()
}

pub async fn request_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .oneshot(request)
        .await
        .expect("router should serve request");

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();

    if body.is_empty() {
        return (status, Value::Null);
    }

    let value = serde_json::from_slice(&body).expect("body should be valid json");
    (status, value)
}

pub fn assert_problem(problem: &Value, expected_status: u16, expected_title: &str) {
    assert_eq!(
        problem.get("status").and_then(Value::as_u64),
        Some(u64::from(expected_status))
    );
    assert_eq!(
        problem.get("title").and_then(Value::as_str),
        Some(expected_title)
    );
    assert!(problem.get("detail").and_then(Value::as_str).is_some());
    assert!(
        problem
            .get("correlation_id")
            .and_then(Value::as_str)
            .is_some()
    );
    assert!(problem.get("type").and_then(Value::as_str).is_some());
}

pub fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("value should be an array")
        .iter()
        .map(|item| item.as_str().expect("item should be a string").to_string())
        .collect()
}
