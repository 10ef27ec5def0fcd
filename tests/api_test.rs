mod common;

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{OWNER, memory_store};
use fitlife::api::router;
use fitlife::session::Session;
use fitlife::state::AppState;

async fn app(session: Session) -> (Router, AppState) {
    let store = memory_store().await;
    let state = AppState::new(store, session);
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Polls a snapshot route until `pred` holds.
async fn poll(app: &Router, uri: &str, pred: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(empty_request("GET", uri))
            .await
            .expect("response");
        let body = body_json(response).await;
        if pred(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never reached the expected state", uri);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(Session::signed_in(OWNER)).await;
    let response = app
        .oneshot(empty_request("GET", "/health"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_meal_add_and_toggle() {
    let (app, _) = app(Session::signed_in(OWNER)).await;
    poll(&app, "/meals", |b| b["loading"] == json!(false)).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/meals",
            json!({"title": "Oats", "date": "2025-01-01", "calories": "350"}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = poll(&app, "/meals", |b| b["items"].as_array().is_some_and(|i| i.len() == 1)).await;
    assert_eq!(body["items"][0]["calories"], json!(350));
    let id = body["items"][0]["id"].as_str().expect("id").to_string();

    let response = app
        .clone()
        .oneshot(json_request("PATCH", &format!("/meals/{}/done", id), json!({"done": true})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    poll(&app, "/meals", |b| b["items"][0]["is_completed"] == json!(true)).await;

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/meals/message"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    poll(&app, "/meals", |b| b["message"].is_null()).await;
}

#[tokio::test]
async fn test_invalid_form_is_rejected() {
    let (app, state) = app(Session::signed_in(OWNER)).await;
    let response = app
        .oneshot(json_request("POST", "/exercises", json!({"name": "  "})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Exercise name required"));
    assert_eq!(
        state.exercises.state().message.as_deref(),
        Some("Exercise name required")
    );
}

#[tokio::test]
async fn test_signed_out_snapshot() {
    let (app, _) = app(Session::signed_out()).await;
    let body = poll(&app, "/workouts", |_| true).await;
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["loading"], json!(false));
    assert_eq!(body["message"], json!("Not logged in. Please login again."));
}

#[tokio::test]
async fn test_workout_checklist() {
    let (app, _) = app(Session::signed_in(OWNER)).await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/workouts",
            json!({
                "name": "Legs",
                "duration_min": "30",
                "required_equipment": "Rack",
                "items": [{"title": "Squat", "order": 0, "sets": 5, "reps": 5}]
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = poll(&app, "/workouts", |b| b["items"].as_array().is_some_and(|i| i.len() == 1)).await;
    let id = body["items"][0]["id"].as_str().expect("id").to_string();

    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/workouts/{}/checklist", id)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.contains("Workout: Legs"));
    assert!(text.contains("⬜ Squat (Sets 5 x Reps 5)"));

    let response = app
        .oneshot(empty_request("GET", "/workouts/nope/checklist"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_and_bmi() {
    let (app, _) = app(Session::signed_in(OWNER)).await;
    let body = poll(&app, "/profile", |b| b["loading"] == json!(false)).await;
    assert!(body["profile"].is_null());

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/profile",
            json!({"full_name": "Sam", "height_cm": "170", "weight_kg": "70"}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    poll(&app, "/profile", |b| b["profile"]["full_name"] == json!("Sam")).await;

    let response = app
        .oneshot(empty_request("GET", "/profile/bmi"))
        .await
        .expect("response");
    let body = body_json(response).await;
    assert_eq!(body["category"], json!("Normal"));
}
