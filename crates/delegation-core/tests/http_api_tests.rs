#![cfg(feature = "http_api")]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use sped_delegation::http_api::{self, AppState};
use sped_delegation::{
    Frequency, InMemoryStore, SchedulingEngine, Staff, Student, TaskStore, TemplateRecord,
};
use tower::util::ServiceExt;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn new_router() -> axum::Router {
    let store = InMemoryStore::new();
    store.save_staff(&Staff::new(1, "Alice", ["Reading", "ELA"])).unwrap();
    store.save_staff(&Staff::new(2, "Bob", ["Math"])).unwrap();
    store
        .save_student(
            &Student::new(10, "Jordan")
                .with_goals(["ELA"])
                .with_needs(["reading comprehension"])
                .with_ard_date(d(2025, 3, 13)),
        )
        .unwrap();
    store
        .save_template(&TemplateRecord::new(
            1,
            "Weekly progress review",
            "ELA",
            Frequency::Weekly,
            1,
            d(2024, 9, 9),
        ))
        .unwrap();
    let state = AppState::new(SchedulingEngine::default(), Arc::new(store));
    http_api::router(state)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = new_router();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn generate_then_complete_via_http() {
    let app = new_router();

    let (status, body) = send(&app, "POST", "/generate/2024-09-09", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["outcomes"][0]["outcome"], "generated");
    assert!(body.get("commit").is_none());

    let (status, body) = send(&app, "POST", "/generate/2024-09-09?commit=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["commit"]["outcomes"][0]["outcome"], "created");
    let task_id = body["commit"]["outcomes"][0]["task_id"].as_i64().unwrap();

    let (_, body) = send(&app, "POST", "/generate/2024-09-09?commit=true", None).await;
    assert_eq!(body["report"]["outcomes"][0]["outcome"], "skipped");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tasks/{task_id}/complete"),
        Some(json!({ "note": "Reviewed with Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
    assert_eq!(body["completion_note"], "Reviewed with Alice");

    let (status, body) = send(&app, "POST", "/tasks/999/complete", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn exceptions_and_preview_via_http() {
    let app = new_router();
    let payload = json!({
        "template_id": 1,
        "date": "2024-09-16",
        "reason": "Field trip",
        "staff_id": 1
    });
    let (status, body) = send(&app, "POST", "/exceptions", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["recorded"], true);
    let (status, body) = send(&app, "POST", "/exceptions", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recorded"], false);

    let uri = "/templates/1/preview?from=2024-09-09&horizon=14";
    let (status, body) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["2024-09-09", "2024-09-23"]));

    let uri = "/templates/1/preview?from=2024-09-09&horizon=999999";
    let (status, body) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) = send(&app, "GET", "/templates/42/preview", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recommendations_via_http() {
    let app = new_router();
    let uri = "/students/10/recommendations?date=2025-03-03";
    let (status, body) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let suggestions = body.as_array().unwrap();
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0]["priority"], "high");
    assert_eq!(suggestions[0]["source"]["source"], "ard_proximity");
    assert!(
        suggestions
            .iter()
            .all(|s| s["assignment"]["staff_id"] != json!(2))
    );

    let (status, _) = send(&app, "GET", "/students/404/recommendations", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let uri = "/students/10/recommendations?date=03-03-2025";
    let (status, _) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_via_http() {
    let app = new_router();
    send(&app, "POST", "/generate/2024-09-09?commit=true", None).await;
    let (status, body) = send(&app, "GET", "/report?date=2024-09-11", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total"], 1);
    assert_eq!(body["summary"]["overdue"], 1);
    assert_eq!(body["rows"][0]["urgency"], "overdue");
    assert_eq!(body["rows"][0]["next_due"], "2024-09-16");

    let (_, body) = send(&app, "GET", "/report?date=2024-09-11&staff_id=2", None).await;
    assert_eq!(body["summary"]["total"], 0);
}

#[tokio::test]
async fn report_window_tolerates_extreme_days_ahead() {
    let app = new_router();
    send(&app, "POST", "/generate/2024-09-09?commit=true", None).await;
    let uri = "/report?date=2024-09-11&days_ahead=9223372036854775807";
    let (status, body) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);

    let uri = "/report?date=2024-09-11&days_ahead=-9223372036854775808";
    let (status, body) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn progress_via_http() {
    let app = new_router();
    let (_, body) = send(&app, "POST", "/generate/2024-09-09?commit=true", None).await;
    let task_id = body["commit"]["outcomes"][0]["task_id"].as_i64().unwrap();
    send(&app, "POST", &format!("/tasks/{task_id}/complete"), None).await;

    let (status, body) = send(&app, "GET", "/staff/1/progress?date=2024-09-11", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start"], "2024-09-09");
    assert_eq!(body["end"], "2024-09-15");
    assert_eq!(body["summary"]["total"], 1);
    assert_eq!(body["summary"]["completed"], 1);
    assert_eq!(body["summary"]["missed"], 0);

    let (status, body) = send(&app, "GET", "/progress?date=2024-09-11", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["staff_count"], 2);
    assert_eq!(body["summary"]["completed"], 1);

    let (status, _) = send(&app, "GET", "/staff/99/progress", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let uri = "/progress?start=2024-09-15&end=2024-09-09";
    let (status, _) = send(&app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
