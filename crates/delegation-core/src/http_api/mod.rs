use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::progress::week_bounds;
use crate::{
    CommitSummary, EngineContext, EngineError, GenerationReport, MasterProgressReport, ReportRow,
    ReportSummary, SchedulingEngine, StaffId, StaffProgressReport, StoreError, Suggestion,
    TaskInstance, TaskStore, TemplateId,
};

const DEFAULT_PREVIEW_HORIZON: i64 = 30;

pub type SharedStore = Arc<dyn TaskStore + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<RwLock<SchedulingEngine>>,
    store: SharedStore,
}

impl AppState {
    pub fn new(engine: SchedulingEngine, store: SharedStore) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            store,
        }
    }

    pub fn with_shared(engine: Arc<RwLock<SchedulingEngine>>, store: SharedStore) -> Self {
        Self { engine, store }
    }

    fn engine(&self) -> Arc<RwLock<SchedulingEngine>> {
        self.engine.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<EngineError> for ApiError {
    fn from(value: EngineError) -> Self {
        let message = value.to_string();
        match value {
            EngineError::MissingConfiguration(_) => ApiError::Conflict(message),
            EngineError::StudentNotFound(_) | EngineError::StaffNotFound(_) => {
                ApiError::NotFound(message)
            }
            EngineError::Config(_) | EngineError::InvalidRequest(_) => ApiError::Invalid(message),
            EngineError::Store(err) => err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        let message = value.to_string();
        match value {
            StoreError::TaskNotFound(_) | StoreError::TemplateNotFound(_) => {
                ApiError::NotFound(message)
            }
            StoreError::Duplicate { .. } => ApiError::Conflict(message),
            StoreError::InvalidData(_) => ApiError::Invalid(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate/:date", post(generate))
        .route("/templates/:id/preview", get(preview_template))
        .route("/students/:id/recommendations", get(student_recommendations))
        .route("/exceptions", post(record_exception))
        .route("/tasks/:id/complete", post(complete_task))
        .route("/report", get(report))
        .route("/staff/:id/progress", get(staff_progress))
        .route("/progress", get(master_progress))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    engine: SchedulingEngine,
    store: SharedStore,
) -> std::io::Result<()> {
    let app = router(AppState::new(engine, store));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(format!("invalid date '{raw}' (expected YYYY-MM-DD)")))
}

fn context_for(date: Option<&str>) -> Result<EngineContext, ApiError> {
    match date {
        Some(raw) => Ok(EngineContext::new(parse_date(raw)?)),
        None => Ok(EngineContext::for_today()),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
struct GenerateParams {
    #[serde(default)]
    commit: bool,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    report: GenerationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<CommitSummary>,
}

async fn generate(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(params): Query<GenerateParams>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let date = parse_date(&date)?;
    let engine = state.engine();
    let guard = engine.read();
    let report = guard.generate_for_date(state.store.as_ref(), date)?;
    let commit = if params.commit {
        Some(guard.commit_generation(state.store.as_ref(), &report)?)
    } else {
        None
    };
    Ok(Json(GenerateResponse { report, commit }))
}

#[derive(Debug, Deserialize)]
struct PreviewParams {
    from: Option<String>,
    horizon: Option<i64>,
}

async fn preview_template(
    State(state): State<AppState>,
    Path(template_id): Path<TemplateId>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<Vec<NaiveDate>>, ApiError> {
    let from = context_for(params.from.as_deref())?.today;
    let horizon = params.horizon.unwrap_or(DEFAULT_PREVIEW_HORIZON);
    if horizon < 0 {
        return Err(ApiError::invalid("horizon must not be negative"));
    }
    let engine = state.engine();
    let dates = engine
        .read()
        .preview_schedule(state.store.as_ref(), template_id, from, horizon)?;
    Ok(Json(dates))
}

#[derive(Debug, Deserialize)]
struct RecommendationParams {
    date: Option<String>,
}

async fn student_recommendations(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let ctx = context_for(params.date.as_deref())?;
    let engine = state.engine();
    let suggestions = engine
        .read()
        .recommend_for_student(state.store.as_ref(), &ctx, student_id)?;
    Ok(Json(suggestions))
}

#[derive(Debug, Deserialize)]
struct ExceptionPayload {
    template_id: TemplateId,
    date: NaiveDate,
    reason: String,
    staff_id: StaffId,
}

async fn record_exception(
    State(state): State<AppState>,
    Json(payload): Json<ExceptionPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if payload.reason.trim().is_empty() {
        return Err(ApiError::invalid("exception reason must not be empty"));
    }
    let engine = state.engine();
    let recorded = engine.read().record_exception(
        state.store.as_ref(),
        payload.template_id,
        payload.date,
        payload.reason.trim(),
        payload.staff_id,
    )?;
    let status = if recorded {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "recorded": recorded }))))
}

#[derive(Debug, Default, Deserialize)]
struct CompletePayload {
    note: Option<String>,
}

async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    payload: Option<Json<CompletePayload>>,
) -> Result<Json<TaskInstance>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let engine = state.engine();
    engine.read().complete_task(
        state.store.as_ref(),
        task_id,
        payload.note.as_deref(),
        Utc::now(),
    )?;
    let task = state
        .store
        .find_task(task_id)?
        .ok_or_else(|| ApiError::Internal("task not found after completion".to_string()))?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    date: Option<String>,
    staff_id: Option<StaffId>,
    days_ahead: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    date: NaiveDate,
    summary: ReportSummary,
    rows: Vec<ReportRow>,
}

async fn report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReportResponse>, ApiError> {
    let mut ctx = context_for(params.date.as_deref())?;
    if let Some(staff_id) = params.staff_id {
        ctx = ctx.acting_as(staff_id);
    }
    let engine = state.engine();
    let report = engine.read().scheduling_report(state.store.as_ref(), &ctx)?;
    let rows = match params.days_ahead {
        Some(days) => report.due_within(days).into_iter().cloned().collect(),
        None => report.rows.clone(),
    };
    Ok(Json(ReportResponse {
        date: report.generated_for,
        summary: report.summary,
        rows,
    }))
}

#[derive(Debug, Deserialize)]
struct ProgressParams {
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

impl ProgressParams {
    /// Evaluation context plus the range, defaulting to the evaluation week.
    fn resolve(&self) -> Result<(EngineContext, NaiveDate, NaiveDate), ApiError> {
        let ctx = context_for(self.date.as_deref())?;
        let (week_start, week_end) = week_bounds(ctx.today);
        let start = match self.start.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => week_start,
        };
        let end = match self.end.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => week_end,
        };
        Ok((ctx, start, end))
    }
}

async fn staff_progress(
    State(state): State<AppState>,
    Path(staff_id): Path<StaffId>,
    Query(params): Query<ProgressParams>,
) -> Result<Json<StaffProgressReport>, ApiError> {
    let (ctx, start, end) = params.resolve()?;
    let engine = state.engine();
    let report = engine
        .read()
        .progress_report(state.store.as_ref(), &ctx, staff_id, start, end)?;
    Ok(Json(report))
}

async fn master_progress(
    State(state): State<AppState>,
    Query(params): Query<ProgressParams>,
) -> Result<Json<MasterProgressReport>, ApiError> {
    let (ctx, start, end) = params.resolve()?;
    let engine = state.engine();
    let report = engine
        .read()
        .master_progress_report(state.store.as_ref(), &ctx, start, end)?;
    Ok(Json(report))
}
