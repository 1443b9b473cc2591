//! HTTP route handlers for the note API.

use crate::error::NotesError;
use crate::notes::{Note, NoteId, NoteInput};
use crate::server::AppState;
use crate::service::{NoteService, ScoredNote, SearchMode, DEFAULT_TOP_K};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::error;

// --- Request/Response types ---

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub search_type: SearchMode,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: NoteId,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub note_count: usize,
    pub vector_count: usize,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_searches: u64,
    pub keyword_searches: u64,
    pub semantic_searches: u64,
    pub total_creates: u64,
    pub total_updates: u64,
    pub total_deletes: u64,
    pub avg_search_latency_us: f64,
    pub p50_search_latency_us: f64,
    pub p95_search_latency_us: f64,
    pub p99_search_latency_us: f64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error rendered as a JSON `{ "error": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn note_not_found(id: NoteId) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("Note not found: {}", id),
        }
    }
}

impl From<NotesError> for ApiError {
    fn from(e: NotesError) -> Self {
        let status = match &e {
            NotesError::InvalidQuery(_)
            | NotesError::DimensionMismatch { .. }
            | NotesError::InvalidVector { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %e, "request failed");
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a service call on the blocking pool: embedding, SQLite and index
/// fsyncs all block.
async fn with_service<T, F>(state: &Arc<AppState>, f: F) -> ApiResult<T>
where
    F: FnOnce(&NoteService) -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.service))
        .await
        .map_err(|e| {
            error!(error = %e, "service task failed");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Task join error: {}", e),
            }
        })?
        .map_err(ApiError::from)
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/notes", get(list_notes).post(create_note))
        .route(
            "/notes/:id",
            get(get_note).put(update_note).delete(delete_note),
        )
        .route("/search", get(search))
        .route("/tags", get(tags))
        .route("/categories", get(categories))
        .route("/filter/tag/:tag", get(filter_by_tag))
        .route("/filter/category/:category", get(filter_by_category))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Handlers ---

async fn create_note(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NoteInput>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let id = with_service(&state, move |svc| svc.create(&input)).await?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_create();
    }

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn list_notes(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Note>>> {
    Ok(Json(with_service(&state, |svc| svc.list()).await?))
}

async fn get_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
) -> ApiResult<Json<Note>> {
    with_service(&state, move |svc| svc.get(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::note_not_found(id))
}

async fn update_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
    Json(input): Json<NoteInput>,
) -> ApiResult<Json<Note>> {
    let note = with_service(&state, move |svc| svc.update(id, &input))
        .await?
        .ok_or_else(|| ApiError::note_not_found(id))?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_update();
    }

    Ok(Json(note))
}

async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
) -> ApiResult<Json<SuccessResponse>> {
    if !with_service(&state, move |svc| svc.delete(id)).await? {
        return Err(ApiError::note_not_found(id));
    }

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_delete();
    }

    Ok(Json(SuccessResponse { success: true }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<ScoredNote>>> {
    let k = params.k.unwrap_or(DEFAULT_TOP_K);

    let mode = params.search_type;

    let start = Instant::now();
    let results = with_service(&state, move |svc| svc.search(&params.q, mode, k)).await?;
    let elapsed = start.elapsed();

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_search(mode, elapsed);
    }

    Ok(Json(results))
}

async fn tags(State(state): State<Arc<AppState>>) -> ApiResult<Json<TagsResponse>> {
    Ok(Json(TagsResponse {
        tags: with_service(&state, |svc| svc.tags()).await?,
    }))
}

async fn categories(State(state): State<Arc<AppState>>) -> ApiResult<Json<CategoriesResponse>> {
    Ok(Json(CategoriesResponse {
        categories: with_service(&state, |svc| svc.categories()).await?,
    }))
}

async fn filter_by_tag(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> ApiResult<Json<Vec<Note>>> {
    Ok(Json(
        with_service(&state, move |svc| svc.filter_by_tag(&tag)).await?,
    ))
}

async fn filter_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<Json<Vec<Note>>> {
    Ok(Json(
        with_service(&state, move |svc| svc.filter_by_category(&category)).await?,
    ))
}

async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let (note_count, vector_count) =
        with_service(&state, |svc| Ok((svc.note_count()?, svc.index_len()?))).await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        note_count,
        vector_count,
    }))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> ApiResult<Json<MetricsResponse>> {
    let metrics = state
        .metrics
        .read()
        .map_err(|_| ApiError::from(NotesError::LockPoisoned))?;

    Ok(Json(MetricsResponse {
        total_searches: metrics.total_searches(),
        keyword_searches: metrics.keyword_searches(),
        semantic_searches: metrics.semantic_searches(),
        total_creates: metrics.total_creates(),
        total_updates: metrics.total_updates(),
        total_deletes: metrics.total_deletes(),
        avg_search_latency_us: metrics.avg_search_latency_us(),
        p50_search_latency_us: metrics.percentile_search_latency_us(50.0),
        p95_search_latency_us: metrics.percentile_search_latency_us(95.0),
        p99_search_latency_us: metrics.percentile_search_latency_us(99.0),
    }))
}
