//! JSON API for ranked movie lists.
//!
//! Thin adapters over `TopMoviesService`: each handler extracts ids and
//! bodies, calls one service method and picks the status code. All routes
//! live under `/api/v1`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use ranking::{EntryDraft, FieldErrors, ListId, RankError, RankedEntry, RankedList};

use crate::error::{AppError, AppResult};
use crate::service::TopMoviesService;

/// Prefix every route is mounted under
pub const API_PREFIX: &str = "/api/v1";

const WELCOME: &str = "Welcome to My Top 100 Movies.";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: TopMoviesService,
}

/// Build the application router
pub fn router(service: TopMoviesService) -> Router {
    let routes = Router::new()
        .route("/top-movies/new/", post(create_top_movies))
        .route(
            "/top-movies/{id}/",
            get(get_top_movies)
                .patch(rename_top_movies)
                .delete(delete_top_movies),
        )
        .route("/top-movies/{id}/add/", post(add_movie))
        .route("/top-movies/{id}/compact/", put(compact_top_movies))
        .route("/top-movie/{id}/", get(get_movie).delete(delete_movie))
        .route("/top-movie/{id}/delete-rank/", delete(delete_rank))
        .route("/top-movie/{id}/move-rank-up/", put(move_rank_up))
        .route("/top-movie/{id}/move-rank-down/", put(move_rank_down))
        .route("/top-movie/{id}/reorder-rank/", put(reorder_rank));

    // A nested "/" only matches the bare prefix, so the slashed root is explicit
    Router::new()
        .route(API_PREFIX, get(api_root))
        .route(&format!("{}/", API_PREFIX), get(api_root))
        .nest(API_PREFIX, routes)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

// =============================================================================
// Request and response bodies
// =============================================================================

/// A list as returned by the API: `{id, movie: [...], title}`
#[derive(Debug, Serialize, Deserialize)]
pub struct TopMoviesView {
    pub id: ListId,
    pub movie: Vec<RankedEntry>,
    pub title: Option<String>,
}

impl From<RankedList> for TopMoviesView {
    fn from(list: RankedList) -> Self {
        Self {
            id: list.id,
            movie: list.entries().to_vec(),
            title: list.title,
        }
    }
}

/// Body of `POST /top-movies/new/`: the first entry plus an optional list title
#[derive(Debug, Deserialize)]
pub struct NewListRequest {
    #[serde(flatten)]
    pub entry: EntryDraft,
    #[serde(default)]
    pub list_title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub rank: Option<i64>,
}

/// Numeric id from the path; anything else is a 404, not a 400
pub struct IdPath(pub u64);

impl<S: Send + Sync> FromRequestParts<S> for IdPath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<u64>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| IdPath(id))
            .map_err(|_| AppError::NotFound)
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::MalformedBody(rejection.body_text()))
}

// =============================================================================
// Handlers
// =============================================================================

async fn api_root() -> Json<serde_json::Value> {
    Json(json!({ "message": WELCOME }))
}

async fn get_top_movies(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<TopMoviesView>> {
    let list = state.service.get_list(id).await?;
    Ok(Json(list.into()))
}

async fn create_top_movies(
    State(state): State<AppState>,
    body: Result<Json<NewListRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RankedEntry>)> {
    let request = json_body(body)?;
    let (_, entry) = state
        .service
        .create_list(request.entry, request.list_title)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn rename_top_movies(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> AppResult<Json<TopMoviesView>> {
    let request = json_body(body)?;
    let list = state.service.rename_list(id, request.title).await?;
    Ok(Json(list.into()))
}

async fn delete_top_movies(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<StatusCode> {
    state.service.delete_list(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_movie(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    body: Result<Json<EntryDraft>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RankedEntry>)> {
    // Unknown list wins over a bad body
    state.service.get_list(id).await?;
    let draft = json_body(body)?;
    let entry = state.service.append(id, draft).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn compact_top_movies(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<TopMoviesView>> {
    let list = state.service.compact_list(id).await?;
    Ok(Json(list.into()))
}

async fn get_movie(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<RankedEntry>> {
    Ok(Json(state.service.get_entry(id).await?))
}

async fn delete_movie(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<StatusCode> {
    state.service.delete_entry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_rank(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<StatusCode> {
    state.service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_rank_up(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<RankedEntry>> {
    Ok(Json(state.service.move_up(id).await?))
}

async fn move_rank_down(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<RankedEntry>> {
    Ok(Json(state.service.move_down(id).await?))
}

async fn reorder_rank(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    body: Result<Json<ReorderRequest>, JsonRejection>,
) -> AppResult<Json<RankedEntry>> {
    let request = json_body(body)?;
    let rank = request.rank.ok_or_else(|| {
        RankError::Validation(FieldErrors::single("rank", "This field is required."))
    })?;
    Ok(Json(state.service.move_entry(id, rank).await?))
}
