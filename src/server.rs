//! Council Forum Server
//!
//! HTTP surface for the forum core. Caller identity travels in the
//! `X-User-Id` header; the session layer proper lives outside this service.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::activity::{ActivityRecorder, DEFAULT_FEED_LIMIT};
use crate::auth;
use crate::config::ReputationConfig;
use crate::error::{ForumError, ForumResult};
use crate::models::{
    FeedDay, NewPollOption, OptionResult, PollSettings, PollWithOptions, Post, Thread, User,
};
use crate::polls::PollService;
use crate::reputation::ReputationLedger;
use crate::storage::ForumStorage;
use crate::threads::ThreadService;
use crate::users::UserService;

pub struct AppState {
    pub storage: Arc<ForumStorage>,
    pub users: UserService,
    pub threads: ThreadService,
    pub polls: PollService,
    pub ledger: ReputationLedger,
    pub recorder: ActivityRecorder,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(storage: Arc<ForumStorage>, reputation: ReputationConfig) -> Self {
        let ledger = ReputationLedger::new(storage.clone(), reputation);
        let recorder = ActivityRecorder::new(storage.clone());

        Self {
            users: UserService::new(storage.clone(), recorder.clone()),
            threads: ThreadService::new(storage.clone(), ledger.clone(), recorder.clone()),
            polls: PollService::new(storage.clone()),
            ledger,
            recorder,
            storage,
            started_at: std::time::Instant::now(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/users", post(create_user_handler))
        .route("/users/:id", get(get_user_handler))
        .route("/users/:id/profile", patch(update_profile_handler))
        .route("/users/:id/feed", get(feed_handler))
        .route("/users/:id/reputation/reset", post(reset_reputation_handler))
        .route("/threads", post(create_thread_handler))
        .route("/threads/:id", get(get_thread_handler).delete(delete_thread_handler))
        .route("/threads/:id/lock", post(lock_thread_handler).delete(unlock_thread_handler))
        .route("/threads/:id/posts", get(list_posts_handler).post(add_post_handler))
        .route("/posts/:id", delete(delete_post_handler))
        .route(
            "/threads/:id/best-post",
            put(mark_best_post_handler).delete(unmark_best_post_handler),
        )
        .route(
            "/threads/:id/poll",
            get(get_poll_handler).post(create_poll_handler),
        )
        .route("/polls/:id", patch(update_poll_handler).delete(delete_poll_handler))
        .route("/polls/:id/options", post(add_option_handler))
        .route("/polls/:id/votes", post(cast_vote_handler))
        .route("/polls/:id/results", get(results_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// HEALTH
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub uptime_secs: u64,
    pub version: String,
    pub service: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "council-forum".to_string(),
    })
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub moderator: bool,
}

async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> ForumResult<(StatusCode, Json<User>)> {
    let user = state.users.create(&request.username, request.moderator)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ForumResult<Json<User>> {
    Ok(Json(state.users.get(id)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub bio: String,
}

async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<UpdateProfileRequest>,
) -> ForumResult<Json<User>> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    Ok(Json(state.users.update_profile(&caller, id, &request.bio)?))
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u32>,
}

async fn feed_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<FeedQuery>,
) -> ForumResult<Json<Vec<FeedDay>>> {
    state.users.get(id)?;
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT);
    Ok(Json(state.recorder.feed(id, limit)?))
}

async fn reset_reputation_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<StatusCode> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    if !auth::can_manage_threads(&caller) {
        return Err(ForumError::Forbidden("cannot reset reputation"));
    }

    state.ledger.reset(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// THREADS & POSTS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub title: String,
    pub body: String,
}

async fn create_thread_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateThreadRequest>,
) -> ForumResult<(StatusCode, Json<Thread>)> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    let thread = state
        .threads
        .create_thread(&caller, &request.title, &request.body)?;
    Ok((StatusCode::CREATED, Json(thread)))
}

async fn get_thread_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ForumResult<Json<Thread>> {
    Ok(Json(state.threads.get(id)?))
}

async fn delete_thread_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<StatusCode> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    state.threads.delete_thread(&caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn lock_thread_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<Json<Thread>> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    Ok(Json(state.threads.set_locked(&caller, id, true)?))
}

async fn unlock_thread_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<Json<Thread>> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    Ok(Json(state.threads.set_locked(&caller, id, false)?))
}

async fn list_posts_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ForumResult<Json<Vec<Post>>> {
    Ok(Json(state.threads.posts(id)?))
}

#[derive(Debug, Deserialize)]
pub struct AddPostRequest {
    pub body: String,
}

async fn add_post_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<AddPostRequest>,
) -> ForumResult<(StatusCode, Json<Post>)> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    let post = state.threads.add_post(&caller, id, &request.body)?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn delete_post_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<StatusCode> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    state.threads.delete_post(&caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// BEST ANSWER
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MarkBestPostRequest {
    pub post_id: i64,
}

async fn mark_best_post_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<MarkBestPostRequest>,
) -> ForumResult<StatusCode> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    state.threads.mark_best_post(&caller, id, request.post_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unmark_best_post_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<StatusCode> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    state.threads.unmark_best_post(&caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// POLLS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    #[serde(flatten)]
    pub settings: PollSettings,
    #[serde(default)]
    pub options: Vec<NewPollOption>,
}

async fn create_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<CreatePollRequest>,
) -> ForumResult<(StatusCode, Json<PollWithOptions>)> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    let poll = state
        .polls
        .create_poll(&caller, id, &request.settings, &request.options)?;
    Ok((StatusCode::CREATED, Json(poll)))
}

async fn get_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ForumResult<Json<PollWithOptions>> {
    Ok(Json(state.polls.poll_for_thread(id)?))
}

async fn update_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(settings): Json<PollSettings>,
) -> ForumResult<Json<PollWithOptions>> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    Ok(Json(state.polls.update_poll(&caller, id, &settings)?))
}

async fn delete_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<StatusCode> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    state.polls.delete_poll(&caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_option_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(option): Json<NewPollOption>,
) -> ForumResult<(StatusCode, Json<crate::models::PollOption>)> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    let option = state
        .polls
        .add_option(&caller, id, &option.label, &option.color)?;
    Ok((StatusCode::CREATED, Json(option)))
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub option_ids: Vec<i64>,
}

async fn cast_vote_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<CastVoteRequest>,
) -> ForumResult<StatusCode> {
    let caller = auth::require_caller(&state.storage, &headers)?;
    state.polls.cast_vote(&caller, id, &request.option_ids)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn results_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ForumResult<Json<Vec<OptionResult>>> {
    let viewer = auth::optional_caller(&state.storage, &headers)?;
    Ok(Json(state.polls.results(viewer.as_ref(), id)?))
}

// ============================================================================
// SERVER
// ============================================================================

/// Run the server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting Council Forum server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
