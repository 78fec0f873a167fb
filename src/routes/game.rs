use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::game::{EliminateRequest, EliminationReport, GameSnapshot, JoinRequest, StartReport},
    error::AppError,
    services::{elimination_service, game_service, lifecycle, resolution},
    state::SharedState,
};

/// Routes handling game lifecycle and participation.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/current", get(current_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/join", post(join_game))
        .route("/games/{id}/start", post(start_game))
        .route("/games/{id}/eliminate", post(eliminate))
        .route("/games/{id}/resolve", post(resolve_game))
}

/// Today's game, created on first contact when none exists yet.
#[utoipa::path(
    get,
    path = "/games/current",
    tag = "game",
    responses(
        (status = 200, description = "Today's game", body = GameSnapshot)
    )
)]
pub async fn current_game(
    State(state): State<SharedState>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::current_game(&state).await?;
    Ok(Json(snapshot))
}

/// Create (idempotently) the game for the next scheduled daily start.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    responses(
        (status = 200, description = "Scheduled game", body = GameSnapshot)
    )
)]
pub async fn create_game(State(state): State<SharedState>) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::create_game(&state).await?;
    Ok(Json(snapshot))
}

/// Snapshot one game with its live holder counts.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game snapshot", body = GameSnapshot),
        (status = 404, description = "Game not found")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::game_snapshot(&state, id).await?;
    Ok(Json(snapshot))
}

/// Join (or re-join) a game before it starts.
#[utoipa::path(
    post,
    path = "/games/{id}/join",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Joined; snapshot after the join", body = GameSnapshot),
        (status = 409, description = "Join window is closed")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<GameSnapshot>, AppError> {
    payload.validate()?;
    let snapshot = game_service::join(&state, id, payload.user_id).await?;
    Ok(Json(snapshot))
}

/// Trigger the `WAITING -> RUNNING` transition.
#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Start outcome; a no-op when already started", body = StartReport)
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StartReport>, AppError> {
    let report = lifecycle::start_game(&state, id).await?;
    Ok(Json(report))
}

/// Report a release and learn whether the game finished.
#[utoipa::path(
    post,
    path = "/games/{id}/eliminate",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    request_body = EliminateRequest,
    responses(
        (status = 200, description = "Elimination outcome", body = EliminationReport),
        (status = 404, description = "Game or player not found"),
        (status = 409, description = "Game has not started")
    )
)]
pub async fn eliminate(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EliminateRequest>,
) -> Result<Json<EliminationReport>, AppError> {
    payload.validate()?;
    let report = elimination_service::eliminate(&state, id, &payload.user_id).await?;
    Ok(Json(report))
}

/// Run winner resolution directly against the current holder count.
#[utoipa::path(
    post,
    path = "/games/{id}/resolve",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Resolution outcome", body = EliminationReport),
        (status = 409, description = "Game has not started")
    )
)]
pub async fn resolve_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EliminationReport>, AppError> {
    let resolution = resolution::resolve(&state, id).await?;
    let report = resolution::report(&state, resolution).await?;
    Ok(Json(report))
}
