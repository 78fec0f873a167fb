use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::admin::ActionResponse, error::AppError, services::game_service, state::SharedState,
};

/// Operational endpoints. Not part of normal game flow.
pub fn router() -> Router<SharedState> {
    Router::new().route("/admin/reset", post(reset))
}

/// Delete all game and player rows.
#[utoipa::path(
    post,
    path = "/admin/reset",
    tag = "admin",
    responses(
        (status = 200, description = "All rows deleted", body = ActionResponse)
    )
)]
pub async fn reset(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    game_service::reset_all(&state).await?;
    Ok(Json(ActionResponse::new(
        "deleted all game and player rows",
    )))
}
