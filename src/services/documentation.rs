use utoipa::OpenApi;

/// Aggregated OpenAPI specification for Last Touch Back.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::game::current_game,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::join_game,
        crate::routes::game::start_game,
        crate::routes::game::eliminate,
        crate::routes::game::resolve_game,
        crate::routes::admin::reset,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::JoinRequest,
            crate::dto::game::EliminateRequest,
            crate::dto::game::GameSnapshot,
            crate::dto::game::PlayerSummary,
            crate::dto::game::EliminationReport,
            crate::dto::game::StartReport,
            crate::dto::admin::ActionResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dao::models::GameState,
            crate::dao::models::PlayerStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game lifecycle and participation"),
        (name = "admin", description = "Operational endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket operations for player clients"),
    )
)]
pub struct ApiDoc;
