/// OpenAPI documentation generation.
pub mod documentation;
/// Elimination processing ("I let go") and its downstream resolution.
pub mod elimination_service;
/// Game bootstrap, joins, snapshots, and the operational reset.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Lifecycle state machine rules and the start transition.
pub mod lifecycle;
/// Winner resolution protocol.
pub mod resolution;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
