use serde::Serialize;
use utoipa::ToSchema;

/// Generic acknowledgement returned by administrative actions.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable result of the action.
    pub message: String,
}

impl ActionResponse {
    /// Build an acknowledgement with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
