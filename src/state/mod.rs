/// Broadcast hub for the public SSE stream.
mod sse;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{config::AppConfig, dao::game_store::GameStore, error::ServiceError};

pub use self::sse::SseHub;

/// Cheaply cloneable handle on the application state.
pub type SharedState = Arc<AppState>;

/// Handle used to push messages to a connected player's WebSocket.
///
/// The registry of these is ephemeral and local to this process; it is a
/// fan-out convenience only and never authoritative for game outcome.
#[derive(Clone)]
pub struct PlayerConnection {
    /// Player row id the connection identified as.
    pub player_id: String,
    /// Game the connection is watching.
    pub game_id: Uuid,
    /// Writer half of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state storing the storage handle, live connections,
/// and broadcast channels.
pub struct AppState {
    config: AppConfig,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    sse: SseHub,
    connections: DashMap<String, PlayerConnection>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be
    /// cloned cheaply. The application starts in degraded mode until a
    /// storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            game_store: RwLock::new(None),
            sse: SseHub::new(16),
            connections: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    /// State with a storage backend already installed; used by tests and
    /// database-less deployments.
    pub async fn with_store(config: AppConfig, store: Arc<dyn GameStore>) -> SharedState {
        let state = Self::new(config);
        state.set_game_store(store).await;
        state
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Game store handle, or [`ServiceError::Degraded`] when none is
    /// installed.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Flip the degraded flag, notifying watchers on change.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Registry of live player WebSocket connections keyed by player id.
    pub fn connections(&self) -> &DashMap<String, PlayerConnection> {
        &self.connections
    }
}
