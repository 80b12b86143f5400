//! Abstract interfaces for runtime dependencies.

use crate::session::RequestSession;
use async_trait::async_trait;
use healthperm::infra::grant_engine::RouteUpdate;
use healthperm_core::{
    Category, EngineError, ExerciseRouteState, Permission, PermissionSet, RoutePreference,
};
use thiserror::Error;

/// Runtime errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Session not concluded: {0}")]
    SessionNotConcluded(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Grant and revoke operations for one host.
#[async_trait]
pub trait GrantService: Send + Sync {
    /// Declared permissions, filtered by visibility.
    async fn declared(&self, app: &str) -> Result<PermissionSet, RuntimeError>;

    /// Current grants as seen by the cache.
    async fn granted(&self, app: &str) -> Result<PermissionSet, RuntimeError>;

    async fn route_state(&self, app: &str) -> ExerciseRouteState;

    async fn apply(&self, app: &str, permission: Permission, grant: bool) -> Result<bool, RuntimeError>;

    async fn apply_category_all(&self, app: &str, category: Category, grant: bool) -> bool;

    async fn revoke_all(&self, app: &str) -> bool;

    async fn update_exercise_route(
        &self,
        app: &str,
        preference: RoutePreference,
    ) -> Result<RouteUpdate, RuntimeError>;

    /// Grants exercise read together with exercise routes.
    async fn enable_exercise_routes(&self, app: &str) -> Result<bool, RuntimeError>;
}

/// Request session checkpoints.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<RequestSession>, RuntimeError>;

    async fn save(&self, session: &RequestSession) -> Result<(), RuntimeError>;

    async fn remove(&self, session_id: &str) -> Result<(), RuntimeError>;
}
