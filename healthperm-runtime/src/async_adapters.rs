use crate::interfaces::{GrantService, RuntimeError, SessionStore as SessionStoreTrait};
use crate::session::RequestSession;
use async_trait::async_trait;
use healthperm::infra::grant_engine::{GrantRevokeEngine, RouteUpdate};
use healthperm::infra::session_store::SessionStore;
use healthperm_core::{Category, ExerciseRouteState, Permission, PermissionSet, RoutePreference};
use std::sync::Arc;
use tracing::error;

fn join_error(e: tokio::task::JoinError) -> RuntimeError {
    RuntimeError::SessionError(format!("Blocking task failed: {}", e))
}

/// Async wrapper for the sync GrantRevokeEngine
pub struct AsyncGrantRevokeEngine {
    inner: Arc<GrantRevokeEngine>,
}

impl AsyncGrantRevokeEngine {
    pub fn new(inner: Arc<GrantRevokeEngine>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<GrantRevokeEngine> {
        &self.inner
    }
}

#[async_trait]
impl GrantService for AsyncGrantRevokeEngine {
    async fn declared(&self, app: &str) -> Result<PermissionSet, RuntimeError> {
        let inner = self.inner.clone();
        let app = app.to_string();

        tokio::task::spawn_blocking(move || inner.store().load_declared(&app).map_err(RuntimeError::from))
            .await
            .map_err(join_error)?
    }

    async fn granted(&self, app: &str) -> Result<PermissionSet, RuntimeError> {
        let inner = self.inner.clone();
        let app = app.to_string();

        tokio::task::spawn_blocking(move || inner.store().granted_snapshot(&app).map_err(RuntimeError::from))
            .await
            .map_err(join_error)?
    }

    async fn route_state(&self, app: &str) -> ExerciseRouteState {
        let inner = self.inner.clone();
        let app = app.to_string();

        match tokio::task::spawn_blocking(move || inner.routes().exercise_route_state(&app)).await {
            Ok(state) => state,
            Err(e) => {
                error!("Route preference lookup failed: {}", e);
                ExerciseRouteState::default()
            }
        }
    }

    async fn apply(&self, app: &str, permission: Permission, grant: bool) -> Result<bool, RuntimeError> {
        let inner = self.inner.clone();
        let app = app.to_string();

        tokio::task::spawn_blocking(move || {
            inner
                .apply(&app, permission, grant)
                .map_err(RuntimeError::from)
        })
        .await
        .map_err(join_error)?
    }

    async fn apply_category_all(&self, app: &str, category: Category, grant: bool) -> bool {
        let inner = self.inner.clone();
        let app = app.to_string();

        tokio::task::spawn_blocking(move || inner.apply_category_all(&app, category, grant))
            .await
            .unwrap_or_else(|e| {
                error!("Bulk update task failed: {}", e);
                false
            })
    }

    async fn revoke_all(&self, app: &str) -> bool {
        let inner = self.inner.clone();
        let app = app.to_string();

        tokio::task::spawn_blocking(move || inner.revoke_all(&app))
            .await
            .unwrap_or_else(|e| {
                error!("Revoke-all task failed: {}", e);
                false
            })
    }

    async fn update_exercise_route(
        &self,
        app: &str,
        preference: RoutePreference,
    ) -> Result<RouteUpdate, RuntimeError> {
        let inner = self.inner.clone();
        let app = app.to_string();

        tokio::task::spawn_blocking(move || {
            inner
                .update_exercise_route(&app, preference)
                .map_err(RuntimeError::from)
        })
        .await
        .map_err(join_error)?
    }

    async fn enable_exercise_routes(&self, app: &str) -> Result<bool, RuntimeError> {
        let inner = self.inner.clone();
        let app = app.to_string();

        tokio::task::spawn_blocking(move || inner.enable_exercise_routes(&app).map_err(RuntimeError::from))
            .await
            .map_err(join_error)?
    }
}

/// Async wrapper for the sync SessionStore
pub struct AsyncSessionStore {
    inner: Arc<SessionStore>,
}

impl AsyncSessionStore {
    pub fn new(inner: Arc<SessionStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SessionStoreTrait for AsyncSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<RequestSession>, RuntimeError> {
        let inner = self.inner.clone();
        let key = session_id.to_string();

        let loaded = tokio::task::spawn_blocking(move || {
            inner
                .load::<RequestSession>(&key)
                .map_err(|e| RuntimeError::SessionError(e.to_string()))
        })
        .await
        .map_err(join_error)??;

        if let Some(session) = &loaded {
            session
                .validate_version()
                .map_err(RuntimeError::SessionError)?;
        }
        Ok(loaded)
    }

    async fn save(&self, session: &RequestSession) -> Result<(), RuntimeError> {
        let inner = self.inner.clone();
        let session = session.clone();

        tokio::task::spawn_blocking(move || {
            inner
                .save(&session.id, &session)
                .map_err(|e| RuntimeError::SessionError(e.to_string()))
        })
        .await
        .map_err(join_error)?
    }

    async fn remove(&self, session_id: &str) -> Result<(), RuntimeError> {
        let inner = self.inner.clone();
        let key = session_id.to_string();

        tokio::task::spawn_blocking(move || {
            inner
                .remove(&key)
                .map(|_| ())
                .map_err(|e| RuntimeError::SessionError(e.to_string()))
        })
        .await
        .map_err(join_error)?
    }
}
