//! Host-side services the engine consumes.

use healthperm_core::{ExerciseRouteState, PermissionFlags};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Call rejected for {permission}: {reason}")]
    Rejected { permission: String, reason: String },
}

/// Reads an app's manifest-level declarations.
pub trait DeclarationReader: Send + Sync {
    fn is_usage_rationale_declared(&self, app: &str) -> bool;

    fn declared_permissions(&self, app: &str) -> Result<Vec<String>, BackendError>;
}

/// OS permission service.
pub trait PermissionBackend: Send + Sync {
    fn granted_permissions(&self, app: &str) -> Result<Vec<String>, BackendError>;

    fn grant(&self, app: &str, permission: &str) -> Result<(), BackendError>;

    fn revoke(&self, app: &str, permission: &str) -> Result<(), BackendError>;

    fn permission_flags(
        &self,
        app: &str,
        permissions: &[String],
    ) -> Result<HashMap<String, PermissionFlags>, BackendError>;

    /// Sets or clears `USER_FIXED` on each of `permissions`.
    fn set_user_fixed(&self, app: &str, permissions: &[String], fixed: bool) -> Result<(), BackendError>;
}

pub trait ExerciseRoutePreferenceProvider: Send + Sync {
    fn exercise_route_state(&self, app: &str) -> ExerciseRouteState;
}
