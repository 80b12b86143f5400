use crate::permission::Permission;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unrecognized permission: {0}")]
    Unrecognized(String),
    #[error("Permission not declared by app: {0}")]
    DeclarationMissing(Permission),
    #[error("Base read permission missing for: {0}")]
    DependencyUnmet(Permission),
    #[error("Backend call failed: {0}")]
    BackendCallFailed(String),
    #[error("App is busy, lock timeout: {0}")]
    Busy(String),
}
