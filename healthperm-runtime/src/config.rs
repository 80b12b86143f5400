//! Engine configuration loader.

use crate::interfaces::RuntimeError;
use healthperm::infra::contracts::{DeclarationReader, ExerciseRoutePreferenceProvider, PermissionBackend};
use healthperm::infra::grant_engine::GrantRevokeEngine;
use healthperm::infra::lock_manager::LockManager;
use healthperm::infra::state_store::PermissionStateStore;
use healthperm_core::{FeatureToggles, PermissionCatalog};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("./data/sessions")
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub feature_toggles: FeatureToggles,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feature_toggles: FeatureToggles::default(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            sessions_dir: default_sessions_dir(),
        }
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Wires a store and engine over the given host services.
    pub fn build_engine(
        &self,
        declarations: Arc<dyn DeclarationReader>,
        backend: Arc<dyn PermissionBackend>,
        routes: Arc<dyn ExerciseRoutePreferenceProvider>,
    ) -> Arc<GrantRevokeEngine> {
        let store = PermissionStateStore::new(
            declarations,
            backend,
            PermissionCatalog::new(self.feature_toggles),
        );
        Arc::new(GrantRevokeEngine::new(
            Arc::new(store),
            routes,
            LockManager::new(self.lock_timeout()),
        ))
    }
}

/// Load engine configuration from a YAML file.
///
/// # Errors
/// Returns `ConfigError` if the file is missing, empty, not valid YAML, or
/// sets a zero lock timeout.
pub fn load_engine_config(config_path: &str) -> Result<EngineConfig, RuntimeError> {
    let config_file = Path::new(config_path);

    if !config_file.exists() {
        return Err(RuntimeError::ConfigError(format!(
            "Config file not found: {}",
            config_path
        )));
    }

    let content = std::fs::read_to_string(config_file)?;

    if content.trim().is_empty() {
        return Err(RuntimeError::ConfigError("Config file is empty".to_string()));
    }

    let config: EngineConfig = serde_yaml::from_str(&content)
        .map_err(|e| RuntimeError::ConfigError(format!("Invalid YAML: {}", e)))?;

    if config.lock_timeout_ms == 0 {
        return Err(RuntimeError::ConfigError(
            "Invalid field: lock_timeout_ms must be positive".to_string(),
        ));
    }

    if config.sessions_dir.as_os_str().is_empty() {
        return Err(RuntimeError::ConfigError(
            "Invalid field: sessions_dir is empty".to_string(),
        ));
    }

    Ok(config)
}
