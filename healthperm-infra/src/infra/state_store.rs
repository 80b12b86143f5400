use crate::infra::contracts::{DeclarationReader, PermissionBackend};
use healthperm_core::{EngineError, Permission, PermissionCatalog, PermissionSet};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Declared and granted permission sets per app, cached for the lifetime of
/// the store.
pub struct PermissionStateStore {
    declarations: Arc<dyn DeclarationReader>,
    backend: Arc<dyn PermissionBackend>,
    catalog: PermissionCatalog,
    declared: Mutex<HashMap<String, PermissionSet>>,
    granted: Mutex<HashMap<String, PermissionSet>>,
}

impl PermissionStateStore {
    pub fn new(
        declarations: Arc<dyn DeclarationReader>,
        backend: Arc<dyn PermissionBackend>,
        catalog: PermissionCatalog,
    ) -> Self {
        Self {
            declarations,
            backend,
            catalog,
            declared: Mutex::new(HashMap::new()),
            granted: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn backend(&self) -> &Arc<dyn PermissionBackend> {
        &self.backend
    }

    pub fn is_usage_rationale_declared(&self, app: &str) -> bool {
        self.declarations.is_usage_rationale_declared(app)
    }

    pub fn load_declared(&self, app: &str) -> Result<PermissionSet, EngineError> {
        if let Some(cached) = self.declared.lock().get(app) {
            return Ok(cached.clone());
        }

        let ids = self
            .declarations
            .declared_permissions(app)
            .map_err(|e| EngineError::BackendCallFailed(e.to_string()))?;
        let declared = self.catalog.valid_declared(&ids);
        debug!("Loaded {} declared permissions for {}", declared.len(), app);

        self.declared.lock().insert(app.to_string(), declared.clone());
        Ok(declared)
    }

    pub fn granted_snapshot(&self, app: &str) -> Result<PermissionSet, EngineError> {
        if let Some(cached) = self.granted.lock().get(app) {
            return Ok(cached.clone());
        }
        self.refresh_granted(app)
    }

    /// Re-reads grants from the backend and replaces the cache. On failure the
    /// previous cache entry is left as it was.
    pub fn refresh_granted(&self, app: &str) -> Result<PermissionSet, EngineError> {
        let ids = self
            .backend
            .granted_permissions(app)
            .map_err(|e| EngineError::BackendCallFailed(e.to_string()))?;
        let granted: PermissionSet = self.catalog.parse_all(&ids).into_iter().collect();
        debug!("Refreshed {} granted permissions for {}", granted.len(), app);

        self.granted.lock().insert(app.to_string(), granted.clone());
        Ok(granted)
    }

    pub fn invalidate(&self, app: &str) {
        self.granted.lock().remove(app);
    }

    /// `requested ∩ declared`, in request order.
    pub fn filter(&self, declared: &PermissionSet, requested: &[Permission]) -> Vec<Permission> {
        requested
            .iter()
            .filter(|p| declared.contains(p))
            .copied()
            .collect()
    }

    pub fn user_fixed_permissions(&self, app: &str, permissions: &[Permission]) -> Vec<Permission> {
        let declared = match self.load_declared(app) {
            Ok(declared) => declared,
            Err(e) => {
                warn!("Cannot read declarations for {}: {}", app, e);
                return Vec::new();
            }
        };
        let candidates = self.filter(&declared, permissions);
        if candidates.is_empty() {
            return Vec::new();
        }

        let ids: Vec<String> = candidates.iter().map(Permission::id).collect();
        match self.backend.permission_flags(app, &ids) {
            Ok(flags) => candidates
                .into_iter()
                .filter(|p| flags.get(&p.id()).map(|f| f.is_user_fixed()).unwrap_or(false))
                .collect(),
            Err(e) => {
                warn!("Cannot read permission flags for {}: {}", app, e);
                Vec::new()
            }
        }
    }

    pub fn is_any_permission_user_fixed(&self, app: &str, permissions: &[Permission]) -> bool {
        !self.user_fixed_permissions(app, permissions).is_empty()
    }
}
