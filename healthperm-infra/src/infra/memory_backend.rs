//! In-process host implementing every backend contract.
//!
//! Records each grant/revoke call and supports injected failures, so flows can
//! be replayed without a real permission service.

use crate::infra::contracts::{
    BackendError, DeclarationReader, ExerciseRoutePreferenceProvider, PermissionBackend,
};
use chrono::{DateTime, Utc};
use healthperm_core::{ExerciseRouteState, Permission, PermissionFlags, RoutePreference};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Grant,
    Revoke,
    SetUserFixed,
    ClearUserFixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCall {
    pub app: String,
    pub permission: String,
    pub kind: CallKind,
    pub at: DateTime<Utc>,
}

/// Manifest data for one installed app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppManifest {
    #[serde(default)]
    pub rationale_declared: bool,
    #[serde(default)]
    pub declared: Vec<String>,
}

#[derive(Default)]
struct AppRecord {
    manifest: AppManifest,
    granted: BTreeSet<String>,
    flags: HashMap<String, PermissionFlags>,
    routes: ExerciseRouteState,
    failing: HashSet<String>,
    unavailable: bool,
}

impl AppRecord {
    /// Route preferences follow grant and flag state once either exercise
    /// permission changes.
    fn sync_route_preference(&mut self, permission: &str) {
        let derived = if self.granted.contains(permission) {
            RoutePreference::AlwaysAllow
        } else if self.flags.get(permission).is_some_and(|f| f.is_user_fixed()) {
            RoutePreference::Denied
        } else {
            RoutePreference::AskEveryTime
        };
        if permission == Permission::EXERCISE_ROUTES.id() {
            self.routes.exercise_route = derived;
        } else if permission == Permission::EXERCISE_READ.id() {
            self.routes.exercise_read = derived;
        }
    }
}

#[derive(Default)]
pub struct InMemoryHost {
    apps: Mutex<HashMap<String, AppRecord>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, app: &str, manifest: AppManifest) {
        self.apps.lock().entry(app.to_string()).or_default().manifest = manifest;
    }

    pub fn set_granted<S: AsRef<str>>(&self, app: &str, permissions: &[S]) {
        let mut apps = self.apps.lock();
        let record = apps.entry(app.to_string()).or_default();
        record.granted = permissions.iter().map(|p| p.as_ref().to_string()).collect();
    }

    pub fn set_flags(&self, app: &str, permission: &str, flags: PermissionFlags) {
        let mut apps = self.apps.lock();
        let record = apps.entry(app.to_string()).or_default();
        record.flags.insert(permission.to_string(), flags);
    }

    pub fn set_route_state(&self, app: &str, routes: ExerciseRouteState) {
        self.apps.lock().entry(app.to_string()).or_default().routes = routes;
    }

    /// Makes every grant, revoke or flag update of `permission` fail.
    pub fn fail_on(&self, app: &str, permission: &str) {
        let mut apps = self.apps.lock();
        let record = apps.entry(app.to_string()).or_default();
        record.failing.insert(permission.to_string());
    }

    /// Makes reads of declarations, grants and flags fail.
    pub fn set_unavailable(&self, app: &str, unavailable: bool) {
        self.apps.lock().entry(app.to_string()).or_default().unavailable = unavailable;
    }

    pub fn granted(&self, app: &str) -> Vec<String> {
        self.apps
            .lock()
            .get(app)
            .map(|r| r.granted.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn with_available<T>(
        &self,
        app: &str,
        read: impl FnOnce(&AppRecord) -> T,
    ) -> Result<T, BackendError> {
        let apps = self.apps.lock();
        match apps.get(app) {
            Some(record) if record.unavailable => {
                Err(BackendError::Unavailable(format!("app {} unavailable", app)))
            }
            Some(record) => Ok(read(record)),
            None => Err(BackendError::Unavailable(format!("app {} not installed", app))),
        }
    }

    pub fn flags(&self, app: &str, permission: &str) -> PermissionFlags {
        self.apps
            .lock()
            .get(app)
            .and_then(|r| r.flags.get(permission).copied())
            .unwrap_or_default()
    }

    fn mutate(&self, app: &str, permission: &str, kind: CallKind) -> Result<(), BackendError> {
        self.calls.lock().push(BackendCall {
            app: app.to_string(),
            permission: permission.to_string(),
            kind,
            at: Utc::now(),
        });

        let mut apps = self.apps.lock();
        let record = apps
            .get_mut(app)
            .ok_or_else(|| BackendError::Unavailable(format!("app {} not installed", app)))?;
        if record.failing.contains(permission) {
            return Err(BackendError::Rejected {
                permission: permission.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        match kind {
            CallKind::Grant => {
                record.granted.insert(permission.to_string());
            }
            CallKind::Revoke => {
                record.granted.remove(permission);
            }
            CallKind::SetUserFixed | CallKind::ClearUserFixed => {
                let flags = record.flags.entry(permission.to_string()).or_default();
                if kind == CallKind::SetUserFixed {
                    flags.0 |= PermissionFlags::USER_FIXED;
                } else {
                    flags.0 &= !PermissionFlags::USER_FIXED;
                }
            }
        }
        record.sync_route_preference(permission);
        Ok(())
    }
}

impl DeclarationReader for InMemoryHost {
    fn is_usage_rationale_declared(&self, app: &str) -> bool {
        self.apps
            .lock()
            .get(app)
            .map(|r| r.manifest.rationale_declared)
            .unwrap_or(false)
    }

    fn declared_permissions(&self, app: &str) -> Result<Vec<String>, BackendError> {
        self.with_available(app, |r| r.manifest.declared.clone())
    }
}

impl PermissionBackend for InMemoryHost {
    fn granted_permissions(&self, app: &str) -> Result<Vec<String>, BackendError> {
        self.with_available(app, |r| r.granted.iter().cloned().collect())
    }

    fn grant(&self, app: &str, permission: &str) -> Result<(), BackendError> {
        self.mutate(app, permission, CallKind::Grant)
    }

    fn revoke(&self, app: &str, permission: &str) -> Result<(), BackendError> {
        self.mutate(app, permission, CallKind::Revoke)
    }

    fn permission_flags(
        &self,
        app: &str,
        permissions: &[String],
    ) -> Result<HashMap<String, PermissionFlags>, BackendError> {
        self.with_available(app, |r| {
            permissions
                .iter()
                .map(|p| (p.clone(), r.flags.get(p).copied().unwrap_or_default()))
                .collect()
        })
    }

    fn set_user_fixed(&self, app: &str, permissions: &[String], fixed: bool) -> Result<(), BackendError> {
        let kind = if fixed { CallKind::SetUserFixed } else { CallKind::ClearUserFixed };
        for permission in permissions {
            self.mutate(app, permission, kind)?;
        }
        Ok(())
    }
}

impl ExerciseRoutePreferenceProvider for InMemoryHost {
    fn exercise_route_state(&self, app: &str) -> ExerciseRouteState {
        self.apps.lock().get(app).map(|r| r.routes).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(ids: &[&str]) -> AppManifest {
        AppManifest {
            rationale_declared: true,
            declared: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_grant_and_revoke_are_logged() {
        let host = InMemoryHost::new();
        host.install("app", manifest(&["a", "b"]));
        host.grant("app", "a").unwrap();
        host.revoke("app", "a").unwrap();

        let calls = host.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, CallKind::Grant);
        assert_eq!(calls[1].kind, CallKind::Revoke);
        assert!(host.granted("app").is_empty());
    }

    #[test]
    fn test_injected_failure_leaves_state() {
        let host = InMemoryHost::new();
        host.install("app", manifest(&["a"]));
        host.set_granted("app", &["a"]);
        host.fail_on("app", "a");

        assert!(host.revoke("app", "a").is_err());
        assert_eq!(host.granted("app"), vec!["a".to_string()]);
        assert_eq!(host.calls().len(), 1);
    }

    #[test]
    fn test_unknown_app() {
        let host = InMemoryHost::new();
        assert!(!host.is_usage_rationale_declared("missing"));
        assert!(host.declared_permissions("missing").is_err());
        assert!(host.grant("missing", "a").is_err());
    }

    #[test]
    fn test_unavailable_reads_fail() {
        let host = InMemoryHost::new();
        host.install("app", manifest(&["a"]));
        host.set_unavailable("app", true);
        assert!(host.granted_permissions("app").is_err());
        assert!(host.permission_flags("app", &["a".to_string()]).is_err());
    }

    #[test]
    fn test_route_preference_follows_grants_and_flags() {
        let route = Permission::EXERCISE_ROUTES.id();
        let host = InMemoryHost::new();
        host.install("app", manifest(&[route.as_str()]));

        host.grant("app", &route).unwrap();
        assert_eq!(host.exercise_route_state("app").exercise_route, RoutePreference::AlwaysAllow);

        host.revoke("app", &route).unwrap();
        assert_eq!(host.exercise_route_state("app").exercise_route, RoutePreference::AskEveryTime);

        host.set_user_fixed("app", &[route.clone()], true).unwrap();
        assert_eq!(host.exercise_route_state("app").exercise_route, RoutePreference::Denied);
        assert!(host.flags("app", &route).is_user_fixed());

        host.set_user_fixed("app", &[route.clone()], false).unwrap();
        assert_eq!(host.exercise_route_state("app").exercise_route, RoutePreference::AskEveryTime);
        assert_eq!(host.calls().len(), 4);
    }

    #[test]
    fn test_flags_default_to_empty() {
        let host = InMemoryHost::new();
        host.install("app", manifest(&["a", "b"]));
        host.set_flags("app", "a", PermissionFlags(PermissionFlags::USER_FIXED));
        let flags = host
            .permission_flags("app", &["a".to_string(), "b".to_string()])
            .unwrap();
        assert!(flags["a"].is_user_fixed());
        assert!(!flags["b"].is_user_fixed());
    }
}
