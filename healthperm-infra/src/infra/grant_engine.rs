//! Applies grants and revocations with their cascades.
//!
//! Every mutating call holds the app's lock for the whole sequence: resolve the
//! plan from the cached snapshot, issue one backend call per permission, then
//! re-read grants into the cache. Backend failures never abort a batch; they
//! turn the overall result into `false`.

use crate::infra::contracts::ExerciseRoutePreferenceProvider;
use crate::infra::lock_manager::{AppLock, LockManager};
use crate::infra::state_store::PermissionStateStore;
use healthperm_core::{
    CascadePlan, Category, EngineError, Permission, PermissionSet, RoutePreference, Scope,
};
use healthperm_policy::DependencyResolver;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of an exercise-route preference change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteUpdate {
    /// The preference already had the requested value.
    Unchanged,
    /// Backend calls were issued; `false` if any of them failed.
    Applied(bool),
    /// Always-allow needs exercise read as well. Nothing was changed; confirm
    /// with [`GrantRevokeEngine::enable_exercise_routes`].
    ExerciseReadRequired,
}

pub struct GrantRevokeEngine {
    store: Arc<PermissionStateStore>,
    routes: Arc<dyn ExerciseRoutePreferenceProvider>,
    locks: LockManager,
}

impl GrantRevokeEngine {
    pub fn new(
        store: Arc<PermissionStateStore>,
        routes: Arc<dyn ExerciseRoutePreferenceProvider>,
        locks: LockManager,
    ) -> Self {
        Self { store, routes, locks }
    }

    pub fn store(&self) -> &Arc<PermissionStateStore> {
        &self.store
    }

    pub fn routes(&self) -> &Arc<dyn ExerciseRoutePreferenceProvider> {
        &self.routes
    }

    fn lock(&self, app: &str) -> Result<AppLock, EngineError> {
        self.locks
            .acquire(app)
            .map_err(|e| EngineError::Busy(e.to_string()))
    }

    fn snapshot(&self, app: &str) -> Result<(PermissionSet, PermissionSet), EngineError> {
        let declared = self.store.load_declared(app)?;
        let granted = self.store.granted_snapshot(app)?;
        Ok((declared, granted))
    }

    /// Grants or revokes a single declared permission.
    ///
    /// Returns `Ok(false)` when any backend call failed. The cache is re-read
    /// either way.
    pub fn apply(&self, app: &str, permission: Permission, grant: bool) -> Result<bool, EngineError> {
        let _lock = self.lock(app)?;
        let declared = self.store.load_declared(app)?;
        if !declared.contains(&permission) {
            return Err(EngineError::DeclarationMissing(permission));
        }
        let granted = self.store.granted_snapshot(app)?;

        let resolver = DependencyResolver::new(&granted, &declared, self.routes.exercise_route_state(app));
        let plan = if grant {
            if !resolver.can_grant(&permission) {
                return Err(EngineError::DependencyUnmet(permission));
            }
            CascadePlan { to_grant: vec![permission], to_revoke: Vec::new() }
        } else {
            resolver.plan_revoke(permission)
        };

        info!(
            "{} {} for {} ({} backend calls)",
            if grant { "Granting" } else { "Revoking" },
            permission,
            app,
            plan.len()
        );
        Ok(self.execute(app, &plan))
    }

    /// Grants every declared permission of `category`, or revokes them with
    /// the revoke-all cascade.
    pub fn apply_category_all(&self, app: &str, category: Category, grant: bool) -> bool {
        let _lock = match self.lock(app) {
            Ok(lock) => lock,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };
        let (declared, granted) = match self.snapshot(app) {
            Ok(sets) => sets,
            Err(e) => {
                error!("Cannot snapshot {} before bulk update: {}", app, e);
                return false;
            }
        };

        let resolver = DependencyResolver::new(&granted, &declared, self.routes.exercise_route_state(app));
        let plan = if grant {
            resolver.plan_grant_all(category)
        } else {
            resolver.plan_revoke_all(category)
        };

        info!(
            "{} all {} permissions for {} ({} backend calls)",
            if grant { "Granting" } else { "Revoking" },
            category,
            app,
            plan.len()
        );
        self.execute(app, &plan)
    }

    /// Revokes every declared health permission of `app`.
    pub fn revoke_all(&self, app: &str) -> bool {
        let _lock = match self.lock(app) {
            Ok(lock) => lock,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };
        let (declared, granted) = match self.snapshot(app) {
            Ok(sets) => sets,
            Err(e) => {
                error!("Cannot snapshot {} before revoking all: {}", app, e);
                return false;
            }
        };

        let resolver = DependencyResolver::new(&granted, &declared, self.routes.exercise_route_state(app));
        let plan = CascadePlan {
            to_grant: Vec::new(),
            to_revoke: resolver.cascade_for_revoke_all(Scope::All).into_iter().collect(),
        };
        info!("Revoking all health permissions for {} ({} backend calls)", app, plan.len());
        self.execute(app, &plan)
    }

    /// Moves the exercise-route preference to `preference`.
    ///
    /// Always-allow grants the route permission. Ask-every-time revokes it or
    /// clears `USER_FIXED`. Denied revokes it and sets `USER_FIXED`.
    pub fn update_exercise_route(
        &self,
        app: &str,
        preference: RoutePreference,
    ) -> Result<RouteUpdate, EngineError> {
        let _lock = self.lock(app)?;
        let declared = self.store.load_declared(app)?;
        if !declared.contains(&Permission::EXERCISE_ROUTES) {
            return Err(EngineError::DeclarationMissing(Permission::EXERCISE_ROUTES));
        }

        let current = self.routes.exercise_route_state(app);
        if current.exercise_route == preference {
            return Ok(RouteUpdate::Unchanged);
        }
        let was_allowed = current.exercise_route == RoutePreference::AlwaysAllow;
        let revoke_route = CascadePlan {
            to_grant: Vec::new(),
            to_revoke: vec![Permission::EXERCISE_ROUTES],
        };

        info!(
            "Exercise route preference for {}: {:?} -> {:?}",
            app, current.exercise_route, preference
        );
        let ok = match preference {
            RoutePreference::AlwaysAllow => {
                if current.exercise_read != RoutePreference::AlwaysAllow {
                    if declared.contains(&Permission::EXERCISE_READ) {
                        return Ok(RouteUpdate::ExerciseReadRequired);
                    }
                    return Err(EngineError::DependencyUnmet(Permission::EXERCISE_ROUTES));
                }
                let grant_route = CascadePlan {
                    to_grant: vec![Permission::EXERCISE_ROUTES],
                    to_revoke: Vec::new(),
                };
                self.execute(app, &grant_route)
            }
            RoutePreference::AskEveryTime if was_allowed => self.execute(app, &revoke_route),
            RoutePreference::AskEveryTime => self.set_route_fixed(app, false),
            RoutePreference::Denied => {
                let revoked = !was_allowed || self.execute(app, &revoke_route);
                let fixed = self.set_route_fixed(app, true);
                revoked && fixed
            }
        };
        Ok(RouteUpdate::Applied(ok))
    }

    /// Grants exercise read and exercise routes together.
    pub fn enable_exercise_routes(&self, app: &str) -> Result<bool, EngineError> {
        let _lock = self.lock(app)?;
        let declared = self.store.load_declared(app)?;
        for permission in [Permission::EXERCISE_READ, Permission::EXERCISE_ROUTES] {
            if !declared.contains(&permission) {
                return Err(EngineError::DeclarationMissing(permission));
            }
        }

        let plan = CascadePlan {
            to_grant: vec![Permission::EXERCISE_READ, Permission::EXERCISE_ROUTES],
            to_revoke: Vec::new(),
        };
        info!("Enabling exercise routes for {}", app);
        Ok(self.execute(app, &plan))
    }

    /// Re-reads the granted set for `app` under its lock.
    pub fn refresh(&self, app: &str) -> Result<PermissionSet, EngineError> {
        let _lock = self.lock(app)?;
        self.store.refresh_granted(app)
    }

    fn set_route_fixed(&self, app: &str, fixed: bool) -> bool {
        let ids = [Permission::EXERCISE_ROUTES.id()];
        match self.store.backend().set_user_fixed(app, &ids, fixed) {
            Ok(()) => true,
            Err(e) => {
                error!("Cannot update USER_FIXED on exercise routes for {}: {}", app, e);
                false
            }
        }
    }

    fn execute(&self, app: &str, plan: &CascadePlan) -> bool {
        let backend = self.store.backend();
        let mut ok = true;

        for permission in &plan.to_grant {
            if let Err(e) = backend.grant(app, &permission.id()) {
                error!("Grant of {} for {} failed: {}", permission, app, e);
                ok = false;
            }
        }
        for permission in &plan.to_revoke {
            if let Err(e) = backend.revoke(app, &permission.id()) {
                error!("Revoke of {} for {} failed: {}", permission, app, e);
                ok = false;
            }
        }

        if let Err(e) = self.store.refresh_granted(app) {
            warn!("Grant cache for {} not refreshed: {}", app, e);
        }
        ok
    }
}
