//! Manage-app permissions surface.

use crate::interfaces::{GrantService, RuntimeError};
use healthperm::infra::grant_engine::RouteUpdate;
use healthperm_core::{Category, ExerciseRouteState, Permission, PermissionSet, RoutePreference, Scope};
use healthperm_policy::DependencyResolver;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Whether "revoke all" for a scope should also take the additional permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevokeInclusion {
    pub fitness: bool,
    pub medical: bool,
    pub all: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppPermissionsView {
    pub app: String,
    pub fitness_granted: Vec<Permission>,
    pub medical_granted: Vec<Permission>,
    pub additional_granted: Vec<Permission>,
    pub all_fitness_granted: bool,
    pub all_medical_granted: bool,
    pub all_additional_granted: bool,
    pub any_fitness_read_granted: bool,
    pub any_medical_read_granted: bool,
    pub include_background: RevokeInclusion,
    pub include_past_data: RevokeInclusion,
    pub exercise_routes: ExerciseRouteState,
}

impl AppPermissionsView {
    fn build(
        app: &str,
        declared: &PermissionSet,
        granted: &PermissionSet,
        routes: ExerciseRouteState,
        resolver: &DependencyResolver<'_>,
    ) -> Self {
        let granted_in = |category: Category| -> Vec<Permission> {
            declared
                .of_category(category)
                .into_iter()
                .filter(|p| granted.contains(p))
                .collect()
        };
        let all_granted = |category: Category, held: &[Permission]| {
            let declared_count = declared.of_category(category).len();
            declared_count > 0 && declared_count == held.len()
        };

        let fitness_granted = granted_in(Category::Fitness);
        let medical_granted = granted_in(Category::Medical);
        let additional_granted = granted_in(Category::Additional);

        Self {
            app: app.to_string(),
            all_fitness_granted: all_granted(Category::Fitness, &fitness_granted),
            all_medical_granted: all_granted(Category::Medical, &medical_granted),
            all_additional_granted: all_granted(Category::Additional, &additional_granted),
            any_fitness_read_granted: granted.any_fitness_read(),
            any_medical_read_granted: granted.any_medical_read(),
            include_background: RevokeInclusion {
                fitness: resolver.should_include_background_on_revoke(Scope::Fitness),
                medical: resolver.should_include_background_on_revoke(Scope::Medical),
                all: resolver.should_include_background_on_revoke(Scope::All),
            },
            include_past_data: RevokeInclusion {
                fitness: resolver.should_include_past_data_on_revoke(Scope::Fitness),
                medical: resolver.should_include_past_data_on_revoke(Scope::Medical),
                all: resolver.should_include_past_data_on_revoke(Scope::All),
            },
            exercise_routes: routes,
            fitness_granted,
            medical_granted,
            additional_granted,
        }
    }
}

/// Publishes an [`AppPermissionsView`] after every change it makes.
pub struct AppPermissionsController {
    service: Arc<dyn GrantService>,
    app: String,
    view_tx: watch::Sender<AppPermissionsView>,
}

impl AppPermissionsController {
    pub fn new(service: Arc<dyn GrantService>, app: &str) -> Self {
        let (view_tx, _) = watch::channel(AppPermissionsView {
            app: app.to_string(),
            ..Default::default()
        });
        Self {
            service,
            app: app.to_string(),
            view_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AppPermissionsView> {
        self.view_tx.subscribe()
    }

    pub fn current(&self) -> AppPermissionsView {
        self.view_tx.borrow().clone()
    }

    /// Reads declared and granted state and publishes a fresh view.
    pub async fn load(&self) -> Result<AppPermissionsView, RuntimeError> {
        let declared = self.service.declared(&self.app).await?;
        let granted = self.service.granted(&self.app).await?;
        let routes = self.service.route_state(&self.app).await;

        let resolver = DependencyResolver::new(&granted, &declared, routes);
        let view = AppPermissionsView::build(&self.app, &declared, &granted, routes, &resolver);
        self.view_tx.send_replace(view.clone());
        Ok(view)
    }

    async fn publish(&self) {
        if let Err(e) = self.load().await {
            warn!("Cannot refresh permissions view for {}: {}", self.app, e);
        }
    }

    pub async fn update_permission(&self, permission: Permission, grant: bool) -> bool {
        let applied = match self.service.apply(&self.app, permission, grant).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Update of {} for {} failed: {}", permission, self.app, e);
                false
            }
        };
        self.publish().await;
        applied
    }

    pub async fn grant_all(&self, category: Category) -> bool {
        let applied = self.service.apply_category_all(&self.app, category, true).await;
        self.publish().await;
        applied
    }

    pub async fn revoke_all(&self, category: Category) -> bool {
        let applied = self.service.apply_category_all(&self.app, category, false).await;
        self.publish().await;
        applied
    }

    /// Removes every health permission of the app.
    pub async fn revoke_all_health(&self) -> bool {
        info!("Removing all health access for {}", self.app);
        let applied = self.service.revoke_all(&self.app).await;
        self.publish().await;
        applied
    }

    /// Changes the exercise-route preference. `ExerciseReadRequired` leaves
    /// state untouched until [`Self::enable_exercise_routes`] confirms.
    pub async fn update_exercise_route(&self, preference: RoutePreference) -> RouteUpdate {
        let update = match self.service.update_exercise_route(&self.app, preference).await {
            Ok(update) => update,
            Err(e) => {
                warn!("Route preference update for {} failed: {}", self.app, e);
                RouteUpdate::Applied(false)
            }
        };
        self.publish().await;
        update
    }

    pub async fn enable_exercise_routes(&self) -> bool {
        let applied = match self.service.enable_exercise_routes(&self.app).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Cannot enable exercise routes for {}: {}", self.app, e);
                false
            }
        };
        self.publish().await;
        applied
    }
}
