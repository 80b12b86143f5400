//! Scenario files: an app's host state, a permission request with the user's
//! answers, and follow-up manage-app actions.

use anyhow::{bail, Context, Result};
use healthperm::infra::memory_backend::{AppManifest, BackendCall, InMemoryHost};
use healthperm_core::{Category, ExerciseRouteState, Permission, PermissionFlags, RoutePreference};
use healthperm_runtime::{
    AppPermissionsController, AppPermissionsView, AsyncGrantRevokeEngine, EngineConfig,
    RequestFlowSequencer, ResultArrays, SessionStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub app: String,
    #[serde(default)]
    pub manifest: AppManifest,
    #[serde(default)]
    pub granted: Vec<String>,
    #[serde(default)]
    pub user_fixed: Vec<String>,
    #[serde(default)]
    pub routes: ExerciseRouteState,
    #[serde(default)]
    pub requested: Vec<String>,
    /// Identifiers the user turns on whenever they are shown.
    #[serde(default)]
    pub approve: Vec<String>,
    #[serde(default)]
    pub approve_all: bool,
    #[serde(default)]
    pub manage: Vec<ManageAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageAction {
    Grant { permission: String },
    Revoke { permission: String },
    GrantAll { category: Category },
    RevokeAll { category: Category },
    RevokeAllHealth,
    ExerciseRoute { preference: RoutePreference },
    EnableExerciseRoutes,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub session_id: String,
    pub screens: Vec<Category>,
    pub result: ResultArrays,
    pub view: AppPermissionsView,
    pub backend_calls: Vec<BackendCall>,
}

pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<Scenario> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let scenario: Scenario = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
    if scenario.app.trim().is_empty() {
        bail!("Scenario is missing the app name");
    }
    Ok(scenario)
}

fn seed_host(scenario: &Scenario) -> Arc<InMemoryHost> {
    let host = Arc::new(InMemoryHost::new());
    host.install(&scenario.app, scenario.manifest.clone());
    host.set_granted(&scenario.app, &scenario.granted);
    host.set_route_state(&scenario.app, scenario.routes);
    for id in &scenario.user_fixed {
        host.set_flags(
            &scenario.app,
            id,
            PermissionFlags(PermissionFlags::USER_SET | PermissionFlags::USER_FIXED),
        );
    }
    host
}

/// Replays `scenario` against a fresh in-memory host.
///
/// When `sessions` is given, the request session is checkpointed after every
/// screen and removed once it concludes.
pub async fn run_scenario(
    scenario: &Scenario,
    config: &EngineConfig,
    sessions: Option<&dyn SessionStore>,
) -> Result<ScenarioReport> {
    let host = seed_host(scenario);
    let engine = config.build_engine(host.clone(), host.clone(), host.clone());
    let sequencer = RequestFlowSequencer::new(engine.clone());

    let approved: HashSet<Permission> = scenario
        .approve
        .iter()
        .filter_map(|id| id.parse().ok())
        .collect();

    let mut session = sequencer.start(&scenario.app, &scenario.requested);
    let mut screens = Vec::new();
    while let Some(category) = session.state.category() {
        screens.push(category);
        if scenario.approve_all {
            sequencer.set_all(&mut session, true)?;
        } else {
            for permission in session.current_screen().to_vec() {
                let grant = approved.contains(&permission);
                sequencer.set_permission(&mut session, permission, grant)?;
            }
        }
        if let Some(store) = sessions {
            store.save(&session).await?;
        }
        sequencer.conclude_screen(&mut session)?;
    }
    let result = sequencer.finalize(&session)?.to_result_arrays();
    if let Some(store) = sessions {
        store.remove(&session.id).await?;
    }
    info!("Request for {} concluded after {} screens", scenario.app, screens.len());

    let controller = AppPermissionsController::new(
        Arc::new(AsyncGrantRevokeEngine::new(engine)),
        &scenario.app,
    );
    controller.load().await?;
    for action in &scenario.manage {
        let applied = match action {
            ManageAction::ExerciseRoute { preference } => {
                let update = controller.update_exercise_route(*preference).await;
                info!("Route preference {:?}: {:?}", preference, update);
                continue;
            }
            ManageAction::EnableExerciseRoutes => controller.enable_exercise_routes().await,
            ManageAction::Grant { permission } => {
                controller.update_permission(parse(permission)?, true).await
            }
            ManageAction::Revoke { permission } => {
                controller.update_permission(parse(permission)?, false).await
            }
            ManageAction::GrantAll { category } => controller.grant_all(*category).await,
            ManageAction::RevokeAll { category } => controller.revoke_all(*category).await,
            ManageAction::RevokeAllHealth => controller.revoke_all_health().await,
        };
        info!("{:?} applied: {}", action, applied);
    }

    Ok(ScenarioReport {
        session_id: session.id,
        screens,
        result,
        view: controller.current(),
        backend_calls: host.calls(),
    })
}

fn parse(id: &str) -> Result<Permission> {
    id.parse::<Permission>()
        .with_context(|| format!("Unknown permission in manage action: {}", id))
}
