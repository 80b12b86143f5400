//! Multi-screen permission request flow.
//!
//! Screens are shown in the order Medical, Fitness, Additional. Each screen
//! collects local toggles; concluding it applies them through the engine and
//! records the decision. The additional screen only appears once some base
//! read is granted.

use crate::interfaces::RuntimeError;
use crate::results::PermissionGrants;
use crate::session::{FlowState, RequestSession, ScreenBuckets};
use healthperm::infra::grant_engine::GrantRevokeEngine;
use healthperm_core::{Category, Permission, PermissionState};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCREEN_ORDER: [Category; 3] = [Category::Medical, Category::Fitness, Category::Additional];

pub struct RequestFlowSequencer {
    engine: Arc<GrantRevokeEngine>,
}

impl RequestFlowSequencer {
    pub fn new(engine: Arc<GrantRevokeEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<GrantRevokeEngine> {
        &self.engine
    }

    /// Opens a session for `requested` identifiers. Unrecognized identifiers
    /// are dropped and duplicates collapse.
    pub fn start<S: AsRef<str>>(&self, app: &str, requested: &[S]) -> RequestSession {
        let mut session = RequestSession::new(app, requested);
        for permission in self.engine.store().catalog().parse_all(requested) {
            session.grants.set(permission, PermissionState::NotGranted);
        }
        info!(
            "Started request session {} for {} ({} permissions)",
            session.id,
            app,
            session.grants.len()
        );

        self.initialize(&mut session);
        session
    }

    /// Re-derives pending screens from current backend state, keeping the
    /// decisions of categories already concluded.
    pub fn resume(&self, mut session: RequestSession) -> RequestSession {
        if session.is_concluded() {
            return session;
        }
        info!("Resuming request session {} for {}", session.id, session.app);
        session.state = FlowState::Init;
        self.initialize(&mut session);
        session
    }

    fn initialize(&self, session: &mut RequestSession) {
        let store = self.engine.store();
        let app = session.app.clone();

        if session.grants.is_empty() {
            debug!("Nothing requested by {}", app);
            self.conclude_denied(session);
            return;
        }
        if !store.is_usage_rationale_declared(&app) {
            info!("{} does not declare a usage rationale, denying request", app);
            self.conclude_denied(session);
            return;
        }

        let (declared, granted) = match (store.load_declared(&app), self.engine.refresh(&app)) {
            (Ok(declared), Ok(granted)) => (declared, granted),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Cannot read permission state for {}: {}", app, e);
                self.conclude_denied(session);
                return;
            }
        };

        for permission in session.grants.permissions() {
            if !session.concluded.contains(&permission.category()) {
                session
                    .grants
                    .set(permission, PermissionState::from_granted(granted.contains(&permission)));
            }
        }

        let requested_declared = store.filter(&declared, &session.grants.permissions());
        let fixed = store.user_fixed_permissions(&app, &requested_declared);
        if let Some(permission) = fixed
            .iter()
            .find(|p| !session.concluded.contains(&p.category()))
        {
            info!("{} is user-fixed for {}, concluding without prompting", permission, app);
            session.buckets = ScreenBuckets::default();
            session.toggled.clear();
            session.state = FlowState::Concluded;
            session.touch();
            return;
        }

        let mut buckets = ScreenBuckets::default();
        for permission in requested_declared {
            if permission == Permission::EXERCISE_ROUTES
                || granted.contains(&permission)
                || session.concluded.contains(&permission.category())
            {
                continue;
            }
            buckets.get_mut(permission.category()).push(permission);
        }
        session
            .toggled
            .retain(|p| buckets.get(p.category()).contains(p));
        session.buckets = buckets;

        self.advance(session);
    }

    fn conclude_denied(&self, session: &mut RequestSession) {
        for permission in session.grants.permissions() {
            if !session.concluded.contains(&permission.category()) {
                session.grants.set(permission, PermissionState::NotGranted);
            }
        }
        session.buckets = ScreenBuckets::default();
        session.toggled.clear();
        session.state = FlowState::Concluded;
        session.touch();
    }

    fn any_read_present(&self, session: &RequestSession) -> bool {
        let backend_read = self
            .engine
            .store()
            .granted_snapshot(&session.app)
            .map(|granted| granted.any_read())
            .unwrap_or(false);
        backend_read || session.grants.any_granted_read()
    }

    fn advance(&self, session: &mut RequestSession) {
        for category in SCREEN_ORDER {
            if session.concluded.contains(&category) {
                continue;
            }
            if session.buckets.get(category).is_empty() {
                session.concluded.insert(category);
                continue;
            }
            if category == Category::Additional && !self.any_read_present(session) {
                debug!("No read granted for {}, skipping additional screen", session.app);
                for permission in session.buckets.additional.clone() {
                    session.grants.set(permission, PermissionState::NotGranted);
                }
                session.concluded.insert(category);
                continue;
            }

            session.state = FlowState::showing(category);
            session.touch();
            info!("Session {} showing {} screen", session.id, category);
            return;
        }

        session.state = FlowState::Concluded;
        session.touch();
        info!("Session {} concluded", session.id);
    }

    /// Records a local toggle on the current screen.
    pub fn set_permission(
        &self,
        session: &mut RequestSession,
        permission: Permission,
        grant: bool,
    ) -> Result<(), RuntimeError> {
        if !session.current_screen().contains(&permission) {
            return Err(RuntimeError::SessionError(format!(
                "{} is not on the current screen",
                permission
            )));
        }
        if grant {
            session.toggled.insert(permission);
        } else {
            session.toggled.remove(&permission);
        }
        session.touch();
        Ok(())
    }

    /// Toggles every permission on the current screen.
    pub fn set_all(&self, session: &mut RequestSession, grant: bool) -> Result<(), RuntimeError> {
        if session.state.category().is_none() {
            return Err(RuntimeError::SessionError(format!(
                "Session {} has no screen shown",
                session.id
            )));
        }
        for permission in session.current_screen().to_vec() {
            self.set_permission(session, permission, grant)?;
        }
        Ok(())
    }

    /// Applies the current screen's toggles and moves to the next screen.
    ///
    /// The recorded state follows the local decision even when a backend call
    /// fails.
    pub fn conclude_screen(&self, session: &mut RequestSession) -> Result<(), RuntimeError> {
        let category = session.state.category().ok_or_else(|| {
            RuntimeError::SessionError(format!("Session {} has no screen shown", session.id))
        })?;

        for permission in session.buckets.get(category).to_vec() {
            let grant = session.toggled.contains(&permission);
            match self.engine.apply(&session.app, permission, grant) {
                Ok(true) => {}
                Ok(false) => warn!("Backend did not fully apply {} for {}", permission, session.app),
                Err(e) => warn!("Could not apply {} for {}: {}", permission, session.app, e),
            }
            session.grants.set(permission, PermissionState::from_granted(grant));
            session.toggled.remove(&permission);
        }

        session.concluded.insert(category);
        self.advance(session);
        Ok(())
    }

    pub fn finalize(&self, session: &RequestSession) -> Result<PermissionGrants, RuntimeError> {
        if !session.is_concluded() {
            return Err(RuntimeError::SessionNotConcluded(session.id.clone()));
        }
        Ok(session.grants.clone())
    }
}
