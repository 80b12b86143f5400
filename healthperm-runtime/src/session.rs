//! Request session state, persisted between screens.

use crate::results::PermissionGrants;
use chrono::{DateTime, Utc};
use healthperm_core::{Category, Permission, PermissionState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Schema version for persisted sessions.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Init,
    ShowMedical,
    ShowFitness,
    ShowAdditional,
    Concluded,
}

impl FlowState {
    /// Category whose screen is shown in this state.
    pub fn category(&self) -> Option<Category> {
        match self {
            FlowState::ShowMedical => Some(Category::Medical),
            FlowState::ShowFitness => Some(Category::Fitness),
            FlowState::ShowAdditional => Some(Category::Additional),
            FlowState::Init | FlowState::Concluded => None,
        }
    }

    pub fn showing(category: Category) -> Self {
        match category {
            Category::Medical => FlowState::ShowMedical,
            Category::Fitness => FlowState::ShowFitness,
            Category::Additional => FlowState::ShowAdditional,
        }
    }
}

/// Permissions still to be prompted, per screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenBuckets {
    pub medical: Vec<Permission>,
    pub fitness: Vec<Permission>,
    pub additional: Vec<Permission>,
}

impl ScreenBuckets {
    pub fn get(&self, category: Category) -> &[Permission] {
        match category {
            Category::Medical => &self.medical,
            Category::Fitness => &self.fitness,
            Category::Additional => &self.additional,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<Permission> {
        match category {
            Category::Medical => &mut self.medical,
            Category::Fitness => &mut self.fitness,
            Category::Additional => &mut self.additional,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSession {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: String,
    pub app: String,
    pub requested: Vec<String>,
    pub grants: PermissionGrants,
    pub buckets: ScreenBuckets,
    #[serde(default)]
    pub toggled: BTreeSet<Permission>,
    #[serde(default)]
    pub concluded: BTreeSet<Category>,
    pub state: FlowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestSession {
    pub fn new<S: AsRef<str>>(app: &str, requested: &[S]) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            app: app.to_string(),
            requested: requested.iter().map(|s| s.as_ref().to_string()).collect(),
            grants: PermissionGrants::new(),
            buckets: ScreenBuckets::default(),
            toggled: BTreeSet::new(),
            concluded: BTreeSet::new(),
            state: FlowState::Init,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate_version(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "Session schema version mismatch: expected {}, got {}",
                SCHEMA_VERSION, self.schema_version
            ));
        }
        Ok(())
    }

    pub fn is_concluded(&self) -> bool {
        self.state == FlowState::Concluded
    }

    /// Permissions on the screen currently shown.
    pub fn current_screen(&self) -> &[Permission] {
        match self.state.category() {
            Some(category) => self.buckets.get(category),
            None => &[],
        }
    }

    pub fn is_toggled(&self, permission: &Permission) -> bool {
        self.toggled.contains(permission)
    }

    pub fn state_of(&self, permission: &Permission) -> Option<PermissionState> {
        self.grants.get(permission)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
