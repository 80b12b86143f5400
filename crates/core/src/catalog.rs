//! Permission classification and visibility.

use crate::error::EngineError;
use crate::permission::{FitnessType, Permission};
use crate::permission_set::PermissionSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Feature toggles gating which permission families are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    #[serde(default = "enabled")]
    pub personal_health_records: bool,
    #[serde(default = "enabled")]
    pub activity_intensity: bool,
}

fn enabled() -> bool {
    true
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            personal_health_records: true,
            activity_intensity: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    toggles: FeatureToggles,
}

impl PermissionCatalog {
    pub fn new(toggles: FeatureToggles) -> Self {
        Self { toggles }
    }

    pub fn toggles(&self) -> FeatureToggles {
        self.toggles
    }

    pub fn parse(&self, id: &str) -> Result<Permission, EngineError> {
        id.parse()
    }

    pub fn is_visible(&self, permission: &Permission) -> bool {
        match permission {
            Permission::Medical { .. } => self.toggles.personal_health_records,
            Permission::Fitness { data_type: FitnessType::ActivityIntensity, .. } => {
                self.toggles.activity_intensity
            }
            Permission::Fitness { .. } | Permission::Additional { .. } => true,
        }
    }

    /// Parses identifiers in order, dropping the ones that are not health permissions.
    pub fn parse_all<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Permission> {
        ids.iter()
            .filter_map(|id| match self.parse(id.as_ref()) {
                Ok(permission) => Some(permission),
                Err(e) => {
                    debug!("Dropping identifier: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Declared permissions the app can actually use: visible ones, minus
    /// history access without a declared fitness read and background access
    /// without any declared read.
    pub fn valid_declared<S: AsRef<str>>(&self, ids: &[S]) -> PermissionSet {
        let visible: PermissionSet = self
            .parse_all(ids)
            .into_iter()
            .filter(|p| self.is_visible(p))
            .collect();

        let history_valid = visible.any_fitness_read();
        let background_valid = visible.any_read();

        visible
            .into_iter()
            .filter(|p| {
                let orphan = (*p == Permission::HISTORY && !history_valid)
                    || (*p == Permission::BACKGROUND && !background_valid);
                if orphan {
                    debug!("Dropping {} without a declared base read", p);
                }
                !orphan
            })
            .collect()
    }
}
