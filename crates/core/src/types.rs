use crate::permission::Permission;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PERMISSION_GRANTED: i32 = 0;
pub const PERMISSION_DENIED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    NotGranted,
}

impl PermissionState {
    pub fn from_granted(granted: bool) -> Self {
        if granted {
            PermissionState::Granted
        } else {
            PermissionState::NotGranted
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }

    pub fn result_code(&self) -> i32 {
        match self {
            PermissionState::Granted => PERMISSION_GRANTED,
            PermissionState::NotGranted => PERMISSION_DENIED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Fitness,
    Medical,
    Additional,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Fitness, Category::Medical, Category::Additional];

    /// Revoke scope for the base categories. Additional permissions have none.
    pub fn scope(&self) -> Option<Scope> {
        match self {
            Category::Fitness => Some(Scope::Fitness),
            Category::Medical => Some(Scope::Medical),
            Category::Additional => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Fitness => write!(f, "fitness"),
            Category::Medical => write!(f, "medical"),
            Category::Additional => write!(f, "additional"),
        }
    }
}

/// Revoke-all scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Fitness,
    Medical,
    All,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Fitness => write!(f, "fitness"),
            Scope::Medical => write!(f, "medical"),
            Scope::All => write!(f, "all"),
        }
    }
}

/// User preference for exercise route sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePreference {
    AlwaysAllow,
    AskEveryTime,
    #[default]
    Denied,
}

/// Route preferences for the exercise read and exercise-route permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExerciseRouteState {
    #[serde(default)]
    pub exercise_read: RoutePreference,
    #[serde(default)]
    pub exercise_route: RoutePreference,
}

impl ExerciseRouteState {
    pub fn new(exercise_read: RoutePreference, exercise_route: RoutePreference) -> Self {
        Self { exercise_read, exercise_route }
    }

    pub fn asks_every_time(&self) -> bool {
        self.exercise_route == RoutePreference::AskEveryTime
    }
}

/// OS permission flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionFlags(pub u32);

impl PermissionFlags {
    pub const USER_SET: u32 = 0x1;
    pub const USER_FIXED: u32 = 0x2;

    pub fn is_user_set(&self) -> bool {
        self.0 & Self::USER_SET != 0
    }

    pub fn is_user_fixed(&self) -> bool {
        self.0 & Self::USER_FIXED != 0
    }
}

/// Backend calls computed for one mutation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadePlan {
    pub to_grant: Vec<Permission>,
    pub to_revoke: Vec<Permission>,
}

impl CascadePlan {
    pub fn is_empty(&self) -> bool {
        self.to_grant.is_empty() && self.to_revoke.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_grant.len() + self.to_revoke.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes() {
        assert_eq!(PermissionState::Granted.result_code(), 0);
        assert_eq!(PermissionState::NotGranted.result_code(), -1);
        assert!(PermissionState::from_granted(true).is_granted());
    }

    #[test]
    fn test_flags() {
        let flags = PermissionFlags(PermissionFlags::USER_SET | PermissionFlags::USER_FIXED);
        assert!(flags.is_user_set());
        assert!(flags.is_user_fixed());
        assert!(!PermissionFlags::default().is_user_fixed());
    }

    #[test]
    fn test_route_state_deserializes_with_defaults() {
        let state: ExerciseRouteState =
            serde_json::from_str(r#"{"exercise_route": "ask_every_time"}"#).unwrap();
        assert!(state.asks_every_time());
        assert_eq!(state.exercise_read, RoutePreference::Denied);
    }
}
