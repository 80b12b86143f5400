//! Final grant map and its array encoding.

use healthperm_core::{Permission, PermissionState};
use serde::{Deserialize, Serialize};

/// Ordered `Permission -> PermissionState` map, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionGrants(Vec<(Permission, PermissionState)>);

impl PermissionGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts at the end, or updates in place if already present.
    pub fn set(&mut self, permission: Permission, state: PermissionState) {
        match self.0.iter_mut().find(|(p, _)| *p == permission) {
            Some(entry) => entry.1 = state,
            None => self.0.push((permission, state)),
        }
    }

    pub fn get(&self, permission: &Permission) -> Option<PermissionState> {
        self.0.iter().find(|(p, _)| p == permission).map(|(_, s)| *s)
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.get(permission).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Permission, PermissionState)> {
        self.0.iter()
    }

    pub fn permissions(&self) -> Vec<Permission> {
        self.0.iter().map(|(p, _)| *p).collect()
    }

    pub fn any_granted_read(&self) -> bool {
        self.0.iter().any(|(p, s)| s.is_granted() && p.is_read())
    }

    pub fn to_result_arrays(&self) -> ResultArrays {
        ResultArrays {
            permissions: self.0.iter().map(|(p, _)| p.id()).collect(),
            grant_results: self.0.iter().map(|(_, s)| s.result_code()).collect(),
        }
    }
}

/// Parallel arrays of identifiers and result codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultArrays {
    pub permissions: Vec<String>,
    pub grant_results: Vec<i32>,
}
