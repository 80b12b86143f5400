use crate::permission::Permission;
use crate::types::{Category, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered set of permissions, used for both declared and granted sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn remove(&mut self, permission: &Permission) -> bool {
        self.0.remove(permission)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn any_fitness_read(&self) -> bool {
        self.0.iter().any(Permission::is_fitness_read)
    }

    pub fn any_medical_read(&self) -> bool {
        self.0.iter().any(Permission::is_medical_read)
    }

    pub fn any_read(&self) -> bool {
        self.0.iter().any(Permission::is_read)
    }

    pub fn any_read_in(&self, scope: Scope) -> bool {
        self.0.iter().any(|p| p.is_read_in(scope))
    }

    /// Whether a base read outside `scope` exists. Always false for `Scope::All`.
    pub fn any_read_outside(&self, scope: Scope) -> bool {
        match scope {
            Scope::Fitness => self.any_medical_read(),
            Scope::Medical => self.any_fitness_read(),
            Scope::All => false,
        }
    }

    pub fn of_category(&self, category: Category) -> Vec<Permission> {
        self.0.iter().filter(|p| p.category() == category).copied().collect()
    }

    pub fn in_scope(&self, scope: Scope) -> Vec<Permission> {
        self.0.iter().filter(|p| p.in_scope(scope)).copied().collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::collections::btree_set::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Permission;
    type IntoIter = std::collections::btree_set::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
