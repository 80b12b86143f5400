//! Cascade rules between base reads and additional permissions.

use healthperm_core::{
    AccessType, CascadePlan, Category, ExerciseRouteState, Permission, PermissionSet, Scope,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Pure view over one app's granted and declared permissions.
pub struct DependencyResolver<'a> {
    granted: &'a PermissionSet,
    declared: &'a PermissionSet,
    routes: ExerciseRouteState,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        granted: &'a PermissionSet,
        declared: &'a PermissionSet,
        routes: ExerciseRouteState,
    ) -> Self {
        Self { granted, declared, routes }
    }

    fn held(&self, permission: &Permission) -> bool {
        self.granted.contains(permission) && self.declared.contains(permission)
    }

    fn route_revocable(&self) -> bool {
        self.held(&Permission::EXERCISE_ROUTES) && !self.routes.asks_every_time()
    }

    fn include_orphaned_modifiers(&self, out: &mut BTreeSet<Permission>) {
        for modifier in [Permission::BACKGROUND, Permission::HISTORY] {
            if self.held(&modifier) {
                out.insert(modifier);
            }
        }
    }

    /// Dependents revoked alongside `permission`. Never contains `permission` itself.
    pub fn cascade_for_single_revoke(&self, permission: Permission) -> BTreeSet<Permission> {
        let mut out = BTreeSet::new();
        if !self.granted.contains(&permission) {
            return out;
        }

        let mut remaining = self.granted.clone();
        remaining.remove(&permission);

        match permission {
            Permission::Fitness { access: AccessType::Write, .. } => {}
            Permission::Fitness { access: AccessType::Read, .. } => {
                if permission == Permission::EXERCISE_READ && self.route_revocable() {
                    out.insert(Permission::EXERCISE_ROUTES);
                }
                if !remaining.any_fitness_read() && !remaining.any_medical_read() {
                    if self.route_revocable() {
                        out.insert(Permission::EXERCISE_ROUTES);
                    }
                    self.include_orphaned_modifiers(&mut out);
                }
            }
            Permission::Medical { .. } if permission.is_medical_read() => {
                if !remaining.any_medical_read() && !remaining.any_fitness_read() {
                    self.include_orphaned_modifiers(&mut out);
                }
            }
            Permission::Medical { .. } => {}
            Permission::Additional { .. } => {}
        }

        if !out.is_empty() {
            debug!("Revoking {} cascades to {:?}", permission, out);
        }
        out
    }

    fn should_include_on_revoke(&self, modifier: Permission, scope: Scope) -> bool {
        self.held(&modifier)
            && self.granted.any_read_in(scope)
            && !self.granted.any_read_outside(scope)
    }

    pub fn should_include_background_on_revoke(&self, scope: Scope) -> bool {
        self.should_include_on_revoke(Permission::BACKGROUND, scope)
    }

    pub fn should_include_past_data_on_revoke(&self, scope: Scope) -> bool {
        self.should_include_on_revoke(Permission::HISTORY, scope)
    }

    /// Everything revoked by "revoke all" for `scope`.
    pub fn cascade_for_revoke_all(&self, scope: Scope) -> BTreeSet<Permission> {
        let ask_every_time = self.routes.asks_every_time();
        let mut out: BTreeSet<Permission> = self
            .declared
            .in_scope(scope)
            .into_iter()
            .filter(|p| !(ask_every_time && *p == Permission::EXERCISE_ROUTES))
            .collect();

        if self.should_include_background_on_revoke(scope) {
            out.insert(Permission::BACKGROUND);
        }
        if self.should_include_past_data_on_revoke(scope) {
            out.insert(Permission::HISTORY);
        }
        if scope == Scope::Fitness && self.route_revocable() {
            out.insert(Permission::EXERCISE_ROUTES);
        }
        out
    }

    /// Whether granting `permission` keeps its base read requirement satisfied.
    pub fn can_grant(&self, permission: &Permission) -> bool {
        match *permission {
            Permission::EXERCISE_ROUTES => self.granted.contains(&Permission::EXERCISE_READ),
            Permission::Additional { .. } => self.granted.any_read(),
            Permission::Fitness { .. } | Permission::Medical { .. } => true,
        }
    }

    pub fn plan_revoke(&self, permission: Permission) -> CascadePlan {
        let mut to_revoke = vec![permission];
        to_revoke.extend(self.cascade_for_single_revoke(permission));
        CascadePlan { to_grant: Vec::new(), to_revoke }
    }

    pub fn plan_revoke_all(&self, category: Category) -> CascadePlan {
        let to_revoke = match category.scope() {
            Some(scope) => self.cascade_for_revoke_all(scope).into_iter().collect(),
            None => self
                .declared
                .of_category(Category::Additional)
                .into_iter()
                .filter(|p| !(self.routes.asks_every_time() && *p == Permission::EXERCISE_ROUTES))
                .collect(),
        };
        CascadePlan { to_grant: Vec::new(), to_revoke }
    }

    /// Declared permissions of `category` that may be granted right now.
    pub fn plan_grant_all(&self, category: Category) -> CascadePlan {
        let to_grant = self
            .declared
            .of_category(category)
            .into_iter()
            .filter(|p| self.can_grant(p))
            .collect();
        CascadePlan { to_grant, to_revoke: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthperm_core::{FitnessType, MedicalType, RoutePreference};

    fn set(items: &[Permission]) -> PermissionSet {
        items.iter().copied().collect()
    }

    fn steps() -> Permission {
        Permission::fitness_read(FitnessType::Steps)
    }

    fn vaccines() -> Permission {
        Permission::medical(MedicalType::Vaccines)
    }

    fn always() -> ExerciseRouteState {
        ExerciseRouteState::new(RoutePreference::AlwaysAllow, RoutePreference::AlwaysAllow)
    }

    fn ask() -> ExerciseRouteState {
        ExerciseRouteState::new(RoutePreference::AlwaysAllow, RoutePreference::AskEveryTime)
    }

    #[test]
    fn test_last_fitness_read_orphans_modifiers() {
        let declared = set(&[steps(), Permission::BACKGROUND, Permission::HISTORY]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, always());
        let cascade = resolver.cascade_for_single_revoke(steps());
        assert_eq!(cascade, [Permission::BACKGROUND, Permission::HISTORY].into_iter().collect());
    }

    #[test]
    fn test_medical_read_keeps_modifiers() {
        let declared = set(&[steps(), vaccines(), Permission::BACKGROUND, Permission::HISTORY]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, always());
        assert!(resolver.cascade_for_single_revoke(steps()).is_empty());
        assert!(resolver.cascade_for_single_revoke(vaccines()).is_empty());
    }

    #[test]
    fn test_other_fitness_read_keeps_modifiers() {
        let sleep = Permission::fitness_read(FitnessType::Sleep);
        let declared = set(&[steps(), sleep, Permission::BACKGROUND]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, always());
        assert!(resolver.cascade_for_single_revoke(steps()).is_empty());
    }

    #[test]
    fn test_last_medical_read_orphans_modifiers_but_not_routes() {
        let declared = set(&[vaccines(), Permission::BACKGROUND, Permission::HISTORY, Permission::EXERCISE_ROUTES]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, always());
        let cascade = resolver.cascade_for_single_revoke(vaccines());
        assert!(cascade.contains(&Permission::BACKGROUND));
        assert!(cascade.contains(&Permission::HISTORY));
        assert!(!cascade.contains(&Permission::EXERCISE_ROUTES));
    }

    #[test]
    fn test_exercise_read_cascades_to_routes() {
        let declared = set(&[Permission::EXERCISE_READ, steps(), Permission::EXERCISE_ROUTES]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, always());
        let cascade = resolver.cascade_for_single_revoke(Permission::EXERCISE_READ);
        assert_eq!(cascade, [Permission::EXERCISE_ROUTES].into_iter().collect());

        let resolver = DependencyResolver::new(&granted, &declared, ask());
        assert!(resolver.cascade_for_single_revoke(Permission::EXERCISE_READ).is_empty());
    }

    #[test]
    fn test_writes_and_ungranted_have_no_dependents() {
        let write = Permission::fitness_write(FitnessType::Steps);
        let declared = set(&[write, steps(), Permission::BACKGROUND]);
        let granted = set(&[write, Permission::BACKGROUND]);
        let resolver = DependencyResolver::new(&granted, &declared, always());
        assert!(resolver.cascade_for_single_revoke(write).is_empty());
        assert!(resolver.cascade_for_single_revoke(steps()).is_empty());
        assert!(resolver
            .cascade_for_single_revoke(Permission::medical(MedicalType::AllMedicalData))
            .is_empty());
    }

    #[test]
    fn test_revoke_predicates() {
        let declared = set(&[steps(), vaccines(), Permission::BACKGROUND, Permission::HISTORY]);

        let granted = set(&[steps(), Permission::BACKGROUND, Permission::HISTORY]);
        let resolver = DependencyResolver::new(&granted, &declared, always());
        assert!(resolver.should_include_background_on_revoke(Scope::Fitness));
        assert!(resolver.should_include_past_data_on_revoke(Scope::Fitness));
        assert!(!resolver.should_include_background_on_revoke(Scope::Medical));
        assert!(resolver.should_include_background_on_revoke(Scope::All));

        let granted = set(&[steps(), vaccines(), Permission::BACKGROUND]);
        let resolver = DependencyResolver::new(&granted, &declared, always());
        assert!(!resolver.should_include_background_on_revoke(Scope::Fitness));
        assert!(!resolver.should_include_background_on_revoke(Scope::Medical));
        assert!(resolver.should_include_background_on_revoke(Scope::All));
        assert!(!resolver.should_include_past_data_on_revoke(Scope::All));
    }

    #[test]
    fn test_revoke_all_fitness() {
        let write = Permission::fitness_write(FitnessType::Distance);
        let declared = set(&[steps(), write, vaccines(), Permission::BACKGROUND, Permission::EXERCISE_ROUTES]);
        let granted = set(&[steps(), Permission::BACKGROUND, Permission::EXERCISE_ROUTES]);
        let resolver = DependencyResolver::new(&granted, &declared, always());
        let all = resolver.cascade_for_revoke_all(Scope::Fitness);
        assert_eq!(
            all,
            [steps(), write, Permission::BACKGROUND, Permission::EXERCISE_ROUTES]
                .into_iter()
                .collect()
        );

        let resolver = DependencyResolver::new(&granted, &declared, ask());
        assert!(!resolver.cascade_for_revoke_all(Scope::Fitness).contains(&Permission::EXERCISE_ROUTES));
    }

    #[test]
    fn test_revoke_all_fitness_keeps_modifiers_when_medical_read_remains() {
        let declared = set(&[steps(), vaccines(), Permission::BACKGROUND, Permission::HISTORY]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, always());
        let all = resolver.cascade_for_revoke_all(Scope::Fitness);
        assert_eq!(all, [steps()].into_iter().collect());
    }

    #[test]
    fn test_revoke_all_scope_all_skips_asked_route() {
        let declared = set(&[steps(), vaccines(), Permission::BACKGROUND, Permission::EXERCISE_ROUTES]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, ask());
        let all = resolver.cascade_for_revoke_all(Scope::All);
        assert_eq!(all.len(), 3);
        assert!(!all.contains(&Permission::EXERCISE_ROUTES));
    }

    #[test]
    fn test_can_grant_requires_base_read() {
        let declared = set(&[Permission::EXERCISE_READ, Permission::EXERCISE_ROUTES, Permission::HISTORY, vaccines()]);
        let granted = set(&[vaccines()]);
        let resolver = DependencyResolver::new(&granted, &declared, always());
        assert!(!resolver.can_grant(&Permission::EXERCISE_ROUTES));
        assert!(resolver.can_grant(&Permission::HISTORY));

        let plan = resolver.plan_grant_all(Category::Additional);
        assert_eq!(plan.to_grant, vec![Permission::HISTORY]);
    }

    #[test]
    fn test_plan_revoke_puts_target_first() {
        let declared = set(&[steps(), Permission::HISTORY]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, always());
        let plan = resolver.plan_revoke(steps());
        assert_eq!(plan.to_revoke, vec![steps(), Permission::HISTORY]);
        assert!(plan.to_grant.is_empty());
    }

    #[test]
    fn test_plan_revoke_all_additional() {
        let declared = set(&[steps(), Permission::HISTORY, Permission::EXERCISE_ROUTES]);
        let granted = declared.clone();
        let resolver = DependencyResolver::new(&granted, &declared, ask());
        let plan = resolver.plan_revoke_all(Category::Additional);
        assert_eq!(plan.to_revoke, vec![Permission::HISTORY]);
    }
}
