//! Request flow scenarios against the in-memory host.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use healthperm::infra::memory_backend::{AppManifest, CallKind, InMemoryHost};
use healthperm_core::{
    Category, FitnessType, MedicalType, Permission, PermissionFlags, PermissionState,
};
use healthperm_runtime::{EngineConfig, FlowState, RequestFlowSequencer, RuntimeError};
use proptest::prelude::*;
use std::sync::Arc;

const APP: &str = "com.example.fit";

fn read(data_type: FitnessType) -> Permission {
    Permission::fitness_read(data_type)
}

fn setup(declared: &[Permission]) -> (Arc<InMemoryHost>, RequestFlowSequencer) {
    let host = Arc::new(InMemoryHost::new());
    host.install(
        APP,
        AppManifest {
            rationale_declared: true,
            declared: declared.iter().map(Permission::id).collect(),
        },
    );
    let engine = EngineConfig::default().build_engine(host.clone(), host.clone(), host.clone());
    (host, RequestFlowSequencer::new(engine))
}

#[test]
fn test_unrecognized_identifiers_dropped() {
    let (_host, seq) = setup(&[read(FitnessType::Exercise), read(FitnessType::Sleep)]);
    let session = seq.start(
        APP,
        &[
            read(FitnessType::Exercise).id(),
            read(FitnessType::Sleep).id(),
            "bogus".to_string(),
        ],
    );

    assert_eq!(session.grants.len(), 2);
    assert!(session
        .grants
        .iter()
        .all(|(_, state)| *state == PermissionState::NotGranted));
}

#[test]
fn test_duplicates_collapse() {
    let steps = read(FitnessType::Steps);
    let (_host, seq) = setup(&[steps]);
    let session = seq.start(APP, &[steps.id(), steps.id()]);
    assert_eq!(session.grants.len(), 1);
    assert_eq!(session.current_screen(), &[steps]);
}

#[test]
fn test_empty_request_concludes_immediately() {
    let (host, seq) = setup(&[read(FitnessType::Steps)]);
    let session = seq.start::<&str>(APP, &[]);
    assert!(session.is_concluded());
    assert!(seq.finalize(&session).unwrap().is_empty());
    assert!(host.calls().is_empty());
}

#[test]
fn test_user_fixed_short_circuits() {
    let steps = read(FitnessType::Steps);
    let sleep = read(FitnessType::Sleep);
    let vaccines = Permission::medical(MedicalType::Vaccines);
    let (host, seq) = setup(&[steps, sleep, vaccines]);
    host.set_granted(APP, &[steps.id()]);
    host.set_flags(APP, &sleep.id(), PermissionFlags(PermissionFlags::USER_FIXED));

    let session = seq.start(APP, &[steps.id(), sleep.id(), vaccines.id()]);
    assert_eq!(session.state, FlowState::Concluded);
    assert!(session.concluded.is_empty());

    let grants = seq.finalize(&session).unwrap();
    assert_eq!(grants.get(&steps), Some(PermissionState::Granted));
    assert_eq!(grants.get(&sleep), Some(PermissionState::NotGranted));
    assert_eq!(grants.get(&vaccines), Some(PermissionState::NotGranted));
    assert!(host.calls().is_empty());
}

#[test]
fn test_undeclared_request_stays_not_granted() {
    let steps = read(FitnessType::Steps);
    let heart = read(FitnessType::HeartRate);
    let (host, seq) = setup(&[steps]);

    let mut session = seq.start(APP, &[steps.id(), heart.id()]);
    assert_eq!(session.current_screen(), &[steps]);
    seq.set_all(&mut session, true).unwrap();
    seq.conclude_screen(&mut session).unwrap();

    let grants = seq.finalize(&session).unwrap();
    assert_eq!(grants.get(&steps), Some(PermissionState::Granted));
    assert_eq!(grants.get(&heart), Some(PermissionState::NotGranted));
    assert_eq!(host.calls().len(), 1);
}

#[test]
fn test_additional_screen_requires_a_read() {
    let steps = read(FitnessType::Steps);
    let (host, seq) = setup(&[steps, Permission::BACKGROUND]);

    let mut session = seq.start(APP, &[steps.id(), Permission::BACKGROUND.id()]);
    assert_eq!(session.state, FlowState::ShowFitness);
    seq.set_permission(&mut session, steps, false).unwrap();
    seq.conclude_screen(&mut session).unwrap();

    assert!(session.is_concluded());
    assert_eq!(session.state_of(&Permission::BACKGROUND), Some(PermissionState::NotGranted));
    assert!(host.calls().iter().all(|c| c.permission != Permission::BACKGROUND.id()));
}

#[test]
fn test_additional_screen_after_fitness_grant() {
    let steps = read(FitnessType::Steps);
    let (host, seq) = setup(&[steps, Permission::BACKGROUND, Permission::HISTORY]);

    let mut session = seq.start(
        APP,
        &[steps.id(), Permission::BACKGROUND.id(), Permission::HISTORY.id()],
    );
    seq.set_all(&mut session, true).unwrap();
    seq.conclude_screen(&mut session).unwrap();
    assert_eq!(session.state, FlowState::ShowAdditional);

    seq.set_permission(&mut session, Permission::HISTORY, true).unwrap();
    seq.conclude_screen(&mut session).unwrap();

    let arrays = seq.finalize(&session).unwrap().to_result_arrays();
    assert_eq!(arrays.grant_results, vec![0, -1, 0]);
    let mut granted = host.granted(APP);
    granted.sort();
    let mut expected = vec![steps.id(), Permission::HISTORY.id()];
    expected.sort();
    assert_eq!(granted, expected);
}

#[test]
fn test_exercise_routes_not_prompted() {
    let exercise = read(FitnessType::Exercise);
    let (_host, seq) = setup(&[exercise, Permission::EXERCISE_ROUTES]);

    let mut session = seq.start(APP, &[exercise.id(), Permission::EXERCISE_ROUTES.id()]);
    assert_eq!(session.current_screen(), &[exercise]);
    seq.set_all(&mut session, true).unwrap();
    seq.conclude_screen(&mut session).unwrap();

    assert!(session.is_concluded());
    assert_eq!(
        session.state_of(&Permission::EXERCISE_ROUTES),
        Some(PermissionState::NotGranted)
    );
}

#[test]
fn test_backend_failure_keeps_local_decision() {
    let steps = read(FitnessType::Steps);
    let (host, seq) = setup(&[steps]);
    host.fail_on(APP, &steps.id());

    let mut session = seq.start(APP, &[steps.id()]);
    seq.set_all(&mut session, true).unwrap();
    seq.conclude_screen(&mut session).unwrap();

    assert_eq!(session.state_of(&steps), Some(PermissionState::Granted));
    assert!(host.granted(APP).is_empty());
    assert_eq!(host.calls()[0].kind, CallKind::Grant);
}

#[test]
fn test_unavailable_backend_denies() {
    let steps = read(FitnessType::Steps);
    let (host, seq) = setup(&[steps]);
    host.set_unavailable(APP, true);

    let session = seq.start(APP, &[steps.id()]);
    assert!(session.is_concluded());
    assert_eq!(session.state_of(&steps), Some(PermissionState::NotGranted));
}

#[test]
fn test_resume_skips_concluded_user_fixed_category() {
    let vaccines = Permission::medical(MedicalType::Vaccines);
    let steps = read(FitnessType::Steps);
    let (host, seq) = setup(&[vaccines, steps]);

    let mut session = seq.start(APP, &[vaccines.id(), steps.id()]);
    assert_eq!(session.state, FlowState::ShowMedical);
    seq.conclude_screen(&mut session).unwrap();
    assert!(session.concluded.contains(&Category::Medical));

    // The medical denial becomes user-fixed while the session is interrupted.
    host.set_flags(APP, &vaccines.id(), PermissionFlags(PermissionFlags::USER_FIXED));
    let resumed = seq.resume(session);
    assert_eq!(resumed.state, FlowState::ShowFitness);
    assert_eq!(resumed.current_screen(), &[steps]);
}

#[test]
fn test_conclude_without_screen_is_an_error() {
    let (_host, seq) = setup(&[]);
    let mut session = seq.start::<&str>(APP, &[]);
    assert!(matches!(
        seq.conclude_screen(&mut session),
        Err(RuntimeError::SessionError(_))
    ));
}

fn any_request() -> impl Strategy<Value = Vec<String>> {
    let known = (0..FitnessType::ALL.len()).prop_map(|i| read(FitnessType::ALL[i]).id());
    let unknown = "[a-z_]{1,12}".prop_map(|s| format!("android.permission.health.{}", s));
    prop::collection::vec(prop_oneof![known, unknown], 0..12)
}

proptest! {
    #[test]
    fn final_map_holds_each_recognized_request_once(request in any_request(), grant in any::<bool>()) {
        let declared: Vec<Permission> = FitnessType::ALL.iter().map(|t| read(*t)).collect();
        let (_host, seq) = setup(&declared);

        let mut session = seq.start(APP, &request);
        while !session.is_concluded() {
            seq.set_all(&mut session, grant).unwrap();
            seq.conclude_screen(&mut session).unwrap();
        }
        let grants = seq.finalize(&session).unwrap();

        let mut expected: Vec<Permission> = Vec::new();
        for id in &request {
            if let Ok(p) = id.parse::<Permission>() {
                if !expected.contains(&p) {
                    expected.push(p);
                }
            }
        }
        prop_assert_eq!(grants.permissions(), expected);
        for (_, state) in grants.iter() {
            prop_assert_eq!(*state, PermissionState::from_granted(grant));
        }
    }
}
