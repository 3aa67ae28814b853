//! End-to-end reconcile behavior against the in-memory transport, run on
//! both backend shapes.

use assert_matches::assert_matches;
use ontap_reconciler::domain::ports::EventSinkRef;
use ontap_reconciler::transport::Call;
use ontap_reconciler::{
    decide, ActionKind, BackendVariant, Connection, DesiredState, Error, MemoryTransport,
    ModuleRunner, ObjectType, State, StateFetcher, Transport,
};
use std::sync::Arc;

const VARIANTS: [BackendVariant; 2] = [BackendVariant::Modern, BackendVariant::Legacy];

fn connect(transport: &Arc<MemoryTransport>) -> Connection {
    let events = match transport.variant() {
        BackendVariant::Legacy => Some(transport.clone() as EventSinkRef),
        BackendVariant::Modern => None,
    };
    Connection {
        transport: transport.clone(),
        events,
    }
}

async fn exists(transport: &Arc<MemoryTransport>, name: &str) -> bool {
    StateFetcher::new(transport.clone())
        .get(ObjectType::Ipspace, name)
        .await
        .unwrap()
        .is_some()
}

#[tokio::test]
async fn test_created_ipspace_is_found_afterwards() {
    for variant in VARIANTS {
        let transport = Arc::new(MemoryTransport::new(variant));
        let report = ModuleRunner::new(connect(&transport), false)
            .run(ObjectType::Ipspace, &DesiredState::new("ipspace1"))
            .await
            .unwrap();

        assert!(report.changed, "{variant}");
        assert_eq!(report.backend, variant);
        assert!(exists(&transport, "ipspace1").await, "{variant}");
    }
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    for variant in VARIANTS {
        for state in [State::Present, State::Absent] {
            let transport = Arc::new(
                MemoryTransport::new(variant).with_object(ObjectType::Ipspace, "ipspace1"),
            );
            let desired = DesiredState::new("ipspace1").with_state(state);

            ModuleRunner::new(connect(&transport), false)
                .run(ObjectType::Ipspace, &desired)
                .await
                .unwrap();
            let mutations = transport.mutation_count();

            let report = ModuleRunner::new(connect(&transport), false)
                .run(ObjectType::Ipspace, &desired)
                .await
                .unwrap();
            assert!(!report.changed, "{variant} {state:?}");
            assert_eq!(report.action, ActionKind::None);
            assert_eq!(transport.mutation_count(), mutations);
        }
    }
}

#[tokio::test]
async fn test_absent_and_missing_sends_nothing() {
    for variant in VARIANTS {
        let transport = Arc::new(MemoryTransport::new(variant));
        let report = ModuleRunner::new(connect(&transport), false)
            .run(
                ObjectType::Ipspace,
                &DesiredState::new("ipspace1").with_state(State::Absent),
            )
            .await
            .unwrap();

        assert!(!report.changed);
        assert_eq!(transport.mutation_count(), 0);
    }
}

#[tokio::test]
async fn test_rename_moves_the_name() {
    for variant in VARIANTS {
        let transport =
            Arc::new(MemoryTransport::new(variant).with_object(ObjectType::Ipspace, "old"));
        let desired = DesiredState::new("new").renamed_from("old");

        let report = ModuleRunner::new(connect(&transport), false)
            .run(ObjectType::Ipspace, &desired)
            .await
            .unwrap();
        assert_eq!(report.action, ActionKind::Rename);
        assert!(exists(&transport, "new").await);
        assert!(!exists(&transport, "old").await);

        // already renamed
        let report = ModuleRunner::new(connect(&transport), false)
            .run(ObjectType::Ipspace, &desired)
            .await
            .unwrap();
        assert!(!report.changed, "{variant}");
    }
}

#[tokio::test]
async fn test_rename_of_missing_source_fails_without_mutation() {
    for variant in VARIANTS {
        let transport = Arc::new(MemoryTransport::new(variant));
        let err = ModuleRunner::new(connect(&transport), false)
            .run(
                ObjectType::Ipspace,
                &DesiredState::new("new").renamed_from("old"),
            )
            .await
            .unwrap_err();

        assert_matches!(
            err,
            Error::Validation(ref msg) if msg == "Error renaming: ipspace old does not exist"
        );
        assert_eq!(transport.mutation_count(), 0);
    }
}

#[tokio::test]
async fn test_check_mode_reports_without_sending() {
    for variant in VARIANTS {
        let transport =
            Arc::new(MemoryTransport::new(variant).with_object(ObjectType::Ipspace, "old"));
        let runner = ModuleRunner::new(connect(&transport), true);

        let create = runner
            .run(ObjectType::Ipspace, &DesiredState::new("ipspace1"))
            .await
            .unwrap();
        let rename = runner
            .run(
                ObjectType::Ipspace,
                &DesiredState::new("new").renamed_from("old"),
            )
            .await
            .unwrap();
        let delete = runner
            .run(
                ObjectType::Ipspace,
                &DesiredState::new("old").with_state(State::Absent),
            )
            .await
            .unwrap();

        for report in [create, rename, delete] {
            assert!(report.changed);
            assert!(report.check_mode);
        }
        assert_eq!(transport.mutation_count(), 0);
        assert!(transport.contains(ObjectType::Ipspace, "old"));
    }
}

#[tokio::test]
async fn test_backends_reach_the_same_decision() {
    let cases = [
        (DesiredState::new("a"), vec![]),
        (DesiredState::new("a"), vec!["a"]),
        (DesiredState::new("a").with_state(State::Absent), vec!["a"]),
        (DesiredState::new("a").with_state(State::Absent), vec![]),
        (DesiredState::new("b").renamed_from("a"), vec!["a"]),
        (DesiredState::new("b").renamed_from("a"), vec!["b"]),
        (DesiredState::new("b").renamed_from("a"), vec!["a", "b"]),
    ];

    for (desired, seeded) in cases {
        let mut kinds = Vec::new();
        for variant in VARIANTS {
            let transport = seeded.iter().fold(MemoryTransport::new(variant), |t, name| {
                t.with_object(ObjectType::Ipspace, name)
            });
            let fetcher = StateFetcher::new(Arc::new(transport));

            let current = fetcher.get(ObjectType::Ipspace, &desired.name).await.unwrap();
            let source = match &desired.from_name {
                Some(from_name) => fetcher.get(ObjectType::Ipspace, from_name).await.unwrap(),
                None => None,
            };
            let plan = decide(ObjectType::Ipspace, &desired, current.as_ref(), source.as_ref())
                .unwrap();
            kinds.push((plan.decision.kind(), plan.changed));
        }
        assert_eq!(kinds[0], kinds[1], "{:?} with {:?}", desired, seeded);
    }
}

#[tokio::test]
async fn test_legacy_not_found_codes_mean_absent() {
    for code in ["14636", "13073"] {
        let transport =
            Arc::new(MemoryTransport::legacy().fail_lookups_with(code, "entry doesn't exist"));
        let report = ModuleRunner::new(connect(&transport), false)
            .run(ObjectType::Ipspace, &DesiredState::new("ipspace1"))
            .await
            .unwrap();
        assert_eq!(report.action, ActionKind::Create, "errno {code}");
    }
}

#[tokio::test]
async fn test_other_lookup_errors_are_fatal() {
    let transport =
        Arc::new(MemoryTransport::legacy().fail_lookups_with("13003", "permission denied"));
    let err = ModuleRunner::new(connect(&transport), false)
        .run(ObjectType::Ipspace, &DesiredState::new("ipspace1"))
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Error fetching ipspace ipspace1"));
    assert!(err.diagnostic().unwrap().contains("errno: 13003"));
    assert_eq!(transport.mutation_count(), 0);
}

#[tokio::test]
async fn test_autosupport_sends_every_run_on_both_backends() {
    for variant in VARIANTS {
        let transport = Arc::new(MemoryTransport::new(variant));
        let desired = DesiredState::new("node1")
            .with_attribute("type", "test")
            .with_attribute("message", "invoked test autosupport");

        for _ in 0..2 {
            let report = ModuleRunner::new(connect(&transport), false)
                .run(ObjectType::AutosupportMessage, &desired)
                .await
                .unwrap();
            assert!(report.changed);
        }

        let creates: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create { .. }))
            .collect();
        assert_eq!(creates.len(), 2, "{variant}");
    }
}
