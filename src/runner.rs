//! Module Runner
//!
//! Drives one run from start to report:
//!
//! ```text
//! START → EVENT (legacy) → FETCH_CURRENT → DECIDE → {ACT | SKIP} → REPORT
//! ```
//!
//! Nothing survives between runs. A failure at any step ends the run; the
//! next run starts again from the fetch.

use crate::domain::ports::{BackendVariant, DesiredState};
use crate::error::{Error, Result};
use crate::objects::{Lifecycle, ObjectType};
use crate::reconcile::{decide, ActionExecutor, ActionKind, Plan, StateFetcher};
use crate::transport::Connection;
use serde::Serialize;
use tracing::{debug, info};

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub changed: bool,
    pub action: ActionKind,
    pub backend: BackendVariant,
    pub check_mode: bool,
}

/// Runs modules against one connection
pub struct ModuleRunner {
    connection: Connection,
    fetcher: StateFetcher,
    executor: ActionExecutor,
    check_mode: bool,
}

impl ModuleRunner {
    pub fn new(connection: Connection, check_mode: bool) -> Self {
        let fetcher = StateFetcher::new(connection.transport.clone());
        let executor = ActionExecutor::new(connection.transport.clone(), check_mode);
        Self {
            connection,
            fetcher,
            executor,
            check_mode,
        }
    }

    /// Reconcile one object toward its desired state
    pub async fn run(&self, object: ObjectType, desired: &DesiredState) -> Result<RunReport> {
        let backend = self.connection.variant();

        // the legacy backend requires the event to land before any lookup
        if let Some(events) = &self.connection.events {
            events
                .log_event(object.module_name())
                .await
                .map_err(|e| Error::backend("logging event for", object.module_name(), e))?;
        }

        let plan = self.plan(object, desired).await?;
        info!(
            "{}: decision {} (changed: {}, backend: {})",
            object.describe(&desired.name),
            plan.decision.kind(),
            plan.changed,
            backend
        );

        self.executor.apply(object, &plan, desired).await?;

        Ok(RunReport {
            changed: plan.changed,
            action: plan.decision.kind(),
            backend,
            check_mode: self.check_mode,
        })
    }

    async fn plan(&self, object: ObjectType, desired: &DesiredState) -> Result<Plan> {
        if object.lifecycle() == Lifecycle::ActionOnly {
            debug!("{} is action-only, skipping lookup", object);
            return Ok(Plan::action_only());
        }

        let current = self.fetcher.get(object, &desired.name).await?;
        let source = match &desired.from_name {
            Some(from_name) => self.fetcher.get(object, from_name).await?,
            None => None,
        };
        decide(object, desired, current.as_ref(), source.as_ref())
    }
}

// =============================================================================
// Output Contract
// =============================================================================

/// Document printed at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ModuleOutput {
    Success {
        changed: bool,
        action: ActionKind,
        backend: BackendVariant,
        check_mode: bool,
    },
    Failure {
        failed: bool,
        msg: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exception: Option<String>,
    },
}

impl ModuleOutput {
    pub fn is_failure(&self) -> bool {
        matches!(self, ModuleOutput::Failure { .. })
    }
}

impl From<Result<RunReport>> for ModuleOutput {
    fn from(result: Result<RunReport>) -> Self {
        match result {
            Ok(report) => ModuleOutput::Success {
                changed: report.changed,
                action: report.action,
                backend: report.backend,
                check_mode: report.check_mode,
            },
            Err(err) => ModuleOutput::Failure {
                failed: true,
                msg: err.to_string(),
                exception: err.diagnostic(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{EventSinkRef, State, Transport};
    use crate::transport::{Call, MemoryTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn runner(transport: &Arc<MemoryTransport>, check_mode: bool) -> ModuleRunner {
        let events = match transport.variant() {
            BackendVariant::Legacy => Some(transport.clone() as EventSinkRef),
            BackendVariant::Modern => None,
        };
        let connection = Connection {
            transport: transport.clone(),
            events,
        };
        ModuleRunner::new(connection, check_mode)
    }

    #[tokio::test]
    async fn test_create_then_idempotent() {
        let transport = Arc::new(MemoryTransport::modern());
        let desired = DesiredState::new("ipspace1");

        let report = runner(&transport, false)
            .run(ObjectType::Ipspace, &desired)
            .await
            .unwrap();
        assert!(report.changed);
        assert_eq!(report.action, ActionKind::Create);
        assert!(transport.contains(ObjectType::Ipspace, "ipspace1"));

        let report = runner(&transport, false)
            .run(ObjectType::Ipspace, &desired)
            .await
            .unwrap();
        assert!(!report.changed);
        assert_eq!(transport.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_uses_fetched_uuid() {
        let transport =
            Arc::new(MemoryTransport::modern().with_object(ObjectType::Ipspace, "ipspace1"));
        let desired = DesiredState::new("ipspace1").with_state(State::Absent);

        let report = runner(&transport, false)
            .run(ObjectType::Ipspace, &desired)
            .await
            .unwrap();
        assert_eq!(report.action, ActionKind::Delete);
        assert!(!transport.contains(ObjectType::Ipspace, "ipspace1"));
    }

    #[tokio::test]
    async fn test_legacy_event_precedes_lookup() {
        let transport = Arc::new(MemoryTransport::legacy());
        runner(&transport, true)
            .run(ObjectType::Ipspace, &DesiredState::new("ipspace1"))
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(
            calls[0],
            Call::Event {
                source: "na_ontap_ipspace".into()
            }
        );
        assert!(matches!(calls[1], Call::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_event_failure_aborts_before_lookup() {
        let transport = Arc::new(MemoryTransport::legacy().fail_events_with("EMS unavailable"));
        let err = runner(&transport, false)
            .run(ObjectType::Ipspace, &DesiredState::new("ipspace1"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("EMS unavailable"));
        assert!(!transport
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_autosupport_is_always_sent() {
        let transport = Arc::new(MemoryTransport::modern());
        let desired = DesiredState::new("node1").with_attribute("type", "test");

        for _ in 0..2 {
            let report = runner(&transport, false)
                .run(ObjectType::AutosupportMessage, &desired)
                .await
                .unwrap();
            assert!(report.changed);
        }
        assert_eq!(transport.mutation_count(), 2);
        assert!(!transport
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_autosupport_check_mode_reports_change() {
        let transport = Arc::new(MemoryTransport::legacy());
        let report = runner(&transport, true)
            .run(ObjectType::AutosupportMessage, &DesiredState::new(""))
            .await
            .unwrap();

        assert!(report.changed);
        assert!(report.check_mode);
        assert_eq!(transport.mutation_count(), 0);
    }

    #[test]
    fn test_output_contract() {
        let success = ModuleOutput::from(Ok(RunReport {
            changed: true,
            action: ActionKind::Rename,
            backend: BackendVariant::Modern,
            check_mode: false,
        }));
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            json!({ "changed": true, "action": "rename", "backend": "modern", "check_mode": false })
        );

        let failure = ModuleOutput::from(Err(Error::backend(
            "renaming",
            "ipspace old",
            Error::Zapi {
                api: "net-ipspaces-rename".into(),
                code: "13001".into(),
                reason: "duplicate".into(),
            },
        )));
        assert!(failure.is_failure());
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["failed"], true);
        assert!(value["msg"].as_str().unwrap().starts_with("Error renaming ipspace old"));
        assert!(value["exception"].as_str().unwrap().contains("errno: 13001"));
    }

    #[test]
    fn test_validation_failure_has_no_exception() {
        let failure = ModuleOutput::from(Err(Error::Validation(
            "Error renaming: ipspace old does not exist".into(),
        )));
        let value = serde_json::to_value(&failure).unwrap();
        assert!(value.get("exception").is_none());
    }
}
