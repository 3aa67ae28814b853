//! Action executor
//!
//! Sends the one mutating call a plan asks for, unless running in check mode.

use crate::domain::ports::{DesiredState, TransportRef};
use crate::error::{Error, Result};
use crate::objects::ObjectType;
use crate::reconcile::{Decision, Plan};
use tracing::{info, warn};

pub struct ActionExecutor {
    transport: TransportRef,
    check_mode: bool,
}

impl ActionExecutor {
    pub fn new(transport: TransportRef, check_mode: bool) -> Self {
        Self {
            transport,
            check_mode,
        }
    }

    /// Carry out a plan
    pub async fn apply(
        &self,
        object: ObjectType,
        plan: &Plan,
        desired: &DesiredState,
    ) -> Result<()> {
        if plan.decision == Decision::None {
            return Ok(());
        }
        if self.check_mode {
            warn!(
                "Check mode: skipping {} of {}",
                plan.decision.kind(),
                object.describe(&desired.name)
            );
            return Ok(());
        }

        match &plan.decision {
            Decision::None => Ok(()),
            Decision::Create => {
                info!("Creating {}", object.describe(&desired.name));
                let attrs = object.create_attributes(desired);
                self.transport
                    .create(object, &attrs)
                    .await
                    .map_err(|e| {
                        Error::backend(object.create_verb(), object.describe(&desired.name), e)
                    })
            }
            Decision::Delete { target } => {
                info!("Deleting {}", object.describe(&target.name));
                self.transport
                    .delete(object, &target.id())
                    .await
                    .map_err(|e| Error::backend("removing", object.describe(&target.name), e))
            }
            Decision::Rename { source } => {
                info!(
                    "Renaming {} to {}",
                    object.describe(&source.name),
                    desired.name
                );
                self.transport
                    .rename(object, &source.id(), &desired.name)
                    .await
                    .map_err(|e| Error::backend("renaming", object.describe(&source.name), e))
            }
        }
    }
}
