//! Create-or-update of user records from client registrations.
//!
//! Policy: every registration resets `paymentStatus` and `gasPaid` (unless
//! `gasPaid` is submitted), so a re-registering client has to pay again.
//! `rewardAddress` is written only when the record is created and `gasFee`
//! only when a new record is created or the client submits one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::user::{DEFAULT_NODE_ID, default_gas_fee};
use crate::models::{User, UserPatch};
use crate::reward::generate_reward_address;
use crate::simulator::PaymentSimulator;
use crate::store::{DocumentStore, InsertDefaults, StoreError, UserUpsert};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("user {0} not found")]
    NotFound(String),

    #[error("sessionId does not match the registered session")]
    SessionMismatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registration data as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub machine_id: Option<String>,
    pub eth_address: Option<String>,
    #[serde(alias = "selectedNode")]
    pub selected_node_id: Option<String>,
    pub gas_fee: Option<Decimal>,
    pub gas_paid: Option<bool>,
    pub session_id: Option<String>,
}

impl Registration {
    pub fn new(machine_id: impl Into<String>, eth_address: impl Into<String>) -> Self {
        Self {
            machine_id: Some(machine_id.into()),
            eth_address: Some(eth_address.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusReport {
    pub machine_id: String,
    pub payment_status: bool,
    pub gas_paid: bool,
    pub session_id: Option<String>,
    pub simulation_pending: bool,
}

/// Blank values count as missing; anything else is kept exactly as sent.
fn required(value: Option<String>, field: &'static str) -> Result<String, ReconcileError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ReconcileError::MissingField(field)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct UserReconciler {
    store: Arc<dyn DocumentStore>,
    simulator: Option<PaymentSimulator>,
}

impl UserReconciler {
    pub fn new(store: Arc<dyn DocumentStore>, simulator: Option<PaymentSimulator>) -> Self {
        Self { store, simulator }
    }

    pub fn simulator(&self) -> Option<&PaymentSimulator> {
        self.simulator.as_ref()
    }

    /// Resolves a registration into the upsert the store applies atomically.
    pub fn plan(
        registration: Registration,
        reward_address: String,
    ) -> Result<UserUpsert, ReconcileError> {
        let machine_id = required(registration.machine_id, "machineId")?;
        let eth_address = required(registration.eth_address, "ethAddress")?;

        Ok(UserUpsert {
            machine_id,
            eth_address,
            selected_node_id: non_empty(registration.selected_node_id)
                .unwrap_or_else(|| DEFAULT_NODE_ID.to_string()),
            session_id: non_empty(registration.session_id),
            gas_fee: registration.gas_fee,
            gas_paid: registration.gas_paid.unwrap_or(false),
            payment_status: false,
            on_insert: InsertDefaults {
                reward_address,
                gas_fee: default_gas_fee(),
            },
        })
    }

    /// Creates or updates the user for this registration and returns the
    /// stored record. Schedules a simulated payment when simulation is on.
    pub async fn reconcile(&self, registration: Registration) -> Result<User, ReconcileError> {
        let upsert = Self::plan(registration, generate_reward_address())?;
        let user = self.store.upsert_user(&upsert).await?;

        debug!(
            machine_id = %user.machine_id,
            selected_node = %user.selected_node_id,
            gas_fee = %user.gas_fee,
            "user reconciled"
        );

        if let Some(simulator) = &self.simulator {
            simulator.schedule(&user.machine_id);
        }
        Ok(user)
    }

    pub async fn confirm_payment(
        &self,
        machine_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<User, ReconcileError> {
        let machine_id = required(machine_id, "machineId")?;
        let existing = self
            .store
            .find_user(&machine_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(machine_id.clone()))?;

        if let (Some(stored), Some(submitted)) = (&existing.session_id, non_empty(session_id)) {
            if *stored != submitted {
                return Err(ReconcileError::SessionMismatch);
            }
        }

        let user = self
            .store
            .update_user(&machine_id, &UserPatch::payment_confirmed())
            .await?
            .ok_or_else(|| ReconcileError::NotFound(machine_id.clone()))?;
        if let Some(simulator) = &self.simulator {
            simulator.cancel(&machine_id);
        }

        info!(machine_id = %machine_id, "payment confirmed");
        Ok(user)
    }

    pub async fn reset_payment(&self, machine_id: &str) -> Result<User, ReconcileError> {
        if let Some(simulator) = &self.simulator {
            simulator.cancel(machine_id);
        }
        let user = self
            .store
            .update_user(machine_id, &UserPatch::payment_reset())
            .await?
            .ok_or_else(|| ReconcileError::NotFound(machine_id.to_owned()))?;

        info!(machine_id, "payment reset");
        Ok(user)
    }

    /// Applies an admin patch. A patch that sets `paymentStatus` takes over
    /// from any pending simulated confirmation.
    pub async fn apply_patch(
        &self,
        machine_id: &str,
        patch: &UserPatch,
    ) -> Result<User, ReconcileError> {
        if patch.payment_status.is_some() {
            if let Some(simulator) = &self.simulator {
                simulator.cancel(machine_id);
            }
        }
        self.store
            .update_user(machine_id, patch)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(machine_id.to_owned()))
    }

    pub async fn payment_status(&self, machine_id: &str) -> Result<PaymentStatusReport, ReconcileError> {
        let user = self
            .store
            .find_user(machine_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(machine_id.to_owned()))?;

        Ok(PaymentStatusReport {
            simulation_pending: self
                .simulator
                .as_ref()
                .is_some_and(|s| s.is_pending(&user.machine_id)),
            machine_id: user.machine_id,
            payment_status: user.payment_status,
            gas_paid: user.gas_paid,
            session_id: user.session_id,
        })
    }
}
