use chrono::{DateTime, Utc};
use mongodb::bson::{self, Decimal128, oid::ObjectId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{DocumentError, to_utc};

/// Node assigned to a user who registers without choosing one.
pub const DEFAULT_NODE_ID: &str = "node-1";

/// Gas fee applied to newly created users (0.005).
pub fn default_gas_fee() -> Decimal {
    Decimal::new(5, 3)
}

/// A user as seen by the rest of the service and returned over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub machine_id: String,
    pub eth_address: String,
    pub selected_node_id: String,
    pub payment_status: bool,
    pub reward_address: String,
    pub gas_fee: Decimal,
    pub gas_paid: bool,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored shape of a user in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub machine_id: String,
    pub eth_address: String,
    // Older records used `selectedNode`.
    #[serde(default, alias = "selectedNode")]
    pub selected_node_id: Option<String>,
    #[serde(default)]
    pub payment_status: bool,
    pub reward_address: String,
    #[serde(default)]
    pub gas_fee: Option<Decimal128>,
    #[serde(default)]
    pub gas_paid: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "bson::DateTime::now")]
    pub created_at: bson::DateTime,
    #[serde(default = "bson::DateTime::now")]
    pub updated_at: bson::DateTime,
}

impl TryFrom<UserDocument> for User {
    type Error = DocumentError;

    fn try_from(doc: UserDocument) -> Result<Self, Self::Error> {
        let gas_fee = match doc.gas_fee {
            Some(fee) => Decimal::from_str(&fee.to_string())
                .map_err(|e| DocumentError::InvalidDecimal(e.to_string()))?,
            None => default_gas_fee(),
        };

        Ok(User {
            machine_id: doc.machine_id,
            eth_address: doc.eth_address,
            selected_node_id: doc
                .selected_node_id
                .unwrap_or_else(|| DEFAULT_NODE_ID.to_string()),
            payment_status: doc.payment_status,
            reward_address: doc.reward_address,
            gas_fee,
            gas_paid: doc.gas_paid,
            session_id: doc.session_id,
            created_at: to_utc(doc.created_at),
            updated_at: to_utc(doc.updated_at),
        })
    }
}

/// Partial update applied by admins and by the payment flows.
///
/// `machineId` and `rewardAddress` are deliberately absent, so a patch naming
/// them is rejected as an unknown field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserPatch {
    pub eth_address: Option<String>,
    pub selected_node_id: Option<String>,
    pub payment_status: Option<bool>,
    pub gas_fee: Option<Decimal>,
    pub gas_paid: Option<bool>,
    pub session_id: Option<String>,
}

impl UserPatch {
    pub fn payment_confirmed() -> Self {
        Self {
            payment_status: Some(true),
            ..Self::default()
        }
    }

    pub fn payment_reset() -> Self {
        Self {
            payment_status: Some(false),
            gas_paid: Some(false),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the set fields to `user`. Does not touch `updated_at`.
    pub fn apply(&self, user: &mut User) {
        if let Some(eth_address) = &self.eth_address {
            user.eth_address = eth_address.clone();
        }
        if let Some(node_id) = &self.selected_node_id {
            user.selected_node_id = node_id.clone();
        }
        if let Some(paid) = self.payment_status {
            user.payment_status = paid;
        }
        if let Some(fee) = self.gas_fee {
            user.gas_fee = fee;
        }
        if let Some(gas_paid) = self.gas_paid {
            user.gas_paid = gas_paid;
        }
        if let Some(session_id) = &self.session_id {
            user.session_id = Some(session_id.clone());
        }
    }
}
