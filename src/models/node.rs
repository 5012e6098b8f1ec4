use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{to_bson_datetime, to_utc};

/// A stakeable validator slot offered to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    pub required_eth: Decimal,
    pub estimated_reward: Decimal,
    pub validator_address: String,
    pub status: String,
    pub status_color: String,
    pub reliability: f64,
    pub countdown_minutes: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Stored shape of a node in the `nodes` collection. Amounts are kept as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "id")]
    pub node_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required_eth: Decimal,
    #[serde(default)]
    pub estimated_reward: Decimal,
    #[serde(default)]
    pub validator_address: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_color: String,
    #[serde(default)]
    pub reliability: f64,
    #[serde(default, with = "bson::serde_helpers::u32_as_f64")]
    pub countdown_minutes: u32,
    #[serde(default = "bson::DateTime::now")]
    pub created_at: bson::DateTime,
}

impl From<NodeDocument> for Node {
    fn from(doc: NodeDocument) -> Self {
        Node {
            id: doc.node_id,
            name: doc.name,
            required_eth: doc.required_eth,
            estimated_reward: doc.estimated_reward,
            validator_address: doc.validator_address,
            status: doc.status,
            status_color: doc.status_color,
            reliability: doc.reliability,
            countdown_minutes: doc.countdown_minutes,
            created_at: to_utc(doc.created_at),
        }
    }
}

impl From<&Node> for NodeDocument {
    fn from(node: &Node) -> Self {
        NodeDocument {
            id: None,
            node_id: node.id.clone(),
            name: node.name.clone(),
            required_eth: node.required_eth,
            estimated_reward: node.estimated_reward,
            validator_address: node.validator_address.clone(),
            status: node.status.clone(),
            status_color: node.status_color.clone(),
            reliability: node.reliability,
            countdown_minutes: node.countdown_minutes,
            created_at: to_bson_datetime(node.created_at),
        }
    }
}

/// Admin patch for a node. The `id` itself cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_eth: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_reward: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_minutes: Option<u32>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, node: &mut Node) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(required_eth) = self.required_eth {
            node.required_eth = required_eth;
        }
        if let Some(reward) = self.estimated_reward {
            node.estimated_reward = reward;
        }
        if let Some(address) = &self.validator_address {
            node.validator_address = address.clone();
        }
        if let Some(status) = &self.status {
            node.status = status.clone();
        }
        if let Some(color) = &self.status_color {
            node.status_color = color.clone();
        }
        if let Some(reliability) = self.reliability {
            node.reliability = reliability;
        }
        if let Some(minutes) = self.countdown_minutes {
            node.countdown_minutes = minutes;
        }
    }
}
