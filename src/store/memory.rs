use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{DocumentStore, StoreResult, UserUpsert};
use crate::models::{Node, NodePatch, User, UserPatch};

/// In-process store with the same upsert semantics as [`super::MongoStore`].
/// A single lock per collection stands in for the unique index.
#[derive(Default)]
pub struct MemoryStore {
    nodes: Mutex<BTreeMap<String, Node>>,
    users: Mutex<BTreeMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_nodes(&self) -> StoreResult<Vec<Node>> {
        Ok(self.nodes.lock().values().cloned().collect())
    }

    async fn find_node(&self, id: &str) -> StoreResult<Option<Node>> {
        Ok(self.nodes.lock().get(id).cloned())
    }

    async fn seed_node(&self, node: &Node) -> StoreResult<bool> {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(&node.id) {
            return Ok(false);
        }
        nodes.insert(node.id.clone(), node.clone());
        Ok(true)
    }

    async fn update_node(&self, id: &str, patch: &NodePatch) -> StoreResult<Option<Node>> {
        let mut nodes = self.nodes.lock();
        Ok(nodes.get_mut(id).map(|node| {
            patch.apply(node);
            node.clone()
        }))
    }

    async fn upsert_user(&self, upsert: &UserUpsert) -> StoreResult<User> {
        let now = Utc::now();
        let mut users = self.users.lock();
        let user = users
            .entry(upsert.machine_id.clone())
            .and_modify(|user| {
                user.eth_address = upsert.eth_address.clone();
                user.selected_node_id = upsert.selected_node_id.clone();
                user.session_id = upsert.session_id.clone();
                user.payment_status = upsert.payment_status;
                user.gas_paid = upsert.gas_paid;
                if let Some(fee) = upsert.gas_fee {
                    user.gas_fee = fee;
                }
                user.updated_at = now;
            })
            .or_insert_with(|| User {
                machine_id: upsert.machine_id.clone(),
                eth_address: upsert.eth_address.clone(),
                selected_node_id: upsert.selected_node_id.clone(),
                payment_status: upsert.payment_status,
                reward_address: upsert.on_insert.reward_address.clone(),
                gas_fee: upsert.gas_fee.unwrap_or(upsert.on_insert.gas_fee),
                gas_paid: upsert.gas_paid,
                session_id: upsert.session_id.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(user.clone())
    }

    async fn find_user(&self, machine_id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.lock().get(machine_id).cloned())
    }

    async fn update_user(&self, machine_id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        let mut users = self.users.lock();
        Ok(users.get_mut(machine_id).map(|user| {
            patch.apply(user);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn list_machine_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.users.lock().keys().cloned().collect())
    }
}
