//! Document storage for nodes and users.
//!
//! The service only talks to storage through [`DocumentStore`]. All mutual
//! exclusion for a user record is delegated to [`DocumentStore::upsert_user`],
//! which must behave as a single atomic find-or-create-and-update keyed by the
//! machine identifier.

#[cfg(test)]
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{DocumentError, Node, NodePatch, User, UserPatch};

pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("upsert for {0} returned no document")]
    MissingUpsertResult(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields written only when the upsert creates the record.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertDefaults {
    pub reward_address: String,
    pub gas_fee: Decimal,
}

/// A fully resolved create-or-update of one user record.
///
/// Every field except `gas_fee` and `on_insert` is written on both paths.
/// `gas_fee` is written only when `Some`; otherwise a new record receives
/// `on_insert.gas_fee` and an existing record keeps its stored fee.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpsert {
    pub machine_id: String,
    pub eth_address: String,
    pub selected_node_id: String,
    pub session_id: Option<String>,
    pub gas_fee: Option<Decimal>,
    pub gas_paid: bool,
    pub payment_status: bool,
    pub on_insert: InsertDefaults,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_nodes(&self) -> StoreResult<Vec<Node>>;

    async fn find_node(&self, id: &str) -> StoreResult<Option<Node>>;

    /// Inserts `node` unless a node with the same id exists. Returns whether
    /// it was inserted.
    async fn seed_node(&self, node: &Node) -> StoreResult<bool>;

    async fn update_node(&self, id: &str, patch: &NodePatch) -> StoreResult<Option<Node>>;

    /// Atomically creates or updates the user keyed by `upsert.machine_id`
    /// and returns the stored record.
    async fn upsert_user(&self, upsert: &UserUpsert) -> StoreResult<User>;

    async fn find_user(&self, machine_id: &str) -> StoreResult<Option<User>>;

    async fn update_user(&self, machine_id: &str, patch: &UserPatch) -> StoreResult<Option<User>>;

    async fn list_machine_ids(&self) -> StoreResult<Vec<String>>;
}
