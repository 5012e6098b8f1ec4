use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument, UpdateOptions,
};
use mongodb::{Collection, Database, IndexModel};
use tracing::{debug, info};

use super::{DocumentStore, StoreError, StoreResult, UserUpsert};
use crate::models::{
    Node, NodeDocument, NodePatch, User, UserDocument, UserPatch, to_decimal128,
};

const USERS: &str = "users";
const NODES: &str = "nodes";
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed store. `users.machineId` carries a unique index, which is
/// what makes [`DocumentStore::upsert_user`] safe under concurrency.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn users(&self) -> Collection<UserDocument> {
        self.db.collection(USERS)
    }

    fn nodes(&self) -> Collection<NodeDocument> {
        self.db.collection(NODES)
    }

    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let machine_id = IndexModel::builder()
            .keys(doc! { "machineId": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let payment_status = IndexModel::builder()
            .keys(doc! { "paymentStatus": 1 })
            .build();
        self.users()
            .create_indexes([machine_id, payment_status], None)
            .await?;

        let node_id = IndexModel::builder().keys(doc! { "id": 1 }).build();
        self.nodes().create_index(node_id, None).await?;

        info!("indexes ensured");
        Ok(())
    }

    async fn find_one_and_update_user(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<Option<UserDocument>, MongoError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .build();
        self.users()
            .find_one_and_update(filter, update, options)
            .await
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Builds the single update document behind a user upsert. Creation-only
/// fields go in `$setOnInsert`, everything else in `$set`; no field appears
/// in both.
pub(crate) fn upsert_update(upsert: &UserUpsert, now: bson::DateTime) -> StoreResult<Document> {
    let mut set = doc! {
        "ethAddress": upsert.eth_address.as_str(),
        "selectedNodeId": upsert.selected_node_id.as_str(),
        "sessionId": upsert.session_id.clone(),
        "paymentStatus": upsert.payment_status,
        "gasPaid": upsert.gas_paid,
        "updatedAt": now,
    };
    let mut on_insert = doc! {
        "rewardAddress": upsert.on_insert.reward_address.as_str(),
        "createdAt": now,
    };
    match upsert.gas_fee {
        Some(fee) => set.insert("gasFee", to_decimal128(fee)?),
        None => on_insert.insert("gasFee", to_decimal128(upsert.on_insert.gas_fee)?),
    };

    Ok(doc! {
        "$set": set,
        "$setOnInsert": on_insert,
        // legacy field name, superseded by selectedNodeId
        "$unset": { "selectedNode": "" },
    })
}

pub(crate) fn user_patch_update(patch: &UserPatch, now: bson::DateTime) -> StoreResult<Document> {
    let mut set = Document::new();
    if let Some(eth_address) = &patch.eth_address {
        set.insert("ethAddress", eth_address.as_str());
    }
    if let Some(node_id) = &patch.selected_node_id {
        set.insert("selectedNodeId", node_id.as_str());
    }
    if let Some(paid) = patch.payment_status {
        set.insert("paymentStatus", paid);
    }
    if let Some(fee) = patch.gas_fee {
        set.insert("gasFee", to_decimal128(fee)?);
    }
    if let Some(gas_paid) = patch.gas_paid {
        set.insert("gasPaid", gas_paid);
    }
    if let Some(session_id) = &patch.session_id {
        set.insert("sessionId", session_id.as_str());
    }
    set.insert("updatedAt", now);
    Ok(doc! { "$set": set })
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_nodes(&self) -> StoreResult<Vec<Node>> {
        let docs: Vec<NodeDocument> = self.nodes().find(None, None).await?.try_collect().await?;
        Ok(docs.into_iter().map(Node::from).collect())
    }

    async fn find_node(&self, id: &str) -> StoreResult<Option<Node>> {
        let doc = self.nodes().find_one(doc! { "id": id }, None).await?;
        Ok(doc.map(Node::from))
    }

    async fn seed_node(&self, node: &Node) -> StoreResult<bool> {
        let document = bson::to_document(&NodeDocument::from(node))?;
        let options = UpdateOptions::builder().upsert(true).build();
        let result = self
            .nodes()
            .update_one(
                doc! { "id": node.id.as_str() },
                doc! { "$setOnInsert": document },
                options,
            )
            .await?;
        Ok(result.upserted_id.is_some())
    }

    async fn update_node(&self, id: &str, patch: &NodePatch) -> StoreResult<Option<Node>> {
        let set = bson::to_document(patch)?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let doc = self
            .nodes()
            .find_one_and_update(doc! { "id": id }, doc! { "$set": set }, options)
            .await?;
        Ok(doc.map(Node::from))
    }

    async fn upsert_user(&self, upsert: &UserUpsert) -> StoreResult<User> {
        let filter = doc! { "machineId": upsert.machine_id.as_str() };
        let update = upsert_update(upsert, bson::DateTime::now())?;

        // Two concurrent first inserts can both miss the filter; the loser hits
        // the unique index and must be replayed as an update.
        let doc = match self
            .find_one_and_update_user(filter.clone(), update.clone(), true)
            .await
        {
            Err(e) if is_duplicate_key(&e) => {
                debug!(machine_id = %upsert.machine_id, "lost insert race, replaying upsert");
                self.find_one_and_update_user(filter, update, true).await?
            }
            other => other?,
        };

        let doc = doc.ok_or_else(|| StoreError::MissingUpsertResult(upsert.machine_id.clone()))?;
        Ok(User::try_from(doc)?)
    }

    async fn find_user(&self, machine_id: &str) -> StoreResult<Option<User>> {
        match self
            .users()
            .find_one(doc! { "machineId": machine_id }, None)
            .await?
        {
            Some(doc) => Ok(Some(User::try_from(doc)?)),
            None => Ok(None),
        }
    }

    async fn update_user(&self, machine_id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        let update = user_patch_update(patch, bson::DateTime::now())?;
        match self
            .find_one_and_update_user(doc! { "machineId": machine_id }, update, false)
            .await?
        {
            Some(doc) => Ok(Some(User::try_from(doc)?)),
            None => Ok(None),
        }
    }

    async fn list_machine_ids(&self) -> StoreResult<Vec<String>> {
        let options = FindOptions::builder()
            .projection(doc! { "machineId": 1, "_id": 0 })
            .build();
        let docs: Vec<Document> = self
            .db
            .collection::<Document>(USERS)
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_str("machineId").ok().map(str::to_owned))
            .collect())
    }
}
