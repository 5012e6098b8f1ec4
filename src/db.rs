use anyhow::{Context, Result};
use mongodb::bson::doc;
use mongodb::{Client, Database, options::ClientOptions};
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Node;
use crate::store::DocumentStore;

pub async fn connect_to_mongo(config: &Config) -> Result<Database> {
    let mut client_options = ClientOptions::parse(&config.mongodb_uri)
        .await
        .context("invalid MONGODB_URI")?;
    client_options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    let client = Client::with_options(client_options)?;

    let db = client.database(&config.database);

    // Test the connection
    db.run_command(doc! { "ping": 1 }, None)
        .await
        .context("MongoDB ping failed")?;

    info!(database = %config.database, "MongoDB connected");
    Ok(db)
}

/// Inserts the nodes listed in the JSON file at `path`, skipping ids that
/// already exist. Returns the number of nodes inserted.
pub async fn seed_nodes(store: &dyn DocumentStore, path: &Path) -> Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let nodes: Vec<Node> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut inserted = 0;
    for node in &nodes {
        if store.seed_node(node).await? {
            inserted += 1;
        } else {
            warn!(node_id = %node.id, "node already exists, not overwritten");
        }
    }

    info!(inserted, total = nodes.len(), "seeded nodes");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_seed_is_insert_if_absent() {
        let path = std::env::temp_dir().join(format!("ethnode-seed-{}.json", std::process::id()));
        let json = serde_json::json!([
            {
                "id": "node-1",
                "name": "Genesis",
                "requiredEth": "32",
                "estimatedReward": "0.1",
                "validatorAddress": "0x01",
                "status": "active",
                "statusColor": "green",
                "reliability": 99.0,
                "countdownMinutes": 10
            }
        ]);
        tokio::fs::write(&path, json.to_string()).await.unwrap();

        let store = MemoryStore::new();
        assert_eq!(seed_nodes(&store, &path).await.unwrap(), 1);
        assert_eq!(seed_nodes(&store, &path).await.unwrap(), 0);
        assert_eq!(store.list_nodes().await.unwrap().len(), 1);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_missing_file_errors() {
        let store = MemoryStore::new();
        let result = seed_nodes(&store, Path::new("/nonexistent/nodes.json")).await;
        assert!(result.is_err());
    }
}
