//! SurrealDB mirror store - connection and tree operations
//!
//! The mirror tree is stored one document per `collection/key` pair
//! (`contests/c1`, `allowedJudges/<push-id>`, ...). Reads and writes deeper
//! than the document level are resolved inside the document body.
//!
//! Supports both local (in-memory) and cloud (WebSocket) connections.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::notify::AddedNotifier;
use crate::path::StorePath;
use crate::storage_traits::{AddedHandler, MirrorStore, StorageResult, SubscriptionId};
use crate::tree;
use crate::Result;

const DEFAULT_NAMESPACE: &str = "judging";
const DEFAULT_DATABASE: &str = "main";

/// Configuration for a remote SurrealDB mirror
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "judging")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl MirrorConfig {
    /// Create a configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "judging")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    collection: String,
    doc_key: String,
    body: String,
}

/// SurrealDB-backed [`MirrorStore`].
///
/// Writes through one handle are serialized, so document-level
/// read-modify-write for deep paths cannot interleave within a process.
/// Added-child notifications cover writes made through this handle.
#[derive(Clone)]
pub struct SurrealMirrorStore {
    db: Surreal<Any>,
    notifier: Arc<AddedNotifier>,
    write_lock: Arc<Mutex<()>>,
}

impl SurrealMirrorStore {
    fn from_db(db: Surreal<Any>) -> Self {
        Self {
            db,
            notifier: Arc::new(AddedNotifier::new()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        Self::connect_url("mem://").await
    }

    /// Connect to an arbitrary SurrealDB URL without authentication
    #[instrument]
    pub async fn connect_url(url: &str) -> Result<Self> {
        info!("Connecting to SurrealDB mirror at {}", url);

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(DEFAULT_NAMESPACE)
            .use_db(DEFAULT_DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        Ok(Self::from_db(db))
    }

    /// Connect to a remote SurrealDB instance with credentials
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: MirrorConfig) -> Result<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        migrations::init_schema(&db).await?;
        info!("SurrealDB Cloud connected and schema initialized");
        Ok(Self::from_db(db))
    }

    /// Connect using environment variables
    ///
    /// If SURREALDB_ENDPOINT is set, connects with credentials.
    /// If SURREALDB_URL is set, connects to that URL.
    /// Otherwise, falls back to in-memory.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> Result<Self> {
        if let Ok(config) = MirrorConfig::from_env() {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect_url(&url).await;
        }

        info!("No mirror config found, using in-memory database");
        Self::setup_db().await
    }

    // -- document helpers ----------------------------------------------------

    fn doc_id(collection: &str, key: &str) -> String {
        format!("{collection}/{key}")
    }

    async fn load_doc(&self, collection: &str, key: &str) -> StorageResult<Option<Value>> {
        let mut res = self
            .db
            .query("SELECT collection, doc_key, body FROM mirror_nodes WHERE collection = $collection AND doc_key = $doc_key")
            .bind(("collection", collection.to_string()))
            .bind(("doc_key", key.to_string()))
            .await?;

        let rows: Vec<NodeRecord> = res.take(0)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_str(&row.body)?)),
            None => Ok(None),
        }
    }

    async fn load_collection(&self, collection: &str) -> StorageResult<BTreeMap<String, Value>> {
        let mut res = self
            .db
            .query("SELECT collection, doc_key, body FROM mirror_nodes WHERE collection = $collection")
            .bind(("collection", collection.to_string()))
            .await?;

        let rows: Vec<NodeRecord> = res.take(0)?;
        rows.into_iter()
            .map(|row| -> StorageResult<(String, Value)> {
                Ok((row.doc_key, serde_json::from_str(&row.body)?))
            })
            .collect()
    }

    async fn save_doc(&self, collection: &str, key: &str, value: Option<Value>) -> StorageResult<()> {
        let id = Self::doc_id(collection, key);
        match value.filter(|v| !v.is_null()) {
            Some(value) => {
                let record = NodeRecord {
                    collection: collection.to_string(),
                    doc_key: key.to_string(),
                    body: serde_json::to_string(&value)?,
                };
                self.db
                    .query("UPSERT type::thing('mirror_nodes', $id) CONTENT $record")
                    .bind(("id", id))
                    .bind(("record", record))
                    .await?
                    .check()?;
            }
            None => {
                self.db
                    .query("DELETE type::thing('mirror_nodes', $id)")
                    .bind(("id", id))
                    .await?
                    .check()?;
            }
        }
        Ok(())
    }

    async fn replace_collection(&self, path: &StorePath, value: Option<Value>) -> StorageResult<()> {
        let collection = path.key().to_string();
        let children = match value.filter(|v| !v.is_null()) {
            None => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(StorageError::NotAnObject {
                    path: path.to_string(),
                })
            }
        };

        self.db
            .query("DELETE mirror_nodes WHERE collection = $collection")
            .bind(("collection", collection.clone()))
            .await?
            .check()?;

        for (key, child) in children {
            self.save_doc(&collection, &key, Some(child)).await?;
        }
        Ok(())
    }

    async fn write_unlocked(&self, path: &StorePath, value: Option<Value>) -> StorageResult<()> {
        let segments = path.segments();
        match segments {
            [_] => self.replace_collection(path, value).await,
            [collection, key] => self.save_doc(collection, key, value).await,
            [collection, key, rest @ ..] => {
                let existing = self.load_doc(collection, key).await?;
                if existing.is_none() && value.is_none() {
                    return Ok(());
                }
                let mut doc = existing.unwrap_or_else(|| Value::Object(Map::new()));
                tree::write(&mut doc, rest, value);
                self.save_doc(collection, key, Some(doc)).await
            }
            [] => Err(StorageError::InvalidPath {
                path: path.to_string(),
                reason: "path must have at least one segment".to_string(),
            }),
        }
    }

    /// Shallowest prefix of `path` (as a length) that does not exist yet.
    async fn first_missing_prefix(&self, path: &StorePath) -> StorageResult<Option<usize>> {
        for len in 1..=path.len() {
            if let Some(prefix) = path.prefix(len) {
                if self.get(&prefix).await?.is_none() {
                    return Ok(Some(len));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl MirrorStore for SurrealMirrorStore {
    #[instrument(skip(self, path), fields(path = %path))]
    async fn get(&self, path: &StorePath) -> StorageResult<Option<Value>> {
        match path.segments() {
            [collection] => {
                let children = self.load_collection(collection).await?;
                if children.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::Object(children.into_iter().collect())))
                }
            }
            [collection, key, rest @ ..] => {
                let doc = self.load_doc(collection, key).await?;
                Ok(doc.and_then(|doc| tree::lookup(&doc, rest).cloned()))
            }
            [] => Ok(None),
        }
    }

    async fn list(&self, path: &StorePath) -> StorageResult<BTreeMap<String, Value>> {
        if let [collection] = path.segments() {
            return self.load_collection(collection).await;
        }
        let node = self.get(path).await?;
        tree::children(node.as_ref(), path)
    }

    #[instrument(skip(self, path, value), fields(path = %path, delete = value.is_none()))]
    async fn set(&self, path: &StorePath, value: Option<Value>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        debug!("writing mirror node");

        let first_new = if self.notifier.is_empty() {
            None
        } else {
            self.first_missing_prefix(path).await?
        };

        self.write_unlocked(path, value).await?;

        if let Some(start) = first_new {
            for len in start..=path.len() {
                let Some(prefix) = path.prefix(len) else {
                    continue;
                };
                if let Some(added) = self.get(&prefix).await? {
                    self.notifier.notify_added(&prefix, &added);
                }
            }
        }
        Ok(())
    }

    async fn subscribe_added(
        &self,
        path: &StorePath,
        handler: AddedHandler,
    ) -> StorageResult<SubscriptionId> {
        let _guard = self.write_lock.lock().await;
        let existing = self.list(path).await?;
        let id = self.notifier.register(path.clone(), handler.clone());
        for (key, value) in &existing {
            handler(key, value);
        }
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> StorageResult<()> {
        self.notifier.remove(id);
        Ok(())
    }
}
