//! SurrealDB schema initialization for the mirror
//!
//! Safe to call on every connection (all definitions are `IF NOT EXISTS`).

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all mirror tables in SurrealDB
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing judging mirror schema");
    init_mirror_nodes_table(db).await?;
    info!("Judging mirror schema initialization complete");
    Ok(())
}

/// Initialize the `mirror_nodes` table
///
/// Schema:
/// ```text
/// TABLE mirror_nodes {
///   collection: STRING (first path segment, e.g. "contests")
///   doc_key:    STRING (second path segment, e.g. a contest id)
///   body:       STRING (JSON text of the whole document)
/// }
/// ```
///
/// One record holds everything beneath `collection/key`. The record id is
/// `collection/key`, so upserts replace a document in a single statement.
async fn init_mirror_nodes_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing mirror_nodes table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS mirror_nodes SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS collection ON TABLE mirror_nodes TYPE string;
        DEFINE FIELD IF NOT EXISTS doc_key ON TABLE mirror_nodes TYPE string;
        DEFINE FIELD IF NOT EXISTS body ON TABLE mirror_nodes TYPE string;

        -- Listing a collection
        DEFINE INDEX IF NOT EXISTS idx_node_collection ON TABLE mirror_nodes COLUMNS collection;

        -- One document per (collection, key)
        DEFINE INDEX IF NOT EXISTS idx_node_doc ON TABLE mirror_nodes COLUMNS collection, doc_key UNIQUE;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    debug!("mirror_nodes table initialized");
    Ok(())
}
