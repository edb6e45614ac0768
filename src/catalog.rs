//! Read-only reflection over the live database schema.
//!
//! Table names ground both query generation and the validation gate, and
//! schema changes are rare, so the name list is cached until someone calls
//! `invalidate()`.

use crate::error::{ChatError, Result};
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::info;

pub struct SchemaCatalog {
    pool: MySqlPool,
    cached_names: RwLock<Option<Vec<String>>>,
}

impl SchemaCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            cached_names: RwLock::new(None),
        }
    }

    /// List of table names in the connected database, cached after first use.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        if let Some(names) = self.cached_names.read().await.as_ref() {
            return Ok(names.clone());
        }

        let rows = sqlx::query("SHOW TABLES")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ChatError::Database(format!("Failed to fetch table names: {}", e)))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| ChatError::Database(format!("Failed to decode table name: {}", e)))?;
            names.push(name);
        }

        info!("Loaded schema catalog: {} tables", names.len());
        *self.cached_names.write().await = Some(names.clone());
        Ok(names)
    }

    /// Drop the cached table list; the next call re-reads the database.
    pub async fn invalidate(&self) {
        *self.cached_names.write().await = None;
    }

    /// Per-table column descriptions as `name (type)` strings.
    ///
    /// Used only to build the synthesis prompt, so it always reads live.
    pub async fn table_info(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut info = BTreeMap::new();
        for table in self.table_names().await? {
            let rows = sqlx::query(&format!("DESCRIBE {}", table))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    ChatError::Database(format!("Failed to describe table {}: {}", table, e))
                })?;

            let mut columns = Vec::with_capacity(rows.len());
            for row in &rows {
                let field: String = row.try_get("Field").map_err(|e| {
                    ChatError::Database(format!("Failed to decode column name: {}", e))
                })?;
                let col_type: String = row.try_get("Type").map_err(|e| {
                    ChatError::Database(format!("Failed to decode column type: {}", e))
                })?;
                columns.push(format!("{} ({})", field, col_type));
            }
            info.insert(table, columns);
        }
        Ok(info)
    }
}
