//! Node storage for one collection table.
//!
//! Every method issues its statements one after another on the shared pool;
//! nothing here opens a transaction.

use crate::backend::{Dialect, SqlBackend};
use crate::error::{FsError, Result};
use crate::schema::{NodeFlags, NodeId, ROOT_ID};
use sqlx::{AnyPool, Row};

/// Stands in for the root's NULL parent when reading rows back.
const NO_PARENT: NodeId = -1;

/// A row of the node table, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub name: String,
    pub flags: NodeFlags,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Handle on one collection table of one backend.
#[derive(Clone)]
pub struct Collection {
    backend: SqlBackend,
    table: String,
}

impl Collection {
    /// Bind to `table`, creating it and its root row when missing.
    ///
    /// Table names are case-insensitive in every backend, so the name is
    /// folded to lower case before it is used as the root's name.
    pub async fn open(backend: SqlBackend, table: &str) -> Result<Self> {
        let table = table.to_ascii_lowercase();
        backend.ensure_collection(&table).await?;
        Ok(Self { backend, table })
    }

    fn pool(&self) -> &AnyPool {
        self.backend.pool()
    }

    fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    fn sql(&self, query: &str) -> String {
        self.dialect().sql(query)
    }

    /// Resolve `segments` below the collection root to a node id.
    ///
    /// The walk starts from the row whose parent is NULL and whose name is the
    /// collection, then looks up one child per segment. This costs one query
    /// per level; a recursive CTE could do it in one, but is not available on
    /// every backend we target. Stops at the first missing segment.
    pub async fn resolve(&self, segments: &[String]) -> Result<Option<NodeId>> {
        let Some(mut current) = self.lookup(None, &self.table).await? else {
            return Ok(None);
        };

        for segment in segments {
            match self.lookup(Some(current), segment).await? {
                Some(id) => current = id,
                None => {
                    tracing::debug!(collection = %self.table, %segment, "segment not found");
                    return Ok(None);
                }
            }
        }

        Ok(Some(current))
    }

    /// Id of the child `name` of `parent`; `None` parent means the top level.
    pub async fn lookup(&self, parent: Option<NodeId>, name: &str) -> Result<Option<NodeId>> {
        let row = match parent {
            Some(parent) => {
                let sql = self.sql(&format!(
                    "SELECT id FROM {} WHERE parent = ? AND name = ?",
                    self.table
                ));
                sqlx::query(&sql)
                    .bind(parent)
                    .bind(name)
                    .fetch_optional(self.pool())
                    .await?
            }
            None => {
                let sql = self.sql(&format!(
                    "SELECT id FROM {} WHERE parent IS NULL AND name = ?",
                    self.table
                ));
                sqlx::query(&sql).bind(name).fetch_optional(self.pool()).await?
            }
        };

        match row {
            Some(row) => Ok(Some(row.try_get::<i64, _>(0)?)),
            None => Ok(None),
        }
    }

    pub async fn node(&self, id: NodeId) -> Result<Option<Node>> {
        // The Any driver cannot decode NULL, so nullable columns are coalesced
        let sql = self.sql(&format!(
            "SELECT id, COALESCE(parent, {NO_PARENT}), name, flags, \
             COALESCE(created_at, 0), COALESCE(modified_at, 0) FROM {} WHERE id = ?",
            self.table
        ));
        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(self.pool()).await? else {
            return Ok(None);
        };

        let parent: i64 = row.try_get(1)?;
        Ok(Some(Node {
            id: row.try_get(0)?,
            parent: (parent != NO_PARENT).then_some(parent),
            name: row.try_get(2)?,
            flags: NodeFlags::from_column(row.try_get(3)?),
            created_at: row.try_get(4)?,
            modified_at: row.try_get(5)?,
        }))
    }

    pub async fn flags(&self, id: NodeId) -> Result<Option<NodeFlags>> {
        let sql = self.sql(&format!("SELECT flags FROM {} WHERE id = ?", self.table));
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.pool()).await?;
        match row {
            Some(row) => Ok(Some(NodeFlags::from_column(row.try_get(0)?))),
            None => Ok(None),
        }
    }

    /// Insert a new node under `parent` and return its generated id.
    pub async fn insert(&self, parent: NodeId, name: &str, flags: NodeFlags) -> Result<NodeId> {
        let now = chrono::Utc::now().timestamp_millis();
        let insert = format!(
            "INSERT INTO {} (parent, name, flags, created_at, modified_at, content) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.table
        );

        let id = if self.dialect().supports_returning() {
            let sql = self.sql(&format!("{} RETURNING id", insert));
            let row = sqlx::query(&sql)
                .bind(parent)
                .bind(name)
                .bind(flags.to_column())
                .bind(now)
                .bind(now)
                .bind(Vec::<u8>::new())
                .fetch_one(self.pool())
                .await?;
            row.try_get::<i64, _>(0)?
        } else {
            let sql = self.sql(&insert);
            let result = sqlx::query(&sql)
                .bind(parent)
                .bind(name)
                .bind(flags.to_column())
                .bind(now)
                .bind(now)
                .bind(Vec::<u8>::new())
                .execute(self.pool())
                .await?;
            result
                .last_insert_id()
                .ok_or_else(|| FsError::Query(format!("no id returned for {}", name)))?
        };

        tracing::debug!(collection = %self.table, parent, name, id, ?flags, "inserted node");
        Ok(id)
    }

    /// Delete one row; descendants go with it through the cascading foreign key.
    pub async fn delete(&self, id: NodeId) -> Result<bool> {
        let sql = self.sql(&format!("DELETE FROM {} WHERE id = ?", self.table));
        let result = sqlx::query(&sql).bind(id).execute(self.pool()).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_children(&self, id: NodeId) -> Result<i64> {
        let sql = self.sql(&format!("SELECT COUNT(*) FROM {} WHERE parent = ?", self.table));
        let row = sqlx::query(&sql).bind(id).fetch_one(self.pool()).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    /// Names of the immediate children of `id`, in the store's natural order.
    pub async fn children(&self, id: NodeId) -> Result<Vec<String>> {
        let sql = self.sql(&format!("SELECT name FROM {} WHERE parent = ?", self.table));
        let rows = sqlx::query(&sql).bind(id).fetch_all(self.pool()).await?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>(0).map_err(FsError::from))
            .collect()
    }

    pub async fn set_parent(&self, id: NodeId, parent: NodeId) -> Result<bool> {
        let sql = self.sql(&format!("UPDATE {} SET parent = ? WHERE id = ?", self.table));
        let result = sqlx::query(&sql)
            .bind(parent)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stored content of `id`; `None` when the row does not exist.
    pub async fn load_content(&self, id: NodeId) -> Result<Option<Vec<u8>>> {
        let sql = self.sql(&format!(
            "SELECT COALESCE(content, {}) FROM {} WHERE id = ?",
            self.dialect().empty_blob(),
            self.table
        ));
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.pool()).await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<Vec<u8>, _>(0)?)),
            None => Ok(None),
        }
    }

    /// Replace the content of `id` and bump its modification time.
    pub async fn store_content(&self, id: NodeId, content: &[u8]) -> Result<bool> {
        let sql = self.sql(&format!(
            "UPDATE {} SET modified_at = ?, content = ? WHERE id = ?",
            self.table
        ));
        let result = sqlx::query(&sql)
            .bind(chrono::Utc::now().timestamp_millis())
            .bind(content.to_vec())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// True when `ancestor` is `id` itself or lies on its parent chain.
    pub async fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> Result<bool> {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            if node == ROOT_ID {
                break;
            }
            current = match self.node(node).await? {
                Some(node) => node.parent,
                None => None,
            };
        }
        Ok(false)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    async fn collection() -> Collection {
        let db = SqlBackend::sqlite(":memory:").await.unwrap();
        Collection::open(db, "files").await.unwrap()
    }

    fn segments(path: &str) -> Vec<String> {
        path.split('/').filter(|s| !s.is_empty()).map(String::from).collect()
    }

    #[tokio::test]
    async fn test_root_sentinel() {
        let fs = collection().await;
        assert_eq!(fs.resolve(&[]).await.unwrap(), Some(ROOT_ID));

        let root = fs.node(ROOT_ID).await.unwrap().unwrap();
        assert_eq!(root.parent, None);
        assert_eq!(root.name, "files");
        assert_eq!(root.flags, NodeFlags::DEFAULT_DIR);
        assert!(root.created_at > 0);

        // The root row is inserted without content
        assert_eq!(fs.load_content(ROOT_ID).await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_table_name_case_folded() {
        let db = SqlBackend::sqlite(":memory:").await.unwrap();
        let lower = Collection::open(db.clone(), "files").await.unwrap();
        let a = lower.insert(ROOT_ID, "a", NodeFlags::DEFAULT_DIR).await.unwrap();

        let mixed = Collection::open(db, "Files").await.unwrap();
        assert_eq!(mixed.resolve(&[]).await.unwrap(), Some(ROOT_ID));
        assert_eq!(mixed.resolve(&segments("a")).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_resolve_walks_parents() {
        let fs = collection().await;
        let a = fs.insert(ROOT_ID, "a", NodeFlags::DEFAULT_DIR).await.unwrap();
        let b = fs.insert(a, "b", NodeFlags::DEFAULT_DIR).await.unwrap();
        let f = fs.insert(b, "f", NodeFlags::DEFAULT_FILE).await.unwrap();

        assert_eq!(fs.resolve(&segments("a/b/f")).await.unwrap(), Some(f));
        assert_eq!(fs.resolve(&segments("a/b")).await.unwrap(), Some(b));
        assert_eq!(fs.resolve(&segments("a/x/f")).await.unwrap(), None);
        assert_eq!(fs.resolve(&segments("b")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let fs = collection().await;
        let a = fs.insert(ROOT_ID, "a", NodeFlags::DEFAULT_DIR).await.unwrap();
        let b = fs.insert(a, "b", NodeFlags::DEFAULT_DIR).await.unwrap();
        let f = fs.insert(b, "f", NodeFlags::DEFAULT_FILE).await.unwrap();

        assert_eq!(fs.count_children(a).await.unwrap(), 1);
        assert!(fs.delete(a).await.unwrap());
        assert!(fs.node(b).await.unwrap().is_none());
        assert!(fs.node(f).await.unwrap().is_none());
        assert!(!fs.delete(a).await.unwrap());
    }

    #[tokio::test]
    async fn test_sibling_names_unique() {
        let fs = collection().await;
        fs.insert(ROOT_ID, "a", NodeFlags::DEFAULT_DIR).await.unwrap();
        let err = fs.insert(ROOT_ID, "a", NodeFlags::DEFAULT_FILE).await.unwrap_err();
        assert!(err.is_storage_failure());
    }

    #[tokio::test]
    async fn test_content_roundtrip() {
        let fs = collection().await;
        let f = fs.insert(ROOT_ID, "f", NodeFlags::DEFAULT_FILE).await.unwrap();

        assert_eq!(fs.load_content(f).await.unwrap(), Some(Vec::new()));
        assert!(fs.store_content(f, b"\x00\x01binary\xff").await.unwrap());
        assert_eq!(
            fs.load_content(f).await.unwrap(),
            Some(b"\x00\x01binary\xff".to_vec())
        );
        assert_eq!(fs.load_content(f + 100).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_is_ancestor() {
        let fs = collection().await;
        let a = fs.insert(ROOT_ID, "a", NodeFlags::DEFAULT_DIR).await.unwrap();
        let b = fs.insert(a, "b", NodeFlags::DEFAULT_DIR).await.unwrap();
        let c = fs.insert(ROOT_ID, "c", NodeFlags::DEFAULT_DIR).await.unwrap();

        assert!(fs.is_ancestor(a, b).await.unwrap());
        assert!(fs.is_ancestor(b, b).await.unwrap());
        assert!(fs.is_ancestor(ROOT_ID, b).await.unwrap());
        assert!(!fs.is_ancestor(b, a).await.unwrap());
        assert!(!fs.is_ancestor(c, b).await.unwrap());
    }
}
