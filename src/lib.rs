//! # sqlfs - A Virtual Filesystem Stored in SQL Tables
//!
//! sqlfs maps paths of the form `sql:/<connection>/<collection>/a/b/c` onto
//! rows of a relational table. Each collection is one table; every row is a
//! directory or file node pointing at its parent, with row `0` as the root.
//!
//! ## Backends
//!
//! - **SQLite**: Embedded, single-file or in-memory database (default feature)
//! - **PostgreSQL**: Remote database (`postgres` feature)
//! - **MySQL**: Remote database (`mysql` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlfs::{ConnectionRegistry, EngineFactory, FileEngine, OpenMode, SqlBackendConfig, SqlEngineHandler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connections = Arc::new(ConnectionRegistry::new());
//!     connections.connect("fsdb", SqlBackendConfig::Sqlite(":memory:".into())).await?;
//!     let handler = SqlEngineHandler::new(connections);
//!
//!     let root = handler.instantiate("sql:/fsdb/files").await?;
//!     root.mkdir("sql:/fsdb/files/docs", false).await?;
//!
//!     let mut file = handler.instantiate("sql:/fsdb/files/docs/note.txt").await?;
//!     file.open(OpenMode::write_only()).await?;
//!     file.write(b"hello")?;
//!     file.close().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod collection;
pub mod engine;
pub mod error;
pub mod handler;
pub mod iter;
pub mod path;
pub mod schema;

pub use backend::{ConnectionRegistry, Dialect, RegistryConfig, SqlBackend, SqlBackendConfig};
pub use collection::{Collection, Node};
pub use engine::{FileName, OpenMode, SqlFileEngine};
pub use error::{FsError, Result};
pub use handler::{EngineFactory, EngineRegistry, FileEngine, SqlEngineHandler};
pub use iter::DirIterator;
pub use path::{DEFAULT_SCHEME, SqlPath};
pub use schema::{NodeFlags, NodeId, ROOT_ID};
