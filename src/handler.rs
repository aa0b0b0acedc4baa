//! Host-facing dispatch: engine and factory traits, and the registry that
//! routes generic paths to a factory.

use crate::backend::ConnectionRegistry;
use crate::engine::{FileName, OpenMode, SqlFileEngine};
use crate::error::{FsError, Result};
use crate::iter::DirIterator;
use crate::path::{DEFAULT_SCHEME, SqlPath};
use crate::schema::NodeFlags;
use async_trait::async_trait;
use std::sync::Arc;

/// File and directory operations on one virtual path.
///
/// `mkdir` and `rmdir` take a full URL because the host may route a directory
/// operation through the engine of a different path.
#[async_trait]
pub trait FileEngine: Send + Sync {
    /// Stored flags of the path, or empty flags when it does not exist.
    async fn flags(&mut self) -> Result<NodeFlags>;

    fn file_name(&self, kind: FileName) -> String;

    async fn entries(&self) -> Result<DirIterator>;

    async fn open(&mut self, mode: OpenMode) -> Result<()>;

    async fn mkdir(&self, url: &str, create_parents: bool) -> Result<()>;

    async fn rmdir(&self, url: &str, recursive: bool) -> Result<()>;

    async fn remove(&mut self) -> Result<()>;

    async fn rename(&mut self, new_url: &str) -> Result<()>;

    async fn size(&self) -> Result<u64>;

    fn set_size(&mut self, size: u64) -> Result<()>;

    fn pos(&self) -> u64;

    fn seek(&mut self, pos: u64) -> Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, data: &[u8]) -> Result<usize>;

    async fn flush(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Recognizes paths and builds engines for them.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    fn recognize(&self, path: &str) -> bool;

    async fn instantiate(&self, path: &str) -> Result<Box<dyn FileEngine>>;
}

/// Factory for `sql:/<connection>/<collection>/...` paths.
#[derive(Clone)]
pub struct SqlEngineHandler {
    scheme: String,
    connections: Arc<ConnectionRegistry>,
}

impl SqlEngineHandler {
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self::with_scheme(DEFAULT_SCHEME, connections)
    }

    pub fn with_scheme(scheme: impl Into<String>, connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            scheme: scheme.into(),
            connections,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Build the concrete engine for `path`.
    pub async fn engine(&self, path: &str) -> Result<SqlFileEngine> {
        let parsed = SqlPath::parse(&self.scheme, path)
            .ok_or_else(|| FsError::ForeignPath(path.to_string()))?;
        SqlFileEngine::new(Arc::clone(&self.connections), parsed).await
    }
}

#[async_trait]
impl EngineFactory for SqlEngineHandler {
    fn recognize(&self, path: &str) -> bool {
        SqlPath::parse(&self.scheme, path).is_some()
    }

    async fn instantiate(&self, path: &str) -> Result<Box<dyn FileEngine>> {
        Ok(Box::new(self.engine(path).await?))
    }
}

/// Ordered list of factories owned by the host.
#[derive(Default)]
pub struct EngineRegistry {
    factories: Vec<Arc<dyn EngineFactory>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn EngineFactory>) {
        self.factories.push(factory);
    }

    pub fn recognizes(&self, path: &str) -> bool {
        self.factories.iter().any(|f| f.recognize(path))
    }

    /// Engine from the first factory recognizing `path`.
    ///
    /// `None` means no factory claims the path and the host should use its
    /// native filesystem.
    pub async fn create(&self, path: &str) -> Option<Result<Box<dyn FileEngine>>> {
        let factory = self.factories.iter().find(|f| f.recognize(path))?;
        Some(factory.instantiate(path).await)
    }
}
