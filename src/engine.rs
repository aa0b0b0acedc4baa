//! The engine bound to one virtual path.
//!
//! Directory operations act on the backing table directly. File content lives
//! in an in-memory buffer between `open` and `close`; `flush` writes the whole
//! buffer back to the node's row.

use crate::backend::ConnectionRegistry;
use crate::collection::{Collection, Node};
use crate::error::{FsError, Result};
use crate::handler::FileEngine;
use crate::iter::DirIterator;
use crate::path::SqlPath;
use crate::schema::{NodeFlags, NodeId, ROOT_ID};
use async_trait::async_trait;
use std::sync::Arc;

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode {
    read: bool,
    write: bool,
    truncate: bool,
    append: bool,
}

impl OpenMode {
    pub const fn read_only() -> Self {
        OpenMode {
            read: true,
            write: false,
            truncate: false,
            append: false,
        }
    }

    pub const fn write_only() -> Self {
        OpenMode {
            read: false,
            write: true,
            truncate: false,
            append: false,
        }
    }

    pub const fn read_write() -> Self {
        OpenMode {
            read: true,
            write: true,
            truncate: false,
            append: false,
        }
    }

    /// Discard existing content on open.
    pub const fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Start at the end of the content and write only there.
    pub const fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub const fn is_readable(&self) -> bool {
        self.read
    }

    pub const fn is_writable(&self) -> bool {
        self.write
    }

    pub const fn is_truncate(&self) -> bool {
        self.truncate
    }

    pub const fn is_append(&self) -> bool {
        self.append
    }
}

/// Which form of the engine's path `file_name` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileName {
    /// The path as given, canonicalized.
    Default,
    Absolute,
    /// Last segment only.
    Base,
    /// URL of the containing directory.
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open(OpenMode),
}

/// Engine for a path under `scheme:/<connection>/<collection>`.
pub struct SqlFileEngine {
    connections: Arc<ConnectionRegistry>,
    path: SqlPath,
    collection: Collection,
    node: Option<NodeId>,
    state: State,
    buffer: Vec<u8>,
    pos: usize,
}

impl SqlFileEngine {
    /// Bind to `path`, creating its collection when needed.
    ///
    /// A missing file is not created here; that happens on the first
    /// writing `open`.
    pub async fn new(connections: Arc<ConnectionRegistry>, path: SqlPath) -> Result<Self> {
        let backend = connections.get(path.connection()).await?;
        let collection = Collection::open(backend, path.collection()).await?;
        let node = collection.resolve(path.segments()).await?;

        Ok(Self {
            connections,
            path,
            collection,
            node,
            state: State::Closed,
            buffer: Vec::new(),
            pos: 0,
        })
    }

    pub fn path(&self) -> &SqlPath {
        &self.path
    }

    /// Node id as last resolved; `None` if the path did not exist.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Stored row of this path.
    pub async fn metadata(&self) -> Result<Node> {
        let id = self
            .collection
            .resolve(self.path.segments())
            .await?
            .ok_or_else(|| FsError::NotFound(self.path.url()))?;
        self.collection
            .node(id)
            .await?
            .ok_or_else(|| FsError::NotFound(self.path.url()))
    }

    /// Read from the current position to the end of the content.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mode = self.open_mode()?;
        if !mode.is_readable() {
            return Err(FsError::PermissionDenied(format!(
                "{} is not open for reading",
                self.path
            )));
        }
        let start = self.pos.min(self.buffer.len());
        let data = self.buffer[start..].to_vec();
        self.pos = self.buffer.len();
        Ok(data)
    }

    fn open_mode(&self) -> Result<OpenMode> {
        match self.state {
            State::Open(mode) => Ok(mode),
            State::Closed => Err(FsError::InvalidState(format!("{} is not open", self.path))),
        }
    }

    fn writable(&self) -> Result<OpenMode> {
        let mode = self.open_mode()?;
        if !mode.is_writable() {
            tracing::warn!(path = %self.path, "write attempted without write mode");
            return Err(FsError::PermissionDenied(format!(
                "{} is not open for writing",
                self.path
            )));
        }
        Ok(mode)
    }

    /// Parse a URL given to a directory operation and bind its collection.
    async fn target(&self, url: &str) -> Result<(SqlPath, Collection)> {
        let path = SqlPath::parse(self.path.scheme(), url)
            .ok_or_else(|| FsError::ForeignPath(url.to_string()))?;
        if path.same_collection(&self.path) {
            return Ok((path, self.collection.clone()));
        }
        let backend = self.connections.get(path.connection()).await?;
        let collection = Collection::open(backend, path.collection()).await?;
        Ok((path, collection))
    }

    fn to_offset(value: u64) -> Result<usize> {
        usize::try_from(value).map_err(|_| FsError::InvalidArgument(format!("offset {}", value)))
    }
}

/// Fails unless `id` is a directory of `collection`.
async fn require_dir(collection: &Collection, id: NodeId, path: &SqlPath) -> Result<()> {
    match collection.flags(id).await? {
        Some(flags) if flags.is_dir() => Ok(()),
        Some(_) => Err(FsError::NotADirectory(path.url())),
        None => Err(FsError::NotFound(path.url())),
    }
}

#[async_trait]
impl FileEngine for SqlFileEngine {
    async fn flags(&mut self) -> Result<NodeFlags> {
        self.node = self.collection.resolve(self.path.segments()).await?;
        match self.node {
            Some(id) => Ok(self.collection.flags(id).await?.unwrap_or_default()),
            None => Ok(NodeFlags::empty()),
        }
    }

    fn file_name(&self, kind: FileName) -> String {
        match kind {
            FileName::Default | FileName::Absolute => self.path.url(),
            FileName::Base => self.path.file_name().to_string(),
            FileName::Path => self
                .path
                .parent()
                .map(|parent| parent.url())
                .unwrap_or_else(|| self.path.url()),
        }
    }

    async fn entries(&self) -> Result<DirIterator> {
        let id = self
            .collection
            .resolve(self.path.segments())
            .await?
            .ok_or_else(|| FsError::NotFound(self.path.url()))?;
        require_dir(&self.collection, id, &self.path).await?;
        DirIterator::new(&self.collection, id).await
    }

    async fn open(&mut self, mode: OpenMode) -> Result<()> {
        if self.is_open() {
            return Err(FsError::InvalidState(format!("{} is already open", self.path)));
        }
        if !mode.is_readable() && !mode.is_writable() {
            return Err(FsError::InvalidArgument("open mode grants no access".to_string()));
        }
        if (mode.is_truncate() || mode.is_append()) && !mode.is_writable() {
            return Err(FsError::InvalidArgument(
                "truncate and append need write access".to_string(),
            ));
        }

        let id = match self.collection.resolve(self.path.segments()).await? {
            Some(id) => {
                let flags = self.collection.flags(id).await?.unwrap_or_default();
                if flags.is_dir() {
                    return Err(FsError::IsADirectory(self.path.url()));
                }
                id
            }
            None if mode.is_writable() => {
                let parent_path = self
                    .path
                    .parent()
                    .ok_or_else(|| FsError::IsADirectory(self.path.url()))?;
                let parent = self
                    .collection
                    .resolve(parent_path.segments())
                    .await?
                    .ok_or_else(|| FsError::NotFound(parent_path.url()))?;
                require_dir(&self.collection, parent, &parent_path).await?;
                self.collection
                    .insert(parent, self.path.file_name(), NodeFlags::DEFAULT_FILE)
                    .await?
            }
            None => return Err(FsError::NotFound(self.path.url())),
        };
        self.node = Some(id);

        if mode.is_truncate() {
            self.buffer.clear();
            self.pos = 0;
        } else {
            self.buffer = self
                .collection
                .load_content(id)
                .await?
                .ok_or_else(|| FsError::NotFound(self.path.url()))?;
            self.pos = if mode.is_append() { self.buffer.len() } else { 0 };
        }

        tracing::debug!(path = %self.path, id, ?mode, size = self.buffer.len(), "opened file");
        self.state = State::Open(mode);
        Ok(())
    }

    async fn mkdir(&self, url: &str, create_parents: bool) -> Result<()> {
        let (path, collection) = self.target(url).await?;

        if collection.resolve(path.segments()).await?.is_some() {
            return Err(FsError::AlreadyExists(path.url()));
        }

        if create_parents {
            let mut parent = ROOT_ID;
            let mut walked = path.collection_root();
            for segment in path.segments() {
                walked = walked.join(segment);
                parent = match collection.lookup(Some(parent), segment).await? {
                    Some(id) => {
                        require_dir(&collection, id, &walked).await?;
                        id
                    }
                    None => collection.insert(parent, segment, NodeFlags::DEFAULT_DIR).await?,
                };
            }
        } else {
            let parent_path = path
                .parent()
                .ok_or_else(|| FsError::AlreadyExists(path.url()))?;
            let parent = collection
                .resolve(parent_path.segments())
                .await?
                .ok_or_else(|| FsError::NotFound(parent_path.url()))?;
            require_dir(&collection, parent, &parent_path).await?;
            collection
                .insert(parent, path.file_name(), NodeFlags::DEFAULT_DIR)
                .await?;
        }

        tracing::debug!(path = %path, create_parents, "created directory");
        Ok(())
    }

    async fn rmdir(&self, url: &str, recursive: bool) -> Result<()> {
        let (path, collection) = self.target(url).await?;
        if path.is_collection_root() {
            return Err(FsError::PermissionDenied(format!(
                "cannot remove collection root {}",
                path
            )));
        }

        let id = collection
            .resolve(path.segments())
            .await?
            .ok_or_else(|| FsError::NotFound(path.url()))?;

        if !recursive && collection.count_children(id).await? > 0 {
            return Err(FsError::NotEmpty(path.url()));
        }

        if !collection.delete(id).await? {
            return Err(FsError::NotFound(path.url()));
        }

        tracing::debug!(path = %path, recursive, "removed directory");
        Ok(())
    }

    async fn remove(&mut self) -> Result<()> {
        if self.path.is_collection_root() {
            return Err(FsError::PermissionDenied(format!(
                "cannot remove collection root {}",
                self.path
            )));
        }
        // The cached id may have been freed and reused by another engine
        self.node = self.collection.resolve(self.path.segments()).await?;
        let id = self.node.ok_or_else(|| FsError::NotFound(self.path.url()))?;

        match self.collection.flags(id).await? {
            Some(flags) if flags.is_dir() => return Err(FsError::IsADirectory(self.path.url())),
            Some(_) => {}
            None => return Err(FsError::NotFound(self.path.url())),
        }

        if !self.collection.delete(id).await? {
            return Err(FsError::NotFound(self.path.url()));
        }

        tracing::debug!(path = %self.path, id, "removed file");
        self.node = None;
        self.state = State::Closed;
        self.buffer.clear();
        self.pos = 0;
        Ok(())
    }

    async fn rename(&mut self, new_url: &str) -> Result<()> {
        self.node = self.collection.resolve(self.path.segments()).await?;
        let id = self.node.ok_or_else(|| FsError::NotFound(self.path.url()))?;
        if id == ROOT_ID {
            return Err(FsError::PermissionDenied(format!(
                "cannot move collection root {}",
                self.path
            )));
        }

        let Some(dest) = SqlPath::parse(self.path.scheme(), new_url) else {
            return Err(FsError::Unsupported(format!(
                "moving {} out of the virtual filesystem",
                self.path
            )));
        };
        if !dest.same_collection(&self.path) {
            return Err(FsError::Unsupported(format!(
                "moving {} to another collection",
                self.path
            )));
        }
        if dest.is_collection_root() || dest.file_name() != self.path.file_name() {
            return Err(FsError::Unsupported(format!(
                "renaming {} to a different name",
                self.path
            )));
        }

        let dest_dir = dest
            .parent()
            .ok_or_else(|| FsError::InvalidArgument(dest.url()))?;
        let parent = self
            .collection
            .resolve(dest_dir.segments())
            .await?
            .ok_or_else(|| FsError::NotFound(dest_dir.url()))?;
        require_dir(&self.collection, parent, &dest_dir).await?;

        match self.collection.lookup(Some(parent), dest.file_name()).await? {
            Some(existing) if existing == id => return Ok(()),
            Some(_) => return Err(FsError::AlreadyExists(dest.url())),
            None => {}
        }
        if self.collection.is_ancestor(id, parent).await? {
            return Err(FsError::InvalidArgument(format!(
                "cannot move {} beneath itself",
                self.path
            )));
        }

        if !self.collection.set_parent(id, parent).await? {
            return Err(FsError::NotFound(self.path.url()));
        }

        tracing::debug!(from = %self.path, to = %dest, id, "moved node");
        self.path = dest;
        Ok(())
    }

    async fn size(&self) -> Result<u64> {
        if self.is_open() {
            return Ok(self.buffer.len() as u64);
        }
        match self.node {
            Some(id) => Ok(self
                .collection
                .load_content(id)
                .await?
                .map_or(0, |content| content.len() as u64)),
            None => Ok(0),
        }
    }

    fn set_size(&mut self, size: u64) -> Result<()> {
        self.writable()?;
        let size = Self::to_offset(size)?;
        self.buffer.resize(size, 0);
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.open_mode()?;
        let pos = Self::to_offset(pos)?;
        if pos > self.buffer.len() {
            return Err(FsError::InvalidArgument(format!(
                "seek to {} past end of {} ({} bytes)",
                pos,
                self.path,
                self.buffer.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mode = self.open_mode()?;
        if !mode.is_readable() {
            return Err(FsError::PermissionDenied(format!(
                "{} is not open for reading",
                self.path
            )));
        }
        let available = self.buffer.len().saturating_sub(self.pos);
        let len = buf.len().min(available);
        if len == 0 {
            return Ok(0);
        }
        buf[..len].copy_from_slice(&self.buffer[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mode = self.writable()?;
        if mode.is_append() {
            self.pos = self.buffer.len();
        }

        let end = self.pos + data.len();
        if end > self.buffer.len() {
            // Any gap left by a shrinking set_size is zero-filled
            self.buffer.resize(end, 0);
        }
        self.buffer[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(data.len())
    }

    async fn flush(&mut self) -> Result<()> {
        let mode = self.open_mode()?;
        if !mode.is_writable() {
            return Ok(());
        }
        let id = self.node.ok_or_else(|| FsError::NotFound(self.path.url()))?;
        if !self.collection.store_content(id, &self.buffer).await? {
            return Err(FsError::NotFound(self.path.url()));
        }
        tracing::debug!(path = %self.path, id, size = self.buffer.len(), "flushed file");
        Ok(())
    }

    /// Flush and close. On a failed flush the file stays open.
    async fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.flush().await?;
        self.state = State::Closed;
        self.buffer = Vec::new();
        self.pos = 0;
        Ok(())
    }
}
