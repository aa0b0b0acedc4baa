use crate::collection::Collection;
use crate::error::Result;
use crate::schema::NodeId;

/// Names of a directory's immediate children.
///
/// The query runs once when the iterator is built; iteration only walks the
/// fetched names. Order is whatever the backing store returns.
#[derive(Debug)]
pub struct DirIterator {
    names: std::vec::IntoIter<String>,
    current: Option<String>,
}

impl DirIterator {
    pub async fn new(collection: &Collection, dir: NodeId) -> Result<Self> {
        let names = collection.children(dir).await?;
        Ok(Self {
            names: names.into_iter(),
            current: None,
        })
    }

    pub fn has_next(&self) -> bool {
        self.names.len() != 0
    }

    /// Name most recently returned by `next`.
    pub fn current_file_name(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

impl Iterator for DirIterator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.current = self.names.next();
        self.current.clone()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.names.size_hint()
    }
}

impl ExactSizeIterator for DirIterator {}
