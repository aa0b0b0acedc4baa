//! Parsing of `scheme:/<connection>/<collection>[/<segment>]*` URLs.

use crate::schema::is_valid_collection_name;
use std::fmt;

/// Default URL scheme served by [`crate::SqlEngineHandler`].
pub const DEFAULT_SCHEME: &str = "sql";

/// An immutable, parsed virtual path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlPath {
    scheme: String,
    connection: String,
    collection: String,
    segments: Vec<String>,
}

impl SqlPath {
    /// Parse `url` under `scheme`, returning `None` when it does not belong to it.
    ///
    /// Empty and `.` segments are dropped, `..` removes the previous segment
    /// but never climbs above the collection. The collection is folded to
    /// lower case since it names a table.
    pub fn parse(scheme: &str, url: &str) -> Option<SqlPath> {
        let rest = url.strip_prefix(scheme)?.strip_prefix(":/")?;

        let (connection, rest) = rest.split_once('/')?;
        if connection.is_empty() {
            return None;
        }

        let mut parts = rest.split('/');
        let collection = parts.next()?;
        if !is_valid_collection_name(collection) {
            return None;
        }

        let mut segments: Vec<String> = Vec::new();
        for part in parts {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                name => segments.push(name.to_string()),
            }
        }

        Some(SqlPath {
            scheme: scheme.to_string(),
            connection: connection.to_string(),
            collection: collection.to_ascii_lowercase(),
            segments,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Segments below the collection root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_collection_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, or the collection name for the collection root.
    pub fn file_name(&self) -> &str {
        self.segments.last().unwrap_or(&self.collection)
    }

    /// Containing directory; `None` for the collection root.
    pub fn parent(&self) -> Option<SqlPath> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    /// The collection root this path lives under.
    pub fn collection_root(&self) -> SqlPath {
        SqlPath {
            segments: Vec::new(),
            ..self.clone()
        }
    }

    pub fn join(&self, name: &str) -> SqlPath {
        let mut child = self.clone();
        child
            .segments
            .extend(name.split('/').filter(|s| !s.is_empty() && *s != ".").map(str::to_string));
        child
    }

    /// Same connection and collection.
    pub fn same_collection(&self, other: &SqlPath) -> bool {
        self.connection == other.connection && self.collection == other.collection
    }

    /// Canonical URL form.
    pub fn url(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SqlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}/{}", self.scheme, self.connection, self.collection)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_components() {
        let path = SqlPath::parse("sql", "sql:/fsdb/tblname/dir1/dir2/file1").unwrap();
        assert_eq!(path.connection(), "fsdb");
        assert_eq!(path.collection(), "tblname");
        assert_eq!(path.segments(), ["dir1", "dir2", "file1"]);
        assert_eq!(path.file_name(), "file1");
        assert_eq!(path.parent().unwrap().url(), "sql:/fsdb/tblname/dir1/dir2");
    }

    #[test]
    fn test_collection_root() {
        let path = SqlPath::parse("sql", "sql:/fsdb/tblname").unwrap();
        assert!(path.is_collection_root());
        assert_eq!(path.file_name(), "tblname");
        assert!(path.parent().is_none());

        let slash = SqlPath::parse("sql", "sql:/fsdb/tblname/").unwrap();
        assert_eq!(path, slash);
    }

    #[test]
    fn test_normalization() {
        let path = SqlPath::parse("sql", "sql:/fsdb/t//a/./b/../c/").unwrap();
        assert_eq!(path.segments(), ["a", "c"]);

        let path = SqlPath::parse("sql", "sql:/fsdb/t/../../x").unwrap();
        assert_eq!(path.segments(), ["x"]);
    }

    #[test]
    fn test_rejects_foreign_and_malformed() {
        assert!(SqlPath::parse("sql", "/home/user/file").is_none());
        assert!(SqlPath::parse("sql", "file:/fsdb/t").is_none());
        assert!(SqlPath::parse("sql", "sql:/fsdb").is_none());
        assert!(SqlPath::parse("sql", "sql://t/a").is_none());
        assert!(SqlPath::parse("sql", "sql:/fsdb/").is_none());
        assert!(SqlPath::parse("sql", "sql:/fsdb/bad-name/a").is_none());
    }

    #[test]
    fn test_collection_case_folded() {
        let mixed = SqlPath::parse("sql", "sql:/Fsdb/Files/Dir").unwrap();
        let lower = SqlPath::parse("sql", "sql:/Fsdb/files/Dir").unwrap();
        assert_eq!(mixed, lower);
        assert_eq!(mixed.url(), "sql:/Fsdb/files/Dir");
        assert_eq!(mixed.collection_root().file_name(), "files");
    }

    #[test]
    fn test_join_and_display() {
        let root = SqlPath::parse("sql", "sql:/fsdb/t").unwrap();
        let child = root.join("a/b");
        assert_eq!(child.to_string(), "sql:/fsdb/t/a/b");
        assert!(child.same_collection(&root));
    }
}
