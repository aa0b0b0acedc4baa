//! Database schema definitions for sqlfs
//!
//! Every collection is one table of nodes linked by a `parent` column.
//! Row `id = 0` is the collection root; its `parent` is NULL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// Identifier of a node within one collection
pub type NodeId = i64;

/// Root node id (always 0)
pub const ROOT_ID: NodeId = 0;

/// Longest accepted collection name (PostgreSQL identifier limit)
pub const MAX_COLLECTION_NAME: usize = 63;

/// Bitmask stored in the `flags` column.
///
/// Permission bits are informational; nothing enforces them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeFlags(u32);

impl NodeFlags {
    pub const DIRECTORY: NodeFlags = NodeFlags(0x0001);
    pub const FILE: NodeFlags = NodeFlags(0x0002);
    pub const EXISTS: NodeFlags = NodeFlags(0x0004);
    pub const READ: NodeFlags = NodeFlags(0x0010);
    pub const WRITE: NodeFlags = NodeFlags(0x0020);

    pub const DEFAULT_DIR: NodeFlags =
        NodeFlags(Self::DIRECTORY.0 | Self::EXISTS.0 | Self::READ.0 | Self::WRITE.0);
    pub const DEFAULT_FILE: NodeFlags =
        NodeFlags(Self::FILE.0 | Self::EXISTS.0 | Self::READ.0 | Self::WRITE.0);

    pub const fn empty() -> Self {
        NodeFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        NodeFlags(bits)
    }

    pub const fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn exists(self) -> bool {
        self.contains(Self::EXISTS)
    }

    pub const fn is_dir(self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    pub const fn is_file(self) -> bool {
        self.contains(Self::FILE)
    }

    /// Value bound to the integer column.
    pub(crate) fn to_column(self) -> i64 {
        i64::from(self.0)
    }

    /// Decode the integer column; bits outside `u32` are dropped.
    pub(crate) fn from_column(value: i64) -> Self {
        NodeFlags(value as u32)
    }
}

impl BitOr for NodeFlags {
    type Output = NodeFlags;

    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | rhs.0)
    }
}

impl BitAnd for NodeFlags {
    type Output = NodeFlags;

    fn bitand(self, rhs: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 & rhs.0)
    }
}

impl fmt::Debug for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::DIRECTORY, "DIRECTORY"),
            (Self::FILE, "FILE"),
            (Self::EXISTS, "EXISTS"),
            (Self::READ, "READ"),
            (Self::WRITE, "WRITE"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "NodeFlags({})", set.join(" | "))
    }
}

/// Collection names become table names, so only plain identifiers pass.
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_COLLECTION_NAME && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Per-dialect DDL templates; `{table}` is replaced by the collection name.
pub(crate) mod ddl {
    pub const SQLITE: &str = include_str!("../migrations/sqlite.sql");
    pub const POSTGRES: &str = include_str!("../migrations/postgres.sql");
    pub const MYSQL: &str = include_str!("../migrations/mysql.sql");
}
