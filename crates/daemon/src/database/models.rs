use std::path::PathBuf;

use common::prelude::{Identity, Locator};

/// A file this node offers under `identity`.
///  Not consumed by `store`; only cleanup removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedEntry {
    pub identity: Identity,
    /// Absolute path of the local file
    pub path: PathBuf,
    pub filename: String,
}

/// Content this node agreed to back up for `identity`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredEntry {
    pub locator: Locator,
    pub identity: Identity,
    /// Directory the content is saved into
    pub path: PathBuf,
    pub filename: String,
}
