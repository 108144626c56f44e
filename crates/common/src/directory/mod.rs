mod adapter;
mod memory;
mod provider;

pub use adapter::{decode_value, encode_value, DirectoryAdapter, DirectoryEntry, RetryPolicy};
pub use memory::{MemoryDirectory, MemoryDirectoryError};
pub use provider::{DirectoryError, DirectoryKey, DirectoryService};
