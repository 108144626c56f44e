use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::provider::{DirectoryError, DirectoryKey, DirectoryService};

/// In-memory directory service.
///
/// Backs the directory node served by the daemon and stands in for
///  the network in tests. Values under a key keep insertion order and
///  duplicates are kept.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<RwLock<MemoryDirectoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryDirectoryInner {
    /// key -> values, in insertion order
    values: HashMap<DirectoryKey, Vec<String>>,
    /// Number of upcoming calls that fail with a network error
    pending_failures: usize,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryDirectoryError {
    #[error("memory directory error: {0}")]
    Internal(String),
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail as if the network were down.
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut inner) = self.inner.write() {
            inner.pending_failures = count;
        }
    }

    /// Number of distinct keys holding at least one value
    pub fn key_count(&self) -> usize {
        self.inner.read().map(|inner| inner.values.len()).unwrap_or(0)
    }

    fn write(
        &self,
    ) -> Result<
        std::sync::RwLockWriteGuard<'_, MemoryDirectoryInner>,
        DirectoryError<MemoryDirectoryError>,
    > {
        self.inner.write().map_err(|e| {
            DirectoryError::Provider(MemoryDirectoryError::Internal(format!(
                "failed to acquire write lock: {}",
                e
            )))
        })
    }
}

impl MemoryDirectoryInner {
    fn take_failure(&mut self) -> Result<(), DirectoryError<MemoryDirectoryError>> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(DirectoryError::Network("simulated network failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryService for MemoryDirectory {
    type Error = MemoryDirectoryError;

    async fn put(
        &self,
        key: &DirectoryKey,
        value: String,
    ) -> Result<(), DirectoryError<Self::Error>> {
        let mut inner = self.write()?;
        inner.take_failure()?;
        inner.values.entry(key.clone()).or_default().push(value);
        Ok(())
    }

    async fn get(&self, key: &DirectoryKey) -> Result<Vec<String>, DirectoryError<Self::Error>> {
        // failure injection mutates state, so even reads take the write lock
        let mut inner = self.write()?;
        inner.take_failure()?;
        Ok(inner.values.get(key).cloned().unwrap_or_default())
    }
}
