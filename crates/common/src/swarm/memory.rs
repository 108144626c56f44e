use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::{SwarmEngine, TransferStatus};
use crate::types::{HandleId, Locator};

/// In-process swarm engine.
///
/// Content lives in memory and is shared by every clone of the engine,
///  so two clones behave like two peers in the same swarm. A joined
///  download advances by `progress_step` on every status poll and is
///  written to disk once it reaches 100%.
#[derive(Debug, Clone)]
pub struct MemorySwarm {
    inner: Arc<Mutex<MemorySwarmInner>>,
    /// Name this clone announces itself as, if any
    peer_name: Option<String>,
}

#[derive(Debug)]
struct MemorySwarmInner {
    content: HashMap<Locator, MemoryContent>,
    handles: HashMap<HandleId, MemoryTransfer>,
    /// Extra providers registered per locator
    providers: HashMap<Locator, Vec<String>>,
    next_handle: u64,
    progress_step: f32,
    shut_down: bool,
}

#[derive(Debug, Clone)]
struct MemoryContent {
    name: String,
    data: Vec<u8>,
}

#[derive(Debug)]
struct MemoryTransfer {
    locator: Locator,
    save_path: PathBuf,
    status: TransferStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum MemorySwarmError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a file: {0}")]
    NotAFile(PathBuf),
    #[error("unknown locator: {0}")]
    UnknownLocator(Locator),
    #[error("engine is shut down")]
    ShutDown,
}

impl Default for MemorySwarm {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySwarm {
    pub fn new() -> Self {
        Self::with_progress_step(1.0)
    }

    pub fn with_progress_step(step: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemorySwarmInner {
                content: HashMap::new(),
                handles: HashMap::new(),
                providers: HashMap::new(),
                next_handle: 0,
                progress_step: step.clamp(f32::EPSILON, 1.0),
                shut_down: false,
            })),
            peer_name: None,
        }
    }

    /// A clone of this swarm that acts as the named peer
    pub fn as_peer(&self, name: impl Into<String>) -> Self {
        Self {
            inner: self.inner.clone(),
            peer_name: Some(name.into()),
        }
    }

    /// Providers registered for `locator`, in registration order
    pub fn providers_of(&self, locator: &Locator) -> Vec<String> {
        self.inner
            .lock()
            .providers
            .get(locator)
            .cloned()
            .unwrap_or_default()
    }

    /// Mark a handle as failed
    pub fn invalidate(&self, handle: HandleId) {
        if let Some(transfer) = self.inner.lock().handles.get_mut(&handle) {
            transfer.status.is_valid = false;
        }
    }

    pub fn handle_count(&self) -> usize {
        self.inner.lock().handles.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }

    /// Locator registered for a handle
    pub fn locator_of(&self, handle: HandleId) -> Option<Locator> {
        self.inner
            .lock()
            .handles
            .get(&handle)
            .map(|transfer| transfer.locator.clone())
    }

    fn register(
        inner: &mut MemorySwarmInner,
        locator: &Locator,
        save_path: &Path,
        status: TransferStatus,
    ) -> HandleId {
        let handle = HandleId(inner.next_handle);
        inner.next_handle += 1;
        inner.handles.insert(
            handle,
            MemoryTransfer {
                locator: locator.clone(),
                save_path: save_path.to_path_buf(),
                status,
            },
        );
        handle
    }
}

fn content_locator(name: &str, data: &[u8]) -> Locator {
    Locator::new(format!(
        "memory:{}?name={}",
        hex::encode(Sha256::digest(data)),
        name
    ))
}

#[async_trait]
impl SwarmEngine for MemorySwarm {
    type Error = MemorySwarmError;

    async fn create_content(&self, path: &Path) -> Result<Locator, Self::Error> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| MemorySwarmError::NotAFile(path.to_path_buf()))?;
        if !path.is_file() {
            return Err(MemorySwarmError::NotAFile(path.to_path_buf()));
        }
        let data = tokio::fs::read(path).await?;
        let locator = content_locator(&name, &data);

        let mut inner = self.inner.lock();
        if inner.shut_down {
            return Err(MemorySwarmError::ShutDown);
        }
        inner
            .content
            .insert(locator.clone(), MemoryContent { name, data });
        Ok(locator)
    }

    async fn seed(&self, locator: &Locator, path: &Path) -> Result<HandleId, Self::Error> {
        let mut inner = self.inner.lock();
        if inner.shut_down {
            return Err(MemorySwarmError::ShutDown);
        }
        let size = inner
            .content
            .get(locator)
            .map(|content| content.data.len() as u64)
            .ok_or_else(|| MemorySwarmError::UnknownLocator(locator.clone()))?;

        let status = TransferStatus {
            progress: 1.0,
            total_downloaded: size,
            is_seeding: true,
            is_valid: true,
            ..Default::default()
        };
        Ok(Self::register(&mut inner, locator, path, status))
    }

    async fn join(&self, locator: &Locator, save_path: &Path) -> Result<HandleId, Self::Error> {
        let mut inner = self.inner.lock();
        if inner.shut_down {
            return Err(MemorySwarmError::ShutDown);
        }
        // unknown content just never makes progress, like a swarm without peers
        let status = TransferStatus {
            is_valid: true,
            ..Default::default()
        };
        Ok(Self::register(&mut inner, locator, save_path, status))
    }

    fn status(&self, handle: HandleId) -> Option<TransferStatus> {
        let mut inner = self.inner.lock();
        let step = inner.progress_step;
        let content = inner
            .handles
            .get(&handle)
            .and_then(|transfer| inner.content.get(&transfer.locator))
            .cloned();
        let transfer = inner.handles.get_mut(&handle)?;

        if !transfer.status.is_valid || transfer.status.is_seeding {
            return Some(transfer.status);
        }
        let Some(content) = content else {
            return Some(transfer.status);
        };

        let size = content.data.len() as u64;
        transfer.status.peers = 1;
        transfer.status.progress = (transfer.status.progress + step).min(1.0);
        transfer.status.download_rate = (size as f32 * step) as u64;
        transfer.status.total_downloaded = (size as f32 * transfer.status.progress) as u64;

        if transfer.status.progress >= 1.0 {
            let target = transfer.save_path.join(&content.name);
            let written = std::fs::create_dir_all(&transfer.save_path)
                .and_then(|_| std::fs::write(&target, &content.data));
            match written {
                Ok(()) => {
                    transfer.status.is_seeding = true;
                    transfer.status.total_downloaded = size;
                    transfer.status.download_rate = 0;
                }
                Err(e) => {
                    tracing::warn!(target = %target.display(), "failed to materialize content: {}", e);
                    transfer.status.is_valid = false;
                }
            }
        }
        Some(transfer.status)
    }

    fn provider_id(&self) -> Option<String> {
        self.peer_name.clone()
    }

    fn add_providers(&self, locator: &Locator, providers: &[String]) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock();
        let known = inner.providers.entry(locator.clone()).or_default();
        for provider in providers {
            if !known.contains(provider) {
                known.push(provider.clone());
            }
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.inner.lock().shut_down = true;
        Ok(())
    }
}
