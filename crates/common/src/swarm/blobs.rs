use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use iroh::discovery::pkarr::dht::DhtDiscovery;
use iroh::discovery::static_provider::StaticProvider;
use iroh::protocol::Router;
use iroh::{Endpoint, NodeAddr, NodeId, RelayMode, SecretKey};
use iroh_blobs::{
    api::{
        blobs::BlobStatus,
        downloader::{DownloadProgressItem, Downloader, Shuffled},
    },
    provider::events::{EventMask, EventSender, ProviderMessage, RequestMode, RequestUpdate},
    store::{fs::FsStore, mem::MemStore},
    BlobsProtocol, Hash,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use url::form_urlencoded;

use super::meter::RateMeter;
use super::{SwarmEngine, TransferStatus};
use crate::types::{HandleId, Locator};

/// Prefix of every locator produced by [`BlobSwarm`]
pub const LOCATOR_SCHEME: &str = "hoard:";

/// Delay before the second download attempt, doubled after every failure
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on the delay between download attempts
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Parsed form of a [`BlobSwarm`] locator:
///  `hoard:<hash>?provider=<node id>&name=<file name>&size=<bytes>`.
///
/// The query is form-urlencoded, so a locator never contains `::`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocator {
    pub hash: Hash,
    /// Node that created the content and seeds it
    pub provider: NodeId,
    /// File name the content is materialized under
    pub name: String,
    /// Content length in bytes
    pub size: u64,
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("provider", &self.provider.to_string())
            .append_pair("name", &self.name)
            .append_pair("size", &self.size.to_string())
            .finish();
        write!(f, "{}{}?{}", LOCATOR_SCHEME, self.hash, query)
    }
}

impl FromStr for BlobLocator {
    type Err = BlobSwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| BlobSwarmError::InvalidLocator(format!("{}: {}", reason, s));

        let rest = s
            .strip_prefix(LOCATOR_SCHEME)
            .ok_or_else(|| invalid("unknown scheme"))?;
        let (hash, query) = rest.split_once('?').ok_or_else(|| invalid("missing query"))?;
        let hash = Hash::from_str(hash).map_err(|_| invalid("bad content hash"))?;

        let mut provider = None;
        let mut name = None;
        let mut size = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "provider" => {
                    provider = Some(
                        NodeId::from_str(&value).map_err(|_| invalid("bad provider node id"))?,
                    )
                }
                "name" => name = Some(value.into_owned()),
                "size" => size = Some(value.parse::<u64>().map_err(|_| invalid("bad size"))?),
                _ => {}
            }
        }

        // only a bare file name may come off the wire
        let name = name.ok_or_else(|| invalid("missing name"))?;
        let bare = Path::new(&name)
            .file_name()
            .map(|n| n.to_string_lossy() == name.as_str())
            .unwrap_or(false);
        if !bare {
            return Err(invalid("name is not a plain file name"));
        }

        Ok(Self {
            hash,
            provider: provider.ok_or_else(|| invalid("missing provider"))?,
            name,
            size: size.ok_or_else(|| invalid("missing size"))?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlobSwarmError {
    #[error("blob store error: {0}")]
    Store(String),
    #[error("failed to bind endpoint: {0}")]
    Bind(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("failed to shut down endpoint: {0}")]
    Shutdown(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a file: {0}")]
    NotAFile(PathBuf),
    #[error("invalid locator {0}")]
    InvalidLocator(String),
    #[error("content {0} is not in the local store")]
    ContentMissing(Hash),
    #[error("a secret key is required to build the swarm endpoint")]
    MissingSecretKey,
}

pub struct BlobSwarmBuilder {
    /// port to listen on, ephemeral when unset
    port: Option<u16>,
    bind_ip: Ipv4Addr,
    secret_key: Option<SecretKey>,
    /// on-disk blob store, in-memory when unset
    blobs_path: Option<PathBuf>,
    dht: bool,
    relay_mode: RelayMode,
}

impl Default for BlobSwarmBuilder {
    fn default() -> Self {
        Self {
            port: None,
            bind_ip: Ipv4Addr::UNSPECIFIED,
            secret_key: None,
            blobs_path: None,
            dht: true,
            relay_mode: RelayMode::Default,
        }
    }
}

impl BlobSwarmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn bind_ip(mut self, ip: Ipv4Addr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn secret_key(mut self, secret_key: SecretKey) -> Self {
        self.secret_key = Some(secret_key);
        self
    }

    pub fn blobs_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.blobs_path = Some(path.into());
        self
    }

    /// Only reach peers added through [`BlobSwarm::add_peer_addr`]
    pub fn without_dht(mut self) -> Self {
        self.dht = false;
        self
    }

    pub fn relay_mode(mut self, relay_mode: RelayMode) -> Self {
        self.relay_mode = relay_mode;
        self
    }

    pub async fn build(self) -> Result<BlobSwarm, BlobSwarmError> {
        let secret_key = self.secret_key.ok_or(BlobSwarmError::MissingSecretKey)?;

        // per-request transfer events feed the upload counters
        let mask = EventMask {
            get: RequestMode::NotifyLog,
            ..EventMask::DEFAULT
        };
        let (events, provider_events) = EventSender::channel(64, mask);

        let protocol = match &self.blobs_path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading blob store");
                let store = FsStore::load(path)
                    .await
                    .map_err(|e| BlobSwarmError::Store(e.to_string()))?;
                BlobsProtocol::new(&store, Some(events))
            }
            None => {
                let store = MemStore::new();
                BlobsProtocol::new(&store, Some(events))
            }
        };
        let protocol = Arc::new(protocol);

        let static_discovery = StaticProvider::new();
        let addr = SocketAddrV4::new(self.bind_ip, self.port.unwrap_or(0));
        let mut builder = Endpoint::builder()
            .secret_key(secret_key.clone())
            .relay_mode(self.relay_mode)
            .discovery(static_discovery.clone())
            .bind_addr_v4(addr);
        if self.dht {
            // peers find each other through the mainline dht
            let mainline_discovery = DhtDiscovery::builder()
                .secret_key(secret_key)
                .build()
                .map_err(|e| BlobSwarmError::Bind(e.to_string()))?;
            builder = builder.add_discovery(mainline_discovery);
        }
        let endpoint = builder
            .bind()
            .await
            .map_err(|e| BlobSwarmError::Bind(e.to_string()))?;

        let router = Router::builder(endpoint.clone())
            .accept(iroh_blobs::ALPN, protocol.clone())
            .spawn();
        let downloader = Downloader::new(protocol.store(), &endpoint);

        let transfers = Arc::new(Mutex::new(Transfers::default()));
        let accounting = tokio::spawn(account_uploads(provider_events, transfers.clone()));
        transfers.lock().track_task(accounting.abort_handle());

        tracing::info!(node_id = %endpoint.node_id(), dht = self.dht, "swarm endpoint bound");

        Ok(BlobSwarm {
            protocol,
            endpoint,
            router: Arc::new(router),
            downloader,
            static_discovery,
            transfers,
        })
    }
}

#[derive(Debug)]
struct Transfer {
    hash: Hash,
    size: u64,
    status: TransferStatus,
    downloaded: RateMeter,
}

#[derive(Debug, Default)]
struct UploadStats {
    sent: RateMeter,
    /// requests currently being served
    peers: u32,
}

#[derive(Debug, Default)]
struct Transfers {
    entries: HashMap<HandleId, Transfer>,
    /// keyed by content, shared by every handle on it
    uploads: HashMap<Hash, UploadStats>,
    /// peers other than the locator's provider known to hold the content
    providers: HashMap<Hash, Vec<NodeId>>,
    tasks: Vec<AbortHandle>,
    next_handle: u64,
}

impl Transfers {
    fn register(&mut self, hash: Hash, size: u64, status: TransferStatus) -> HandleId {
        let handle = HandleId(self.next_handle);
        self.next_handle += 1;
        self.entries.insert(
            handle,
            Transfer {
                hash,
                size,
                status,
                downloaded: RateMeter::new(),
            },
        );
        handle
    }

    fn update(&mut self, handle: HandleId, f: impl FnOnce(&mut TransferStatus)) {
        if let Some(transfer) = self.entries.get_mut(&handle) {
            f(&mut transfer.status);
        }
    }

    fn record_download(&mut self, handle: HandleId, bytes: u64) {
        if let Some(transfer) = self.entries.get_mut(&handle) {
            transfer.downloaded.record_total(bytes);
            transfer.status.total_downloaded = transfer.downloaded.total();
            if transfer.size > 0 {
                let fraction = transfer.downloaded.total() as f64 / transfer.size as f64;
                transfer.status.progress = fraction.min(1.0) as f32;
            }
        }
    }

    fn record_upload(&mut self, hash: Hash, bytes: u64) {
        self.uploads.entry(hash).or_default().sent.add(bytes);
    }

    fn track_task(&mut self, task: AbortHandle) {
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(task);
    }

    fn snapshot(&self, handle: HandleId) -> Option<TransferStatus> {
        let transfer = self.entries.get(&handle)?;
        let mut status = transfer.status;
        if !status.is_seeding {
            status.download_rate = transfer.downloaded.rate();
        }
        if let Some(upload) = self.uploads.get(&transfer.hash) {
            status.upload_rate = upload.sent.rate();
            status.total_uploaded = upload.sent.total();
            status.peers += upload.peers;
        }
        Some(status)
    }
}

/// Turn provider-side request events into upload counters
async fn account_uploads(
    mut events: mpsc::Receiver<ProviderMessage>,
    transfers: Arc<Mutex<Transfers>>,
) {
    while let Some(event) = events.recv().await {
        let ProviderMessage::GetRequestReceivedNotify(msg) = event else {
            continue;
        };
        let hash = msg.inner.request.hash;
        let mut updates = msg.rx;
        tracing::debug!(%hash, connection = msg.inner.connection_id, "serving content");

        let counters = transfers.clone();
        let request = tokio::spawn(async move {
            counters.lock().uploads.entry(hash).or_default().peers += 1;
            let mut sent = 0u64;
            while let Ok(Some(update)) = updates.recv().await {
                let reached = match update {
                    RequestUpdate::Started(_) => continue,
                    RequestUpdate::Progress(progress) => progress.end_offset,
                    RequestUpdate::Completed(done) => done.stats.payload_bytes_sent.max(sent),
                    RequestUpdate::Aborted(aborted) => aborted.stats.payload_bytes_sent.max(sent),
                };
                if reached > sent {
                    counters.lock().record_upload(hash, reached - sent);
                    sent = reached;
                }
            }
            if let Some(upload) = counters.lock().uploads.get_mut(&hash) {
                upload.peers = upload.peers.saturating_sub(1);
            }
        });
        transfers.lock().track_task(request.abort_handle());
    }
}

/// Swarm engine over iroh-blobs.
///
/// Content is imported into a local blob store (on disk, so it survives
///  restarts) and served to any peer over the iroh-blobs ALPN. Joining
///  downloads from the locator's provider and from every extra provider
///  registered for the content, retrying with backoff until one of them
///  answers, then exports the file under the save path and keeps seeding.
#[derive(Clone)]
pub struct BlobSwarm {
    protocol: Arc<BlobsProtocol>,
    endpoint: Endpoint,
    router: Arc<Router>,
    downloader: Downloader,
    static_discovery: StaticProvider,
    transfers: Arc<Mutex<Transfers>>,
}

impl fmt::Debug for BlobSwarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobSwarm")
            .field("node_id", &self.endpoint.node_id())
            .field("transfers", &self.transfers.lock().entries.len())
            .finish_non_exhaustive()
    }
}

impl BlobSwarm {
    pub fn builder() -> BlobSwarmBuilder {
        BlobSwarmBuilder::new()
    }

    pub fn node_id(&self) -> NodeId {
        self.endpoint.node_id()
    }

    /// Direct address of this node on its bound sockets
    pub fn local_addr(&self) -> NodeAddr {
        let sockets = self.endpoint.bound_sockets().into_iter().map(|addr| {
            if addr.ip().is_unspecified() {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
            } else {
                addr
            }
        });
        NodeAddr::new(self.node_id()).with_direct_addresses(sockets)
    }

    /// Make a peer reachable without discovery
    pub fn add_peer_addr(&self, addr: NodeAddr) {
        self.static_discovery.add_node_info(addr);
    }

    async fn is_complete(&self, hash: Hash) -> Result<bool, BlobSwarmError> {
        let status = self
            .protocol
            .store()
            .blobs()
            .status(hash)
            .await
            .map_err(|e| BlobSwarmError::Store(e.to_string()))?;
        Ok(matches!(status, BlobStatus::Complete { .. }))
    }

    fn providers_for(&self, locator: &BlobLocator) -> Vec<NodeId> {
        let own = self.node_id();
        let transfers = self.transfers.lock();
        std::iter::once(locator.provider)
            .chain(
                transfers
                    .providers
                    .get(&locator.hash)
                    .into_iter()
                    .flatten()
                    .copied(),
            )
            .filter(|id| *id != own)
            .collect()
    }

    /// One pass over the known providers. Errors here are never fatal.
    async fn download_once(
        &self,
        handle: HandleId,
        hash: Hash,
        providers: Vec<NodeId>,
    ) -> Result<(), BlobSwarmError> {
        if providers.is_empty() {
            return Err(BlobSwarmError::Download("no known providers".to_string()));
        }

        let mut progress = self
            .downloader
            .download(hash, Shuffled::new(providers))
            .stream()
            .await
            .map_err(|e| BlobSwarmError::Download(e.to_string()))?;

        while let Some(item) = progress.next().await {
            match item {
                DownloadProgressItem::TryProvider { id, .. } => {
                    tracing::debug!(%handle, provider = %id, "trying provider");
                    self.transfers.lock().update(handle, |status| status.peers = 1);
                }
                DownloadProgressItem::ProviderFailed { id, .. } => {
                    tracing::debug!(%handle, provider = %id, "provider failed");
                    self.transfers.lock().update(handle, |status| status.peers = 0);
                }
                DownloadProgressItem::Progress(bytes) => {
                    self.transfers.lock().record_download(handle, bytes);
                }
                DownloadProgressItem::PartComplete { .. } => {}
                DownloadProgressItem::DownloadError => {
                    return Err(BlobSwarmError::Download(
                        "no provider could serve the content".to_string(),
                    ));
                }
                DownloadProgressItem::Error(e) => {
                    return Err(BlobSwarmError::Download(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Download until the content is complete, then export it.
    ///
    /// Unreachable providers are retried forever; only store and
    ///  filesystem failures end the transfer.
    async fn fetch(
        &self,
        handle: HandleId,
        locator: &BlobLocator,
        save_path: &Path,
    ) -> Result<u64, BlobSwarmError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt: u32 = 0;

        while !self.is_complete(locator.hash).await? {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2).min(RETRY_MAX_DELAY);
            }
            attempt += 1;

            let providers = self.providers_for(locator);
            tracing::info!(%handle, hash = %locator.hash, attempt, providers = providers.len(), "downloading content");
            if let Err(e) = self.download_once(handle, locator.hash, providers).await {
                tracing::warn!(
                    %handle,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    "download attempt failed: {}",
                    e
                );
            }
            self.transfers.lock().update(handle, |status| status.peers = 0);
        }

        tokio::fs::create_dir_all(save_path).await?;
        let target = tokio::fs::canonicalize(save_path)
            .await?
            .join(&locator.name);
        let size = self
            .protocol
            .store()
            .blobs()
            .export(locator.hash, &target)
            .await
            .map_err(|e| BlobSwarmError::Store(e.to_string()))?;
        tracing::info!(target = %target.display(), bytes = size, "content materialized");

        Ok(size)
    }
}

#[async_trait]
impl SwarmEngine for BlobSwarm {
    type Error = BlobSwarmError;

    async fn create_content(&self, path: &Path) -> Result<Locator, Self::Error> {
        let name = match path.file_name() {
            Some(name) if path.is_file() => name.to_string_lossy().to_string(),
            _ => return Err(BlobSwarmError::NotAFile(path.to_path_buf())),
        };

        // the store imports by absolute path, streaming from disk
        let absolute = tokio::fs::canonicalize(path).await?;
        let size = tokio::fs::metadata(&absolute).await?.len();
        let hash = self
            .protocol
            .store()
            .blobs()
            .add_path(&absolute)
            .await
            .map_err(|e| BlobSwarmError::Store(e.to_string()))?
            .hash;

        let locator = BlobLocator {
            hash,
            provider: self.node_id(),
            name,
            size,
        };
        tracing::debug!(path = %path.display(), %hash, size, "content created");
        Ok(Locator::new(locator.to_string()))
    }

    async fn seed(&self, locator: &Locator, _path: &Path) -> Result<HandleId, Self::Error> {
        let parsed = BlobLocator::from_str(locator.as_str())?;
        if !self.is_complete(parsed.hash).await? {
            return Err(BlobSwarmError::ContentMissing(parsed.hash));
        }

        let handle = self.transfers.lock().register(
            parsed.hash,
            parsed.size,
            TransferStatus {
                progress: 1.0,
                total_downloaded: parsed.size,
                is_seeding: true,
                is_valid: true,
                ..Default::default()
            },
        );
        tracing::debug!(%handle, hash = %parsed.hash, "seeding content");
        Ok(handle)
    }

    async fn join(&self, locator: &Locator, save_path: &Path) -> Result<HandleId, Self::Error> {
        let parsed = BlobLocator::from_str(locator.as_str())?;
        let handle = self.transfers.lock().register(
            parsed.hash,
            parsed.size,
            TransferStatus {
                is_valid: true,
                ..Default::default()
            },
        );

        let swarm = self.clone();
        let save_path = save_path.to_path_buf();
        let task = tokio::spawn(async move {
            let result = swarm.fetch(handle, &parsed, &save_path).await;
            let mut transfers = swarm.transfers.lock();
            match result {
                Ok(size) => {
                    transfers.record_download(handle, size);
                    transfers.update(handle, |status| {
                        status.progress = 1.0;
                        status.total_downloaded = size;
                        status.peers = 0;
                        status.is_seeding = true;
                    });
                }
                Err(e) => {
                    tracing::warn!(%handle, "transfer failed: {}", e);
                    transfers.update(handle, |status| status.is_valid = false);
                }
            }
        });
        self.transfers.lock().track_task(task.abort_handle());

        Ok(handle)
    }

    fn status(&self, handle: HandleId) -> Option<TransferStatus> {
        self.transfers.lock().snapshot(handle)
    }

    fn provider_id(&self) -> Option<String> {
        Some(self.node_id().to_string())
    }

    fn add_providers(&self, locator: &Locator, providers: &[String]) -> Result<(), Self::Error> {
        let parsed = BlobLocator::from_str(locator.as_str())?;
        let own = self.node_id();

        let mut transfers = self.transfers.lock();
        let known = transfers.providers.entry(parsed.hash).or_default();
        for provider in providers {
            match NodeId::from_str(provider) {
                Ok(id) if id == own || id == parsed.provider || known.contains(&id) => {}
                Ok(id) => known.push(id),
                Err(_) => tracing::warn!(provider = %provider, "ignoring malformed provider id"),
            }
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        let tasks: Vec<AbortHandle> = self.transfers.lock().tasks.drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.router
            .shutdown()
            .await
            .map_err(|e| BlobSwarmError::Shutdown(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{HandleState, MonitorMode, MonitorOutcome, TransferCoordinator};
    use tempfile::TempDir;
    use tokio::sync::watch;

    fn provider() -> NodeId {
        SecretKey::from_bytes(&[7u8; 32]).public()
    }

    /// A swarm reachable only over loopback, with no relays or dht
    async fn local_swarm(seed: u8) -> BlobSwarm {
        BlobSwarm::builder()
            .secret_key(SecretKey::from_bytes(&[seed; 32]))
            .bind_ip(Ipv4Addr::LOCALHOST)
            .relay_mode(RelayMode::Disabled)
            .without_dht()
            .build()
            .await
            .unwrap()
    }

    async fn wait_for(
        swarm: &BlobSwarm,
        handle: HandleId,
        done: impl Fn(&TransferStatus) -> bool,
    ) -> TransferStatus {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let status = swarm.status(handle).unwrap();
                if done(&status) {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_locator_format() {
        let locator = BlobLocator {
            hash: Hash::new(b"quarterly numbers"),
            provider: provider(),
            name: "q3 report::final.pdf".to_string(),
            size: 17,
        };

        let encoded = locator.to_string();
        assert!(encoded.starts_with("hoard:"));
        assert!(!encoded.contains("::"));
        assert_eq!(BlobLocator::from_str(&encoded).unwrap(), locator);
    }

    #[test]
    fn test_locator_rejects_paths() {
        let hash = Hash::new(b"x");
        let encoded = format!(
            "hoard:{}?provider={}&name=..%2Fescape&size=1",
            hash,
            provider()
        );
        assert!(matches!(
            BlobLocator::from_str(&encoded),
            Err(BlobSwarmError::InvalidLocator(_))
        ));
    }

    #[test]
    fn test_locator_rejects_foreign_scheme() {
        assert!(BlobLocator::from_str("magnet:?xt=urn:btih:abc").is_err());
        assert!(BlobLocator::from_str("hoard:nothex?name=a").is_err());

        let no_size = format!("hoard:{}?provider={}&name=a", Hash::new(b"x"), provider());
        assert!(BlobLocator::from_str(&no_size).is_err());
    }

    #[tokio::test]
    async fn test_transfer_between_two_nodes() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("ledger.csv");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &data).unwrap();

        let owner = local_swarm(1).await;
        let mirror = local_swarm(2).await;
        mirror.add_peer_addr(owner.local_addr());

        let locator = owner.create_content(&source).await.unwrap();
        let parsed = BlobLocator::from_str(locator.as_str()).unwrap();
        assert_eq!(parsed.size, data.len() as u64);
        assert_eq!(parsed.provider, owner.node_id());

        let seed = owner.seed(&locator, &source).await.unwrap();
        assert!(owner.status(seed).unwrap().is_seeding);

        let backup = temp.path().join("backup");
        let mut coordinator = TransferCoordinator::new(mirror.clone());
        coordinator.join(&locator, &backup, "ledger.csv").await.unwrap();

        let (_tx, mut cancel) = watch::channel(());
        let mut out = Vec::new();
        let outcome = tokio::time::timeout(
            Duration::from_secs(30),
            coordinator.monitor(MonitorMode::Download, &mut cancel, &mut out),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::Completed);
        assert_eq!(coordinator.tracked()[0].state, HandleState::Completed);
        assert_eq!(std::fs::read(backup.join("ledger.csv")).unwrap(), data);

        let handle = coordinator.tracked()[0].handle;
        let status = mirror.status(handle).unwrap();
        assert_eq!(status.progress, 1.0);
        assert_eq!(status.total_downloaded, data.len() as u64);

        let served = wait_for(&owner, seed, |s| s.total_uploaded >= data.len() as u64).await;
        assert!(served.is_seeding);

        mirror.shutdown().await.unwrap();
        owner.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_provider_keeps_handle_alive() {
        let temp = TempDir::new().unwrap();
        let mirror = local_swarm(3).await;

        // nobody answers for this provider
        let locator = BlobLocator {
            hash: Hash::new(b"offline content"),
            provider: provider(),
            name: "offline.bin".to_string(),
            size: 15,
        };
        let handle = mirror
            .join(&Locator::new(locator.to_string()), temp.path())
            .await
            .unwrap();

        tokio::time::sleep(RETRY_BASE_DELAY + Duration::from_millis(500)).await;
        let status = mirror.status(handle).unwrap();
        assert!(status.is_valid);
        assert!(!status.is_seeding);
        assert!(!temp.path().join("offline.bin").exists());

        mirror.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unwritable_save_path_invalidates_handle() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        std::fs::write(&source, b"alpha").unwrap();

        let swarm = local_swarm(4).await;
        let locator = swarm.create_content(&source).await.unwrap();

        // content is local, but the save path sits under a regular file
        let handle = swarm.join(&locator, &source.join("nested")).await.unwrap();
        let status = wait_for(&swarm, handle, |s| !s.is_valid).await;
        assert!(!status.is_seeding);

        swarm.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_add_providers_skips_self_and_malformed() {
        let swarm = local_swarm(5).await;
        let other = SecretKey::from_bytes(&[9u8; 32]).public();
        let locator = BlobLocator {
            hash: Hash::new(b"shared"),
            provider: provider(),
            name: "shared.bin".to_string(),
            size: 6,
        };

        swarm
            .add_providers(
                &Locator::new(locator.to_string()),
                &[
                    other.to_string(),
                    swarm.node_id().to_string(),
                    "not a node id".to_string(),
                    other.to_string(),
                ],
            )
            .unwrap();

        assert_eq!(swarm.providers_for(&locator), vec![provider(), other]);
        swarm.shutdown().await.unwrap();
    }
}
