//! Transfer coordination
//!
//! The coordinator owns the swarm engine for one invocation and every
//! handle created through it. All handles, seeding or downloading, are
//! polled by a single multiplexed loop, so a finished download starts
//! reporting as seeding on the next tick without waiting for its siblings.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::swarm::{SwarmEngine, TransferStatus};
use crate::types::{HandleId, Locator};

mod render;

pub use render::render_status;

/// Cadence of the seed-only monitor
pub const SEED_INTERVAL: Duration = Duration::from_secs(5);
/// Cadence of the download monitor
pub const DOWNLOAD_INTERVAL: Duration = Duration::from_secs(1);

/// How a handle came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Local content offered to the swarm
    Seed,
    /// Remote content fetched into a save path
    Download,
}

/// Lifecycle of a tracked handle.
///
/// `Joining -> Active -> Completed` for downloads, `Joining -> Active`
///  for seeds. Any state can fall to `Invalid`, which drops the handle
///  from the monitored set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Joining,
    Active,
    Completed,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct TrackedTransfer {
    pub handle: HandleId,
    pub locator: Locator,
    /// File name shown in status lines
    pub label: String,
    pub kind: TransferKind,
    pub state: HandleState,
}

impl TrackedTransfer {
    fn display_label(&self) -> String {
        match (self.kind, self.state) {
            (TransferKind::Download, HandleState::Joining | HandleState::Active) => {
                format!("Downloading {}", self.label)
            }
            _ => format!("Seeding {}", self.label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// Run until cancelled
    Seed,
    /// Run until every download completed, or until cancelled
    Download,
}

impl MonitorMode {
    pub fn interval(&self) -> Duration {
        match self {
            MonitorMode::Seed => SEED_INTERVAL,
            MonitorMode::Download => DOWNLOAD_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// No download is left in flight: each one completed or was dropped
    Completed,
    /// The cancellation signal fired
    Cancelled,
    /// Nothing left to monitor
    Idle,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError<E: std::error::Error + 'static> {
    #[error("swarm engine error: {0}")]
    Swarm(#[source] E),
    #[error("failed to write transfer status: {0}")]
    Output(#[from] std::io::Error),
}

/// Owns a swarm engine session and the handles created through it.
#[derive(Debug)]
pub struct TransferCoordinator<S: SwarmEngine> {
    engine: S,
    tracked: Vec<TrackedTransfer>,
    /// Handles the engine gave up on, in the order they were dropped
    dropped: Vec<TrackedTransfer>,
}

impl<S: SwarmEngine> TransferCoordinator<S> {
    pub fn new(engine: S) -> Self {
        Self {
            engine,
            tracked: Vec::new(),
            dropped: Vec::new(),
        }
    }

    pub fn engine(&self) -> &S {
        &self.engine
    }

    /// Handles still being monitored
    pub fn tracked(&self) -> &[TrackedTransfer] {
        &self.tracked
    }

    /// Hash `path` into new content and start seeding it from there.
    pub async fn create_and_seed(&mut self, path: &Path) -> Result<Locator, TransferError<S::Error>> {
        let locator = self
            .engine
            .create_content(path)
            .await
            .map_err(TransferError::Swarm)?;
        let handle = self
            .engine
            .seed(&locator, path)
            .await
            .map_err(TransferError::Swarm)?;

        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        tracing::info!(%handle, path = %path.display(), "seeding new content");

        self.track(handle, locator.clone(), label, TransferKind::Seed);
        Ok(locator)
    }

    /// Join the swarm behind `locator`, saving into `save_path`.
    pub async fn join(
        &mut self,
        locator: &Locator,
        save_path: &Path,
        label: &str,
    ) -> Result<HandleId, TransferError<S::Error>> {
        let handle = self
            .engine
            .join(locator, save_path)
            .await
            .map_err(TransferError::Swarm)?;
        tracing::info!(%handle, %locator, save_path = %save_path.display(), "joined swarm");

        self.track(handle, locator.clone(), label.to_string(), TransferKind::Download);
        Ok(handle)
    }

    fn track(&mut self, handle: HandleId, locator: Locator, label: String, kind: TransferKind) {
        self.tracked.push(TrackedTransfer {
            handle,
            locator,
            label,
            kind,
            state: HandleState::Joining,
        });
    }

    /// Handles that fell to `Invalid` and left the monitored set
    pub fn dropped(&self) -> &[TrackedTransfer] {
        &self.dropped
    }

    /// Downloads that reached `Completed`
    pub fn completed_downloads(&self) -> impl Iterator<Item = &TrackedTransfer> {
        self.tracked
            .iter()
            .filter(|t| t.kind == TransferKind::Download && t.state == HandleState::Completed)
    }

    /// True once no download is still in flight. Dropped downloads do
    ///  not count, see [`Self::dropped`].
    pub fn downloads_complete(&self) -> bool {
        self.tracked
            .iter()
            .filter(|t| t.kind == TransferKind::Download)
            .all(|t| t.state == HandleState::Completed)
    }

    /// Poll every handle once, advance its state and print its status.
    pub fn tick<W: Write>(&mut self, out: &mut W) -> Result<(), TransferError<S::Error>> {
        for transfer in self.tracked.iter_mut() {
            let status: TransferStatus = match self.engine.status(transfer.handle) {
                Some(status) if status.is_valid => status,
                _ => {
                    tracing::warn!(
                        handle = %transfer.handle,
                        label = %transfer.label,
                        "transfer handle is no longer valid, dropping it"
                    );
                    transfer.state = HandleState::Invalid;
                    continue;
                }
            };

            if transfer.state == HandleState::Joining {
                transfer.state = HandleState::Active;
            }
            if transfer.kind == TransferKind::Download
                && transfer.state == HandleState::Active
                && status.is_seeding
            {
                transfer.state = HandleState::Completed;
                writeln!(
                    out,
                    "Download of '{}' complete. Continuing to seed...",
                    transfer.label
                )?;
            }

            writeln!(out, "{}", render_status(&transfer.display_label(), &status))?;
        }

        let (invalid, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tracked)
            .into_iter()
            .partition(|t| t.state == HandleState::Invalid);
        self.tracked = live;
        self.dropped.extend(invalid);
        out.flush()?;
        Ok(())
    }

    /// Poll all tracked handles at the mode's cadence.
    ///
    /// A change on `cancel` ends this loop only; the transfers stay
    ///  registered with the engine.
    pub async fn monitor<W: Write + Send>(
        &mut self,
        mode: MonitorMode,
        cancel: &mut watch::Receiver<()>,
        out: &mut W,
    ) -> Result<MonitorOutcome, TransferError<S::Error>> {
        let mut ticker = tokio::time::interval(mode.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancellable = true;

        tracing::debug!(?mode, handles = self.tracked.len(), "monitor started");

        loop {
            if self.tracked.is_empty() {
                return Ok(MonitorOutcome::Idle);
            }

            tokio::select! {
                changed = cancel.changed(), if cancellable => {
                    match changed {
                        Ok(()) => {
                            let message = match mode {
                                MonitorMode::Seed => "Seeding stopped by user.",
                                MonitorMode::Download => "Downloading interrupted by user.",
                            };
                            writeln!(out, "\n{}", message)?;
                            return Ok(MonitorOutcome::Cancelled);
                        }
                        // nobody can cancel anymore
                        Err(_) => cancellable = false,
                    }
                }
                _ = ticker.tick() => {
                    self.tick(out)?;
                    if mode == MonitorMode::Download && self.downloads_complete() {
                        return Ok(MonitorOutcome::Completed);
                    }
                }
            }
        }
    }

    /// Stop the engine. Consumes the coordinator; handles die with it.
    pub async fn shutdown(self) -> Result<(), TransferError<S::Error>> {
        self.engine.shutdown().await.map_err(TransferError::Swarm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::MemorySwarm;
    use tempfile::TempDir;

    fn fixture(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn test_create_and_seed_tracks_handle() {
        let temp = TempDir::new().unwrap();
        let file = fixture(temp.path(), "a.txt", b"alpha");
        let mut coordinator = TransferCoordinator::new(MemorySwarm::new());

        coordinator.create_and_seed(&file).await.unwrap();

        let tracked = coordinator.tracked();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].kind, TransferKind::Seed);
        assert_eq!(tracked[0].state, HandleState::Joining);
        assert_eq!(tracked[0].label, "a.txt");
    }

    #[tokio::test]
    async fn test_seed_handles_never_complete() {
        let temp = TempDir::new().unwrap();
        let file = fixture(temp.path(), "a.txt", b"alpha");
        let mut coordinator = TransferCoordinator::new(MemorySwarm::new());
        coordinator.create_and_seed(&file).await.unwrap();

        let mut out = Vec::new();
        coordinator.tick(&mut out).unwrap();
        coordinator.tick(&mut out).unwrap();

        assert_eq!(coordinator.tracked()[0].state, HandleState::Active);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Seeding a.txt 100.00%"));
        assert!(!text.contains("complete"));
    }

    #[tokio::test]
    async fn test_download_state_machine() {
        let temp = TempDir::new().unwrap();
        let file = fixture(temp.path(), "a.txt", b"alpha");
        let swarm = MemorySwarm::with_progress_step(0.5);
        let locator = swarm.create_content(&file).await.unwrap();

        let mut coordinator = TransferCoordinator::new(swarm);
        coordinator
            .join(&locator, &temp.path().join("backup"), "a.txt")
            .await
            .unwrap();
        assert!(!coordinator.downloads_complete());

        let mut out = Vec::new();
        coordinator.tick(&mut out).unwrap();
        assert_eq!(coordinator.tracked()[0].state, HandleState::Active);
        assert!(!coordinator.downloads_complete());

        coordinator.tick(&mut out).unwrap();
        assert_eq!(coordinator.tracked()[0].state, HandleState::Completed);
        assert!(coordinator.downloads_complete());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Downloading a.txt 50.00%"));
        assert_eq!(text.matches("Download of 'a.txt' complete").count(), 1);
        assert!(text.contains("Seeding a.txt 100.00%"));
    }

    #[tokio::test]
    async fn test_invalid_handles_leave_the_set() {
        let temp = TempDir::new().unwrap();
        let swarm = MemorySwarm::new();
        let mut coordinator = TransferCoordinator::new(swarm.clone());

        let handle = coordinator
            .join(&Locator::from("memory:missing"), temp.path(), "missing")
            .await
            .unwrap();
        swarm.invalidate(handle);

        let mut out = Vec::new();
        coordinator.tick(&mut out).unwrap();
        assert!(coordinator.tracked().is_empty());
        assert!(coordinator.downloads_complete());

        // gone from the set, but not counted as downloaded
        assert_eq!(coordinator.completed_downloads().count(), 0);
        assert_eq!(coordinator.dropped().len(), 1);
        assert_eq!(coordinator.dropped()[0].handle, handle);
        assert_eq!(coordinator.dropped()[0].state, HandleState::Invalid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_monitor_returns_when_all_complete() {
        let temp = TempDir::new().unwrap();
        let a = fixture(temp.path(), "a.txt", b"alpha");
        let b = fixture(temp.path(), "b.txt", b"bravo");
        let swarm = MemorySwarm::with_progress_step(0.25);
        let la = swarm.create_content(&a).await.unwrap();
        let lb = swarm.create_content(&b).await.unwrap();

        let mut coordinator = TransferCoordinator::new(swarm);
        let backup = temp.path().join("backup");
        coordinator.join(&la, &backup, "a.txt").await.unwrap();
        coordinator.join(&lb, &backup, "b.txt").await.unwrap();

        let (_tx, mut cancel) = watch::channel(());
        let mut out = Vec::new();
        let outcome = coordinator
            .monitor(MonitorMode::Download, &mut cancel, &mut out)
            .await
            .unwrap();

        assert_eq!(outcome, MonitorOutcome::Completed);
        assert_eq!(std::fs::read(backup.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(backup.join("b.txt")).unwrap(), b"bravo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_ends_only_the_loop() {
        let temp = TempDir::new().unwrap();
        let file = fixture(temp.path(), "a.txt", b"alpha");
        let swarm = MemorySwarm::new();
        let mut coordinator = TransferCoordinator::new(swarm.clone());
        coordinator.create_and_seed(&file).await.unwrap();

        let (tx, mut cancel) = watch::channel(());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            let _ = tx.send(());
        });

        let mut out = Vec::new();
        let outcome = coordinator
            .monitor(MonitorMode::Seed, &mut cancel, &mut out)
            .await
            .unwrap();

        assert_eq!(outcome, MonitorOutcome::Cancelled);
        let text = String::from_utf8(out).unwrap();
        // ticks at 0s, 5s and 10s
        assert_eq!(text.matches("Seeding a.txt").count(), 3);
        assert!(text.contains("Seeding stopped by user."));
        // the engine still knows the transfer
        assert_eq!(swarm.handle_count(), 1);
        assert_eq!(coordinator.tracked().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_monitor_is_idle() {
        let mut coordinator = TransferCoordinator::new(MemorySwarm::new());
        let (_tx, mut cancel) = watch::channel(());
        let mut out = Vec::new();
        let outcome = coordinator
            .monitor(MonitorMode::Seed, &mut cancel, &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, MonitorOutcome::Idle);
    }
}
