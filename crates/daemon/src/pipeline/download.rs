use std::fmt;
use std::io::Write;

use tokio::sync::watch;

use common::prelude::{DirectoryService, HandleId, MonitorMode, MonitorOutcome, SwarmEngine};

use super::{PipelineError, Session};
use crate::database::MirroredEntry;

/// What one `download` run did
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Mirrored entries the run started with
    pub total: usize,
    pub joined: Vec<(MirroredEntry, HandleId)>,
    /// Entries whose content is now on disk
    pub completed: Vec<MirroredEntry>,
    /// Entries that could not be joined or whose transfer was abandoned,
    ///  with the reason
    pub failed: Vec<(MirroredEntry, String)>,
    /// How the bounded download loop ended
    pub download_outcome: Option<MonitorOutcome>,
    /// How the seed loop ended, if it was entered
    pub seed_outcome: Option<MonitorOutcome>,
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return write!(f, "Nothing to download");
        }
        match self.download_outcome {
            Some(MonitorOutcome::Cancelled) => write!(
                f,
                "Download interrupted, {} of {} files downloaded",
                self.completed.len(),
                self.total
            )?,
            _ => write!(f, "Downloaded {} of {} files", self.completed.len(), self.total)?,
        }
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        Ok(())
    }
}

/// Join every mirrored entry's swarm and wait for all of them to finish.
///
/// Providers announced for an entry are handed to the engine before it is
///  joined, and this node announces itself for every entry it completes.
///  Completed handles keep seeding while their siblings download, and once
///  nothing is left in flight the same loop continues as a seed loop until
///  cancelled. Cancelling during the download phase ends the run.
pub async fn download<D, S, W>(
    session: &mut Session<D, S>,
    cancel: &mut watch::Receiver<()>,
    out: &mut W,
) -> Result<DownloadReport, PipelineError<D, S>>
where
    D: DirectoryService,
    S: SwarmEngine,
    W: Write + Send,
{
    let entries = session.catalog.list_mirrored().await?;
    let mut report = DownloadReport {
        total: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        register_providers(session, &entry).await;

        match session
            .transfers
            .join(&entry.locator, &entry.path, &entry.filename)
            .await
        {
            Ok(handle) => report.joined.push((entry, handle)),
            Err(e) => {
                tracing::warn!(locator = %entry.locator, identity = %entry.identity, "failed to join swarm: {}", e);
                writeln!(out, "Failed to join {}: {}", entry.filename, e)?;
                report.failed.push((entry, e.to_string()));
            }
        }
    }

    let download_outcome = session
        .transfers
        .monitor(MonitorMode::Download, cancel, out)
        .await
        .map_err(PipelineError::Transfer)?;
    report.download_outcome = Some(download_outcome);

    for (entry, handle) in &report.joined {
        let completed = session
            .transfers
            .completed_downloads()
            .any(|t| t.handle == *handle);
        let dropped = session.transfers.dropped().iter().any(|t| t.handle == *handle);

        if completed {
            report.completed.push(entry.clone());
        } else if dropped {
            writeln!(out, "Failed to download {}: transfer abandoned", entry.filename)?;
            report
                .failed
                .push((entry.clone(), "transfer abandoned".to_string()));
        }
    }
    announce_completed(session, &report.completed).await;

    if download_outcome != MonitorOutcome::Completed {
        tracing::info!(outcome = ?download_outcome, "download loop ended without completing");
        return Ok(report);
    }

    tracing::info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        "downloads settled, seeding"
    );
    let seed_outcome = session
        .transfers
        .monitor(MonitorMode::Seed, cancel, out)
        .await
        .map_err(PipelineError::Transfer)?;
    report.seed_outcome = Some(seed_outcome);

    Ok(report)
}

/// Hand every provider announced for the entry to the engine.
///  A directory failure only narrows the download to the original provider.
async fn register_providers<D: DirectoryService, S: SwarmEngine>(
    session: &Session<D, S>,
    entry: &MirroredEntry,
) {
    let providers = match session.directory.providers(&entry.locator).await {
        Ok(providers) => providers,
        Err(e) => {
            tracing::warn!(locator = %entry.locator, "failed to look up providers: {}", e);
            return;
        }
    };
    if providers.is_empty() {
        return;
    }
    if let Err(e) = session
        .transfers
        .engine()
        .add_providers(&entry.locator, &providers)
    {
        tracing::warn!(locator = %entry.locator, "failed to register providers: {}", e);
    }
}

/// Let other peers fetch completed content from this node
async fn announce_completed<D: DirectoryService, S: SwarmEngine>(
    session: &Session<D, S>,
    completed: &[MirroredEntry],
) {
    let Some(provider) = session.transfers.engine().provider_id() else {
        return;
    };
    for entry in completed {
        if let Err(e) = session
            .directory
            .announce_provider(&entry.locator, &provider)
            .await
        {
            tracing::warn!(locator = %entry.locator, "failed to announce as provider: {}", e);
        }
    }
}
