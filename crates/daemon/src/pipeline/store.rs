use std::io::Write;

use tokio::sync::watch;

use common::prelude::{DirectoryService, Locator, MonitorMode, MonitorOutcome, SwarmEngine};

use super::{PipelineError, Session};
use crate::database::OwnedEntry;

/// What one `store` run did
#[derive(Debug, Default)]
pub struct StoreReport {
    pub stored: Vec<(OwnedEntry, Locator)>,
    /// Entries that failed, with the reason
    pub failed: Vec<(OwnedEntry, String)>,
    pub outcome: Option<MonitorOutcome>,
}

/// Seed and publish every owned entry, then keep seeding until cancelled.
///
/// One entry failing does not stop the others. Every owned entry is
///  announced again on every run.
pub async fn store<D, S, W>(
    session: &mut Session<D, S>,
    cancel: &mut watch::Receiver<()>,
    out: &mut W,
) -> Result<StoreReport, PipelineError<D, S>>
where
    D: DirectoryService,
    S: SwarmEngine,
    W: Write + Send,
{
    let entries = session.catalog.list_owned().await?;
    let mut report = StoreReport::default();

    for entry in entries {
        match store_entry(session, &entry).await {
            Ok(locator) => {
                writeln!(out, "Storing {}: {}", entry.path.display(), locator)?;
                report.stored.push((entry, locator));
            }
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), identity = %entry.identity, "failed to store entry: {}", e);
                writeln!(out, "Failed to store {}: {}", entry.path.display(), e)?;
                report.failed.push((entry, e.to_string()));
            }
        }
    }

    tracing::info!(
        stored = report.stored.len(),
        failed = report.failed.len(),
        "store batch finished, seeding"
    );

    let outcome = session
        .transfers
        .monitor(MonitorMode::Seed, cancel, out)
        .await
        .map_err(PipelineError::Transfer)?;
    report.outcome = Some(outcome);

    Ok(report)
}

async fn store_entry<D: DirectoryService, S: SwarmEngine>(
    session: &mut Session<D, S>,
    entry: &OwnedEntry,
) -> Result<Locator, PipelineError<D, S>> {
    let locator = session
        .transfers
        .create_and_seed(&entry.path)
        .await
        .map_err(PipelineError::Transfer)?;

    session
        .directory
        .publish(&entry.identity, &entry.filename, &locator)
        .await
        .map_err(PipelineError::Directory)?;

    Ok(locator)
}

