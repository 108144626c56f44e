use std::fmt;

use crate::database::{Catalog, CatalogError, KEPT_TABLE, SAVED_TABLE};

/// Which catalog tables to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CleanupScope {
    /// Mirrored entries
    Kept,
    /// Owned entries
    Saved,
    /// Both
    All,
}

impl CleanupScope {
    fn clears_kept(&self) -> bool {
        matches!(self, CleanupScope::Kept | CleanupScope::All)
    }

    fn clears_saved(&self) -> bool {
        matches!(self, CleanupScope::Saved | CleanupScope::All)
    }
}

/// Rows removed per table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub cleared: Vec<(&'static str, u64)>,
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .cleared
            .iter()
            .map(|(table, rows)| format!("Cleared table '{}' ({} entries)", table, rows))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Clear catalog tables. Running transfers are not touched.
pub async fn cleanup(catalog: &Catalog, scope: CleanupScope) -> Result<CleanupReport, CatalogError> {
    let mut report = CleanupReport::default();

    if scope.clears_kept() {
        let rows = catalog.clear_mirrored().await?;
        report.cleared.push((KEPT_TABLE, rows));
    }
    if scope.clears_saved() {
        let rows = catalog.clear_owned().await?;
        report.cleared.push((SAVED_TABLE, rows));
    }

    tracing::info!(?scope, "catalog cleaned up");
    Ok(report)
}
