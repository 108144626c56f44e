use common::prelude::{DirectoryAdapter, DirectoryEntry, DirectoryError, DirectoryService, Identity};

/// Every `(filename, locator)` published under `identity`.
///  Empty when the identity published nothing.
pub async fn lookup<D: DirectoryService>(
    directory: &DirectoryAdapter<D>,
    identity: &Identity,
) -> Result<Vec<DirectoryEntry>, DirectoryError<D::Error>> {
    directory.lookup(identity).await
}

/// Render a lookup result the way the `lookup` command prints it
pub fn format_entries(identity: &Identity, entries: &[DirectoryEntry]) -> String {
    if entries.is_empty() {
        return format!("No entries found for identity '{}'", identity);
    }

    let mut lines = vec![format!("Files published by '{}':", identity)];
    lines.extend(
        entries
            .iter()
            .map(|entry| format!("  {}: {}", entry.filename, entry.locator)),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::prelude::Locator;

    #[test]
    fn test_format_empty_lookup() {
        assert_eq!(
            format_entries(&Identity::from("nobody"), &[]),
            "No entries found for identity 'nobody'"
        );
    }

    #[test]
    fn test_format_lists_every_entry() {
        let entries = vec![
            DirectoryEntry {
                filename: "a.txt".to_string(),
                locator: Locator::from("loc-a"),
            },
            DirectoryEntry {
                filename: "b.txt".to_string(),
                locator: Locator::from("loc-b"),
            },
        ];
        assert_eq!(
            format_entries(&Identity::from("alice"), &entries),
            "Files published by 'alice':\n  a.txt: loc-a\n  b.txt: loc-b"
        );
    }
}
