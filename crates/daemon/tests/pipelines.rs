//! End-to-end pipeline scenarios over in-process collaborators.
//!
//! Two sessions share one `MemoryDirectory` and one `MemorySwarm`, standing
//! in for a publishing node and a backing-up node on the same network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::watch;

use common::prelude::{
    DirectoryAdapter, DirectoryKey, DirectoryService, Identity, Locator, MemoryDirectory,
    MemorySwarm, MonitorOutcome, RetryPolicy, SwarmEngine,
};
use hoard_daemon::pipeline::{
    cleanup, download, lookup, mirror, new_entries, store, CleanupScope, Session,
};
use hoard_daemon::{Catalog, MirroredEntry};

type MemorySession = Session<MemoryDirectory, MemorySwarm>;

async fn session(directory: &MemoryDirectory, swarm: &MemorySwarm) -> MemorySession {
    Session::new(
        Catalog::in_memory().await.unwrap(),
        DirectoryAdapter::new(directory.clone()).with_retry(RetryPolicy::none()),
        swarm.clone(),
    )
}

fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// A receiver whose cancellation is already pending
fn cancelled() -> watch::Receiver<()> {
    let (tx, rx) = watch::channel(());
    tx.send(()).unwrap();
    rx
}

/// A receiver cancelled after `after` of real time
fn cancel_after(after: Duration) -> watch::Receiver<()> {
    let (tx, rx) = watch::channel(());
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(());
    });
    rx
}

#[tokio::test]
async fn test_backup_round_trip() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    let source = write_file(&data_dir, "report.pdf", b"quarterly numbers");
    let backup_dir = temp.path().join("backup");

    let directory = MemoryDirectory::new();
    let swarm = MemorySwarm::new();
    let alice = Identity::from("alice");

    // publisher: new + store
    let mut publisher = session(&directory, &swarm).await;
    let added = new_entries(&publisher.catalog, &data_dir, &alice)
        .await
        .unwrap()
        .added;
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].filename, "report.pdf");
    assert_eq!(added[0].path, source.canonicalize().unwrap());

    let mut out = Vec::new();
    let report = store(&mut publisher, &mut cancelled(), &mut out).await.unwrap();
    assert_eq!(report.stored.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(report.outcome, Some(MonitorOutcome::Cancelled));
    let locator = report.stored[0].1.clone();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(&format!("Storing {}: {}", added[0].path.display(), locator)));

    // published as "<filename>::<locator>" under hash(identity)
    let raw = directory
        .get(&DirectoryKey::for_identity(&alice))
        .await
        .unwrap();
    assert_eq!(raw, vec![format!("report.pdf::{}", locator)]);

    // backer: lookup + mirror + download
    let mut backer = session(&directory, &swarm).await;
    let entries = lookup(&backer.directory, &alice).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].filename, "report.pdf");
    assert_eq!(entries[0].locator, locator);

    let mirrored = mirror(
        &backer.catalog,
        &backer.directory,
        &alice,
        "report.pdf",
        &backup_dir,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(
        mirrored,
        MirroredEntry {
            locator: locator.clone(),
            identity: alice.clone(),
            path: backup_dir.clone(),
            filename: "report.pdf".to_string(),
        }
    );

    let mut out = Vec::new();
    let report = download(
        &mut backer,
        &mut cancel_after(Duration::from_millis(300)),
        &mut out,
    )
    .await
    .unwrap();
    assert_eq!(report.joined.len(), 1);
    assert_eq!(report.completed, vec![mirrored.clone()]);
    assert_eq!(report.download_outcome, Some(MonitorOutcome::Completed));
    assert_eq!(report.seed_outcome, Some(MonitorOutcome::Cancelled));
    assert_eq!(report.to_string(), "Downloaded 1 of 1 files");

    assert_eq!(
        std::fs::read(backup_dir.join("report.pdf")).unwrap(),
        b"quarterly numbers"
    );
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Download of 'report.pdf' complete. Continuing to seed..."));
    assert!(text.contains("Seeding stopped by user."));

    backer.close().await;
    publisher.close().await;
    assert!(swarm.is_shut_down());
}

#[tokio::test]
async fn test_new_twice_doubles_entries() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "f1", b"1");
    write_file(temp.path(), "f2", b"2");
    write_file(temp.path(), "f3", b"3");
    std::fs::create_dir(temp.path().join("nested")).unwrap();
    write_file(&temp.path().join("nested"), "deep", b"skipped");

    let catalog = Catalog::in_memory().await.unwrap();
    let alice = Identity::from("alice");

    let first = new_entries(&catalog, temp.path(), &alice).await.unwrap();
    assert!(first.failed.is_empty());
    let names: Vec<&str> = first.added.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["f1", "f2", "f3"]);

    new_entries(&catalog, temp.path(), &alice).await.unwrap();
    assert_eq!(catalog.list_owned().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_new_rejects_missing_directory() {
    let temp = TempDir::new().unwrap();
    let catalog = Catalog::in_memory().await.unwrap();
    let result = new_entries(&catalog, &temp.path().join("absent"), &Identity::from("a")).await;
    assert!(result.is_err());
    assert!(catalog.list_owned().await.unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_new_follows_file_symlinks() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    let target = write_file(temp.path(), "outside.txt", b"linked");
    std::os::unix::fs::symlink(&target, data_dir.join("link.txt")).unwrap();
    std::os::unix::fs::symlink(temp.path().join("missing"), data_dir.join("dangling")).unwrap();
    std::os::unix::fs::symlink(temp.path(), data_dir.join("dir-link")).unwrap();

    let catalog = Catalog::in_memory().await.unwrap();
    let report = new_entries(&catalog, &data_dir, &Identity::from("alice"))
        .await
        .unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.added[0].filename, "link.txt");
    assert_eq!(catalog.list_owned().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_new_reports_entries_it_cannot_record() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "f1", b"1");
    write_file(temp.path(), "f2", b"2");

    let catalog = Catalog::in_memory().await.unwrap();
    catalog.close().await;

    let report = new_entries(&catalog, temp.path(), &Identity::from("alice"))
        .await
        .unwrap();
    assert!(report.added.is_empty());
    let failed: Vec<PathBuf> = report.failed.into_iter().map(|(path, _)| path).collect();
    assert_eq!(
        failed,
        vec![
            temp.path().canonicalize().unwrap().join("f1"),
            temp.path().canonicalize().unwrap().join("f2"),
        ]
    );
}

#[tokio::test]
async fn test_store_continues_past_failures() {
    let temp = TempDir::new().unwrap();
    let good = write_file(temp.path(), "good.txt", b"fine");
    let missing = temp.path().join("gone.txt");

    let directory = MemoryDirectory::new();
    let swarm = MemorySwarm::new();
    let mut node = session(&directory, &swarm).await;
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");

    node.catalog.add_owned(&alice, &missing).await.unwrap();
    node.catalog.add_owned(&bob, &good).await.unwrap();
    node.catalog.add_owned(&alice, &good).await.unwrap();
    // the publish of bob's entry hits a network failure
    directory.fail_next(1);

    let mut out = Vec::new();
    let report = store(&mut node, &mut cancelled(), &mut out).await.unwrap();

    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].0.path, missing);
    assert_eq!(report.failed[1].0.identity, bob);
    assert_eq!(report.stored.len(), 1);
    assert_eq!(report.stored[0].0.identity, alice);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(&format!("Failed to store {}", missing.display())));

    assert_eq!(lookup(&node.directory, &alice).await.unwrap().len(), 1);
    assert!(lookup(&node.directory, &bob).await.unwrap().is_empty());
    node.close().await;
}

#[tokio::test]
async fn test_mirror_without_match_leaves_catalog_unchanged() {
    let directory = MemoryDirectory::new();
    let adapter = DirectoryAdapter::new(directory);
    let catalog = Catalog::in_memory().await.unwrap();
    let alice = Identity::from("alice");
    adapter
        .publish(&alice, "notes.txt", &Locator::from("L1"))
        .await
        .unwrap();

    let result = mirror(&catalog, &adapter, &alice, "report.pdf", Path::new("/backup"))
        .await
        .unwrap();
    assert!(result.is_none());

    let result = mirror(
        &catalog,
        &adapter,
        &Identity::from("nobody"),
        "notes.txt",
        Path::new("/backup"),
    )
    .await
    .unwrap();
    assert!(result.is_none());
    assert!(catalog.list_mirrored().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mirror_takes_first_match() {
    let adapter = DirectoryAdapter::new(MemoryDirectory::new());
    let catalog = Catalog::in_memory().await.unwrap();
    let alice = Identity::from("alice");
    adapter
        .publish(&alice, "report.pdf", &Locator::from("first"))
        .await
        .unwrap();
    adapter
        .publish(&alice, "report.pdf", &Locator::from("second"))
        .await
        .unwrap();

    let entry = mirror(&catalog, &adapter, &alice, "report.pdf", Path::new("/backup"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.locator, Locator::from("first"));
    assert_eq!(catalog.list_mirrored().await.unwrap().len(), 1);
}

async fn fill(catalog: &Catalog, identity: &Identity) {
    catalog.add_owned(identity, Path::new("/d/f")).await.unwrap();
    catalog
        .add_mirrored(&Locator::from("L"), identity, Path::new("/b"), "f")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cleanup_scopes() {
    let catalog = Catalog::in_memory().await.unwrap();
    let alice = Identity::from("alice");

    fill(&catalog, &alice).await;
    let report = cleanup(&catalog, CleanupScope::Saved).await.unwrap();
    assert_eq!(report.to_string(), "Cleared table 'saved' (1 entries)");
    assert!(catalog.list_owned().await.unwrap().is_empty());
    assert_eq!(catalog.list_mirrored().await.unwrap().len(), 1);

    cleanup(&catalog, CleanupScope::Kept).await.unwrap();
    assert!(catalog.list_mirrored().await.unwrap().is_empty());

    fill(&catalog, &alice).await;
    let report = cleanup(&catalog, CleanupScope::All).await.unwrap();
    assert_eq!(report.cleared, vec![("kept", 1), ("saved", 1)]);
    assert!(catalog.list_owned().await.unwrap().is_empty());
    assert!(catalog.list_mirrored().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_download_joins_every_entry() {
    let temp = TempDir::new().unwrap();
    let a = write_file(temp.path(), "a.txt", b"alpha");
    let b = write_file(temp.path(), "b.txt", b"bravo");

    let directory = MemoryDirectory::new();
    let swarm = MemorySwarm::new();
    let la = swarm.create_content(&a).await.unwrap();
    let lb = swarm.create_content(&b).await.unwrap();

    let mut node = session(&directory, &swarm).await;
    let u1 = Identity::from("u1");
    let u2 = Identity::from("u2");
    let p1 = temp.path().join("p1");
    let p2 = temp.path().join("p2");
    node.catalog.add_mirrored(&la, &u1, &p1, "a.txt").await.unwrap();
    node.catalog.add_mirrored(&lb, &u2, &p2, "b.txt").await.unwrap();

    let mut out = Vec::new();
    let report = download(
        &mut node,
        &mut cancel_after(Duration::from_millis(300)),
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(report.joined.len(), 2);
    assert_eq!(report.completed.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(swarm.handle_count(), 2);
    assert_eq!(report.download_outcome, Some(MonitorOutcome::Completed));
    assert_eq!(std::fs::read(p1.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(std::fs::read(p2.join("b.txt")).unwrap(), b"bravo");
    node.close().await;
}

#[tokio::test]
async fn test_cancelled_download_skips_seeding() {
    let temp = TempDir::new().unwrap();
    let directory = MemoryDirectory::new();
    let swarm = MemorySwarm::new();
    let mut node = session(&directory, &swarm).await;

    // nobody provides this content, so it never completes
    node.catalog
        .add_mirrored(
            &Locator::from("memory:unknown?name=x"),
            &Identity::from("u"),
            temp.path(),
            "x",
        )
        .await
        .unwrap();

    let mut out = Vec::new();
    let report = download(
        &mut node,
        &mut cancel_after(Duration::from_millis(300)),
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(report.download_outcome, Some(MonitorOutcome::Cancelled));
    assert_eq!(report.seed_outcome, None);
    assert!(report.completed.is_empty());
    assert_eq!(report.to_string(), "Download interrupted, 0 of 1 files downloaded");
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Downloading x 0.00%"));
    assert!(text.contains("Downloading interrupted by user."));
    node.close().await;
}

#[tokio::test]
async fn test_download_with_nothing_mirrored_is_idle() {
    let directory = MemoryDirectory::new();
    let swarm = MemorySwarm::new();
    let mut node = session(&directory, &swarm).await;

    let (_tx, mut rx) = watch::channel(());
    let mut out = Vec::new();
    let report = download(&mut node, &mut rx, &mut out).await.unwrap();
    assert_eq!(report.download_outcome, Some(MonitorOutcome::Idle));
    assert_eq!(report.seed_outcome, None);
    node.close().await;
}

#[tokio::test]
async fn test_abandoned_download_is_not_counted() {
    let temp = TempDir::new().unwrap();
    let source = write_file(temp.path(), "a.txt", b"alpha");
    // the save path sits below a regular file, so nothing can be written
    let blocker = write_file(temp.path(), "blocker", b"");

    let directory = MemoryDirectory::new();
    let swarm = MemorySwarm::new();
    let locator = swarm.create_content(&source).await.unwrap();

    let mut node = session(&directory, &swarm).await;
    node.catalog
        .add_mirrored(&locator, &Identity::from("u"), &blocker.join("sub"), "a.txt")
        .await
        .unwrap();

    let mut out = Vec::new();
    let report = download(
        &mut node,
        &mut cancel_after(Duration::from_millis(300)),
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(report.joined.len(), 1);
    assert!(report.completed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.filename, "a.txt");
    assert_eq!(report.to_string(), "Downloaded 0 of 1 files, 1 failed");
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Failed to download a.txt"));
    node.close().await;
}

#[tokio::test]
async fn test_download_shares_provider_records() {
    let temp = TempDir::new().unwrap();
    let source = write_file(temp.path(), "a.txt", b"alpha");

    let directory = MemoryDirectory::new();
    let swarm = MemorySwarm::new();
    let locator = swarm.create_content(&source).await.unwrap();

    let mut backer = Session::new(
        Catalog::in_memory().await.unwrap(),
        DirectoryAdapter::new(directory.clone()).with_retry(RetryPolicy::none()),
        swarm.as_peer("backer"),
    );
    // an earlier mirror already announced itself
    backer
        .directory
        .announce_provider(&locator, "mirror-1")
        .await
        .unwrap();
    backer
        .catalog
        .add_mirrored(&locator, &Identity::from("u"), &temp.path().join("b"), "a.txt")
        .await
        .unwrap();

    let mut out = Vec::new();
    let report = download(
        &mut backer,
        &mut cancel_after(Duration::from_millis(300)),
        &mut out,
    )
    .await
    .unwrap();
    assert_eq!(report.completed.len(), 1);

    // the engine was told about the earlier mirror before joining
    assert_eq!(swarm.providers_of(&locator), vec!["mirror-1".to_string()]);
    // and this node now serves the content too
    assert_eq!(
        backer.directory.providers(&locator).await.unwrap(),
        vec!["mirror-1".to_string(), "backer".to_string()]
    );
    backer.close().await;
}
