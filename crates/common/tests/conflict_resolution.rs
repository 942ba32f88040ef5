//! Integration tests for the commit-time conflict merge
//!
//! These tests run two sessions from the same baseline, let one win the
//! publish race, and check that the loser's commit reconciles rather than
//! silently dropping anybody's data.

mod common;

use std::io::Cursor;

#[tokio::test]
async fn test_no_conflict_commit_keeps_edits_as_is() {
    let (vault, _transfer, _key, _temp) = common::setup_test_env().await;
    let mut root = vault.navigate().await.unwrap();

    root.upload("a.txt", Cursor::new(b"a".to_vec()))
        .await
        .unwrap();
    root.commit().await.unwrap();

    root.upload("b.txt", Cursor::new(b"b".to_vec()))
        .await
        .unwrap();
    root.commit().await.unwrap();

    // a single writer never triggers the merge branch: no conflict names
    let fresh = vault.navigate().await.unwrap();
    let mut names: Vec<String> = fresh.list_files().into_iter().map(|f| f.name).collect();
    names.sort();
    assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);
}

#[tokio::test]
async fn test_concurrent_uploads_keep_both_versions() {
    let (vault, _transfer, _key, _temp) = common::setup_test_env().await;

    // both sessions start from the same (empty) baseline
    let mut alice = vault.navigate().await.unwrap();
    let mut bob = vault.navigate().await.unwrap();

    let alice_entry = alice
        .upload("notes.txt", Cursor::new(b"Alice's notes".to_vec()))
        .await
        .unwrap();
    alice.commit().await.unwrap();

    let bob_entry = bob
        .upload("notes.txt", Cursor::new(b"Bob's notes".to_vec()))
        .await
        .unwrap();
    bob.commit().await.unwrap();

    // after the losing commit: the winner's entry is untouched and the
    // loser's lives on under the deterministic conflict name
    let fresh = vault.navigate().await.unwrap();
    let files = fresh.list_files();
    assert_eq!(files.len(), 2);

    let original = files.iter().find(|f| f.name == "notes.txt").unwrap();
    assert_eq!(original.block, alice_entry.block);

    let conflict_name = format!("notes.txt_conflict_{}", bob_entry.mtime);
    let renamed = files.iter().find(|f| f.name == conflict_name).unwrap();
    assert_eq!(renamed.block, bob_entry.block);

    // both contents remain downloadable
    let a = fresh.download(original).await.unwrap();
    let b = fresh.download(renamed).await.unwrap();
    assert_eq!(a.as_ref(), b"Alice's notes".as_slice());
    assert_eq!(b.as_ref(), b"Bob's notes".as_slice());
}

#[tokio::test]
async fn test_concurrent_overwrites_keep_both_versions() {
    let (vault, _transfer, _key, _temp) = common::setup_test_env().await;

    // seed a committed baseline entry
    let mut seed = vault.navigate().await.unwrap();
    seed.upload("report.pdf", Cursor::new(b"original".to_vec()))
        .await
        .unwrap();
    seed.commit().await.unwrap();

    // both writers see the same baseline and both overwrite it
    let mut alice = vault.navigate().await.unwrap();
    let mut bob = vault.navigate().await.unwrap();

    let alice_entry = alice
        .upload("report.pdf", Cursor::new(b"alice rewrite".to_vec()))
        .await
        .unwrap();
    alice.commit().await.unwrap();

    let bob_entry = bob
        .upload("report.pdf", Cursor::new(b"bob rewrite".to_vec()))
        .await
        .unwrap();
    bob.commit().await.unwrap();

    let fresh = vault.navigate().await.unwrap();
    let files = fresh.list_files();
    assert_eq!(files.len(), 2);

    // Alice won the race; her replacement must not be clobbered by Bob's
    // stale baseline cleanup
    let winner = files.iter().find(|f| f.name == "report.pdf").unwrap();
    assert_eq!(winner.block, alice_entry.block);

    let conflict_name = format!("report.pdf_conflict_{}", bob_entry.mtime);
    let loser = files.iter().find(|f| f.name == conflict_name).unwrap();
    assert_eq!(loser.block, bob_entry.block);

    let content = fresh.download(winner).await.unwrap();
    assert_eq!(content.as_ref(), b"alice rewrite".as_slice());
}

#[tokio::test]
async fn test_superseded_edit_yields_to_remote_state() {
    let (vault, _transfer, _key, _temp) = common::setup_test_env().await;

    let mut seed = vault.navigate().await.unwrap();
    let original = seed
        .upload("config.toml", Cursor::new(b"v1".to_vec()))
        .await
        .unwrap();
    seed.commit().await.unwrap();

    let mut alice = vault.navigate().await.unwrap();
    let mut bob = vault.navigate().await.unwrap();

    // Alice touches something unrelated, so the index version moves but
    // config.toml still equals Bob's baseline when he merges
    alice
        .upload("unrelated.txt", Cursor::new(b"x".to_vec()))
        .await
        .unwrap();
    alice.commit().await.unwrap();

    let bob_entry = bob
        .upload("config.toml", Cursor::new(b"v2".to_vec()))
        .await
        .unwrap();
    bob.commit().await.unwrap();

    // the merge is conservative: published state wins over re-applying the
    // staged edit, and no conflict entry appears
    let fresh = vault.navigate().await.unwrap();
    let files = fresh.list_files();
    assert_eq!(files.len(), 2);

    let config = files.iter().find(|f| f.name == "config.toml").unwrap();
    assert_eq!(config.block, original.block);
    assert!(!files.iter().any(|f| f.name.contains("_conflict_")));
    assert!(!files.iter().any(|f| f.block == bob_entry.block));
}

#[tokio::test]
async fn test_kind_collision_renames_staged_file() {
    let (vault, _transfer, _key, _temp) = common::setup_test_env().await;

    let mut alice = vault.navigate().await.unwrap();
    let mut bob = vault.navigate().await.unwrap();

    // Alice publishes a *folder* named "report"
    alice.create_folder("report").await.unwrap();
    alice.commit().await.unwrap();

    // Bob concurrently uploads a *file* named "report"
    let bob_entry = bob
        .upload("report", Cursor::new(b"file body".to_vec()))
        .await
        .unwrap();
    bob.commit().await.unwrap();

    let fresh = vault.navigate().await.unwrap();

    // the folder keeps the name; the file is inserted under a conflict name
    assert_eq!(fresh.list_folders().len(), 1);
    assert_eq!(fresh.list_folders()[0].name, "report");

    let files = fresh.list_files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, format!("report_conflict_{}", bob_entry.mtime));
    assert_eq!(files[0].block, bob_entry.block);
}

#[tokio::test]
async fn test_compound_conflict_rename_converges() {
    let (vault, _transfer, _key, _temp) = common::setup_test_env().await;

    let mut alice = vault.navigate().await.unwrap();
    let mut bob = vault.navigate().await.unwrap();

    // Bob stages his upload first so its mtime is known
    let bob_entry = bob
        .upload("report", Cursor::new(b"file body".to_vec()))
        .await
        .unwrap();
    let first_conflict = format!("report_conflict_{}", bob_entry.mtime);

    // Alice publishes folders squatting on the name *and* its first conflict
    // rename, forcing the merge to rename twice
    alice.create_folder("report").await.unwrap();
    alice.create_folder(&first_conflict).await.unwrap();
    alice.commit().await.unwrap();

    bob.commit().await.unwrap();

    let fresh = vault.navigate().await.unwrap();
    assert_eq!(fresh.list_folders().len(), 2);

    let files = fresh.list_files();
    assert_eq!(files.len(), 1);
    assert_eq!(
        files[0].name,
        format!("{}_conflict_{}", first_conflict, bob_entry.mtime)
    );
    assert_eq!(files[0].block, bob_entry.block);
}

#[tokio::test]
async fn test_losing_delete_queue_still_flushes() {
    let (vault, transfer, _key, _temp) = common::setup_test_env().await;

    let mut seed = vault.navigate().await.unwrap();
    let original = seed
        .upload("a.txt", Cursor::new(b"v1".to_vec()))
        .await
        .unwrap();
    seed.commit().await.unwrap();

    let mut alice = vault.navigate().await.unwrap();
    let mut bob = vault.navigate().await.unwrap();

    alice
        .upload("b.txt", Cursor::new(b"b".to_vec()))
        .await
        .unwrap();
    alice.commit().await.unwrap();

    // Bob replaces a.txt; his overwrite queued the original block
    let replacement = bob
        .upload("a.txt", Cursor::new(b"v2".to_vec()))
        .await
        .unwrap();
    assert!(bob.deferred_deletes().contains(&original.block_ref()));
    bob.commit().await.unwrap();

    // the queue flushed with the commit and the session is clean again
    assert!(bob.deferred_deletes().is_empty());
    assert!(!bob.is_dirty());
    assert!(!transfer.exists(&original.block_ref()).await.unwrap());
    assert!(transfer.exists(&replacement.block_ref()).await.unwrap());
}
