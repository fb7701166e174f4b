// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dx_core::OfflineLogRecord;
use dx_storage::MemoryStore;
use yare::parameterized;

fn tx(id: &str) -> TransactionId {
    TransactionId::from(id)
}

#[parameterized(
    plain = { "video/webm", "video/webm" },
    codecs = { "video/webm;codecs=vp9,opus", "video/webm" },
    spaced = { "video/mp4 ; codecs=avc1", "video/mp4" },
    empty = { "", "application/octet-stream" },
    only_params = { ";codecs=vp8", "application/octet-stream" },
)]
fn essence_strips_parameters(input: &str, expected: &str) {
    assert_eq!(mimetype_essence(input), expected);
}

#[tokio::test]
async fn memory_wins_over_disk() {
    let store = MemoryStore::new();
    let path = MemoryStore::video_path("video_1.mp4");
    store.insert_video(&path, b"from-disk".to_vec());
    let evidence = Evidence::new(store);

    evidence.remember_video_path(tx("tx1"), path);
    evidence.remember_recording(tx("tx1"), b"from-memory".to_vec(), "video/webm;codecs=vp9");

    let resolved = evidence.resolve(&tx("tx1")).await.unwrap().unwrap();
    assert_eq!(resolved.source, EvidenceSource::Memory);
    assert_eq!(resolved.bytes, b"from-memory");
    assert_eq!(resolved.content_type, "video/webm");
}

#[tokio::test]
async fn falls_back_to_disk_with_inferred_type() {
    let store = MemoryStore::new();
    let path = MemoryStore::video_path("video_1.mp4");
    store.insert_video(&path, b"clip".to_vec());
    let evidence = Evidence::new(store);
    evidence.remember_video_path(tx("tx1"), path);

    let resolved = evidence.resolve(&tx("tx1")).await.unwrap().unwrap();
    assert_eq!(resolved.source, EvidenceSource::Disk);
    assert_eq!(resolved.bytes, b"clip");
    assert_eq!(resolved.content_type, "video/mp4");
}

#[tokio::test]
async fn unbound_transaction_resolves_to_none() {
    let evidence = Evidence::new(MemoryStore::new());
    assert_eq!(evidence.resolve(&tx("nope")).await.unwrap(), None);
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let evidence = Evidence::new(MemoryStore::new());
    evidence.remember_video_path(tx("tx1"), MemoryStore::video_path("gone.webm"));

    assert!(matches!(evidence.resolve(&tx("tx1")).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn attach_writes_clip_and_binds_both_ways() {
    let store = MemoryStore::new();
    let evidence = Evidence::new(store.clone());

    let path = evidence.attach_evidence(tx("tx1"), b"clip".to_vec(), "video/webm").await.unwrap();

    assert!(store.has_video(&path));
    assert_eq!(evidence.video_path(&tx("tx1")), Some(path));
    assert_eq!(evidence.counts(), (1, 1));
}

#[tokio::test]
async fn cleanup_removes_file_and_bindings_and_is_idempotent() {
    let store = MemoryStore::new();
    let evidence = Evidence::new(store.clone());
    let path = evidence.attach_evidence(tx("tx1"), b"clip".to_vec(), "video/webm").await.unwrap();

    evidence.cleanup_transaction(&tx("tx1")).await;
    evidence.cleanup_transaction(&tx("tx1")).await;

    assert!(!store.has_video(&path));
    assert!(!evidence.is_bound(&tx("tx1")));
    assert_eq!(evidence.counts(), (0, 0));
}

#[tokio::test]
async fn cleanup_keeps_bindings_when_delete_fails() {
    let evidence = Evidence::new(MemoryStore::new());
    // Outside the managed directory, so the store refuses to delete it
    evidence.remember_video_path(tx("tx1"), PathBuf::from("/etc/passwd"));

    evidence.cleanup_transaction(&tx("tx1")).await;

    assert_eq!(evidence.video_path(&tx("tx1")), Some(PathBuf::from("/etc/passwd")));
}

#[tokio::test]
async fn clear_memory_only_keeps_paths() {
    let evidence = Evidence::new(MemoryStore::new());
    evidence.attach_evidence(tx("tx1"), b"clip".to_vec(), "video/webm").await.unwrap();
    evidence.remember_recording(tx("tx2"), b"clip".to_vec(), "video/webm");

    evidence.clear_memory_only();

    assert_eq!(evidence.counts(), (0, 1));
    assert!(evidence.is_bound(&tx("tx1")));
    assert!(!evidence.is_bound(&tx("tx2")));
}

#[tokio::test]
async fn hydrate_binds_paths_from_persisted_records() {
    let store = MemoryStore::new();
    let with_clip = OfflineLogRecord::builder()
        .transaction_id("tx1")
        .video_path(MemoryStore::video_path("video_1.webm"))
        .build();
    let without_clip = OfflineLogRecord::builder().transaction_id("tx2").build();
    store.write_record(&with_clip).await.unwrap();
    store.write_record(&without_clip).await.unwrap();

    let evidence = Evidence::new(store);
    assert_eq!(evidence.hydrate_from_disk().await.unwrap(), 1);

    assert_eq!(evidence.video_path(&tx("tx1")), Some(MemoryStore::video_path("video_1.webm")));
    assert!(!evidence.is_bound(&tx("tx2")));
}

#[tokio::test]
async fn clones_share_bindings() {
    let evidence = Evidence::new(MemoryStore::new());
    let other = evidence.clone();

    other.remember_recording(tx("tx1"), vec![1], "video/webm");

    assert!(evidence.is_bound(&tx("tx1")));
}
