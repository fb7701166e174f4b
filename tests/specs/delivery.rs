//! Offline delivery specs over the on-disk store
//!
//! Records submitted while offline land in `monitor-logs/`, survive a client
//! restart, and leave disk only once the server accepts them. Evidence clips
//! stay until the server asks for them.

use dx_adapters::{FakeRemoteLink, FakeUploader};
use dx_core::{OfflineLogRecord, TransactionId};
use dx_engine::{
    Evidence, EvidenceSource, EvidenceUploader, OfflineQueue, SubmitOutcome, UploadOutcome,
    DEFAULT_BULK_TIMEOUT,
};
use dx_storage::{FsLocalStore, LocalStore, MONITOR_LOGS_DIR};
use dx_wire::UploadRequest;
use std::path::Path;
use tempfile::TempDir;

fn record(tx: &str) -> OfflineLogRecord {
    OfflineLogRecord::builder().transaction_id(tx).room_code("ROOM-7").build()
}

fn queued_files(root: &Path) -> usize {
    std::fs::read_dir(root.join(MONITOR_LOGS_DIR)).unwrap().count()
}

async fn client(root: &Path, link: &FakeRemoteLink) -> OfflineQueue<FakeRemoteLink, FsLocalStore> {
    let store = FsLocalStore::open(root).await.unwrap();
    let evidence = Evidence::new(store);
    evidence.hydrate_from_disk().await.unwrap();
    OfflineQueue::new(link.clone(), evidence)
}

#[tokio::test]
async fn offline_records_are_flushed_after_reconnect() {
    let dir = TempDir::new().unwrap();
    let link = FakeRemoteLink::new(false);
    let queue = client(dir.path(), &link).await;

    for tx in ["tx-1", "tx-2", "tx-3"] {
        assert_eq!(queue.submit(record(tx)).await, SubmitOutcome::Persisted);
    }
    assert_eq!(queued_files(dir.path()), 3);

    link.set_connected(true);
    let report = queue.flush(25, DEFAULT_BULK_TIMEOUT).await;

    assert_eq!((report.pending, report.accepted, report.deleted), (3, 3, 3));
    assert_eq!(link.bulk_calls().len(), 1);
    assert_eq!(queued_files(dir.path()), 0);
}

#[tokio::test]
async fn unaccepted_records_stay_on_disk_for_the_next_cycle() {
    let dir = TempDir::new().unwrap();
    let link = FakeRemoteLink::new(false);
    let queue = client(dir.path(), &link).await;
    for tx in ["tx-1", "tx-2", "tx-3"] {
        queue.submit(record(tx)).await;
    }

    link.set_connected(true);
    link.accept_only(["tx-1", "tx-3"]);
    let first = queue.flush(25, DEFAULT_BULK_TIMEOUT).await;
    assert_eq!(first.deleted, 2);

    let left = queue.evidence().store().list_records().await.unwrap();
    let left: Vec<TransactionId> = left.into_iter().map(|s| s.record.transaction_id).collect();
    assert_eq!(left, vec![TransactionId::from("tx-2")]);

    link.accept_only(["tx-2"]);
    let second = queue.flush(25, DEFAULT_BULK_TIMEOUT).await;
    assert_eq!(second.deleted, 1);
    assert_eq!(queued_files(dir.path()), 0);
}

#[tokio::test]
async fn chunks_never_exceed_the_chunk_size() {
    let dir = TempDir::new().unwrap();
    let link = FakeRemoteLink::new(false);
    let queue = client(dir.path(), &link).await;
    for n in 0..7 {
        queue.submit(record(&format!("tx-{n}"))).await;
    }

    link.set_connected(true);
    let report = queue.flush(3, DEFAULT_BULK_TIMEOUT).await;

    let sizes: Vec<usize> = link.bulk_calls().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(report.deleted, 7);
}

#[tokio::test]
async fn evidence_survives_restart_and_uploads_from_disk() {
    let dir = TempDir::new().unwrap();
    let link = FakeRemoteLink::new(false);

    // First run: clip written, record persisted while offline
    {
        let queue = client(dir.path(), &link).await;
        let path = queue
            .evidence()
            .attach_evidence("tx-9".into(), b"webm-bytes".to_vec(), "video/webm;codecs=vp9")
            .await
            .unwrap();
        let record = OfflineLogRecord::builder().transaction_id("tx-9").video_path(path).build();
        assert_eq!(queue.submit(record).await, SubmitOutcome::Persisted);
    }

    // Second run: nothing in memory, bindings rebuilt from disk
    let queue = client(dir.path(), &link).await;
    link.set_connected(true);
    assert_eq!(queue.flush(25, DEFAULT_BULK_TIMEOUT).await.deleted, 1);
    let video = queue.evidence().video_path(&"tx-9".into()).unwrap();
    assert!(video.exists(), "clip is kept until the server asks for it");

    let uploads = FakeUploader::new();
    let uploader = EvidenceUploader::new(queue.evidence().clone(), uploads.clone());
    let request = UploadRequest { transaction_id: "tx-9".into(), url: "https://bucket/put/tx-9".into() };
    let outcome = uploader.handle_upload_request(&request).await;

    assert_eq!(outcome, UploadOutcome::Uploaded(EvidenceSource::Disk));
    let calls = uploads.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].content_type, "video/webm");
    assert_eq!(calls[0].body, b"webm-bytes");
    assert!(!video.exists());
    assert!(!queue.evidence().is_bound(&"tx-9".into()));
}
