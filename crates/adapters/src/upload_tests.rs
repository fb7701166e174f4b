// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Captured request as seen by the test server.
struct Received {
    head: String,
    body: Vec<u8>,
}

/// One-shot HTTP server answering with `status`.
async fn serve_once(status: u16) -> (String, tokio::task::JoinHandle<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/upload/tx1", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let (head, body_start) = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break (String::from_utf8_lossy(&buf[..pos]).to_string(), pos + 4);
            }
        };
        let length = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        let mut body = buf[body_start..].to_vec();
        while body.len() < length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0);
            body.extend_from_slice(&chunk[..n]);
        }
        let response = format!("HTTP/1.1 {status} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        stream.write_all(response.as_bytes()).await.unwrap();
        Received { head, body }
    });
    (url, handle)
}

#[tokio::test]
async fn put_sends_body_with_content_type() {
    let (url, server) = serve_once(200).await;

    HttpUploader::new().unwrap().put(&url, "video/webm", b"clip-bytes".to_vec()).await.unwrap();

    let received = server.await.unwrap();
    assert!(received.head.starts_with("PUT /upload/tx1 HTTP/1.1"), "{}", received.head);
    assert!(received.head.to_ascii_lowercase().contains("content-type: video/webm"));
    assert_eq!(received.body, b"clip-bytes");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (url, server) = serve_once(500).await;

    let result = HttpUploader::new().unwrap().put(&url, "video/mp4", vec![1, 2, 3]).await;

    assert_eq!(result, Err(UploadError::Status(500)));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_url_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/upload", listener.local_addr().unwrap());
    drop(listener);

    let result = HttpUploader::new().unwrap().put(&url, "video/webm", Vec::new()).await;

    assert!(matches!(result, Err(UploadError::Http(_))));
}

#[tokio::test]
async fn stalled_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/upload", listener.local_addr().unwrap());
    // Accept and read, never answer
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink).await;
    });

    let uploader = HttpUploader::with_timeout(Duration::from_millis(200)).unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        uploader.put(&url, "video/webm", b"clip".to_vec()),
    )
    .await
    .expect("upload should give up on its own");

    assert!(matches!(result, Err(UploadError::Http(_))), "got {result:?}");
    server.abort();
}

#[tokio::test]
async fn fake_records_calls_and_replays_failures() {
    let uploader = FakeUploader::new();
    uploader.fail_next(UploadError::Status(403));

    let first = uploader.put("http://u/1", "video/webm", vec![1]).await;
    let second = uploader.put("http://u/1", "video/webm", vec![1]).await;

    assert_eq!(first, Err(UploadError::Status(403)));
    assert_eq!(second, Ok(()));
    assert_eq!(uploader.calls().len(), 2);
    assert_eq!(uploader.calls()[0].url, "http://u/1");
}
