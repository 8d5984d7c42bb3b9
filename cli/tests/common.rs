#![allow(unused_crate_dependencies)]
//! Shared helpers for servicectl integration tests.
#![allow(missing_docs, dead_code)]

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Run the given future with a timeout, failing the test if it elapses.
///
/// # Panics
///
/// Panics if the timeout elapses before the future completes.
pub async fn run_with_timeout<F, T>(duration: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .expect("test timed out")
}

/// Fake daemon: publishes its address in `temp_dir`, answers one request
/// with `reply` and returns the request line it received.
pub async fn fake_daemon(temp_dir: &std::path::Path, reply: &'static str) -> JoinHandle<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    std::fs::write(temp_dir.join("console.serviced.txt"), addr.to_string()).unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        writer.write_all(reply.as_bytes()).await.unwrap();
        line.trim_end().to_string()
    })
}
