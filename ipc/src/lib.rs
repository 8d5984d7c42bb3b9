//! IPC (Inter-Process Communication) module
//!
//! This crate carries the control protocol between the daemon and the
//! console: newline-framed requests and responses over TCP, the discovery
//! file announcing the daemon's address, the server side that drives the
//! supervisor and the console client.

pub mod client;
pub mod error;
pub mod server;


pub use client::ConsoleClient;
pub use error::{IpcError, Result};
pub use server::{ControlPlane, ControlServer};

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Maximum allowed frame size for IPC messages (64KB)
/// This prevents unbounded memory growth from malicious or buggy peers
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Read one newline-terminated frame, without the line ending
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::with_capacity(256);
    loop {
        let chunk = reader
            .fill_buf()
            .await
            .map_err(|e| IpcError::ReceiveFailed(e.to_string()))?;
        if chunk.is_empty() {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(IpcError::ProtocolError(
                "incomplete frame: connection closed before newline terminator".to_string(),
            ));
        }

        let newline_pos = chunk.iter().position(|b| *b == b'\n');
        let to_copy = newline_pos.map_or(chunk.len(), |idx| idx + 1);
        let next_len = buffer.len() + to_copy;
        if next_len > MAX_FRAME_SIZE {
            return Err(IpcError::ProtocolError(format!(
                "Frame size {next_len} exceeds maximum allowed size of {MAX_FRAME_SIZE} bytes"
            )));
        }

        buffer.extend_from_slice(&chunk[..to_copy]);
        reader.consume(to_copy);
        if newline_pos.is_some() {
            break;
        }
    }

    // Trim trailing newline/carriage return
    if matches!(buffer.last(), Some(b'\n')) {
        buffer.pop();
        if matches!(buffer.last(), Some(b'\r')) {
            buffer.pop();
        }
    }
    Ok(Some(buffer))
}

/// Write `line` followed by a newline (unless it already ends with one)
pub async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let send = |e: std::io::Error| IpcError::SendFailed(e.to_string());
    writer.write_all(line.as_bytes()).await.map_err(send)?;
    if !line.ends_with('\n') {
        writer.write_all(b"\n").await.map_err(send)?;
    }
    writer.flush().await.map_err(send)
}

/// Publish the control address in `<temp_dir>/console.serviced.txt`
pub async fn write_discovery(temp_dir: &Path, addr: SocketAddr) -> Result<PathBuf> {
    let path = schema::discovery_path(temp_dir);
    tokio::fs::write(&path, addr.to_string())
        .await
        .map_err(|e| {
            IpcError::DiscoveryFailed(format!(
                "write console listen to {} fail with {}",
                path.display(),
                e
            ))
        })?;
    debug!("wrote control address {} to {}", addr, path.display());
    Ok(path)
}

/// Read the control address published by a running daemon
pub async fn read_discovery(temp_dir: &Path) -> Result<String> {
    let path = schema::discovery_path(temp_dir);
    let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
        IpcError::DiscoveryFailed(format!(
            "read console address from {} fail with {}",
            path.display(),
            e
        ))
    })?;
    let addr = text.trim();
    if addr.is_empty() {
        return Err(IpcError::DiscoveryFailed(format!(
            "console address in {} is empty",
            path.display()
        )));
    }
    Ok(addr.to_string())
}
