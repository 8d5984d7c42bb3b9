//! Console client for the control protocol
//!
//! One connection, one request at a time. A background reader forwards
//! progress lines to an output sink and routes terminal markers, in arrival
//! order, to the request waiting for them.

use crate::{read_line, write_line, IpcError, Result};
use schema::{Command, Reply, Target};
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Capacity of the completion channel between reader and requester
const COMPLETION_CAPACITY: usize = 8;

type Completion = std::result::Result<(), String>;

/// Connected console
#[derive(Debug)]
pub struct ConsoleClient {
    writer: OwnedWriteHalf,
    done: mpsc::Receiver<Completion>,
    reader: JoinHandle<()>,
}

impl ConsoleClient {
    /// Dial the daemon announced in `<temp_dir>/console.serviced.txt`
    pub async fn bootstrap<W>(temp_dir: &Path, sink: W) -> Result<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let addr = crate::read_discovery(temp_dir).await?;
        Self::dial(&addr, sink).await
    }

    /// Connect to a daemon at `addr` (`host:port`)
    pub async fn dial<W>(addr: &str, sink: W) -> Result<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            IpcError::ConnectionFailed(format!("connect console by {} fail with {}", addr, e))
        })?;
        debug!("connected to console at {}", addr);

        let (reader, writer) = stream.into_split();
        let (done_tx, done) = mpsc::channel(COMPLETION_CAPACITY);
        let reader = tokio::spawn(copy_replies(reader, sink, done_tx));
        Ok(Self {
            writer,
            done,
            reader,
        })
    }

    /// Include a group definition file
    pub async fn add(&mut self, group_file: &str) -> Result<()> {
        self.request(&Command::Add(group_file.to_string())).await
    }

    /// Remove a group
    pub async fn remove(&mut self, group: &str) -> Result<()> {
        self.request(&Command::Remove(group.to_string())).await
    }

    /// Start a group, or every group with `all`
    pub async fn start(&mut self, group: &str) -> Result<()> {
        self.request(&Command::Start(Target::parse(group))).await
    }

    /// Stop a group, or every group with `all`
    pub async fn stop(&mut self, group: &str) -> Result<()> {
        self.request(&Command::Stop(Target::parse(group))).await
    }

    /// Print the status table of a group, or every group with `all`
    pub async fn list(&mut self, group: &str) -> Result<()> {
        self.request(&Command::List(Target::parse(group))).await
    }

    /// Send one command and wait for its terminal marker
    pub async fn request(&mut self, command: &Command) -> Result<()> {
        write_line(&mut self.writer, &command.to_line()).await?;
        match self.done.recv().await {
            Some(Ok(())) => Ok(()),
            Some(Err(message)) => Err(IpcError::Remote(message)),
            None => Err(IpcError::ConnectionClosed),
        }
    }

    /// Close the connection and wait for pending output to be flushed
    pub async fn close(mut self) -> Result<()> {
        // The daemon may already have hung up
        if let Err(e) = self.writer.shutdown().await {
            debug!("console shutdown: {}", e);
        }
        self.reader
            .await
            .map_err(|e| IpcError::ReceiveFailed(e.to_string()))
    }
}

async fn copy_replies<W>(reader: OwnedReadHalf, mut sink: W, done: mpsc::Sender<Completion>)
where
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let frame = match read_line(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("console reader stopped: {}", e);
                break;
            }
        };
        let text = String::from_utf8_lossy(&frame);
        let completion = match Reply::classify(&text) {
            Reply::Ok => Ok(()),
            Reply::Err(message) => Err(message.to_string()),
            Reply::Progress(line) => {
                if let Err(e) = write_line(&mut sink, line).await {
                    warn!("console output failed: {}", e);
                }
                continue;
            }
        };
        if done.send(completion).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Sink collecting everything written to it
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl AsyncWrite for Captured {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Server answering each request with the canned replies, in order
    async fn scripted_server(replies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            let mut requests = Vec::new();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                requests.push(line.trim_end().to_string());
                writer.write_all(reply.as_bytes()).await.unwrap();
            }
            requests
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_progress_goes_to_sink_and_ok_completes() {
        let (addr, server) =
            scripted_server(vec!["all service is starting\n  g/s is started  \n==OK:\n"]).await;
        let sink = Captured::default();
        let mut client = ConsoleClient::dial(&addr, sink.clone()).await.unwrap();

        client.start("all").await.unwrap();
        client.close().await.unwrap();

        assert_eq!(sink.text(), "all service is starting\ng/s is started\n");
        assert_eq!(server.await.unwrap(), vec![r#"["start","all"]"#]);
    }

    #[tokio::test]
    async fn test_err_marker_becomes_remote_error() {
        let (addr, server) = scripted_server(vec![
            "web service is starting\n==ERR:group web is not exist\n",
            "==OK:\n",
        ])
        .await;
        let sink = Captured::default();
        let mut client = ConsoleClient::dial(&addr, sink.clone()).await.unwrap();

        match client.start("web").await {
            Err(IpcError::Remote(message)) => assert_eq!(message, "group web is not exist"),
            other => panic!("expected remote error, got {other:?}"),
        }
        client.list("web").await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests, vec![r#"["start","web"]"#, r#"["list","web"]"#]);
        assert_eq!(sink.text(), "web service is starting\n");
    }

    #[tokio::test]
    async fn test_closed_connection_is_reported() {
        let (addr, server) = scripted_server(vec!["partial progress\n"]).await;
        let mut client = ConsoleClient::dial(&addr, Captured::default()).await.unwrap();

        let result = client.stop("web").await;
        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_bootstrap_reads_discovery_file() {
        let (addr, server) = scripted_server(vec!["==OK:\n"]).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("console.serviced.txt"), &addr).unwrap();

        let mut client = ConsoleClient::bootstrap(dir.path(), Captured::default())
            .await
            .unwrap();
        client.remove("web").await.unwrap();
        assert_eq!(server.await.unwrap(), vec![r#"["remove","web"]"#]);
    }

    #[tokio::test]
    async fn test_dial_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = ConsoleClient::dial(&addr, Captured::default()).await.unwrap_err();
        assert_eq!(err.code(), "IPC001");
    }
}
