//! Progress line sink for group and bulk operations

use tokio::sync::mpsc;

/// Destination for human-readable progress lines
///
/// Lines are forwarded to whoever holds the receiving end; a sink without
/// a receiver (or whose receiver is gone) silently drops them.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl Progress {
    /// Sink that drops every line
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Sink paired with a receiver of its lines
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Emit one line
    pub fn line(&self, line: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(line.into());
        }
    }
}
