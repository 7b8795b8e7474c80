//! IPC client for communicating with the compositor

use anyhow::{Context, Result};
use std::path::Path;
use tessera_ipc::{read_frame, write_frame, FramedMessage, ShellEvent, ShellRequest};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Queue for requests to the compositor.
///
/// Requests are buffered and written out by the event loop between
/// dispatch iterations, so sending never blocks.
#[derive(Clone)]
pub struct IpcSender {
    tx: mpsc::UnboundedSender<ShellRequest>,
}

impl IpcSender {
    /// Queue a request for the compositor
    pub fn send(&self, request: ShellRequest) {
        if let Err(e) = self.tx.send(request) {
            error!("Failed to queue request: {}", e);
        }
    }
}

/// Create a request queue and the receiving end the event loop drains
pub fn channel() -> (IpcSender, mpsc::UnboundedReceiver<ShellRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IpcSender { tx }, rx)
}

/// The display connection to the compositor
pub struct Connection {
    events: mpsc::UnboundedReceiver<ShellEvent>,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Connect to the compositor's shell socket
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        info!("Connecting to compositor at {:?}", socket_path);
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("failed to create display: cannot connect to {:?}", socket_path))?;
        info!("Connected to compositor");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: UnixStream) -> Self {
        let (mut reader, writer) = stream.into_split();
        let (tx, events) = mpsc::unbounded_channel();

        // Spawn reader task; dropping `tx` on exit ends the event stream
        let reader = tokio::spawn(async move {
            loop {
                let frame = match read_frame(&mut reader).await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Compositor connection error: {}", e);
                        break;
                    }
                };

                match FramedMessage::decode_event(&frame) {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to decode event: {}", e);
                    }
                }
            }
            debug!("Reader task ended");
        });

        Self {
            events,
            writer,
            reader,
        }
    }

    /// Next compositor event; `None` once the compositor hung up.
    ///
    /// Cancel-safe, so it can sit in a `select!`.
    pub async fn next_event(&mut self) -> Option<ShellEvent> {
        self.events.recv().await
    }

    /// Write one request to the socket
    pub async fn send(&mut self, request: &ShellRequest) -> Result<()> {
        write_frame(&mut self.writer, request)
            .await
            .context("failed to send request to compositor")
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_exchanges_frames() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let mut conn = Connection::from_stream(ours);

        write_frame(&mut theirs, &ShellEvent::PrepareLockSurface).await.unwrap();
        assert_eq!(conn.next_event().await, Some(ShellEvent::PrepareLockSurface));

        conn.send(&ShellRequest::Unlock).await.unwrap();
        let frame = read_frame(&mut theirs).await.unwrap().unwrap();
        assert_eq!(FramedMessage::decode_request(&frame).unwrap(), ShellRequest::Unlock);

        drop(theirs);
        assert_eq!(conn.next_event().await, None);
    }

    #[tokio::test]
    async fn test_undecodable_frames_are_skipped() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let mut conn = Connection::from_stream(ours);

        write_frame(&mut theirs, &serde_json::json!({"type": "Bogus"})).await.unwrap();
        write_frame(&mut theirs, &ShellEvent::GrabCursor { cursor: 7 }).await.unwrap();

        assert_eq!(conn.next_event().await, Some(ShellEvent::GrabCursor { cursor: 7 }));
    }

    #[test]
    fn test_sender_queues_in_order() {
        let (ipc, mut rx) = channel();
        ipc.send(ShellRequest::Unlock);
        ipc.send(ShellRequest::DesktopReady);

        assert_eq!(rx.try_recv().unwrap(), ShellRequest::Unlock);
        assert_eq!(rx.try_recv().unwrap(), ShellRequest::DesktopReady);
        assert!(rx.try_recv().is_err());
    }
}
