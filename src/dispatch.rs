//! Event loop
//!
//! One thread, one loop. Each iteration runs the tasks deferred by the
//! previous one, repaints what changed, flushes queued requests and then
//! waits for exactly one source: a compositor event, a timer task, SIGCHLD
//! or a termination signal.

use crate::config::Config;
use crate::desktop::Desktop;
use crate::ipc::{self, Connection};
use crate::shell::launcher;
use crate::toolkit::SurfaceId;
use anyhow::{Context, Result};
use tessera_ipc::ShellRequest;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Unit of work run on the loop thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// A panel clock's timer expired
    ClockTick { panel: SurfaceId },
    /// Confirm the unlock and drop the dialog
    FinishUnlock,
}

/// Handle timer sources use to queue tasks for the loop
#[derive(Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskSender {
    /// Returns false once the loop is gone
    pub fn send(&self, task: Task) -> bool {
        self.tx.send(task).is_ok()
    }
}

pub fn task_channel() -> (TaskSender, mpsc::UnboundedReceiver<Task>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskSender { tx }, rx)
}

pub struct EventLoop {
    desktop: Desktop,
    connection: Connection,
    requests: mpsc::UnboundedReceiver<ShellRequest>,
    tasks: mpsc::UnboundedReceiver<Task>,
}

impl EventLoop {
    pub fn new(config: &Config, connection: Connection) -> Self {
        let (ipc, requests) = ipc::channel();
        let (task_sender, tasks) = task_channel();

        Self {
            desktop: Desktop::new(config, ipc, task_sender),
            connection,
            requests,
            tasks,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut sigchld = signal(SignalKind::child()).context("failed to watch SIGCHLD")?;
        let mut sigterm = signal(SignalKind::terminate()).context("failed to watch SIGTERM")?;
        let mut sigint = signal(SignalKind::interrupt()).context("failed to watch SIGINT")?;

        info!("Starting main event loop");

        loop {
            self.desktop.run_deferred();
            self.desktop.redraw();
            if let Err(e) = self.flush().await {
                warn!("Lost compositor connection: {:#}", e);
                break;
            }

            tokio::select! {
                event = self.connection.next_event() => match event {
                    Some(event) => {
                        debug!("Event: {:?}", event);
                        self.desktop.handle_event(event);
                    }
                    None => {
                        info!("Compositor closed the connection");
                        break;
                    }
                },

                Some(task) = self.tasks.recv() => self.desktop.run_task(task),

                _ = sigchld.recv() => launcher::reap_children(),

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }

                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
            }
        }

        self.desktop.shutdown();
        if let Err(e) = self.flush().await {
            debug!("Could not flush teardown requests: {:#}", e);
        }
        info!("Event loop finished");
        Ok(())
    }

    /// Write every queued request to the socket
    async fn flush(&mut self) -> Result<()> {
        while let Ok(request) = self.requests.try_recv() {
            self.connection.send(&request).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_ipc::{read_frame, write_frame, FramedMessage, ShellEvent, DESKTOP_SHELL_INTERFACE};
    use tokio::net::UnixStream;

    #[test]
    fn test_task_sender_reports_closed_loop() {
        let (tasks, rx) = task_channel();
        assert!(tasks.send(Task::FinishUnlock));
        drop(rx);
        assert!(!tasks.send(Task::FinishUnlock));
    }

    #[tokio::test]
    async fn test_loop_binds_shell_and_exits_on_hangup() {
        let (ours, mut compositor) = UnixStream::pair().unwrap();
        let event_loop = EventLoop::new(&Config::default(), Connection::from_stream(ours));
        let running = tokio::spawn(event_loop.run());

        write_frame(
            &mut compositor,
            &ShellEvent::Global { name: 1, interface: DESKTOP_SHELL_INTERFACE.into(), version: 5 },
        )
        .await
        .unwrap();

        let frame = read_frame(&mut compositor).await.unwrap().unwrap();
        assert_eq!(
            FramedMessage::decode_request(&frame).unwrap(),
            ShellRequest::Bind { name: 1, interface: DESKTOP_SHELL_INTERFACE.into(), version: 2 }
        );

        drop(compositor);
        running.await.unwrap().unwrap();
    }
}
