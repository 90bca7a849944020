use tokio::sync::{mpsc, oneshot, watch};

use super::PublishSession;
use crate::domain::errors::{DomainError, Result};
use crate::domain::events::{FrameReceiver, SessionEvent, SessionEventReceiver, SessionEventSender};
use crate::domain::value_objects::SessionSnapshot;

const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Controller requests, answered once the session has processed them
#[derive(Debug)]
pub enum SessionCommand {
    RequestPublish {
        url: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SwitchCamera {
        reply: oneshot::Sender<Result<()>>,
    },
    SetBitrate {
        bitrate: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    PauseForwarding {
        reply: oneshot::Sender<Result<()>>,
    },
    ResumeForwarding {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Owns a `PublishSession` and feeds it every input from one task, so state
/// transitions never interleave.
pub struct SessionRunner {
    session: PublishSession,
    commands: mpsc::Receiver<SessionCommand>,
    events: SessionEventReceiver,
    frames: FrameReceiver,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl SessionRunner {
    pub fn new(
        session: PublishSession,
        event_sender: SessionEventSender,
        events: SessionEventReceiver,
        frames: FrameReceiver,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        let runner = Self {
            session,
            commands: command_rx,
            events,
            frames,
            snapshot: snapshot_tx,
        };

        let handle = SessionHandle {
            commands: command_tx,
            events: event_sender,
            snapshot: snapshot_rx,
        };

        (runner, handle)
    }

    /// Process inputs until shutdown or until every handle is dropped.
    /// Returns the session for inspection.
    pub async fn run(mut self) -> PublishSession {
        tracing::info!(session_id = %self.session.id(), "Publish session runner started");

        loop {
            // Events first: a surface event sent before a command is seen before it
            tokio::select! {
                biased;

                Some(event) = self.events.recv() => {
                    self.session.handle_event(event);
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!(session_id = %self.session.id(), "All session handles dropped");
                        self.session.shutdown();
                        break;
                    };
                    if self.handle_command(command) {
                        break;
                    }
                }
                Some(frame) = self.frames.recv() => {
                    self.session.on_frame(frame);
                    continue;
                }
            }

            self.publish_snapshot();
        }

        self.publish_snapshot();
        tracing::info!(session_id = %self.session.id(), "Publish session runner stopped");
        self.session
    }

    /// Returns true when the runner should exit
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::RequestPublish { url, reply } => {
                let result = self.session.request_publish(&url);
                if let Err(e) = &result {
                    tracing::warn!(session_id = %self.session.id(), error = %e, "Publish request rejected");
                }
                self.reply(reply, result);
            }
            SessionCommand::Stop { reply } => {
                self.session.stop();
                self.reply(reply, ());
            }
            SessionCommand::SwitchCamera { reply } => {
                let result = self.session.switch_camera();
                self.reply(reply, result);
            }
            SessionCommand::SetBitrate { bitrate, reply } => {
                let result = self.session.set_bitrate(bitrate);
                self.reply(reply, result);
            }
            SessionCommand::PauseForwarding { reply } => {
                let result = self.session.pause_forwarding();
                self.reply(reply, result);
            }
            SessionCommand::ResumeForwarding { reply } => {
                let result = self.session.resume_forwarding();
                self.reply(reply, result);
            }
            SessionCommand::Shutdown { reply } => {
                self.session.shutdown();
                self.reply(reply, ());
                return true;
            }
        }
        false
    }

    /// The snapshot is current by the time the caller sees the reply
    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish_snapshot();
        let _ = reply.send(value);
    }

    fn publish_snapshot(&self) {
        let snapshot = self.session.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Cloneable controller-side handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: SessionEventSender,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub async fn request_publish(&self, url: impl Into<String>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::RequestPublish {
            url: url.into(),
            reply,
        })
        .await?;
        response.await.map_err(|_| DomainError::SessionClosed)?
    }

    pub async fn stop(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Stop { reply }).await?;
        response.await.map_err(|_| DomainError::SessionClosed)
    }

    pub async fn switch_camera(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::SwitchCamera { reply }).await?;
        response.await.map_err(|_| DomainError::SessionClosed)?
    }

    pub async fn set_bitrate(&self, bitrate: u32) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::SetBitrate { bitrate, reply })
            .await?;
        response.await.map_err(|_| DomainError::SessionClosed)?
    }

    pub async fn pause_forwarding(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::PauseForwarding { reply }).await?;
        response.await.map_err(|_| DomainError::SessionClosed)?
    }

    pub async fn resume_forwarding(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::ResumeForwarding { reply }).await?;
        response.await.map_err(|_| DomainError::SessionClosed)?
    }

    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Shutdown { reply }).await?;
        response.await.map_err(|_| DomainError::SessionClosed)
    }

    pub fn surface_created(&self) -> Result<()> {
        self.emit(SessionEvent::SurfaceCreated)
    }

    pub fn surface_changed(&self, width: u32, height: u32) -> Result<()> {
        self.emit(SessionEvent::SurfaceChanged { width, height })
    }

    pub fn surface_destroyed(&self) -> Result<()> {
        self.emit(SessionEvent::SurfaceDestroyed)
    }

    /// Inject any session event (surface, transport or timer)
    pub fn emit(&self, event: SessionEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| DomainError::SessionClosed)
    }

    pub fn event_sender(&self) -> SessionEventSender {
        self.events.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DomainError::SessionClosed)
    }
}
