//! Session Driver
//!
//! The single logical execution context of the client: one task that feeds
//! the engine signaling frames, WebRTC engine events, UI commands, and
//! timer ticks. No other code mutates session state.

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use crate::error::SessionError;
use crate::peer::PeerEvent;
use crate::session::SessionEngine;
use crate::transport::TransportEvent;

/// UI commands posted into the driver.
#[derive(Debug)]
pub enum Command {
    Chat(Value),
    SendFile {
        name: String,
        mime: String,
        bytes: Vec<u8>,
    },
    StartVoice,
    StopVoice,
    SetNc(bool),
    EndSession,
}

/// Cloneable handle the UI uses to talk to the driver task.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    fn post(&self, command: Command) -> Result<(), SessionError> {
        self.cmd_tx
            .send(command)
            .map_err(|_| SessionError::TransportClosed)
    }

    pub fn send_message(&self, data: Value) -> Result<(), SessionError> {
        self.post(Command::Chat(data))
    }

    pub fn send_file(&self, name: String, mime: String, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.post(Command::SendFile { name, mime, bytes })
    }

    pub fn start_voice_chat(&self) -> Result<(), SessionError> {
        self.post(Command::StartVoice)
    }

    pub fn stop_voice_chat(&self) -> Result<(), SessionError> {
        self.post(Command::StopVoice)
    }

    pub fn set_nc_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        self.post(Command::SetNc(enabled))
    }

    pub fn end_session(&self) -> Result<(), SessionError> {
        self.post(Command::EndSession)
    }
}

/// Spawn the driver task over an engine and its input streams.
pub fn spawn(
    mut engine: SessionEngine,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    mut peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
) -> (SessionHandle, JoinHandle<()>) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();

    let task = tokio::spawn(async move {
        loop {
            let deadline = engine.next_deadline();

            tokio::select! {
                event = transport_rx.recv() => match event {
                    Some(TransportEvent::Open) => {
                        log_err(engine.on_transport_open(Instant::now()).await);
                    }
                    Some(TransportEvent::Frame(frame)) => {
                        log_err(engine.handle_frame(frame).await);
                    }
                    Some(TransportEvent::Closed) => engine.on_transport_closed(),
                    None => break,
                },

                event = peer_rx.recv() => match event {
                    Some(event) => {
                        log_err(engine.handle_peer_event(event, Instant::now()).await);
                    }
                    None => break,
                },

                command = cmd_rx.recv() => match command {
                    Some(command) => handle_command(&mut engine, command).await,
                    None => break,
                },

                () = sleep_until(deadline) => {
                    log_err(engine.on_tick(Instant::now()).await);
                }
            }
        }
    });

    (SessionHandle { cmd_tx }, task)
}

async fn handle_command(engine: &mut SessionEngine, command: Command) {
    match command {
        Command::Chat(data) => engine.send_chat(data),
        Command::SendFile { name, mime, bytes } => engine.send_file(&name, &mime, &bytes),
        Command::StartVoice => log_err(engine.start_voice().await),
        Command::StopVoice => log_err(engine.stop_voice().await),
        Command::SetNc(enabled) => engine.set_nc_enabled(enabled),
        Command::EndSession => log_err(engine.end_session().await),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn log_err(result: Result<(), SessionError>) {
    if let Err(e) = result {
        warn!(error = %e, "Session engine error");
    }
}
