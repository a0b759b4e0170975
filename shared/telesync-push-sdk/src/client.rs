//! WebSocket push transport with automatic reconnection

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use telesync_core::MetricId;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::protocol::{Frame, Inbound};
use crate::{PushConfig, PushError, PushEvent, PushTransport, Result};

const EVENT_BUFFER: usize = 1024;

enum Command {
    Send(Frame),
    Close,
}

enum PumpOutcome {
    /// Closed locally; the connection task must stop
    Closed,
    /// Dropped by the peer or the network; reconnect
    Dropped(String),
}

/// Push transport over a WebSocket connection.
///
/// The connection lives in a background task that reconnects on drop and
/// reports lifecycle changes through the event receiver returned by
/// [`WsPushTransport::connect`]. Frames sent while disconnected are rejected
/// with [`PushError::NotConnected`]; subscriptions are expected to be re-armed
/// after the next `Authenticated` event.
pub struct WsPushTransport {
    token: String,
    commands: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
}

impl WsPushTransport {
    /// Spawn the connection task and return the transport plus its event stream
    pub fn connect(config: PushConfig) -> (Self, mpsc::Receiver<PushEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let connected = Arc::new(AtomicBool::new(false));

        let transport = Self {
            token: config.token.clone(),
            commands: command_tx,
            connected: connected.clone(),
        };

        let connection = Connection {
            config,
            commands: command_rx,
            events: event_tx,
            connected,
        };
        tokio::spawn(connection.run());

        (transport, event_rx)
    }

    fn send(&self, frame: Frame) -> Result<()> {
        if !self.is_connected() {
            return Err(PushError::NotConnected);
        }
        self.commands
            .send(Command::Send(frame))
            .map_err(|_| PushError::Closed)
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn authenticate(&self) -> Result<()> {
        self.send(Frame::authentication(&self.token))
    }

    async fn subscribe(&self, metric: &MetricId) -> Result<()> {
        self.send(Frame::subscribe(metric))
    }

    async fn unsubscribe(&self, metric: &MetricId) -> Result<()> {
        self.send(Frame::unsubscribe(metric))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Stop the connection task
    fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

struct Connection {
    config: PushConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<PushEvent>,
    connected: Arc<AtomicBool>,
}

impl Connection {
    async fn run(mut self) {
        let mut sessions: u32 = 0;
        let mut failed_attempts: u32 = 0;

        loop {
            info!(url = %self.config.url, "Connecting to push server");

            match connect_async(self.config.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    failed_attempts = 0;
                    if !self.drain_stale_commands() {
                        return;
                    }
                    self.connected.store(true, Ordering::SeqCst);

                    let event = if sessions == 0 {
                        PushEvent::Connected
                    } else {
                        PushEvent::Reconnected { attempt: sessions }
                    };
                    sessions += 1;
                    if !self.emit(event).await {
                        return;
                    }

                    let outcome = self.pump(ws_stream).await;
                    self.connected.store(false, Ordering::SeqCst);

                    match outcome {
                        PumpOutcome::Closed => {
                            info!("Push transport closed");
                            return;
                        }
                        PumpOutcome::Dropped(reason) => {
                            warn!(reason = %reason, "Push connection lost");
                            if !self.emit(PushEvent::Disconnected { reason }).await {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    failed_attempts += 1;
                    warn!(error = %e, attempt = failed_attempts, "Failed to connect to push server");

                    if self.config.max_reconnect_attempts > 0
                        && failed_attempts >= self.config.max_reconnect_attempts
                    {
                        let _ = self
                            .emit(PushEvent::Error {
                                message: format!(
                                    "Max reconnect attempts ({}) reached",
                                    self.config.max_reconnect_attempts
                                ),
                            })
                            .await;
                        return;
                    }
                }
            }

            debug!(
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "Waiting before reconnect"
            );
            if !self.wait_before_retry().await {
                return;
            }
        }
    }

    /// Drop frames queued while the link was down. Returns false on close.
    fn drain_stale_commands(&mut self) -> bool {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Send(frame) => {
                    debug!(event = %frame.event, "Dropping frame queued while disconnected")
                }
                Command::Close => return false,
            }
        }
        true
    }

    /// Sleep for the reconnect delay. Returns false if closed meanwhile.
    async fn wait_before_retry(&mut self) -> bool {
        let deadline = Instant::now() + self.config.reconnect_delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        debug!(event = %frame.event, "Dropping frame while disconnected");
                    }
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    async fn pump(&mut self, ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> PumpOutcome {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        let text = match frame.encode() {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "Failed to encode outbound frame");
                                continue;
                            }
                        };
                        if let Err(e) = write.send(Message::Text(text)).await {
                            return PumpOutcome::Dropped(e.to_string());
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        return PumpOutcome::Closed;
                    }
                },
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if !self.handle_text(&text).await {
                            return PumpOutcome::Closed;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return PumpOutcome::Dropped(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpOutcome::Dropped(e.to_string()),
                    None => return PumpOutcome::Dropped("stream ended".to_string()),
                },
            }
        }
    }

    /// Returns false once nobody listens for events any more.
    async fn handle_text(&self, text: &str) -> bool {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to parse push frame");
                return true;
            }
        };

        match frame.into_inbound() {
            Inbound::Authenticated => self.emit(PushEvent::Authenticated).await,
            Inbound::LastValue { metric, payload } => {
                self.emit(PushEvent::Value { metric, payload }).await
            }
            Inbound::Other(event) => {
                trace!(event = %event, "Ignoring push frame");
                true
            }
        }
    }

    async fn emit(&self, event: PushEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}
