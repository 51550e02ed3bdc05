//! WebSocket transport implementation
//!
//! A background task owns the socket for its whole lifecycle:
//! connect, read frames and route them to the event bus, process outbound
//! commands, and reconnect with exponential backoff after failures.
//! The public handle only ever talks to the task over channels.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::events::{ClientEvent, EventBus};
use msgcache::PresenceStatus;

use super::status::ConnectionStatus;

/// Capacity of the outbound command channel
const COMMAND_CHANNEL_CAPACITY: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors surfaced by the transport handle
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    #[error("Transport task is not running")]
    ChannelClosed,
}

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WsTransportConfig {
    /// Endpoint URL (ws:// or wss://)
    pub url: String,
    /// Bearer token, forwarded as a query parameter
    pub token: Option<String>,
    /// Active establishment id, forwarded as a query parameter
    pub etab_id: Option<String>,
    /// Active role, forwarded as a query parameter
    pub role: Option<String>,
    /// Initial reconnect delay
    pub reconnect_initial_delay: Duration,
    /// Backoff cap
    pub reconnect_max_delay: Duration,
    /// Attempts before giving up; None retries forever
    pub max_reconnect_attempts: Option<u32>,
}

/// Commands sent from the public handle to the background task
#[derive(Debug)]
enum TransportCmd {
    /// Serialize and send a frame to the server
    Send(ClientEvent),
    /// Close the connection and stop the task
    Shutdown,
}

/// How a connected session ended
enum SessionEnd {
    /// Shutdown was requested; do not reconnect
    Shutdown,
    /// Server closed the connection or the stream ended
    Closed,
    /// Read or write error
    Failed,
}

/// Handle to the WebSocket transport
///
/// Spawning starts the background connection task; the handle exposes the
/// status watch channel and the outbound command surface.
pub struct WsTransport {
    cmd_tx: mpsc::Sender<TransportCmd>,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl WsTransport {
    /// Spawn the transport task
    ///
    /// The initial status is `Disconnected`; the task immediately starts
    /// its first connection attempt.
    pub fn spawn(config: WsTransportConfig, bus: Arc<EventBus>) -> Result<Self, TransportError> {
        let url = build_ws_url(&config)?;
        // Log the configured URL, not the built one: the query may carry a token
        debug!(url = %config.url, "WsTransport::spawn");

        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let task = tokio::spawn(transport_task(url, config, bus, status_tx, cmd_rx));

        Ok(Self { cmd_tx, status_rx, task })
    }

    /// Get a receiver for connection status changes
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Send a typing start/stop signal for a conversation
    pub async fn send_typing(&self, conversation_id: &str, is_typing: bool) -> Result<(), TransportError> {
        let event = if is_typing {
            ClientEvent::TypingStart {
                conversation_id: conversation_id.to_string(),
                timestamp: Utc::now(),
            }
        } else {
            ClientEvent::TypingStop {
                conversation_id: conversation_id.to_string(),
                timestamp: Utc::now(),
            }
        };
        self.send(event).await
    }

    /// Send a presence update
    pub async fn send_presence(&self, status: PresenceStatus) -> Result<(), TransportError> {
        self.send(ClientEvent::PresenceUpdate {
            status,
            timestamp: Utc::now(),
        })
        .await
    }

    async fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        self.cmd_tx
            .send(TransportCmd::Send(event))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Close the connection and stop the task
    pub async fn shutdown(self) {
        debug!("WsTransport::shutdown");
        // Ignore send errors: the task may already be gone
        let _ = self.cmd_tx.send(TransportCmd::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "Transport task did not shut down cleanly");
        }
    }
}

/// Build the connection URL with auth and tenant context query parameters
fn build_ws_url(config: &WsTransportConfig) -> Result<reqwest::Url, TransportError> {
    let mut url =
        reqwest::Url::parse(&config.url).map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.url)))?;

    // Only touch the query when there is something to add; an empty
    // serializer would leave a dangling `?` behind
    if config.token.is_some() || config.etab_id.is_some() || config.role.is_some() {
        let mut pairs = url.query_pairs_mut();
        if let Some(token) = &config.token {
            pairs.append_pair("token", token);
        }
        if let Some(etab_id) = &config.etab_id {
            pairs.append_pair("etab_id", etab_id);
        }
        if let Some(role) = &config.role {
            pairs.append_pair("role", role);
        }
    }

    Ok(url)
}

/// Exponential backoff delay for the given attempt (1-based)
fn reconnect_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let initial_ms = initial.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let delay_ms = initial_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(max_ms);
    Duration::from_millis(delay_ms)
}

/// The main background task managing the WebSocket connection
///
/// Lifecycle:
/// 1. Connect and publish `Connected` (resetting the attempt counter)
/// 2. Enter session loop: route frames to the bus + process commands
/// 3. On disconnect: publish the new status and back off before retrying
/// 4. After the configured attempts are exhausted, stay down until shutdown
async fn transport_task(
    url: reqwest::Url,
    config: WsTransportConfig,
    bus: Arc<EventBus>,
    status_tx: watch::Sender<ConnectionStatus>,
    mut cmd_rx: mpsc::Receiver<TransportCmd>,
) {
    let mut attempts: u32 = 0;

    loop {
        status_tx.send_replace(ConnectionStatus::Connecting);
        debug!(attempt = attempts + 1, "transport_task: connecting");

        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!("WebSocket connected");
                attempts = 0;
                status_tx.send_replace(ConnectionStatus::Connected);

                match run_session(stream, &bus, &mut cmd_rx).await {
                    SessionEnd::Shutdown => {
                        status_tx.send_replace(ConnectionStatus::Disconnected);
                        info!("WebSocket closed (shutdown requested)");
                        return;
                    }
                    SessionEnd::Closed => {
                        status_tx.send_replace(ConnectionStatus::Disconnected);
                        info!("WebSocket connection closed");
                    }
                    SessionEnd::Failed => {
                        status_tx.send_replace(ConnectionStatus::Error);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "WebSocket connect failed");
                status_tx.send_replace(ConnectionStatus::Error);
            }
        }

        attempts += 1;
        if let Some(max) = config.max_reconnect_attempts {
            if attempts > max {
                warn!(attempts, "Reconnect attempts exhausted, transport staying down");
                // Keep draining commands so late senders see a warning
                // rather than a closed channel, until shutdown arrives.
                while let Some(cmd) = cmd_rx.recv().await {
                    match cmd {
                        TransportCmd::Shutdown => return,
                        TransportCmd::Send(event) => {
                            warn!(event_type = ?event, "Dropping outbound frame, transport is down");
                        }
                    }
                }
                return;
            }
        }

        let delay = reconnect_delay(attempts, config.reconnect_initial_delay, config.reconnect_max_delay);
        info!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

        // Wait out the backoff delay, but keep listening for shutdown
        let deadline = tokio::time::Instant::now() + delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(TransportCmd::Shutdown) | None => {
                        status_tx.send_replace(ConnectionStatus::Disconnected);
                        return;
                    }
                    Some(TransportCmd::Send(event)) => {
                        warn!(event_type = ?event, "Dropping outbound frame, transport is down");
                    }
                },
            }
        }
    }
}

/// Run one connected session until it ends
async fn run_session(stream: WsStream, bus: &EventBus, cmd_rx: &mut mpsc::Receiver<TransportCmd>) -> SessionEnd {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(bus, text.as_str()),
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = sink.send(Message::Pong(payload)).await {
                        warn!(error = %e, "Failed to answer ping");
                        return SessionEnd::Failed;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server closed the connection");
                    return SessionEnd::Closed;
                }
                // Binary and pong frames carry nothing for us
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read error");
                    return SessionEnd::Failed;
                }
                None => {
                    debug!("WebSocket stream ended");
                    return SessionEnd::Closed;
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(TransportCmd::Send(event)) => {
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if let Err(e) = sink.send(Message::Text(json.into())).await {
                                warn!(error = %e, "WebSocket send failed");
                                return SessionEnd::Failed;
                            }
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize outbound frame"),
                    }
                }
                Some(TransportCmd::Shutdown) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            },
        }
    }
}

/// Parse a server frame and emit it on the bus
///
/// Unparseable frames are logged and skipped; one bad frame must not
/// take the session down.
fn handle_frame(bus: &EventBus, text: &str) {
    match serde_json::from_str(text) {
        Ok(event) => bus.emit(event),
        Err(e) => warn!(error = %e, "Discarding unparseable frame"),
    }
}
