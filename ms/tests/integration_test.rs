//! Integration tests for MsgSync
//!
//! These tests verify end-to-end behavior of the engine components:
//! transport against a real WebSocket server, events flowing through the
//! pump into state, and the coordinator against an in-test handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

use msgsync::events::{ChatEvent, EventBus};
use msgsync::state::{StateEvent, StateManager, spawn_event_pump};
use msgsync::sync::{SyncCoordinator, SyncError, SyncHandler};
use msgsync::transport::{ConnectionStatus, WsTransport, WsTransportConfig};

// =============================================================================
// Helpers
// =============================================================================

fn transport_config(url: String) -> WsTransportConfig {
    WsTransportConfig {
        url,
        token: None,
        etab_id: None,
        role: None,
        reconnect_initial_delay: Duration::from_millis(20),
        reconnect_max_delay: Duration::from_millis(100),
        max_reconnect_attempts: Some(2),
    }
}

async fn wait_until(rx: &mut watch::Receiver<ConnectionStatus>, desc: &str, predicate: impl Fn(ConnectionStatus) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if predicate(*rx.borrow_and_update()) {
                return;
            }
            rx.changed().await.expect("status channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("transport never became {desc}"));
}

async fn wait_for_connected(rx: &mut watch::Receiver<ConnectionStatus>) {
    wait_until(rx, "connected", |s| s.is_connected()).await;
}

fn message_frame(message_id: &str, conversation_id: &str) -> String {
    format!(
        r#"{{"type": "message_received", "payload": {{"conversationId": "{conversation_id}", "message": {{
            "id": "{message_id}",
            "conversationId": "{conversation_id}",
            "senderId": "u-1",
            "type": "TEXT",
            "content": "bonjour",
            "createdAt": "2026-03-01T10:05:00Z"
        }}}}}}"#
    )
}

/// Counting handler for coordinator wiring tests
#[derive(Default)]
struct CountingHandler {
    conversations: AtomicUsize,
    messages: AtomicUsize,
}

#[async_trait]
impl SyncHandler for CountingHandler {
    async fn refetch_conversations(&self) -> Result<(), SyncError> {
        self.conversations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refetch_messages(&self, _conversation_id: &str) -> Result<(), SyncError> {
        self.messages.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Transport Tests
// =============================================================================

#[tokio::test]
async fn test_transport_delivers_events_to_state() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A server that pushes one message frame, then waits for the close
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text(message_frame("msg-1", "conv-1").into()))
            .await
            .unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
        }
    });

    let bus = Arc::new(EventBus::new(64));
    let state = StateManager::spawn();
    let _pump = spawn_event_pump(bus.clone(), state.clone());
    let mut state_events = state.subscribe_events();

    let transport = WsTransport::spawn(transport_config(format!("ws://{addr}/ws")), bus).unwrap();
    let mut status_rx = transport.status();
    wait_for_connected(&mut status_rx).await;

    // The pushed frame must land in the cache via bus -> pump -> actor
    let event = tokio::time::timeout(Duration::from_secs(5), state_events.recv())
        .await
        .expect("timed out waiting for state event")
        .unwrap();
    match event {
        StateEvent::MessageReceived { message } => {
            assert_eq!(message.id, "msg-1");
            assert_eq!(message.content, "bonjour");
        }
        other => panic!("Expected MessageReceived, got {other:?}"),
    }

    let messages = state.list_messages("conv-1").await.unwrap();
    assert_eq!(messages.len(), 1);

    transport.shutdown().await;
    state.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_transport_sends_client_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A server that records the first text frame it receives
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            match frame {
                Message::Text(text) => return Some(text.as_str().to_string()),
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    });

    let bus = Arc::new(EventBus::new(64));
    let transport = WsTransport::spawn(transport_config(format!("ws://{addr}/ws")), bus).unwrap();
    let mut status_rx = transport.status();
    wait_for_connected(&mut status_rx).await;

    transport.send_typing("conv-1", true).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .expect("server saw no text frame");

    let frame: serde_json::Value = serde_json::from_str(&received).unwrap();
    assert_eq!(frame["type"], "typing_start");
    assert_eq!(frame["payload"]["conversationId"], "conv-1");

    transport.shutdown().await;
}

#[tokio::test]
async fn test_transport_reconnects_after_server_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // First session is dropped immediately; the second stays up
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(frame)) = ws.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
        }
    });

    let bus = Arc::new(EventBus::new(64));
    let transport = WsTransport::spawn(transport_config(format!("ws://{addr}/ws")), bus).unwrap();
    let mut status_rx = transport.status();

    wait_for_connected(&mut status_rx).await;
    // The server drops the first session; the transport must come back
    wait_until(&mut status_rx, "down", |s| !s.is_connected()).await;
    wait_for_connected(&mut status_rx).await;

    transport.shutdown().await;
    server.await.unwrap();
}

// =============================================================================
// Coordinator Wiring Tests
// =============================================================================

#[tokio::test]
async fn test_coordinator_polls_and_stops_on_reconnect() {
    let handler = Arc::new(CountingHandler::default());
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
    let (_active_tx, active_rx) = watch::channel(Some("conv-1".to_string()));
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let (coordinator, snapshot_rx) = SyncCoordinator::new(
        status_rx,
        active_rx,
        handler.clone(),
        Duration::from_millis(50),
    );
    let task = tokio::spawn(coordinator.run(shutdown_rx));

    // A few poll periods pass while disconnected
    tokio::time::sleep(Duration::from_millis(300)).await;
    let polled = handler.conversations.load(Ordering::SeqCst);
    assert!(polled >= 3, "expected at least 3 poll ticks, got {polled}");
    assert_eq!(handler.messages.load(Ordering::SeqCst), polled);
    assert!(snapshot_rx.borrow().is_polling);

    // Reconnect: polling stops, one forced refetch fires (a final tick may
    // race the transition, so allow one extra)
    status_tx.send(ConnectionStatus::Connected).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_reconnect = handler.conversations.load(Ordering::SeqCst);
    assert!(
        after_reconnect == polled + 1 || after_reconnect == polled + 2,
        "expected the reconnect refetch on top of {polled} ticks, got {after_reconnect}"
    );
    assert!(!snapshot_rx.borrow().is_polling);

    // No more calls while connected
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handler.conversations.load(Ordering::SeqCst), after_reconnect);

    shutdown_tx.send(()).await.unwrap();
    task.await.unwrap();
}

// =============================================================================
// State Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_bus_events_reach_cache_metrics() {
    let bus = Arc::new(EventBus::new(64));
    let state = StateManager::spawn();
    let _pump = spawn_event_pump(bus.clone(), state.clone());
    let mut state_events = state.subscribe_events();

    let frame = message_frame("msg-1", "conv-1");
    let event: ChatEvent = serde_json::from_str(&frame).unwrap();
    bus.emit(event);

    tokio::time::timeout(Duration::from_secs(5), state_events.recv())
        .await
        .expect("timed out waiting for state event")
        .unwrap();

    let metrics = state.metrics().await.unwrap();
    assert_eq!(metrics.messages, 1);

    state.shutdown().await;
}
