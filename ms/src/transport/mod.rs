//! Push transport - WebSocket connection to the messaging service
//!
//! The transport owns the socket in a background task, publishes its
//! [`ConnectionStatus`] on a watch channel and emits parsed events on the
//! bus. Consumers never touch the socket directly.

mod status;
mod ws;

pub use status::ConnectionStatus;
pub use ws::{TransportError, WsTransport, WsTransportConfig};
