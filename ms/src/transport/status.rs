//! Connection status reported by the transport

use serde::{Deserialize, Serialize};

/// Connection status of the push transport
///
/// Published on a watch channel; readers react to whatever value is
/// currently reported and never validate transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No connection and none being attempted
    #[default]
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// Connected and receiving events
    Connected,
    /// Last connection attempt or session failed
    Error,
}

impl ConnectionStatus {
    /// Whether push delivery is currently available
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Whether the polling fallback should be active
    ///
    /// `Connecting` does not poll: an attempt is in flight and will
    /// resolve to `Connected` or `Error` shortly.
    pub fn needs_polling(&self) -> bool {
        matches!(self, ConnectionStatus::Disconnected | ConnectionStatus::Error)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_polling() {
        assert!(ConnectionStatus::Disconnected.needs_polling());
        assert!(ConnectionStatus::Error.needs_polling());
        assert!(!ConnectionStatus::Connecting.needs_polling());
        assert!(!ConnectionStatus::Connected.needs_polling());
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(serde_json::to_string(&ConnectionStatus::Error).unwrap(), "\"error\"");
        let status: ConnectionStatus = serde_json::from_str("\"connected\"").unwrap();
        assert!(status.is_connected());
    }
}
