//! Connection lifecycle states.

use std::fmt;

/// State of the live feed connection.
///
/// ```text
/// Idle -> Connecting -> Open -> Reconnecting -> Open | GivenUp
///                 \-> Reconnecting
/// any -> Closed (explicit disconnect)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// First connection attempt in flight.
    Connecting,
    /// Transport is open.
    Open,
    /// Explicitly disconnected. Terminal until the next `connect`.
    Closed,
    /// Waiting for or running a reconnection attempt.
    Reconnecting,
    /// Reconnection attempts exhausted.
    GivenUp,
}

impl ConnectionState {
    /// Returns true for states that a pending `connect` resolves on.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Open | Self::Closed | Self::GivenUp)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::GivenUp => write!(f, "given_up"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn test_settled_states() {
        assert!(ConnectionState::Open.is_settled());
        assert!(ConnectionState::Closed.is_settled());
        assert!(ConnectionState::GivenUp.is_settled());
        assert!(!ConnectionState::Idle.is_settled());
        assert!(!ConnectionState::Connecting.is_settled());
        assert!(!ConnectionState::Reconnecting.is_settled());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::GivenUp.to_string(), "given_up");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }
}
