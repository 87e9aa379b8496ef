//! Host fault type.

/// A fault raised by the host side of the bridge.
///
/// The engine never interprets these; they propagate unchanged to the
/// run's terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HostFault {
    /// Human-readable fault description.
    pub message: String,
}

impl HostFault {
    /// Create a fault with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        HostFault {
            message: message.into(),
        }
    }
}
