use std::time::Duration;

use thiserror::Error;

use crate::listener::ListenerState;
use crate::payload::CallbackPayload;

/// Failures of a single round trip.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The OS refused to open the scheme URL (or the URL could not be built).
    #[error("Failed to dispatch Bear action '{action}'")]
    Dispatch {
        action: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Callback listener could not bind {addr}")]
    ListenerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Expected in normal operation: many actions never call back.
    #[error("No callback from Bear within {}ms", .0.as_millis())]
    CallbackTimeout(Duration),

    #[error("Bear reported error {code}: {message}")]
    Application { code: i64, message: String },

    #[error("Bear sent an unrecognized error payload: {0}")]
    UnrecognizedCallback(CallbackPayload),

    #[error("Callback listener is {0}; a listener is single-use")]
    ListenerUnavailable(ListenerState),
}

impl BridgeError {
    pub fn dispatch(
        action: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Dispatch {
            action: action.to_string(),
            source: source.into(),
        }
    }

    /// Timeouts are not hard failures; callers log them at a lower level.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CallbackTimeout(_))
    }
}
