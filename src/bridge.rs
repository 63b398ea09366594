use std::time::Duration;

use crate::dispatcher::{ActionDispatcher, OutgoingAction};
use crate::error::BridgeError;
use crate::listener::{CallbackListener, ListenerConfig};
use crate::payload::{CallbackPayload, PayloadShape};
use crate::token::TokenSource;

/// Parameter names Bear reads its callback destinations from.
pub const SUCCESS_KEY: &str = "x-success";
pub const ERROR_KEY: &str = "x-error";
const TOKEN_KEY: &str = "token";

/// One dispatch, optionally followed by a wait for Bear's callback.
#[derive(Debug, Clone)]
pub struct RoundTrip {
    pub action: OutgoingAction,
    pub expects_callback: bool,
    pub needs_token: bool,
    pub timeout: Duration,
}

impl RoundTrip {
    pub fn fire_and_forget(action: OutgoingAction) -> Self {
        Self {
            action,
            expects_callback: false,
            needs_token: false,
            timeout: Duration::ZERO,
        }
    }

    pub fn with_callback(action: OutgoingAction, timeout: Duration) -> Self {
        Self {
            action,
            expects_callback: true,
            needs_token: false,
            timeout,
        }
    }

    pub fn needs_token(mut self, needs_token: bool) -> Self {
        self.needs_token = needs_token;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Fire-and-forget: the action was handed to the OS, nothing to wait for.
    Dispatched,
    Fulfilled(CallbackPayload),
}

/// Turns Bear's fire-and-forget URL scheme into one awaitable result.
///
/// Round trips must be serialized by the caller; each one owns a fresh
/// listener on the same well-known port.
pub struct CorrelationBridge {
    dispatcher: ActionDispatcher,
    listener: ListenerConfig,
}

impl CorrelationBridge {
    pub fn new(dispatcher: ActionDispatcher, listener: ListenerConfig) -> Self {
        Self {
            dispatcher,
            listener,
        }
    }

    pub async fn round_trip(
        &self,
        request: RoundTrip,
        tokens: &dyn TokenSource,
    ) -> Result<Outcome, BridgeError> {
        let RoundTrip {
            mut action,
            expects_callback,
            needs_token,
            timeout,
        } = request;

        if needs_token {
            match tokens.load() {
                Some(token) => action.set(TOKEN_KEY, Some(token)),
                None => log::warn!("No Bear token configured; '{}' may be refused", action.name),
            }
        }

        if !expects_callback {
            self.dispatcher.invoke(&action)?;
            return Ok(Outcome::Dispatched);
        }

        let mut listener = CallbackListener::new(self.listener.clone());
        let result = self.await_round_trip(&mut listener, action, timeout).await;
        listener.stop().await;

        match &result {
            Err(e) if e.is_timeout() => log::info!("{}", e),
            Err(BridgeError::Application { code, message }) => {
                log::warn!("Bear returned error {}: {}", code, message)
            }
            Err(e) => match std::error::Error::source(e) {
                Some(cause) => log::error!("Round trip failed: {}: {}", e, cause),
                None => log::error!("Round trip failed: {}", e),
            },
            Ok(_) => {}
        }
        result
    }

    async fn await_round_trip(
        &self,
        listener: &mut CallbackListener,
        mut action: OutgoingAction,
        timeout: Duration,
    ) -> Result<Outcome, BridgeError> {
        // Bound before dispatch: Bear may call back before we start waiting.
        listener.start().await?;

        let destination = listener.callback_url();
        action.set(SUCCESS_KEY, Some(destination.clone()));
        action.set(ERROR_KEY, Some(destination));

        self.dispatcher.invoke(&action)?;

        let payload = listener.await_callback(timeout).await?;
        classify(payload)
    }
}

fn classify(payload: CallbackPayload) -> Result<Outcome, BridgeError> {
    match payload.classify() {
        PayloadShape::Success => Ok(Outcome::Fulfilled(payload)),
        PayloadShape::ApplicationError { code, message } => {
            Err(BridgeError::Application { code, message })
        }
        PayloadShape::Unrecognized => Err(BridgeError::UnrecognizedCallback(payload)),
    }
}
