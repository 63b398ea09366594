use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::BridgeError;
use crate::payload::CallbackPayload;

/// How long `stop()` waits for in-flight connections before aborting the server.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Lets Bear's webview close itself once the callback has been read.
const CLOSE_PAGE: &str = "<!DOCTYPE html><html><head><title>Bear</title></head>\
<body><p>Response received. You can close this window.</p>\
<script>window.close();</script></body></html>";

/// Where the listener binds and which path it answers on.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub path: String,
}

impl ListenerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The address Bear is told to call back on (`x-success` / `x-error`).
    pub fn callback_url(&self) -> String {
        format!("http://{}{}", self.socket_addr(), self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Starting,
    Listening,
    Delivered,
    TimedOut,
    Errored,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Listening => "listening",
            Self::Delivered => "delivered",
            Self::TimedOut => "timed out",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Single slot for the first payload; later callbacks find it empty.
type Slot = Arc<Mutex<Option<oneshot::Sender<CallbackPayload>>>>;

/// Loopback HTTP endpoint that receives at most one callback from Bear.
///
/// Single-use: once it has left `Listening` it cannot be started again.
pub struct CallbackListener {
    config: ListenerConfig,
    state: ListenerState,
    spent: bool,
    slot: Slot,
    receiver: Option<oneshot::Receiver<CallbackPayload>>,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl CallbackListener {
    pub fn new(mut config: ListenerConfig) -> Self {
        if !config.path.starts_with('/') {
            config.path.insert(0, '/');
        }
        Self {
            config,
            state: ListenerState::Stopped,
            spent: false,
            slot: Arc::new(Mutex::new(None)),
            receiver: None,
            shutdown: None,
            join: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn callback_url(&self) -> String {
        self.config.callback_url()
    }

    /// Bind the well-known port and begin serving. Fails if the port is taken;
    /// there is no fallback port because the address is already in the URL.
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        if self.spent || self.state != ListenerState::Stopped {
            return Err(BridgeError::ListenerUnavailable(self.state));
        }
        self.spent = true;
        self.state = ListenerState::Starting;

        let addr = self.config.socket_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state = ListenerState::Errored;
                return Err(BridgeError::ListenerBind {
                    addr: addr.to_string(),
                    source,
                });
            }
        };

        let (payload_tx, payload_rx) = oneshot::channel();
        *lock_slot(&self.slot) = Some(payload_tx);
        self.receiver = Some(payload_rx);

        let app = Router::new()
            .route(&self.config.path, get(receive_callback))
            .fallback(not_found)
            .with_state(self.slot.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                log::warn!("Callback listener stopped with error: {}", e);
            }
        });

        self.shutdown = Some(shutdown_tx);
        self.join = Some(join);
        self.state = ListenerState::Listening;
        log::info!("Callback listener on {}", self.callback_url());
        Ok(())
    }

    /// Wait for the first callback. Only one wait can ever be registered.
    pub async fn await_callback(
        &mut self,
        timeout: Duration,
    ) -> Result<CallbackPayload, BridgeError> {
        if self.state != ListenerState::Listening {
            return Err(BridgeError::ListenerUnavailable(self.state));
        }
        let receiver = self
            .receiver
            .take()
            .ok_or(BridgeError::ListenerUnavailable(self.state))?;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(payload)) => {
                self.state = ListenerState::Delivered;
                Ok(payload)
            }
            Ok(Err(_)) => {
                self.state = ListenerState::Errored;
                Err(BridgeError::ListenerUnavailable(self.state))
            }
            Err(_) => {
                // Disarm the slot so a callback racing the deadline is dropped.
                lock_slot(&self.slot).take();
                self.state = ListenerState::TimedOut;
                Err(BridgeError::CallbackTimeout(timeout))
            }
        }
    }

    /// Release the socket. Safe to call any number of times from any state.
    pub async fn stop(&mut self) {
        lock_slot(&self.slot).take();
        self.receiver = None;

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(mut join) = self.join.take() {
            match tokio::time::timeout(STOP_GRACE, &mut join).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Callback listener task failed: {}", e),
                Err(_) => {
                    log::warn!("Callback listener did not drain in time, aborting");
                    join.abort();
                    let _ = join.await;
                }
            }
            log::debug!("Callback listener on {} stopped", self.callback_url());
        }

        self.state = ListenerState::Stopped;
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

fn lock_slot(slot: &Slot) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<CallbackPayload>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn receive_callback(State(slot): State<Slot>, RawQuery(query): RawQuery) -> Response {
    let payload = CallbackPayload::from_query(query.as_deref().unwrap_or(""));
    log::debug!("Callback received with {} field(s)", payload.len());

    let sender = lock_slot(&slot).take();
    match sender {
        Some(sender) => {
            if sender.send(payload).is_err() {
                log::debug!("Callback arrived after the wait was abandoned");
            }
        }
        None => log::debug!("Ignoring extra callback: the wait is already resolved"),
    }

    page(StatusCode::OK, CLOSE_PAGE)
}

async fn not_found() -> Response {
    page(StatusCode::NOT_FOUND, "")
}

fn page(status: StatusCode, body: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
