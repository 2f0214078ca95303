use crate::error::SignalingError;
use crate::signaling::channel_event::ChannelEvent;
use crate::signaling::signaling_config::{ReconnectPolicy, SignalingConfig};
use crate::signaling::signaling_output::SignalingOutput;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use peerlink_core::{ConnectionStatus, SignalingMessage, decode_frame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// State shared between channel handles and the connection supervisor.
struct ChannelShared {
    status: watch::Sender<ConnectionStatus>,
    closed: AtomicBool,
    shutdown: Notify,
}

/// WebSocket connection to the rendezvous server.
///
/// The handle is cheap to clone. A background supervisor owns the socket,
/// reconnects after transient loss and reports everything it sees on the event
/// receiver returned by [`connect`](Self::connect).
#[derive(Clone)]
pub struct SignalingChannel {
    outgoing: mpsc::UnboundedSender<SignalingMessage>,
    shared: Arc<ChannelShared>,
}

impl SignalingChannel {
    /// Start connecting to `config.endpoint`. Must be called inside a Tokio runtime.
    pub fn connect(
        config: SignalingConfig,
    ) -> Result<(Self, mpsc::Receiver<ChannelEvent>), SignalingError> {
        let url = websocket_url(&config.endpoint)?;
        if let Some(token) = &config.token {
            bearer(token)?;
        }

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);

        let shared = Arc::new(ChannelShared {
            status: status_tx,
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        });

        let supervisor = Supervisor {
            shared: shared.clone(),
            url,
            token: config.token,
            policy: config.reconnect,
            events: event_tx,
            outgoing: outgoing_rx,
        };
        tokio::spawn(supervisor.run());

        Ok((
            Self {
                outgoing: outgoing_tx,
                shared,
            },
            event_rx,
        ))
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Close the connection for good. Reconnection stops and the channel
    /// reports `disconnected`.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            info!("Closing signaling channel");
            self.shared.shutdown.notify_one();
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingChannel {
    async fn send(&self, message: SignalingMessage) -> Result<(), SignalingError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SignalingError::Closed);
        }
        if !self.status().is_connected() {
            return Err(SignalingError::NotConnected);
        }
        debug!("Sending {} frame", message.kind());
        self.outgoing
            .send(message)
            .map_err(|_| SignalingError::Closed)
    }
}

enum PumpExit {
    Closed,
    Lost(String),
}

struct Supervisor {
    shared: Arc<ChannelShared>,
    url: Url,
    token: Option<String>,
    policy: ReconnectPolicy,
    events: mpsc::Sender<ChannelEvent>,
    outgoing: mpsc::UnboundedReceiver<SignalingMessage>,
}

impl Supervisor {
    async fn run(mut self) {
        let _ = self
            .events
            .send(ChannelEvent::Status(ConnectionStatus::Connecting))
            .await;

        let mut attempt: u32 = 0;
        let mut connected_once = false;

        loop {
            let request = match build_request(&self.url, self.token.as_deref()) {
                Ok(request) => request,
                Err(e) => {
                    error!("Cannot build signaling request: {}", e);
                    break;
                }
            };

            let connected = tokio::select! {
                res = connect_async(request) => res,
                _ = self.shared.shutdown.notified() => break,
            };

            match connected {
                Ok((ws, _)) => {
                    info!("Signaling channel connected to {}", self.url);
                    attempt = 0;
                    connected_once = true;
                    if !self.publish(ConnectionStatus::Connected).await {
                        break;
                    }
                    match self.pump(ws).await {
                        PumpExit::Closed => break,
                        PumpExit::Lost(reason) => warn!("Signaling connection lost: {}", reason),
                    }
                }
                Err(e) => warn!("Signaling connect to {} failed: {}", self.url, e),
            }

            attempt += 1;
            if attempt > self.policy.max_attempts {
                error!(
                    "Giving up on signaling after {} failed attempts",
                    attempt
                );
                break;
            }
            if connected_once && !self.publish(ConnectionStatus::Reconnecting).await {
                break;
            }

            let delay = self.policy.delay_for(attempt);
            debug!("Reconnecting in {:?} (attempt {})", delay, attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shared.shutdown.notified() => break,
            }
        }

        self.shared.closed.store(true, Ordering::SeqCst);
        self.publish(ConnectionStatus::Disconnected).await;
        info!("Signaling supervisor finished");
    }

    async fn pump(&mut self, ws: WsStream) -> PumpExit {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                _ = self.shared.shutdown.notified() => {
                    while let Ok(message) = self.outgoing.try_recv() {
                        if let Ok(json) = serde_json::to_string(&message) {
                            let _ = sink.send(Message::Text(json.into())).await;
                        }
                    }
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Closed;
                }

                outgoing = self.outgoing.recv() => {
                    let Some(message) = outgoing else {
                        let _ = sink.send(Message::Close(None)).await;
                        return PumpExit::Closed;
                    };
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize {} frame: {}", message.kind(), e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(json.into())).await {
                        return PumpExit::Lost(e.to_string());
                    }
                }

                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !self.dispatch(&text).await {
                            return PumpExit::Closed;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            if !self.dispatch(text).await {
                                return PumpExit::Closed;
                            }
                        }
                        Err(_) => warn!("Dropping non UTF-8 binary signaling frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return PumpExit::Lost(format!("closed by server: {:?}", frame));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpExit::Lost(e.to_string()),
                    None => return PumpExit::Lost("stream ended".to_owned()),
                }
            }
        }
    }

    /// Forward one decoded frame. Returns `false` once nobody listens anymore.
    async fn dispatch(&self, text: &str) -> bool {
        let event = match decode_frame(text) {
            Ok(SignalingMessage::Welcome { user_id }) => {
                info!("Assigned participant id {}", user_id);
                ChannelEvent::Identity(user_id)
            }
            Ok(message) => {
                debug!("Received {} frame", message.kind());
                ChannelEvent::Message(message)
            }
            Err(e) => {
                warn!("Dropping signaling frame: {}", e);
                return true;
            }
        };
        self.events.send(event).await.is_ok()
    }

    async fn publish(&self, status: ConnectionStatus) -> bool {
        let changed = self.shared.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if !changed {
            return true;
        }
        info!("Signaling status: {}", status);
        self.events.send(ChannelEvent::Status(status)).await.is_ok()
    }
}

/// Normalise an endpoint to a WebSocket URL (`http` becomes `ws`, `https` becomes `wss`).
pub fn websocket_url(endpoint: &str) -> Result<Url, SignalingError> {
    let invalid = |reason: String| SignalingError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch to a websocket scheme".to_owned()))?;
    Ok(url)
}

fn build_request(url: &Url, token: Option<&str>) -> Result<Request, SignalingError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| SignalingError::InvalidEndpoint {
            endpoint: url.to_string(),
            reason: e.to_string(),
        })?;
    if let Some(token) = token {
        request.headers_mut().insert(AUTHORIZATION, bearer(token)?);
    }
    Ok(request)
}

fn bearer(token: &str) -> Result<HeaderValue, SignalingError> {
    HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| SignalingError::InvalidCredentials)
}
