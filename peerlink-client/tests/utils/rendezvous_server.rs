use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use peerlink_core::{ParticipantId, RoomId, SignalingMessage};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Default)]
struct ServerState {
    peers: Arc<DashMap<ParticipantId, mpsc::UnboundedSender<Message>>>,
    rooms: Arc<DashMap<RoomId, BTreeSet<ParticipantId>>>,
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
}

impl ServerState {
    fn send_to(&self, id: &ParticipantId, message: &SignalingMessage) {
        let Ok(json) = serde_json::to_string(message) else {
            return;
        };
        if let Some(tx) = self.peers.get(id) {
            let _ = tx.send(Message::Text(json.into()));
        }
    }

    fn broadcast_room(&self, room_id: &RoomId) {
        let members: Vec<ParticipantId> = self
            .rooms
            .get(room_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        let update = SignalingMessage::RoomUpdate {
            room_id: room_id.clone(),
            members: members.clone(),
        };
        for member in &members {
            self.send_to(member, &update);
        }
    }

    fn leave(&self, room_id: &RoomId, id: &ParticipantId) {
        let removed = self
            .rooms
            .get_mut(room_id)
            .map(|mut m| m.remove(id))
            .unwrap_or(false);
        if !removed {
            return;
        }
        let members: Vec<ParticipantId> = self
            .rooms
            .get(room_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        let leave = SignalingMessage::LeaveRoom {
            room_id: room_id.clone(),
            user_id: Some(id.clone()),
        };
        for member in &members {
            self.send_to(member, &leave);
        }
        self.broadcast_room(room_id);
    }

    fn route(&self, from: &ParticipantId, message: SignalingMessage) {
        match &message {
            SignalingMessage::JoinRoom { room_id, .. } => {
                self.rooms
                    .entry(room_id.clone())
                    .or_default()
                    .insert(from.clone());
                self.broadcast_room(room_id);
            }
            SignalingMessage::LeaveRoom { room_id, .. } => self.leave(room_id, from),
            _ => {
                if let Some(target) = message.target() {
                    self.send_to(target, &message);
                }
            }
        }
    }
}

/// A small WebSocket rendezvous server on a random local port.
///
/// Each socket gets a fresh participant id announced with a `welcome` frame,
/// so a reconnecting client always comes back with a new identity.
pub struct RendezvousServer {
    addr: SocketAddr,
    state: ServerState,
    task: JoinHandle<()>,
}

impl RendezvousServer {
    pub async fn start() -> Self {
        let state = ServerState::default();
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind rendezvous server");
        let addr = listener.local_addr().expect("No local address");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        info!("[Rendezvous] listening on {}", addr);

        Self { addr, state, task }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_endpoint(&self) -> String {
        format!("http://{}/ws", self.addr)
    }

    pub fn connected(&self) -> usize {
        self.state.peers.len()
    }

    pub async fn auth_headers(&self) -> Vec<Option<String>> {
        self.state.auth_headers.lock().await.clone()
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.state
            .rooms
            .get(room_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Write a raw text frame to every connected socket.
    pub fn send_raw(&self, text: &str) {
        for peer in self.state.peers.iter() {
            let _ = peer.value().send(Message::Text(text.to_owned().into()));
        }
    }

    /// Close every socket from the server side.
    pub fn kick_all(&self) {
        for peer in self.state.peers.iter() {
            let _ = peer.value().send(Message::Close(None));
        }
    }

    pub async fn wait_for_connections(&self, count: usize, timeout_ms: u64) -> bool {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if self.connected() >= count {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    pub fn shutdown(self) {
        self.kick_all();
        self.task.abort();
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    state.auth_headers.lock().await.push(auth);

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ServerState) {
    let id = ParticipantId::from(Uuid::new_v4().to_string());
    debug!("[Rendezvous] new socket {}", id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.peers.insert(id.clone(), tx);
    state.send_to(&id, &SignalingMessage::Welcome { user_id: id.clone() });

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let close = matches!(msg, Message::Close(_));
            if sender.send(msg).await.is_err() || close {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let id = id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<SignalingMessage>(text.as_str()) {
                            Ok(message) => state.route(&id, message),
                            Err(e) => debug!("[Rendezvous] bad frame from {}: {}", id, e),
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.peers.remove(&id);
    let rooms: Vec<RoomId> = state
        .rooms
        .iter()
        .filter(|r| r.value().contains(&id))
        .map(|r| r.key().clone())
        .collect();
    for room_id in rooms {
        state.leave(&room_id, &id);
    }
    debug!("[Rendezvous] socket {} closed", id);
}
