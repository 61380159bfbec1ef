use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};

type ClientId = usize;

#[derive(Default)]
struct ServerState {
    clients: HashMap<ClientId, mpsc::UnboundedSender<Message>>,
    // inbound text frames, per accepted connection in accept order
    received: Vec<Vec<String>>,
    next_id: ClientId,
}

/// Loopback feed server for driving the client under test: records every
/// inbound frame per connection, broadcasts frames to connected clients and
/// can drop them to simulate upstream failure.
pub struct MockFeedServer {
    state: Arc<RwLock<ServerState>>,
    local_addr: SocketAddr,
}

impl MockFeedServer {
    pub async fn bind() -> Result<Arc<Self>> {
        Self::bind_on("127.0.0.1:0").await
    }

    pub async fn bind_on(addr: &str) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(addr)
            .await
            .context("Failed to bind mock feed listener")?;
        let local_addr = listener.local_addr()?;
        let state: Arc<RwLock<ServerState>> = Arc::new(RwLock::new(ServerState::default()));

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, state).await;
                });
            }
        });

        Ok(Arc::new(Self { state, local_addr }))
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Connections accepted so far, including ones that have since closed.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.received.len()
    }

    pub async fn client_count(&self) -> usize {
        self.state.read().await.clients.len()
    }

    /// Text frames received on the n-th accepted connection.
    pub async fn frames(&self, connection: usize) -> Vec<String> {
        self.state
            .read()
            .await
            .received
            .get(connection)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn broadcast(&self, text: &str) {
        let state = self.state.read().await;
        for sender in state.clients.values() {
            let _ = sender.send(Message::Text(text.to_string()));
        }
    }

    /// Closes every live connection from the server side.
    pub async fn drop_clients(&self) {
        let state = self.state.read().await;
        for sender in state.clients.values() {
            let _ = sender.send(Message::Close(None));
        }
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<RwLock<ServerState>>) -> Result<()> {
    let socket = accept_async(stream)
        .await
        .context("Failed to accept WebSocket")?;
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let id = {
        let mut state = state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        state.clients.insert(id, tx);
        state.received.push(Vec::new());
        id
    };

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => state.write().await.received[id].push(text),
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    state.write().await.clients.remove(&id);
    send_task.abort();
    Ok(())
}
