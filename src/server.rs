use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tracing::Instrument;

use crate::error::RelayError;
use crate::policy::SessionPolicy;
use crate::relay::{Frame, RelaySession};
use crate::tools::ToolRegistry;
use crate::upstream::{UpstreamConnector, CLIENT_REQUEST_ID_HEADER};

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Binary(bin) => Frame::Binary(bin.to_vec()),
            Message::Ping(data) => Frame::Ping(data.to_vec()),
            Message::Pong(data) => Frame::Pong(data.to_vec()),
            Message::Close(_) => Frame::Close,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bin) => Message::Binary(bin.into()),
            Frame::Ping(data) => Message::Ping(data.into()),
            Frame::Pong(data) => Message::Pong(data.into()),
            Frame::Close => Message::Close(None),
        }
    }
}

/// The relay shared by every client connection: one upstream connector, one
/// session policy and one tool registry.
#[derive(Clone)]
pub struct MiddleTier {
    connector: Arc<UpstreamConnector>,
    policy: Arc<SessionPolicy>,
    registry: Arc<ToolRegistry>,
}

impl MiddleTier {
    pub fn new(connector: UpstreamConnector, policy: SessionPolicy, registry: ToolRegistry) -> Self {
        if registry.is_empty() {
            tracing::warn!("no tools registered, upstream sessions will run with tool_choice none");
        }
        Self {
            connector: Arc::new(connector),
            policy: Arc::new(policy),
            registry: Arc::new(registry),
        }
    }

    /// Connects upstream on behalf of an accepted client socket and relays
    /// until both sides are done.
    pub async fn relay(&self, socket: WebSocket, request_id: Option<String>) -> Result<(), RelayError> {
        let session = RelaySession::new(self.policy.clone(), self.registry.clone());
        let upstream = session.connect(&self.connector, request_id.as_deref()).await?;

        let (client_tx, client_rx) = socket.split();
        let client_rx = client_rx.map(|message| message.map(Frame::from).map_err(RelayError::from));
        let client_tx =
            client_tx.with(|frame: Frame| futures::future::ready(Ok::<_, RelayError>(Message::from(frame))));

        session.relay_upstream(upstream, client_rx, client_tx).await
    }

    /// Builds a router that upgrades requests on `path` and relays them.
    pub fn router(self, path: &str) -> Router {
        Router::new().route(path, get(ws_handler)).with_state(self)
    }
}

async fn ws_handler(State(tier): State<MiddleTier>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let request_id = headers
        .get(CLIENT_REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    tracing::info!(request_id = ?request_id, "websocket upgrade request received");

    ws.on_upgrade(move |socket| async move {
        let span = tracing::info_span!(
            "relay_session",
            request_id = request_id.as_deref().unwrap_or("-")
        );
        async {
            match tier.relay(socket, request_id.clone()).await {
                Ok(()) => tracing::info!("relay session finished"),
                Err(e) => tracing::error!("relay session failed: {}", e),
            }
        }
        .instrument(span)
        .await
    })
}
