//! One relayed client session: a client socket, an upstream socket and the
//! two forwarding flows between them.

use std::pin::pin;
use std::sync::Arc;

use futures::lock::Mutex;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;

use crate::error::RelayError;
use crate::policy::SessionPolicy;
use crate::tools::ToolRegistry;
use crate::translate::{ClientToUpstream, UpstreamToClient};
use crate::upstream::{UpstreamConnector, UpstreamSocket};

/// A websocket frame, independent of which websocket library carried it.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Frame {
    fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
            Frame::Ping(_) => "ping",
            Frame::Pong(_) => "pong",
            Frame::Close => "close",
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(bin) => Frame::Binary(bin),
            Message::Ping(data) => Frame::Ping(data),
            Message::Pong(data) => Frame::Pong(data),
            Message::Close(_) => Frame::Close,
            Message::Frame(frame) => Frame::Binary(frame.into_data()),
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bin) => Message::Binary(bin),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        }
    }
}

/// Lifecycle of a relay session. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelayState {
    Connecting,
    Authenticated,
    Relaying,
    Closing,
    Closed,
}

pub struct RelaySession {
    policy: Arc<SessionPolicy>,
    registry: Arc<ToolRegistry>,
    state: watch::Sender<RelayState>,
}

impl RelaySession {
    pub fn new(policy: Arc<SessionPolicy>, registry: Arc<ToolRegistry>) -> Self {
        let (state, _) = watch::channel(RelayState::Connecting);
        Self {
            policy,
            registry,
            state,
        }
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    fn transition(&self, next: RelayState) {
        let moved = self.state.send_if_modified(|state| {
            if *state < next {
                *state = next;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!(state = ?next, "relay session state changed");
        }
    }

    /// Authenticates and opens the upstream socket for this session.
    pub async fn connect(
        &self,
        connector: &UpstreamConnector,
        request_id: Option<&str>,
    ) -> Result<UpstreamSocket, RelayError> {
        match connector.connect(request_id).await {
            Ok(socket) => {
                self.transition(RelayState::Authenticated);
                Ok(socket)
            }
            Err(e) => {
                self.transition(RelayState::Closed);
                Err(e)
            }
        }
    }

    /// Relays between an already-connected upstream socket and a client.
    pub async fn relay_upstream<CR, CW>(
        &self,
        upstream: UpstreamSocket,
        client_rx: CR,
        client_tx: CW,
    ) -> Result<(), RelayError>
    where
        CR: Stream<Item = Result<Frame, RelayError>>,
        CW: Sink<Frame, Error = RelayError>,
    {
        let (write, read) = upstream.split();
        let upstream_rx = read.map(|message| message.map(Frame::from).map_err(RelayError::from));
        let upstream_tx =
            write.with(|frame: Frame| futures::future::ready(Ok::<_, RelayError>(Message::from(frame))));
        self.run(client_rx, client_tx, upstream_rx, upstream_tx).await
    }

    /// Runs both forwarding flows until both have finished.
    ///
    /// The first non-reset error tears the whole session down.
    pub async fn run<CR, CW, UR, UW>(
        &self,
        client_rx: CR,
        client_tx: CW,
        upstream_rx: UR,
        upstream_tx: UW,
    ) -> Result<(), RelayError>
    where
        CR: Stream<Item = Result<Frame, RelayError>>,
        CW: Sink<Frame, Error = RelayError>,
        UR: Stream<Item = Result<Frame, RelayError>>,
        UW: Sink<Frame, Error = RelayError>,
    {
        self.transition(RelayState::Authenticated);
        self.transition(RelayState::Relaying);

        let to_upstream = ClientToUpstream::new(self.policy.clone(), self.registry.clone());
        let mut to_client = UpstreamToClient::new(self.policy.clone(), self.registry.clone());
        let upstream = Mutex::new(Box::pin(upstream_tx));

        let result = futures::try_join!(
            self.client_to_upstream(client_rx, &to_upstream, &upstream),
            self.upstream_to_client(upstream_rx, client_tx, &mut to_client, &upstream),
        );

        self.transition(RelayState::Closing);
        self.transition(RelayState::Closed);
        result.map(|_| ())
    }

    async fn client_to_upstream<CR, UW>(
        &self,
        frames: CR,
        translator: &ClientToUpstream,
        upstream: &Mutex<std::pin::Pin<Box<UW>>>,
    ) -> Result<(), RelayError>
    where
        CR: Stream<Item = Result<Frame, RelayError>>,
        UW: Sink<Frame, Error = RelayError>,
    {
        let mut frames = pin!(frames);

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) if e.is_reset() => {
                    tracing::debug!("client connection reset: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            };

            match frame {
                Frame::Text(text) => {
                    let text = translator.translate(text)?;
                    match upstream.lock().await.send(Frame::Text(text)).await {
                        Ok(()) => {}
                        Err(e) if e.is_reset() => {
                            tracing::debug!("upstream connection reset: {}", e);
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Frame::Close => break,
                Frame::Ping(_) | Frame::Pong(_) => tracing::trace!("client keepalive frame"),
                other => tracing::warn!("unexpected {} frame from client, dropping", other.kind()),
            }
        }

        self.transition(RelayState::Closing);
        tracing::info!("client side ended, closing upstream connection");
        match upstream.lock().await.close().await {
            Err(e) if !e.is_reset() => Err(e),
            _ => Ok(()),
        }
    }

    async fn upstream_to_client<UR, CW, UW>(
        &self,
        frames: UR,
        client: CW,
        translator: &mut UpstreamToClient,
        upstream: &Mutex<std::pin::Pin<Box<UW>>>,
    ) -> Result<(), RelayError>
    where
        UR: Stream<Item = Result<Frame, RelayError>>,
        CW: Sink<Frame, Error = RelayError>,
        UW: Sink<Frame, Error = RelayError>,
    {
        let mut frames = pin!(frames);
        let mut client = pin!(client);
        let mut upstream_open = true;

        'frames: while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) if e.is_reset() => {
                    tracing::debug!("upstream connection reset: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            };

            let text = match frame {
                Frame::Text(text) => text,
                Frame::Close => break,
                Frame::Ping(_) | Frame::Pong(_) => {
                    tracing::trace!("upstream keepalive frame");
                    continue;
                }
                other => {
                    tracing::warn!("unexpected {} frame from upstream, dropping", other.kind());
                    continue;
                }
            };

            let translation = translator.translate(text).await?;

            for event in translation.to_upstream {
                if !upstream_open {
                    tracing::debug!("upstream already closing, dropping relay event");
                    continue;
                }
                let text = serde_json::to_string(&event)?;
                match upstream.lock().await.send(Frame::Text(text)).await {
                    Ok(()) => {}
                    Err(e) if e.is_reset() => {
                        tracing::debug!("upstream closed before relay event was sent: {}", e);
                        upstream_open = false;
                    }
                    Err(e) => return Err(e),
                }
            }

            for text in translation.to_client {
                match client.send(Frame::Text(text)).await {
                    Ok(()) => {}
                    Err(e) if e.is_reset() => {
                        tracing::debug!("client connection reset: {}", e);
                        break 'frames;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.transition(RelayState::Closing);
        tracing::info!("upstream side ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolArgs, ToolResult};
    use crate::types::audio::Voice;
    use crate::types::tools::{FunctionTool, ToolParameters};
    use crate::upstream::{Credential, UpstreamConfig};
    use futures::channel::mpsc;
    use serde_json::{json, Value};

    struct Harness {
        client_in: mpsc::UnboundedSender<Result<Frame, RelayError>>,
        client_out: mpsc::UnboundedReceiver<Frame>,
        upstream_in: mpsc::UnboundedSender<Result<Frame, RelayError>>,
        upstream_out: mpsc::UnboundedReceiver<Frame>,
    }

    fn session() -> RelaySession {
        let search = Tool::new(
            FunctionTool::new(
                "Search",
                "Searches the knowledge base.",
                ToolParameters::new().with_property("query", json!({"type": "string"}), true),
            ),
            |args: ToolArgs| async move {
                let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
                ToolResult::to_server(format!("no match found for {query}"))
            },
        );
        RelaySession::new(
            Arc::new(SessionPolicy::new().with_voice(Voice::Sage)),
            Arc::new(ToolRegistry::builder().with_tool(search).build().unwrap()),
        )
    }

    /// Spawns the session over in-memory channels and returns the far ends.
    fn spawn(session: RelaySession) -> (Harness, tokio::task::JoinHandle<(RelaySession, Result<(), RelayError>)>) {
        let (client_in, client_rx) = mpsc::unbounded();
        let (client_tx, client_out) = mpsc::unbounded();
        let (upstream_in, upstream_rx) = mpsc::unbounded();
        let (upstream_tx, upstream_out) = mpsc::unbounded();

        let handle = tokio::spawn(async move {
            let result = session
                .run(
                    client_rx,
                    client_tx.sink_map_err(|e| RelayError::ClientSocket(axum::Error::new(e))),
                    upstream_rx,
                    upstream_tx.sink_map_err(|_| {
                        RelayError::Upstream(tokio_tungstenite::tungstenite::Error::AlreadyClosed)
                    }),
                )
                .await;
            (session, result)
        });

        (
            Harness {
                client_in,
                client_out,
                upstream_in,
                upstream_out,
            },
            handle,
        )
    }

    fn text(frame: Option<Frame>) -> Value {
        match frame {
            Some(Frame::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let (mut h, handle) = spawn(session());

        h.client_in
            .unbounded_send(Ok(Frame::Text(
                json!({"type": "session.update", "session": {"tools": [{"name": "Bogus"}]}}).to_string(),
            )))
            .unwrap();
        let update = text(h.upstream_out.next().await);
        assert_eq!(update["session"]["tools"][0]["name"], "Search");
        assert_eq!(update["session"]["tool_choice"], "auto");

        let upstream_frames = [
            json!({"type": "conversation.item.created", "previous_item_id": "item_user",
                   "item": {"type": "function_call", "call_id": "call_1", "name": "Search", "arguments": ""}}),
            json!({"type": "response.output_item.done",
                   "item": {"type": "function_call", "call_id": "call_1", "name": "Search",
                            "arguments": "{\"query\":\"refund policy\"}"}}),
            json!({"type": "response.done",
                   "response": {"output": [{"type": "function_call", "call_id": "call_1"}]}}),
        ];
        for frame in upstream_frames {
            h.upstream_in.unbounded_send(Ok(Frame::Text(frame.to_string()))).unwrap();
        }

        let output = text(h.upstream_out.next().await);
        assert_eq!(output["type"], "conversation.item.create");
        assert_eq!(output["item"]["call_id"], "call_1");
        assert_eq!(output["item"]["output"], "no match found for refund policy");

        let continuation = text(h.upstream_out.next().await);
        assert_eq!(continuation, json!({"type": "response.create"}));

        let done = text(h.client_out.next().await);
        assert_eq!(done["type"], "response.done");
        assert_eq!(done["response"]["output"], json!([]));

        h.client_in.unbounded_send(Ok(Frame::Close)).unwrap();
        drop(h.upstream_in);
        let (session, result) = handle.await.unwrap();
        result.unwrap();
        assert_eq!(session.state(), RelayState::Closed);
        // Nothing else reached the client.
        assert_eq!(h.client_out.next().await, None);
    }

    #[tokio::test]
    async fn test_client_close_shuts_upstream_and_waits_for_both_flows() {
        let (mut h, handle) = spawn(session());

        h.client_in.unbounded_send(Ok(Frame::Close)).unwrap();
        // The upstream sink is closed once the client leaves.
        assert_eq!(h.upstream_out.next().await, None);
        assert!(!handle.is_finished());

        // Upstream can still deliver frames to the client until it closes.
        h.upstream_in
            .unbounded_send(Ok(Frame::Text(r#"{"type":"response.audio.delta","delta":"AAAA"}"#.to_string())))
            .unwrap();
        assert_eq!(
            h.client_out.next().await,
            Some(Frame::Text(r#"{"type":"response.audio.delta","delta":"AAAA"}"#.to_string()))
        );

        h.upstream_in.unbounded_send(Ok(Frame::Close)).unwrap();
        let (session, result) = handle.await.unwrap();
        result.unwrap();
        assert_eq!(session.state(), RelayState::Closed);
    }

    #[tokio::test]
    async fn test_non_text_frames_are_dropped() {
        let (mut h, handle) = spawn(session());

        h.client_in.unbounded_send(Ok(Frame::Binary(vec![1, 2, 3]))).unwrap();
        h.client_in
            .unbounded_send(Ok(Frame::Text(r#"{"type":"input_audio_buffer.commit"}"#.to_string())))
            .unwrap();

        assert_eq!(
            h.upstream_out.next().await,
            Some(Frame::Text(r#"{"type":"input_audio_buffer.commit"}"#.to_string()))
        );

        drop(h.client_in);
        drop(h.upstream_in);
        let (_, result) = handle.await.unwrap();
        result.unwrap();
    }

    #[tokio::test]
    async fn test_upstream_reset_ends_session_gracefully() {
        let (h, handle) = spawn(session());

        h.upstream_in
            .unbounded_send(Err(RelayError::Upstream(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed,
            )))
            .unwrap();
        drop(h.client_in);

        let (session, result) = handle.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(session.state(), RelayState::Closed);
    }

    #[tokio::test]
    async fn test_unknown_tool_tears_down_session() {
        let (h, handle) = spawn(session());

        for frame in [
            json!({"type": "conversation.item.created", "previous_item_id": null,
                   "item": {"type": "function_call", "call_id": "call_1", "name": "Bogus", "arguments": ""}}),
            json!({"type": "response.output_item.done",
                   "item": {"type": "function_call", "call_id": "call_1", "name": "Bogus", "arguments": "{}"}}),
        ] {
            h.upstream_in.unbounded_send(Ok(Frame::Text(frame.to_string()))).unwrap();
        }

        let (session, result) = handle.await.unwrap();
        assert!(matches!(result, Err(RelayError::UnknownTool(name)) if name == "Bogus"));
        assert_eq!(session.state(), RelayState::Closed);
    }

    #[tokio::test]
    async fn test_undecodable_client_frame_is_fatal() {
        let (h, handle) = spawn(session());

        h.client_in.unbounded_send(Ok(Frame::Text("not json".to_string()))).unwrap();

        let (_, result) = handle.await.unwrap();
        assert!(matches!(result, Err(RelayError::Decode(_))));
    }

    #[tokio::test]
    async fn test_client_leaving_mid_turn_ends_cleanly_over_websocket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (finish_turn, turn_finished) = tokio::sync::oneshot::channel::<()>();

        // Upstream: open a function call, then complete the turn only after
        // the relay has started closing.
        let upstream_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in [
                json!({"type": "conversation.item.created", "previous_item_id": "item_user",
                       "item": {"type": "function_call", "call_id": "call_1", "name": "Search", "arguments": ""}}),
                json!({"type": "response.audio.delta", "delta": "AAAA"}),
            ] {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }
            turn_finished.await.unwrap();
            ws.send(Message::Text(
                json!({"type": "response.done", "response": {"output": []}}).to_string(),
            ))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (upstream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();
        let session = session();
        let mut state = session.subscribe();
        let (client_in, client_rx) = mpsc::unbounded();
        let (client_tx, mut client_out) = mpsc::unbounded();

        let relay = tokio::spawn(async move {
            let result = session
                .relay_upstream(
                    upstream,
                    client_rx,
                    client_tx.sink_map_err(|e| RelayError::ClientSocket(axum::Error::new(e))),
                )
                .await;
            (session, result)
        });

        // The audio delta trails the function call, so the call is pending now.
        assert_eq!(text(client_out.next().await)["type"], "response.audio.delta");

        client_in.unbounded_send(Ok(Frame::Close)).unwrap();
        state.wait_for(|state| *state >= RelayState::Closing).await.unwrap();
        finish_turn.send(()).unwrap();

        assert_eq!(text(client_out.next().await)["type"], "response.done");
        let (session, result) = relay.await.unwrap();
        assert!(result.is_ok(), "session failed: {result:?}");
        assert_eq!(session.state(), RelayState::Closed);
        upstream_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_upstream_connect_closes_session() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let connector = UpstreamConnector::new(
            UpstreamConfig::builder(&format!("http://{addr}"), "dev").build(),
            Credential::static_key("key-abc"),
        );
        let session = session();

        let result = session.connect(&connector, Some("req-1")).await;

        assert!(matches!(result, Err(RelayError::Upstream(_))));
        assert_eq!(session.state(), RelayState::Closed);
    }
}
