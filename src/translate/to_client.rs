use std::sync::Arc;

use serde_json::Value;

use super::{item_type, message_type};
use crate::error::RelayError;
use crate::pending::{PendingCalls, PendingToolCall};
use crate::policy::SessionPolicy;
use crate::tools::{ToolArgs, ToolRegistry, ToolResultDirection};
use crate::types::events::client::{ConversationItemCreateEvent, ResponseCreateEvent};
use crate::types::events::server::MiddleTierToolResponseEvent;
use crate::types::session;
use crate::types::tools::ToolChoice;
use crate::types::{ClientEvent, FunctionCallItem, FunctionCallOutputItem, Item, RelayEvent, ServerEventType};

/// Frames produced by one upstream message.
///
/// Upstream events are sent before client frames, each list in order.
#[derive(Debug, Default, PartialEq)]
pub struct Translation {
    pub to_upstream: Vec<ClientEvent>,
    pub to_client: Vec<String>,
}

impl Translation {
    fn forward(text: String) -> Self {
        Self {
            to_upstream: vec![],
            to_client: vec![text],
        }
    }

    fn suppress() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.to_upstream.is_empty() && self.to_client.is_empty()
    }
}

/// Rewrites upstream frames before they reach the client and runs tool calls.
///
/// Function-call bookkeeping never reaches the client. When a function-call
/// item completes, the matching tool runs to completion before `translate`
/// returns, so tool turnaround is serialized with the message stream.
pub struct UpstreamToClient {
    policy: Arc<SessionPolicy>,
    registry: Arc<ToolRegistry>,
    pending: PendingCalls,
}

impl UpstreamToClient {
    pub fn new(policy: Arc<SessionPolicy>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            policy,
            registry,
            pending: PendingCalls::new(),
        }
    }

    pub fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    pub async fn translate(&mut self, text: String) -> Result<Translation, RelayError> {
        let message: Value = serde_json::from_str(&text)?;
        let Some(kind) = message_type(&message).map(ServerEventType::from) else {
            return Ok(Translation::forward(text));
        };
        let event_id = message.get("event_id").and_then(Value::as_str).unwrap_or("unknown");
        tracing::debug!("received message: {}, id={}", kind.as_str(), event_id);

        match kind {
            ServerEventType::SessionCreated => self.session_created(message),
            ServerEventType::ResponseOutputItemAdded => {
                if item_type(&message) == Some(Item::FUNCTION_CALL) {
                    Ok(Translation::suppress())
                } else {
                    Ok(Translation::forward(text))
                }
            }
            ServerEventType::ConversationItemCreated => self.item_created(&message, text),
            ServerEventType::ResponseFunctionCallArgumentsDelta
            | ServerEventType::ResponseFunctionCallArgumentsDone => Ok(Translation::suppress()),
            ServerEventType::ResponseOutputItemDone => {
                if item_type(&message) == Some(Item::FUNCTION_CALL) {
                    self.function_call_done(message).await
                } else {
                    Ok(Translation::forward(text))
                }
            }
            ServerEventType::ResponseDone => self.response_done(message, text),
            ServerEventType::Other => Ok(Translation::forward(text)),
        }
    }

    /// Hides the server-side configuration from the client.
    fn session_created(&self, mut message: Value) -> Result<Translation, RelayError> {
        let session = message
            .get_mut("session")
            .and_then(Value::as_object_mut)
            .ok_or(RelayError::MalformedMessage {
                message_type: "session.created",
                reason: "missing session object",
            })?;

        session.insert(session::INSTRUCTIONS.to_string(), "".into());
        session.insert(session::TOOLS.to_string(), Value::Array(vec![]));
        session.insert(
            session::VOICE.to_string(),
            serde_json::to_value(self.policy.voice())?,
        );
        session.insert(
            session::TOOL_CHOICE.to_string(),
            serde_json::to_value(ToolChoice::None)?,
        );
        session.insert(session::MAX_RESPONSE_OUTPUT_TOKENS.to_string(), Value::Null);

        Ok(Translation::forward(serde_json::to_string(&message)?))
    }

    fn item_created(&mut self, message: &Value, text: String) -> Result<Translation, RelayError> {
        match item_type(message) {
            Some(Item::FUNCTION_CALL) => {
                let item: FunctionCallItem = serde_json::from_value(message["item"].clone())?;
                let previous_item_id = message.get("previous_item_id").and_then(Value::as_str);
                if self
                    .pending
                    .register(PendingToolCall::new(item.call_id(), previous_item_id))
                {
                    tracing::debug!(call_id = item.call_id(), tool = item.name(), "function call pending");
                }
                Ok(Translation::suppress())
            }
            Some(Item::FUNCTION_CALL_OUTPUT) => Ok(Translation::suppress()),
            _ => Ok(Translation::forward(text)),
        }
    }

    /// Runs the requested tool and answers the call upstream.
    async fn function_call_done(&mut self, mut message: Value) -> Result<Translation, RelayError> {
        let item: FunctionCallItem = serde_json::from_value(message["item"].take())?;

        let previous_item_id = self
            .pending
            .get(item.call_id())
            .ok_or_else(|| RelayError::UnknownCall(item.call_id().to_string()))?
            .previous_item_id()
            .map(str::to_string);

        let Some(tool) = self.registry.get(item.name()) else {
            tracing::error!(
                tool = item.name(),
                call_id = item.call_id(),
                "upstream requested a tool that is not registered"
            );
            return Err(RelayError::UnknownTool(item.name().to_string()));
        };

        let args: ToolArgs = serde_json::from_str(item.arguments())?;
        tracing::info!(tool = item.name(), call_id = item.call_id(), "invoking tool");
        let result = tool.invoke(args).await;

        let output = match result.destination() {
            ToolResultDirection::ToServer => result.to_text(),
            ToolResultDirection::ToClient => String::new(),
        };
        let mut translation = Translation::suppress();
        translation
            .to_upstream
            .push(ClientEvent::ConversationItemCreate(ConversationItemCreateEvent::new(
                Item::FunctionCallOutput(FunctionCallOutputItem::new(item.call_id(), output)),
            )));

        if result.destination() == ToolResultDirection::ToClient {
            let event = RelayEvent::MiddleTierToolResponse(MiddleTierToolResponseEvent::new(
                previous_item_id.as_deref(),
                item.name(),
                result.to_text(),
            ));
            translation.to_client.push(serde_json::to_string(&event)?);
        }

        Ok(translation)
    }

    /// Continues the turn if calls were answered and strips function calls from the output.
    fn response_done(&mut self, mut message: Value, text: String) -> Result<Translation, RelayError> {
        let mut translation = Translation::suppress();

        if !self.pending.is_empty() {
            let cleared = self.pending.clear();
            tracing::debug!(cleared, "turn completed with tool calls, continuing response");
            translation
                .to_upstream
                .push(ClientEvent::ResponseCreate(ResponseCreateEvent::new()));
        }

        let removed = message
            .get_mut("response")
            .and_then(|response| response.get_mut("output"))
            .and_then(Value::as_array_mut)
            .map(|output| {
                let before = output.len();
                output.retain(|entry| message_type(entry) != Some(Item::FUNCTION_CALL));
                before - output.len()
            })
            .unwrap_or(0);

        if removed > 0 {
            translation.to_client.push(serde_json::to_string(&message)?);
        } else {
            translation.to_client.push(text);
        }

        Ok(translation)
    }
}
