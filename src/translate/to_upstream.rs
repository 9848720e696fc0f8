use std::sync::Arc;

use serde_json::{Map, Value};

use super::message_type;
use crate::error::RelayError;
use crate::policy::SessionPolicy;
use crate::tools::ToolRegistry;
use crate::types::events::client::SESSION_UPDATE;
use crate::types::session;
use crate::types::tools::ToolChoice;

/// Rewrites client frames before they reach the upstream service.
///
/// Only `session.update` is touched: configured policy fields are overlaid and
/// the tool list is replaced wholesale with the server's own schemas.
pub struct ClientToUpstream {
    policy: Arc<SessionPolicy>,
    registry: Arc<ToolRegistry>,
}

impl ClientToUpstream {
    pub fn new(policy: Arc<SessionPolicy>, registry: Arc<ToolRegistry>) -> Self {
        Self { policy, registry }
    }

    pub fn translate(&self, text: String) -> Result<String, RelayError> {
        let mut message: Value = serde_json::from_str(&text)?;

        match message_type(&message) {
            Some(SESSION_UPDATE) => {
                let session = message
                    .get_mut("session")
                    .and_then(Value::as_object_mut)
                    .ok_or(RelayError::MalformedMessage {
                        message_type: SESSION_UPDATE,
                        reason: "missing session object",
                    })?;
                self.enforce_policy(session)?;
                Ok(serde_json::to_string(&message)?)
            }
            _ => Ok(text),
        }
    }

    fn enforce_policy(&self, session: &mut Map<String, Value>) -> Result<(), RelayError> {
        let policy = &self.policy;

        if let Some(instructions) = policy.instructions().filter(|i| !i.is_empty()) {
            session.insert(session::INSTRUCTIONS.to_string(), instructions.into());
        }
        if let Some(temperature) = policy.temperature() {
            session.insert(session::TEMPERATURE.to_string(), temperature.into());
        }
        if let Some(max_tokens) = policy.max_tokens() {
            session.insert(
                session::MAX_RESPONSE_OUTPUT_TOKENS.to_string(),
                serde_json::to_value(max_tokens)?,
            );
        }
        if let Some(disable_audio) = policy.disable_audio() {
            session.insert(session::DISABLE_AUDIO.to_string(), disable_audio.into());
        }
        if let Some(voice) = policy.voice() {
            session.insert(session::VOICE.to_string(), serde_json::to_value(voice)?);
        }
        if let Some(turn_detection) = policy.turn_detection() {
            tracing::info!("applying server turn detection settings: {:?}", turn_detection);
            session.insert(
                session::TURN_DETECTION.to_string(),
                serde_json::to_value(turn_detection)?,
            );
        }

        let tool_choice = if self.registry.is_empty() {
            ToolChoice::None
        } else {
            ToolChoice::Auto
        };
        session.insert(
            session::TOOL_CHOICE.to_string(),
            serde_json::to_value(tool_choice)?,
        );
        session.insert(
            session::TOOLS.to_string(),
            Value::Array(self.registry.schemas().to_vec()),
        );
        tracing::debug!(
            tools = self.registry.len(),
            "enforced server policy on session.update"
        );

        Ok(())
    }
}
