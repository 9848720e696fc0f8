use std::str::FromStr;

/// The upstream message types the relay distinguishes. Every other tag maps to
/// [`ServerEventType::Other`] and is forwarded untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEventType {
    SessionCreated,
    ConversationItemCreated,
    ResponseOutputItemAdded,
    ResponseOutputItemDone,
    ResponseFunctionCallArgumentsDelta,
    ResponseFunctionCallArgumentsDone,
    ResponseDone,
    Other,
}

impl ServerEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionCreated => "session.created",
            Self::ConversationItemCreated => "conversation.item.created",
            Self::ResponseOutputItemAdded => "response.output_item.added",
            Self::ResponseOutputItemDone => "response.output_item.done",
            Self::ResponseFunctionCallArgumentsDelta => "response.function_call_arguments.delta",
            Self::ResponseFunctionCallArgumentsDone => "response.function_call_arguments.done",
            Self::ResponseDone => "response.done",
            Self::Other => "other",
        }
    }
}

impl FromStr for ServerEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "session.created" => Self::SessionCreated,
            "conversation.item.created" => Self::ConversationItemCreated,
            "response.output_item.added" => Self::ResponseOutputItemAdded,
            "response.output_item.done" => Self::ResponseOutputItemDone,
            "response.function_call_arguments.delta" => Self::ResponseFunctionCallArgumentsDelta,
            "response.function_call_arguments.done" => Self::ResponseFunctionCallArgumentsDone,
            "response.done" => Self::ResponseDone,
            _ => Self::Other,
        })
    }
}

impl From<&str> for ServerEventType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

/// `extension.middle_tier_tool_response` event
///
/// Carries a tool result straight to the client, tagged with the conversation
/// item that preceded the call so the client can place it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MiddleTierToolResponseEvent {
    previous_item_id: Option<String>,
    tool_name: String,
    tool_result: String,
}

impl MiddleTierToolResponseEvent {
    pub fn new(previous_item_id: Option<&str>, tool_name: &str, tool_result: String) -> Self {
        Self {
            previous_item_id: previous_item_id.map(str::to_string),
            tool_name: tool_name.to_string(),
            tool_result,
        }
    }

    pub fn previous_item_id(&self) -> Option<&str> {
        self.previous_item_id.as_deref()
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn tool_result(&self) -> &str {
        &self.tool_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags_round_trip_through_as_str() {
        for kind in [
            ServerEventType::SessionCreated,
            ServerEventType::ConversationItemCreated,
            ServerEventType::ResponseOutputItemAdded,
            ServerEventType::ResponseOutputItemDone,
            ServerEventType::ResponseFunctionCallArgumentsDelta,
            ServerEventType::ResponseFunctionCallArgumentsDone,
            ServerEventType::ResponseDone,
        ] {
            assert_eq!(ServerEventType::from(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unknown_tag_is_other() {
        assert_eq!(ServerEventType::from("response.audio.delta"), ServerEventType::Other);
        assert_eq!(ServerEventType::from(""), ServerEventType::Other);
    }
}
