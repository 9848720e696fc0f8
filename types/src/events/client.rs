use crate::Item;

/// Tag of the client's session negotiation message.
pub const SESSION_UPDATE: &str = "session.update";

/// `conversation.item.create` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversationItemCreateEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// The item to add to the conversation
    item: Item,
}

impl ConversationItemCreateEvent {
    pub fn new(item: Item) -> Self {
        Self {
            event_id: None,
            item,
        }
    }
}

/// `response.create` event
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseCreateEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
}

impl ResponseCreateEvent {
    pub fn new() -> Self {
        Self::default()
    }
}
