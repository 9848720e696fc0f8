pub mod client;
pub mod server;

use client::*;
use server::*;

pub use server::ServerEventType;

/// Events the relay itself originates towards the upstream service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate(ConversationItemCreateEvent),
    #[serde(rename = "response.create")]
    ResponseCreate(ResponseCreateEvent),
}

/// Events the relay itself originates towards the client.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    #[serde(rename = "extension.middle_tier_tool_response")]
    MiddleTierToolResponse(MiddleTierToolResponseEvent),
}
