//! Per-direction message rewriting.
//!
//! Each translator parses a frame into a fresh `serde_json::Value`, decides by
//! its `type` tag what to do with it and produces new frames. Unrecognised
//! messages are forwarded as the exact text that arrived.

mod to_client;
mod to_upstream;

pub use to_client::{Translation, UpstreamToClient};
pub use to_upstream::ClientToUpstream;

use serde_json::Value;

fn message_type(message: &Value) -> Option<&str> {
    message.get("type").and_then(Value::as_str)
}

fn item_type(message: &Value) -> Option<&str> {
    message
        .get("item")
        .and_then(|item| item.get("type"))
        .and_then(Value::as_str)
}
