use std::collections::HashMap;

/// A function call the upstream model has created but whose turn has not completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToolCall {
    call_id: String,
    previous_item_id: Option<String>,
}

impl PendingToolCall {
    pub fn new(call_id: &str, previous_item_id: Option<&str>) -> Self {
        Self {
            call_id: call_id.to_string(),
            previous_item_id: previous_item_id.map(str::to_string),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// The conversation item that preceded the call.
    pub fn previous_item_id(&self) -> Option<&str> {
        self.previous_item_id.as_deref()
    }
}

/// Per-session correlation table from `call_id` to its pending call.
///
/// Owned by the session's upstream-to-client flow, so it needs no locking.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: HashMap<String, PendingToolCall>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call unless one with the same id is already pending.
    /// Returns whether the call was newly recorded.
    pub fn register(&mut self, call: PendingToolCall) -> bool {
        if self.calls.contains_key(call.call_id()) {
            return false;
        }
        self.calls.insert(call.call_id.clone(), call);
        true
    }

    pub fn get(&self, call_id: &str) -> Option<&PendingToolCall> {
        self.calls.get(call_id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Drops every pending call at once. Calls are never resolved individually;
    /// a turn completion wipes the whole table, including calls registered by
    /// any other response still in flight.
    pub fn clear(&mut self) -> usize {
        let cleared = self.calls.len();
        self.calls.clear();
        cleared
    }
}
