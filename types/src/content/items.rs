#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Item {
    #[serde(rename = "function_call")]
    FunctionCall(FunctionCallItem),
    #[serde(rename = "function_call_output")]
    FunctionCallOutput(FunctionCallOutputItem),
}

impl Item {
    pub const FUNCTION_CALL: &'static str = "function_call";
    pub const FUNCTION_CALL_OUTPUT: &'static str = "function_call_output";
}

/// A `function_call` item as the upstream service reports it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionCallItem {
    /// The unique ID of the item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    /// The ID of the function call
    call_id: String,

    /// The name of the function being called
    #[serde(default)]
    name: String,

    /// The arguments of the call, as a JSON-encoded string
    #[serde(default)]
    arguments: String,
}

impl FunctionCallItem {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }
}

/// A `function_call_output` item, sent upstream to complete a call.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionCallOutputItem {
    /// The ID of the function call this output answers
    call_id: String,

    /// The output of the function call
    output: String,
}

impl FunctionCallOutputItem {
    pub fn new(call_id: &str, output: String) -> Self {
        Self {
            call_id: call_id.to_string(),
            output,
        }
    }
}
