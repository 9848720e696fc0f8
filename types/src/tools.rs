use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Tool {
    #[serde(rename = "function")]
    Function(FunctionTool),
}

impl Tool {
    pub fn name(&self) -> &str {
        match self {
            Tool::Function(function) => function.name(),
        }
    }
}

/// A function schema in the flat shape the realtime API expects:
/// `name`, `description` and `parameters` all sit at the top level.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionTool {
    /// The name of the function
    name: String,

    /// The description of the function
    description: String,

    /// The parameters of the function in JSON Schema format
    parameters: ToolParameters,
}

impl FunctionTool {
    pub fn new(name: &str, description: &str, parameters: ToolParameters) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }
}

/// The `{"type": "object", "properties": ..., "required": ...}` block of a function schema.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    schema_type: String,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Map::new(),
            required: vec![],
        }
    }
}

impl ToolParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property; `required` marks it in the `required` list as well.
    pub fn with_property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }
}
