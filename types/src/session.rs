//! Field names of the `session` object that the relay overwrites, and the
//! value types it writes into them.

pub const INSTRUCTIONS: &str = "instructions";
pub const TEMPERATURE: &str = "temperature";
pub const MAX_RESPONSE_OUTPUT_TOKENS: &str = "max_response_output_tokens";
pub const DISABLE_AUDIO: &str = "disable_audio";
pub const VOICE: &str = "voice";
pub const TURN_DETECTION: &str = "turn_detection";
pub const TOOLS: &str = "tools";
pub const TOOL_CHOICE: &str = "tool_choice";

/// Maximum number of output tokens. Use "inf" for infinity.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MaxOutputTokens {
    Number(u32),
    Infinity(String),
}

impl MaxOutputTokens {
    pub fn infinite() -> Self {
        Self::Infinity("inf".to_string())
    }
}

impl std::str::FromStr for MaxOutputTokens {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "inf" {
            return Ok(Self::infinite());
        }
        s.parse().map(Self::Number)
    }
}
