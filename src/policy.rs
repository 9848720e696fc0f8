use crate::types::audio::{TurnDetection, Voice};
use crate::types::session::MaxOutputTokens;

/// Session settings the server enforces regardless of what the client asks for.
///
/// Unset fields leave the client's value alone; set fields always win.
#[derive(Debug, Clone, Default)]
pub struct SessionPolicy {
    instructions: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<MaxOutputTokens>,
    disable_audio: Option<bool>,
    voice: Option<Voice>,
    turn_detection: Option<TurnDetection>,
}

impl SessionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: MaxOutputTokens) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_disable_audio(mut self, disable_audio: bool) -> Self {
        self.disable_audio = Some(disable_audio);
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_turn_detection(mut self, turn_detection: TurnDetection) -> Self {
        self.turn_detection = Some(turn_detection);
        self
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<&MaxOutputTokens> {
        self.max_tokens.as_ref()
    }

    pub fn disable_audio(&self) -> Option<bool> {
        self.disable_audio
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn turn_detection(&self) -> Option<&TurnDetection> {
        self.turn_detection.as_ref()
    }
}
