#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad(ServerVadTurnDetection),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServerVadTurnDetection {
    /// Activation threshold for VAD(0.0 to 1.0).
    threshold: f64,

    /// Amount of audio to include before speech starts, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix_padding_ms: Option<u32>,

    /// Duration of silence to detect speech stop, in milliseconds
    silence_duration_ms: u32,

    /// Whether the model's in-flight response is cut off when the user starts speaking
    #[serde(skip_serializing_if = "Option::is_none")]
    interrupt_response: Option<bool>,

    /// Whether a response is created automatically when speech stops
    #[serde(skip_serializing_if = "Option::is_none")]
    create_response: Option<bool>,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self::ServerVad(ServerVadTurnDetection::default())
    }
}

impl Default for ServerVadTurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            prefix_padding_ms: None,
            silence_duration_ms: 250,
            interrupt_response: Some(true),
            create_response: None,
        }
    }
}

impl ServerVadTurnDetection {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_prefix_padding_ms(mut self, prefix_padding_ms: u32) -> Self {
        self.prefix_padding_ms = Some(prefix_padding_ms);
        self
    }

    pub fn with_silence_duration_ms(mut self, silence_duration_ms: u32) -> Self {
        self.silence_duration_ms = silence_duration_ms;
        self
    }

    pub fn with_interrupt_response(mut self, interrupt_response: bool) -> Self {
        self.interrupt_response = Some(interrupt_response);
        self
    }

    pub fn with_create_response(mut self, create_response: bool) -> Self {
        self.create_response = Some(create_response);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn silence_duration_ms(&self) -> u32 {
        self.silence_duration_ms
    }

    pub fn interrupt_response(&self) -> Option<bool> {
        self.interrupt_response
    }
}
