pub const REALTIME_PATH: &str = "/openai/realtime";
pub const DEFAULT_API_VERSION: &str = "2024-10-01-preview";

/// Scope requested from token providers.
pub const TOKEN_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

pub const API_KEY_HEADER: &str = "api-key";
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";
