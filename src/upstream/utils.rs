use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::error::RelayError;
use crate::upstream::config::UpstreamConfig;
use crate::upstream::consts::{API_KEY_HEADER, CLIENT_REQUEST_ID_HEADER, REALTIME_PATH};
use crate::upstream::credential::AuthHeader;

pub(crate) fn build_request(
    config: &UpstreamConfig,
    auth: &AuthHeader<'_>,
    request_id: Option<&str>,
) -> Result<Request, RelayError> {
    let url = format!(
        "{}{}?api-version={}&deployment={}",
        websocket_base(config.endpoint()),
        REALTIME_PATH,
        config.api_version(),
        config.deployment()
    );
    let mut request = url.into_client_request()?;
    let headers = request.headers_mut();

    if let Some(request_id) = request_id {
        headers.insert(
            CLIENT_REQUEST_ID_HEADER,
            HeaderValue::from_str(request_id)
                .map_err(|_| RelayError::InvalidHeader(CLIENT_REQUEST_ID_HEADER))?,
        );
    }

    match auth {
        AuthHeader::ApiKey(key) => {
            let mut value = HeaderValue::from_str(key.expose_secret())
                .map_err(|_| RelayError::InvalidHeader(API_KEY_HEADER))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }
        AuthHeader::Bearer(token) => {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| RelayError::InvalidHeader("authorization"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
    }

    Ok(request)
}

/// Maps an `https://` resource endpoint onto its websocket scheme.
fn websocket_base(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if let Some(host) = endpoint.strip_prefix("https://") {
        format!("wss://{host}")
    } else if let Some(host) = endpoint.strip_prefix("http://") {
        format!("ws://{host}")
    } else {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> UpstreamConfig {
        UpstreamConfig::builder("https://contoso.openai.azure.com/", "gpt-4o-realtime").build()
    }

    #[test]
    fn test_api_key_request() {
        let key = SecretString::from("key-abc".to_string());
        let request = build_request(&config(), &AuthHeader::ApiKey(&key), None).unwrap();

        assert_eq!(
            request.uri().to_string(),
            "wss://contoso.openai.azure.com/openai/realtime?api-version=2024-10-01-preview&deployment=gpt-4o-realtime"
        );
        assert_eq!(request.headers()[API_KEY_HEADER], "key-abc");
        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert!(request.headers().get(CLIENT_REQUEST_ID_HEADER).is_none());
    }

    #[test]
    fn test_bearer_request_keeps_request_id() {
        let token = SecretString::from("tok-123".to_string());
        let request =
            build_request(&config(), &AuthHeader::Bearer(token), Some("req-1")).unwrap();

        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok-123");
        assert_eq!(request.headers()[CLIENT_REQUEST_ID_HEADER], "req-1");
        assert!(request.headers().get(API_KEY_HEADER).is_none());
    }

    #[test]
    fn test_api_version_override_and_plain_http() {
        let config = UpstreamConfig::builder("http://localhost:8080", "dev")
            .with_api_version("2025-04-01-preview")
            .build();
        let key = SecretString::from("k".to_string());
        let request = build_request(&config, &AuthHeader::ApiKey(&key), None).unwrap();

        assert_eq!(
            request.uri().to_string(),
            "ws://localhost:8080/openai/realtime?api-version=2025-04-01-preview&deployment=dev"
        );
    }

    #[test]
    fn test_invalid_request_id_is_rejected() {
        let key = SecretString::from("k".to_string());
        let result = build_request(&config(), &AuthHeader::ApiKey(&key), Some("bad\nid"));

        assert!(matches!(result, Err(RelayError::InvalidHeader(CLIENT_REQUEST_ID_HEADER))));
    }
}
