use std::process::Command;
use std::sync::Arc;

use secrecy::SecretString;

use crate::error::RelayError;
use crate::upstream::consts::TOKEN_SCOPE;

/// A source of bearer tokens whose fetch may block.
///
/// The relay always calls it on the blocking thread pool.
pub trait TokenProvider: Send + Sync {
    fn get_token(&self, scope: &str) -> Result<SecretString, RelayError>;
}

/// How the relay authenticates against the upstream service.
///
/// Chosen once when the relay is built; every session uses the same variant.
pub enum Credential {
    /// Sent verbatim in the `api-key` header.
    StaticKey(SecretString),
    /// Fetched once per session and sent as `Authorization: Bearer`.
    TokenProvider(Arc<dyn TokenProvider>),
}

impl Credential {
    pub fn static_key(key: &str) -> Self {
        Self::StaticKey(SecretString::from(key.to_string()))
    }

    pub fn token_provider(provider: impl TokenProvider + 'static) -> Self {
        Self::TokenProvider(Arc::new(provider))
    }

    pub(crate) async fn acquire(&self) -> Result<AuthHeader<'_>, RelayError> {
        match self {
            Credential::StaticKey(key) => Ok(AuthHeader::ApiKey(key)),
            Credential::TokenProvider(provider) => {
                tracing::info!("acquiring token for upstream connection");
                let provider = Arc::clone(provider);
                let token =
                    tokio::task::spawn_blocking(move || provider.get_token(TOKEN_SCOPE)).await??;
                tracing::info!("token acquired");
                Ok(AuthHeader::Bearer(token))
            }
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::StaticKey(_) => f.write_str("Credential::StaticKey([REDACTED])"),
            Credential::TokenProvider(_) => f.write_str("Credential::TokenProvider"),
        }
    }
}

/// The single auth header attached to an upstream handshake.
pub(crate) enum AuthHeader<'a> {
    ApiKey(&'a SecretString),
    Bearer(SecretString),
}

/// Asks the Azure CLI of the signed-in developer for a token.
#[derive(Debug, Clone, Default)]
pub struct AzureCliTokenProvider;

impl TokenProvider for AzureCliTokenProvider {
    fn get_token(&self, scope: &str) -> Result<SecretString, RelayError> {
        let output = Command::new("az")
            .args(["account", "get-access-token", "--scope", scope])
            .args(["--query", "accessToken", "--output", "tsv"])
            .output()
            .map_err(|e| RelayError::Credential(format!("failed to run az: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelayError::Credential(format!(
                "az account get-access-token failed: {}",
                stderr.trim()
            )));
        }

        let token = String::from_utf8(output.stdout)
            .map_err(|_| RelayError::Credential("az returned a non-UTF-8 token".to_string()))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(RelayError::Credential("az returned an empty token".to_string()));
        }
        Ok(SecretString::from(token.to_string()))
    }
}

/// A token minted elsewhere, handed out as-is.
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: SecretString::from(token.to_string()),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token(&self, _scope: &str) -> Result<SecretString, RelayError> {
        use secrecy::ExposeSecret;
        Ok(SecretString::from(self.token.expose_secret().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use secrecy::ExposeSecret;

    mock! {
        pub TokenSource {}
        impl TokenProvider for TokenSource {
            fn get_token(&self, scope: &str) -> Result<SecretString, RelayError>;
        }
    }

    #[tokio::test]
    async fn test_token_provider_is_called_once_with_scope() {
        let mut source = MockTokenSource::new();
        source
            .expect_get_token()
            .times(1)
            .returning(|scope| {
                assert_eq!(scope, TOKEN_SCOPE);
                Ok(SecretString::from("tok-123".to_string()))
            });

        let credential = Credential::token_provider(source);
        let header = credential.acquire().await.unwrap();

        match header {
            AuthHeader::Bearer(token) => assert_eq!(token.expose_secret(), "tok-123"),
            AuthHeader::ApiKey(_) => panic!("expected a bearer token"),
        }
    }

    #[tokio::test]
    async fn test_token_failure_is_propagated() {
        let mut source = MockTokenSource::new();
        source
            .expect_get_token()
            .returning(|_| Err(RelayError::Credential("expired".to_string())));

        let credential = Credential::token_provider(source);
        let result = credential.acquire().await;

        assert!(matches!(result, Err(RelayError::Credential(reason)) if reason == "expired"));
    }

    #[tokio::test]
    async fn test_static_key_needs_no_fetch() {
        let credential = Credential::static_key("key-abc");

        match credential.acquire().await.unwrap() {
            AuthHeader::ApiKey(key) => assert_eq!(key.expose_secret(), "key-abc"),
            AuthHeader::Bearer(_) => panic!("expected an api key"),
        }
    }

    #[tokio::test]
    async fn test_static_token_provider_is_sent_as_bearer() {
        let credential = Credential::token_provider(StaticTokenProvider::new("pre-minted"));

        match credential.acquire().await.unwrap() {
            AuthHeader::Bearer(token) => assert_eq!(token.expose_secret(), "pre-minted"),
            AuthHeader::ApiKey(_) => panic!("expected a bearer token"),
        }
    }

    #[test]
    fn test_debug_output_redacts_key() {
        let credential = Credential::static_key("key-abc");
        assert!(!format!("{credential:?}").contains("key-abc"));
    }
}
