use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::RelayError;

mod config;
mod consts;
mod credential;
mod utils;

pub use config::{UpstreamConfig, UpstreamConfigBuilder};
pub use consts::{CLIENT_REQUEST_ID_HEADER, DEFAULT_API_VERSION, TOKEN_SCOPE};
pub use credential::{AzureCliTokenProvider, Credential, StaticTokenProvider, TokenProvider};

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens authenticated connections to the upstream realtime deployment.
#[derive(Debug)]
pub struct UpstreamConnector {
    config: UpstreamConfig,
    credential: Credential,
}

impl UpstreamConnector {
    pub fn new(config: UpstreamConfig, credential: Credential) -> Self {
        Self { config, credential }
    }

    /// Acquires credentials and completes the websocket handshake.
    ///
    /// Credentials are fetched once here and never refreshed for the life of
    /// the returned socket.
    pub async fn connect(&self, request_id: Option<&str>) -> Result<UpstreamSocket, RelayError> {
        let auth = self.credential.acquire().await?;
        let request = utils::build_request(&self.config, &auth, request_id)?;

        let (socket, response) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!(
            status = %response.status(),
            deployment = self.config.deployment(),
            "connected to upstream realtime endpoint"
        );
        Ok(socket)
    }
}
