use crate::upstream::consts::DEFAULT_API_VERSION;

/// Where the upstream realtime deployment lives.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    endpoint: String,
    deployment: String,
    api_version: String,
}

pub struct UpstreamConfigBuilder {
    config: UpstreamConfig,
}

impl UpstreamConfigBuilder {
    pub fn new(endpoint: &str, deployment: &str) -> Self {
        Self {
            config: UpstreamConfig {
                endpoint: endpoint.to_string(),
                deployment: deployment.to_string(),
                api_version: DEFAULT_API_VERSION.to_string(),
            },
        }
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.config.api_version = api_version.to_string();
        self
    }

    pub fn build(self) -> UpstreamConfig {
        self.config
    }
}

impl UpstreamConfig {
    pub fn builder(endpoint: &str, deployment: &str) -> UpstreamConfigBuilder {
        UpstreamConfigBuilder::new(endpoint, deployment)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}
