use super::{ContainerManager, ContainerManagerError, RawResponse};
use crate::models::ClusterType;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Client de l'API Kubernetes (`/api/v1`), authentifié par bearer token
pub struct KubeContainerManager {
    name: String,
    base_url: Url,
    token: String,
    client: reqwest::Client,
}

impl KubeContainerManager {
    pub fn new(
        name: impl Into<String>,
        server_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ContainerManagerError> {
        let server_url = server_url.trim().trim_end_matches('/');
        let invalid = |reason: String| ContainerManagerError::InvalidConfig(format!("server_url `{server_url}`: {reason}"));

        let base_url = Url::parse(&format!("{server_url}/api/v1")).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("warden-kernel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            name: name.into(),
            base_url,
            token: token.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/nodes/{address}`, l'adresse encodée comme un seul segment
    fn node_url(&self, address: &str) -> Result<Url, ContainerManagerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ContainerManagerError::InvalidConfig(format!("cannot extend `{}`", self.base_url)))?
            .pop_if_empty()
            .push("nodes")
            .push(address);
        Ok(url)
    }
}

#[async_trait]
impl ContainerManager for KubeContainerManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn cluster_type(&self) -> ClusterType {
        ClusterType::Kubernetes
    }

    async fn node_status(&self, address: &str) -> Result<RawResponse, ContainerManagerError> {
        let url = self.node_url(address)?;
        debug!(manager = %self.name, %url, "[kube] fetching node status");

        let mut request = self.client.get(url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ContainerManagerError::Unreachable(e.to_string())
            } else {
                ContainerManagerError::Http(e)
            }
        })?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}
