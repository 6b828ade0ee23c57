/*!
Mock Container Manager

Répond une réponse brute fixe (ou simule un orchestrateur injoignable) et
garde la liste des adresses interrogées.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use warden_kernel::containermgr::{ContainerManager, ContainerManagerError, RawResponse};
use warden_kernel::models::ClusterType;

#[derive(Clone)]
pub struct MockContainerManager {
    cluster_type: ClusterType,
    response: Arc<Mutex<Option<RawResponse>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockContainerManager {
    pub fn returning(status: u16, body: impl Into<String>) -> Self {
        Self {
            cluster_type: ClusterType::Kubernetes,
            response: Arc::new(Mutex::new(Some(RawResponse {
                status,
                body: body.into(),
            }))),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unreachable() -> Self {
        let manager = Self::returning(0, "");
        *manager.response.lock() = None;
        manager
    }

    pub fn set_response(&self, status: u16, body: impl Into<String>) {
        *self.response.lock() = Some(RawResponse {
            status,
            body: body.into(),
        });
    }

    pub fn requested_addresses(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requested.lock().len()
    }
}

#[async_trait]
impl ContainerManager for MockContainerManager {
    fn name(&self) -> &str {
        "mock-kubernetes"
    }

    fn cluster_type(&self) -> ClusterType {
        self.cluster_type
    }

    async fn node_status(&self, address: &str) -> Result<RawResponse, ContainerManagerError> {
        self.requested.lock().push(address.to_string());
        self.response
            .lock()
            .clone()
            .ok_or_else(|| ContainerManagerError::Unreachable(format!("{address}: connection refused")))
    }
}
