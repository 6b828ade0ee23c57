/*!
 * STATUS - Agrégation du statut d'un host
 *
 * RÔLE :
 * Compose, par requête, le record du host, le type de son cluster et, pour
 * un cluster orchestré, le statut live renvoyé par le container manager.
 *
 * RÈGLES :
 * - host absent ou sans cluster propriétaire -> NotFound
 * - cluster `host` : container_manager = {} sans aucun appel externe
 * - cluster orchestré : toute panne de l'orchestrateur (réseau, code non-2xx,
 *   corps illisible, manager absent) dégrade en {} ; jamais d'échec global
 *
 * Le cluster propriétaire est trouvé par recherche inverse dans les hostsets.
 */

use crate::models::{Cluster, Host, HostStatusView};
use crate::store::StoreHandlerManager;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("host `{0}` not found")]
    HostNotFound(String),
    #[error("no cluster contains host `{0}`")]
    ClusterNotFound(String),
}

#[derive(Clone)]
pub struct StatusAggregator {
    store: Arc<StoreHandlerManager>,
}

impl StatusAggregator {
    pub fn new(store: Arc<StoreHandlerManager>) -> Self {
        Self { store }
    }

    pub async fn status(&self, address: &str) -> Result<HostStatusView, StatusError> {
        let host = self
            .store
            .get::<Host>(address)
            .map_err(|_| StatusError::HostNotFound(address.to_string()))?;
        let cluster = self
            .owning_cluster(address)
            .ok_or_else(|| StatusError::ClusterNotFound(address.to_string()))?;

        let container_manager = if cluster.cluster_type.is_container_managed() {
            self.container_manager_status(&cluster, address).await
        } else {
            Map::new()
        };

        Ok(HostStatusView {
            cluster_type: cluster.cluster_type,
            host: host.status_summary(),
            container_manager,
        })
    }

    /// Premier cluster (ordre des handlers) dont le hostset contient l'adresse
    pub fn owning_cluster(&self, address: &str) -> Option<Cluster> {
        let mut owners = self.store.list::<Cluster>().into_iter().filter(|c| c.contains(address));
        let owner = owners.next()?;

        let others: Vec<String> = owners.map(|c| c.name).collect();
        if !others.is_empty() {
            warn!(
                address,
                cluster = %owner.name,
                also_in = ?others,
                "[status] host listed in several clusters, using the first"
            );
        }
        Some(owner)
    }

    async fn container_manager_status(&self, cluster: &Cluster, address: &str) -> Map<String, Value> {
        let Some(manager) = self
            .store
            .list_container_managers()
            .iter()
            .find(|m| m.cluster_type() == cluster.cluster_type)
        else {
            warn!(cluster = %cluster.name, kind = %cluster.cluster_type, "[status] no container manager registered");
            return Map::new();
        };

        let response = match manager.node_status(address).await {
            Ok(response) => response,
            Err(e) => {
                warn!(manager = manager.name(), address, error = %e, "[status] container manager unreachable");
                return Map::new();
            }
        };

        if !response.is_success() {
            debug!(manager = manager.name(), address, status = response.status, "[status] container manager returned an error");
            return Map::new();
        }

        match serde_json::from_str::<Map<String, Value>>(&response.body) {
            Ok(data) => data,
            Err(e) => {
                debug!(manager = manager.name(), address, error = %e, "[status] undecodable container manager body");
                Map::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containermgr::{ContainerManager, ContainerManagerError, RawResponse};
    use crate::models::{ClusterType, HostStatus};
    use crate::store::{EntityKind, MemoryStoreHandler};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADDRESS: &str = "10.2.0.2";

    /// Orchestrateur factice : réponse fixe ou panne réseau
    struct FakeKube {
        response: Option<RawResponse>,
        calls: AtomicUsize,
    }

    impl FakeKube {
        fn answering(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Some(RawResponse {
                    status,
                    body: body.to_string(),
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn down() -> Arc<Self> {
            Arc::new(Self {
                response: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContainerManager for FakeKube {
        fn name(&self) -> &str {
            "fake-kube"
        }

        fn cluster_type(&self) -> ClusterType {
            ClusterType::Kubernetes
        }

        async fn node_status(&self, _address: &str) -> Result<RawResponse, ContainerManagerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .clone()
                .ok_or_else(|| ContainerManagerError::Unreachable("connection refused".into()))
        }
    }

    fn aggregator(cluster_type: ClusterType, kube: Option<Arc<FakeKube>>) -> StatusAggregator {
        let mut builder = StoreHandlerManager::builder().handler(MemoryStoreHandler::new("memory"), &EntityKind::ALL);
        if let Some(kube) = kube {
            builder = builder.shared_container_manager(kube);
        }
        let store = Arc::new(builder.build());

        let mut host = Host::new(ADDRESS);
        host.status = HostStatus::Available;
        store.save(host).unwrap();
        let mut cluster = Cluster::new("cluster", cluster_type);
        cluster.hostset.insert(ADDRESS.to_string());
        store.save(cluster).unwrap();

        StatusAggregator::new(store)
    }

    #[tokio::test]
    async fn test_host_only_cluster_never_calls_container_manager() {
        let kube = FakeKube::answering(200, r#"{"use": "kube"}"#);
        let status = aggregator(ClusterType::Host, Some(kube.clone()))
            .status(ADDRESS)
            .await
            .unwrap();

        assert_eq!(status.cluster_type, ClusterType::Host);
        assert_eq!(status.host.status, HostStatus::Available);
        assert!(status.container_manager.is_empty());
        assert_eq!(kube.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_kubernetes_cluster_is_enriched() {
        let kube = FakeKube::answering(200, r#"{"use": "kube"}"#);
        let status = aggregator(ClusterType::Kubernetes, Some(kube.clone()))
            .status(ADDRESS)
            .await
            .unwrap();

        assert_eq!(status.cluster_type, ClusterType::Kubernetes);
        assert_eq!(Value::Object(status.container_manager), json!({"use": "kube"}));
        assert_eq!(kube.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_container_manager_failures_degrade_to_empty() {
        for kube in [
            Some(FakeKube::down()),
            Some(FakeKube::answering(500, r#"{"use": "kube"}"#)),
            Some(FakeKube::answering(200, "not json")),
            Some(FakeKube::answering(200, "[1, 2]")),
            None,
        ] {
            let status = aggregator(ClusterType::Kubernetes, kube)
                .status(ADDRESS)
                .await
                .unwrap();
            assert_eq!(status.cluster_type, ClusterType::Kubernetes);
            assert!(status.container_manager.is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_host_or_cluster_is_not_found() {
        let agg = aggregator(ClusterType::Host, None);
        assert!(matches!(
            agg.status("10.9.9.9").await,
            Err(StatusError::HostNotFound(_))
        ));

        agg.store.save(Host::new("10.9.9.9")).unwrap();
        assert!(matches!(
            agg.status("10.9.9.9").await,
            Err(StatusError::ClusterNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_first_owning_cluster_wins() {
        let agg = aggregator(ClusterType::Host, None);
        let mut later = Cluster::new("zzz", ClusterType::Kubernetes);
        later.hostset.insert(ADDRESS.to_string());
        agg.store.save(later).unwrap();

        assert_eq!(agg.owning_cluster(ADDRESS).unwrap().name, "cluster");
    }

    #[test]
    fn test_status_view_wire_format() {
        let mut host = Host::new(ADDRESS);
        host.status = HostStatus::Available;
        let view = HostStatusView {
            cluster_type: ClusterType::Host,
            host: host.status_summary(),
            container_manager: Map::new(),
        };
        assert_eq!(
            serde_json::to_value(view).unwrap(),
            json!({
                "type": "host",
                "host": {"status": "available", "last_check": null},
                "container_manager": {}
            })
        );
    }
}
