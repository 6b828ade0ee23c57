/*!
 * HOSTS - Contrôleur de réconciliation des hosts
 *
 * RÔLE :
 * Création idempotente, lecture, suppression et projection credentials
 * d'un host. Chaque requête est évaluée indépendamment contre l'état
 * courant du store ; le contrôleur ne garde rien entre deux requêtes.
 *
 * CREATE-OR-CONFIRM :
 * - host absent  : le cluster demandé doit exister, sinon PreconditionFailed ;
 *                  host créé en `inprocess` puis ajouté au hostset du cluster
 * - host présent : chaque champ fourni doit être identique au stocké
 *                  (credentials comparés octet par octet) ; sinon Conflict.
 *                  Jamais d'écriture sur ce chemin.
 *
 * LIMITE CONNUE :
 * lecture -> comparaison -> écriture n'est pas atomique ; deux PUT
 * concurrents sur la même adresse peuvent tous deux voir "absent".
 */

use crate::models::{validate_address, Cluster, Host, HostCreds, HostSpec, HostStatus, Hosts, ModelError, DEFAULT_REMOTE_USER};
use crate::store::{StoreError, StoreHandlerManager};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("host `{0}` not found")]
    NotFound(String),
    #[error("host `{address}` conflicts with request: {reason}")]
    Conflict { address: String, reason: String },
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error(transparent)]
    InvalidAddress(#[from] ModelError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issue d'un create-or-confirm réussi
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Premier PUT : host persisté, tel que renvoyé par le store
    Created(Host),
    /// Rejeu identique : host existant, aucune écriture
    Unchanged(Host),
}

impl CreateOutcome {
    pub fn host(&self) -> &Host {
        match self {
            CreateOutcome::Created(h) | CreateOutcome::Unchanged(h) => h,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Adresse dérivée pour un PUT `/host` sans adresse : l'IP du pair
pub fn implicit_address(peer: IpAddr) -> String {
    peer.to_canonical().to_string()
}

#[derive(Clone)]
pub struct HostController {
    store: Arc<StoreHandlerManager>,
}

impl HostController {
    pub fn new(store: Arc<StoreHandlerManager>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Hosts {
        Hosts(self.store.list::<Host>())
    }

    pub fn retrieve(&self, address: &str) -> Result<Host, HostError> {
        self.store
            .get::<Host>(address)
            .map_err(|_| HostError::NotFound(address.to_string()))
    }

    pub fn credentials(&self, address: &str) -> Result<HostCreds, HostError> {
        self.retrieve(address).map(|h| h.creds())
    }

    pub fn delete(&self, address: &str) -> Result<(), HostError> {
        self.store
            .delete::<Host>(address)
            .map_err(|_| HostError::NotFound(address.to_string()))?;

        let clusters = self.store.remove_host_from_clusters(address);
        info!(address, clusters, "[hosts] host deleted");
        Ok(())
    }

    pub fn create_or_confirm(&self, address: &str, spec: HostSpec) -> Result<CreateOutcome, HostError> {
        validate_address(address)?;
        match self.store.get::<Host>(address) {
            Ok(existing) => self.confirm(existing, &spec).map(CreateOutcome::Unchanged),
            Err(e) => {
                debug!(address, reason = %e, "[hosts] host absent, creating");
                self.create(address, spec).map(CreateOutcome::Created)
            }
        }
    }

    pub fn create_or_confirm_implicit(&self, peer: IpAddr, spec: HostSpec) -> Result<CreateOutcome, HostError> {
        let address = implicit_address(peer);
        self.create_or_confirm(&address, spec)
    }

    fn create(&self, address: &str, spec: HostSpec) -> Result<Host, HostError> {
        let cluster_name = spec
            .cluster
            .as_deref()
            .ok_or_else(|| HostError::PreconditionFailed("no cluster named in request".into()))?;
        self.store.get::<Cluster>(cluster_name).map_err(|_| {
            HostError::PreconditionFailed(format!("cluster `{cluster_name}` does not exist"))
        })?;

        let host = Host {
            address: address.to_string(),
            status: HostStatus::Inprocess,
            ssh_priv_key: spec.ssh_priv_key.clone().unwrap_or_default(),
            remote_user: spec
                .remote_user
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_USER.to_string()),
            ..Host::default()
        };
        let saved = self.store.save(host)?;

        // tout ou rien : sans appartenance au cluster, on retire le host
        if let Err(e) = self.store.add_host_to_cluster(cluster_name, &saved.address) {
            warn!(address, cluster = cluster_name, error = %e, "[hosts] cluster update failed, rolling back");
            if let Err(rollback) = self.store.delete::<Host>(&saved.address) {
                warn!(address, error = %rollback, "[hosts] rollback failed");
            }
            return Err(if e.is_not_found() {
                HostError::PreconditionFailed(format!("cluster `{cluster_name}` disappeared during create"))
            } else {
                e.into()
            });
        }

        info!(address, cluster = cluster_name, "[hosts] host created");
        Ok(saved)
    }

    fn confirm(&self, existing: Host, spec: &HostSpec) -> Result<Host, HostError> {
        let conflict = |reason: String| HostError::Conflict {
            address: existing.address.clone(),
            reason,
        };

        if let Some(name) = spec.cluster.as_deref() {
            match self.store.get::<Cluster>(name) {
                Ok(cluster) if cluster.contains(&existing.address) => {}
                Ok(_) => return Err(conflict(format!("host is not a member of cluster `{name}`"))),
                Err(_) => return Err(conflict(format!("cluster `{name}` does not exist"))),
            }
        }

        if let Some(key) = &spec.ssh_priv_key {
            if *key != existing.ssh_priv_key {
                return Err(conflict("ssh_priv_key differs".into()));
            }
        }

        if let Some(user) = &spec.remote_user {
            if *user != existing.remote_user {
                return Err(conflict("remote_user differs".into()));
            }
        }

        debug!(address = %existing.address, "[hosts] request matches existing host");
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClusterType;
    use crate::store::{Entity, EntityKind, HandlerError, HandlerInfo, MemoryStoreHandler, StoreHandler, StoreModel};
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicBool, Ordering};

    const ADDRESS: &str = "10.2.0.2";

    fn controller_with_cluster() -> (HostController, Arc<StoreHandlerManager>) {
        let store = Arc::new(
            StoreHandlerManager::builder()
                .handler(MemoryStoreHandler::new("memory"), &EntityKind::ALL)
                .build(),
        );
        store.save(Cluster::new("cluster", ClusterType::Host)).unwrap();
        (HostController::new(store.clone()), store)
    }

    fn spec() -> HostSpec {
        HostSpec {
            ssh_priv_key: Some(b"test\n".to_vec()),
            remote_user: Some("root".into()),
            cluster: Some("cluster".into()),
        }
    }

    #[test]
    fn test_create_then_confirm_is_idempotent() {
        let (hosts, store) = controller_with_cluster();

        let first = hosts.create_or_confirm(ADDRESS, spec()).unwrap();
        assert!(first.is_created());
        assert_eq!(first.host().status, HostStatus::Inprocess);
        assert_eq!(first.host().ssh_priv_key, b"test\n");

        let second = hosts.create_or_confirm(ADDRESS, spec()).unwrap();
        assert!(!second.is_created());
        assert_eq!(first.host(), second.host());

        assert!(store.get::<Cluster>("cluster").unwrap().contains(ADDRESS));
    }

    #[test]
    fn test_conflicting_credential_leaves_stored_value() {
        let (hosts, _) = controller_with_cluster();
        hosts.create_or_confirm(ADDRESS, spec()).unwrap();

        // "boguskey" est du base64 valide mais d'autres octets
        let bogus = HostSpec {
            ssh_priv_key: Some(crate::models::base64_bytes::decode("boguskey").unwrap()),
            ..HostSpec::default()
        };
        let err = hosts.create_or_confirm(ADDRESS, bogus).unwrap_err();
        assert!(matches!(err, HostError::Conflict { .. }));

        assert_eq!(hosts.retrieve(ADDRESS).unwrap().ssh_priv_key, b"test\n");
    }

    #[test]
    fn test_conflicting_remote_user() {
        let (hosts, _) = controller_with_cluster();
        hosts.create_or_confirm(ADDRESS, spec()).unwrap();

        let other_user = HostSpec {
            remote_user: Some("admin".into()),
            ..HostSpec::default()
        };
        assert!(matches!(
            hosts.create_or_confirm(ADDRESS, other_user),
            Err(HostError::Conflict { .. })
        ));
    }

    #[test]
    fn test_confirm_checks_cluster_membership() {
        let (hosts, store) = controller_with_cluster();
        hosts.create_or_confirm(ADDRESS, spec()).unwrap();
        store.save(Cluster::new("other", ClusterType::Host)).unwrap();

        let wrong_cluster = HostSpec {
            cluster: Some("other".into()),
            ..spec()
        };
        assert!(matches!(
            hosts.create_or_confirm(ADDRESS, wrong_cluster),
            Err(HostError::Conflict { .. })
        ));

        let missing_cluster = HostSpec {
            cluster: Some("missing".into()),
            ..spec()
        };
        assert!(matches!(
            hosts.create_or_confirm(ADDRESS, missing_cluster),
            Err(HostError::Conflict { .. })
        ));
    }

    #[test]
    fn test_confirm_with_no_fields_is_a_noop() {
        let (hosts, _) = controller_with_cluster();
        hosts.create_or_confirm(ADDRESS, spec()).unwrap();

        let outcome = hosts.create_or_confirm(ADDRESS, HostSpec::default()).unwrap();
        assert!(!outcome.is_created());
    }

    #[test]
    fn test_missing_cluster_is_a_precondition_failure() {
        let (hosts, _) = controller_with_cluster();

        let spec = HostSpec {
            cluster: Some("missing".into()),
            ..spec()
        };
        assert!(matches!(
            hosts.create_or_confirm(ADDRESS, spec),
            Err(HostError::PreconditionFailed(_))
        ));
        assert!(matches!(hosts.retrieve(ADDRESS), Err(HostError::NotFound(_))));

        let no_cluster = HostSpec {
            cluster: None,
            ..HostSpec::default()
        };
        assert!(matches!(
            hosts.create_or_confirm(ADDRESS, no_cluster),
            Err(HostError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_create_defaults_remote_user() {
        let (hosts, _) = controller_with_cluster();
        let spec = HostSpec {
            cluster: Some("cluster".into()),
            ..HostSpec::default()
        };
        let host = hosts.create_or_confirm(ADDRESS, spec).unwrap();
        assert_eq!(host.host().remote_user, "root");
    }

    /// Clusters lisibles mais plus modifiables
    struct ReadOnlyClusters(MemoryStoreHandler);

    impl StoreHandler for ReadOnlyClusters {
        fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Entity>, HandlerError> {
            self.0.get(kind, key)
        }
        fn save(&self, _entity: &Entity) -> Result<Entity, HandlerError> {
            Err(HandlerError::Unavailable("read-only".into()))
        }
        fn delete(&self, kind: EntityKind, key: &str) -> Result<(), HandlerError> {
            self.0.delete(kind, key)
        }
        fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, HandlerError> {
            self.0.list(kind)
        }
        fn info(&self) -> HandlerInfo {
            self.0.info()
        }
    }

    #[test]
    fn test_create_rolls_back_when_cluster_cannot_be_updated() {
        let clusters = MemoryStoreHandler::new("clusters");
        clusters
            .save(&Cluster::new("cluster", ClusterType::Host).into_entity())
            .unwrap();
        let store = Arc::new(
            StoreHandlerManager::builder()
                .handler(MemoryStoreHandler::new("hosts"), &[EntityKind::Host])
                .handler(ReadOnlyClusters(clusters), &[EntityKind::Cluster])
                .build(),
        );
        let hosts = HostController::new(store);

        assert!(matches!(
            hosts.create_or_confirm(ADDRESS, spec()),
            Err(HostError::Store(StoreError::Backend { .. }))
        ));
        assert!(hosts.list().is_empty());
    }

    /// Cluster visible à la première lecture seulement (supprimé entre-temps)
    struct VanishingCluster {
        inner: MemoryStoreHandler,
        seen: AtomicBool,
    }

    impl StoreHandler for VanishingCluster {
        fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Entity>, HandlerError> {
            if self.seen.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get(kind, key)
        }
        fn save(&self, entity: &Entity) -> Result<Entity, HandlerError> {
            self.inner.save(entity)
        }
        fn delete(&self, kind: EntityKind, key: &str) -> Result<(), HandlerError> {
            self.inner.delete(kind, key)
        }
        fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, HandlerError> {
            self.inner.list(kind)
        }
        fn info(&self) -> HandlerInfo {
            self.inner.info()
        }
    }

    #[test]
    fn test_cluster_removed_during_create_is_a_precondition_failure() {
        let clusters = VanishingCluster {
            inner: MemoryStoreHandler::new("clusters"),
            seen: AtomicBool::new(false),
        };
        clusters
            .inner
            .save(&Cluster::new("cluster", ClusterType::Host).into_entity())
            .unwrap();
        let store = Arc::new(
            StoreHandlerManager::builder()
                .handler(MemoryStoreHandler::new("hosts"), &[EntityKind::Host])
                .handler(clusters, &[EntityKind::Cluster])
                .build(),
        );
        let hosts = HostController::new(store);

        assert!(matches!(
            hosts.create_or_confirm(ADDRESS, spec()),
            Err(HostError::PreconditionFailed(_))
        ));
        assert!(hosts.list().is_empty());
    }

    #[test]
    fn test_rejects_addresses_outside_one_segment() {
        let (hosts, _) = controller_with_cluster();
        for address in ["../../secrets/admin", "10.2.0.2?watch=1", ".."] {
            assert!(matches!(
                hosts.create_or_confirm(address, spec()),
                Err(HostError::InvalidAddress(_))
            ));
        }
        assert!(hosts.list().is_empty());
    }

    #[test]
    fn test_delete_then_retrieve() {
        let (hosts, store) = controller_with_cluster();
        hosts.create_or_confirm(ADDRESS, spec()).unwrap();

        hosts.delete(ADDRESS).unwrap();
        assert!(matches!(hosts.retrieve(ADDRESS), Err(HostError::NotFound(_))));
        assert!(matches!(hosts.delete(ADDRESS), Err(HostError::NotFound(_))));
        assert!(!store.get::<Cluster>("cluster").unwrap().contains(ADDRESS));
    }

    #[test]
    fn test_credentials_projection() {
        let (hosts, _) = controller_with_cluster();
        hosts.create_or_confirm(ADDRESS, spec()).unwrap();

        let creds = hosts.credentials(ADDRESS).unwrap();
        assert_eq!(creds.ssh_priv_key, b"test\n");
        assert_eq!(creds.remote_user, "root");
        assert!(matches!(hosts.credentials("10.9.9.9"), Err(HostError::NotFound(_))));
    }

    #[test]
    fn test_implicit_address() {
        assert_eq!(implicit_address(IpAddr::V4(Ipv4Addr::LOCALHOST)), "127.0.0.1");
        let mapped = IpAddr::V6(Ipv4Addr::new(10, 2, 0, 2).to_ipv6_mapped());
        assert_eq!(implicit_address(mapped), "10.2.0.2");
        assert_eq!(implicit_address(IpAddr::V6(Ipv6Addr::LOCALHOST)), "::1");
    }

    #[test]
    fn test_implicit_create_uses_peer_address() {
        let (hosts, _) = controller_with_cluster();
        let outcome = hosts
            .create_or_confirm_implicit(IpAddr::V4(Ipv4Addr::LOCALHOST), spec())
            .unwrap();
        assert!(outcome.is_created());
        assert_eq!(outcome.host().address, "127.0.0.1");
        assert!(hosts.retrieve("127.0.0.1").is_ok());
    }
}
