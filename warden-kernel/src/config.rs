use crate::containermgr::{ContainerManagerError, KubeContainerManager};
use crate::models::Cluster;
use crate::store::{
    EntityKind, HandlerError, JsonFileStoreHandler, MemoryStoreHandler, StoreError, StoreHandlerManager,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid listen address `{0}`")]
    Listen(String),
    #[error("store handler init failed: {0}")]
    Store(#[from] HandlerError),
    #[error(transparent)]
    ContainerManager(#[from] ContainerManagerError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: String,
    pub stores: Vec<StoreConf>,
    pub container_managers: Vec<ContainerManagerConf>,
    /// Clusters créés au démarrage s'ils n'existent pas déjà
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConf {
    Memory {
        #[serde(default = "all_entities")]
        entities: Vec<EntityKind>,
    },
    JsonFile {
        path: PathBuf,
        #[serde(default = "all_entities")]
        entities: Vec<EntityKind>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainerManagerConf {
    Kubernetes {
        #[serde(default = "default_kube_name")]
        name: String,
        server_url: String,
        #[serde(default)]
        token: String,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
    },
}

fn all_entities() -> Vec<EntityKind> {
    EntityKind::ALL.to_vec()
}

fn default_kube_name() -> String {
    "kubernetes".into()
}

fn default_timeout_seconds() -> u64 {
    5
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
            stores: vec![StoreConf::Memory {
                entities: all_entities(),
            }],
            container_managers: Vec::new(),
            clusters: Vec::new(),
        }
    }
}

impl KernelConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::Listen(self.listen.clone()))
    }

    /// Instancie les handlers et container managers dans l'ordre du fichier
    pub fn build_store(&self) -> Result<StoreHandlerManager, ConfigError> {
        let mut builder = StoreHandlerManager::builder();

        for (idx, store) in self.stores.iter().enumerate() {
            builder = match store {
                StoreConf::Memory { entities } => {
                    builder.handler(MemoryStoreHandler::new(format!("memory#{idx}")), entities)
                }
                StoreConf::JsonFile { path, entities } => {
                    builder.handler(JsonFileStoreHandler::new(path.clone())?, entities)
                }
            };
        }

        for manager in &self.container_managers {
            builder = match manager {
                ContainerManagerConf::Kubernetes {
                    name,
                    server_url,
                    token,
                    timeout_seconds,
                } => builder.container_manager(KubeContainerManager::new(
                    name.clone(),
                    server_url,
                    token.clone(),
                    Duration::from_secs(*timeout_seconds),
                )?),
            };
        }

        Ok(builder.build())
    }

    /// Crée les clusters déclarés absents du store ; les existants ne sont pas touchés
    pub fn seed_clusters(&self, store: &StoreHandlerManager) -> Result<usize, StoreError> {
        let mut created = 0;
        for cluster in &self.clusters {
            if cluster.name.trim().is_empty() {
                warn!(kind = %cluster.cluster_type, "[config] seed cluster without a name, skipped");
                continue;
            }
            if store.get::<Cluster>(&cluster.name).is_ok() {
                continue;
            }
            store.save(cluster.clone())?;
            info!(cluster = %cluster.name, kind = %cluster.cluster_type, "[config] cluster seeded");
            created += 1;
        }
        Ok(created)
    }
}

pub fn parse_config(txt: &str) -> Result<KernelConfig, ConfigError> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    Ok(serde_yaml::from_str(txt)?)
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("WARDEN_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if !Path::new(&path).exists() {
        warn!(%path, "[config] no config file, using defaults");
        return KernelConfig::default();
    }

    let txt = match fs::read_to_string(&path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!(%path, error = %e, "[config] unreadable config, using defaults");
            return KernelConfig::default();
        }
    };

    parse_config(&txt).unwrap_or_else(|e| {
        warn!(%path, error = %e, "[config] invalid config, using defaults");
        KernelConfig::default()
    })
}
