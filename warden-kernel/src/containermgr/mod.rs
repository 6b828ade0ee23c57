/*!
 * CONTAINER MANAGERS - Orchestrateurs externes interrogés en lecture seule
 *
 * RÔLE :
 * Un cluster de type orchestrateur (kubernetes) délègue l'état live de ses
 * nodes à un container manager. Le kernel ne fait que lire ce statut pour
 * l'agréger dans `/host/{address}/status`, jamais pour persister.
 *
 * CONTRAT :
 * - `node_status` renvoie la réponse brute (code + corps)
 * - L'appelant décide quoi faire d'un code non-2xx ou d'un corps illisible
 */

mod kubernetes;

pub use kubernetes::KubeContainerManager;

use crate::models::ClusterType;
use async_trait::async_trait;

/// Réponse brute d'un orchestrateur
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerManagerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid container manager config: {0}")]
    InvalidConfig(String),
    /// Connexion refusée ou timeout
    #[error("container manager unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait ContainerManager: Send + Sync {
    fn name(&self) -> &str;

    /// Type de cluster que ce manager sait servir
    fn cluster_type(&self) -> ClusterType;

    /// Statut live d'un node, tel que renvoyé par l'orchestrateur
    async fn node_status(&self, address: &str) -> Result<RawResponse, ContainerManagerError>;
}
