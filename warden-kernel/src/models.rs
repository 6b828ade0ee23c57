/*!
 * MODÈLES - Entités persistées et vues exposées par l'API hosts/clusters
 *
 * RÔLE :
 * Définit la forme fixe des enregistrements Host et Cluster, leurs valeurs
 * par défaut, et les projections dérivées (vue publique, credentials, status).
 *
 * FONCTIONNEMENT :
 * - Host / Cluster = entités stockées par les store handlers
 * - HostView / HostCreds / HostStatusView = vues recalculées à chaque requête
 * - HostRequest = corps brut d'un PUT, validé une seule fois en HostSpec
 *
 * FORMAT FIL :
 * - ssh_priv_key est une chaîne base64 sur le fil, des octets en mémoire
 * - last_check est RFC3339 (ou null)
 * - champs absents = valeurs par défaut, champs inconnus ignorés
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// Erreur de validation levée à la frontière de la requête
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Cycle de vie du provisioning d'un host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    #[default]
    Unknown,
    Inprocess,
    Investigating,
    Bootstrapping,
    Available,
    Active,
    Inactive,
    Disassociated,
    Failed,
}

/// Une machine gérée. `address` est l'identité unique dans le store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    pub address: String,
    pub status: HostStatus,
    pub os: String,
    pub cpus: u32,
    pub memory: u64,
    pub space: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_check: Option<OffsetDateTime>,
    #[serde(with = "base64_bytes")]
    pub ssh_priv_key: Vec<u8>,
    pub remote_user: String,
}

pub const DEFAULT_REMOTE_USER: &str = "root";

impl Default for Host {
    fn default() -> Self {
        Self {
            address: String::new(),
            status: HostStatus::Unknown,
            os: String::new(),
            cpus: 0,
            memory: 0,
            space: 0,
            last_check: None,
            ssh_priv_key: Vec::new(),
            remote_user: DEFAULT_REMOTE_USER.to_string(),
        }
    }
}

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Vue publique : les credentials ne sortent que par `/creds`
    pub fn view(&self) -> HostView {
        HostView {
            address: self.address.clone(),
            status: self.status,
            os: self.os.clone(),
            cpus: self.cpus,
            memory: self.memory,
            space: self.space,
            last_check: self.last_check,
        }
    }

    pub fn creds(&self) -> HostCreds {
        HostCreds {
            ssh_priv_key: self.ssh_priv_key.clone(),
            remote_user: self.remote_user.clone(),
        }
    }

    pub fn status_summary(&self) -> HostStatusSummary {
        HostStatusSummary {
            status: self.status,
            last_check: self.last_check,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostView {
    pub address: String,
    pub status: HostStatus,
    pub os: String,
    pub cpus: u32,
    pub memory: u64,
    pub space: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_check: Option<OffsetDateTime>,
}

/// Projection credentials d'un host, jamais persistée séparément
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCreds {
    #[serde(with = "base64_bytes")]
    pub ssh_priv_key: Vec<u8>,
    pub remote_user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatusSummary {
    pub status: HostStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_check: Option<OffsetDateTime>,
}

/// Composite éphémère renvoyé par `/host/{address}/status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostStatusView {
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
    pub host: HostStatusSummary,
    pub container_manager: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    /// Hosts nus, aucun orchestrateur derrière
    #[default]
    Host,
    Kubernetes,
}

impl ClusterType {
    pub fn is_container_managed(self) -> bool {
        !matches!(self, ClusterType::Host)
    }
}

impl std::fmt::Display for ClusterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterType::Host => f.write_str("host"),
            ClusterType::Kubernetes => f.write_str("kubernetes"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    #[default]
    Ok,
    Degraded,
    Failed,
}

/// Groupe nommé de hosts. `hostset` ne porte que l'appartenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    pub name: String,
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
    pub status: ClusterStatus,
    pub hostset: BTreeSet<String>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, cluster_type: ClusterType) -> Self {
        Self {
            name: name.into(),
            cluster_type,
            ..Self::default()
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.hostset.contains(address)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hosts(pub Vec<Host>);

impl Hosts {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn views(&self) -> Vec<HostView> {
        self.0.iter().map(Host::view).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clusters(pub Vec<Cluster>);

impl Clusters {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Une adresse de host doit tenir dans un seul segment d'URL
pub fn validate_address(address: &str) -> Result<(), ModelError> {
    let invalid = |reason: &str| ModelError::Invalid {
        field: "address",
        reason: reason.to_string(),
    };

    if address.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if address == "." || address == ".." {
        return Err(invalid("dot segments are not addresses"));
    }
    if address
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(invalid("contains a reserved character"));
    }
    Ok(())
}

/// Corps brut d'un PUT `/host[/{address}]`, tel que reçu
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostRequest {
    pub ssh_priv_key: Option<String>,
    pub remote_user: Option<String>,
    pub cluster: Option<String>,
}

/// Requête validée : seuls les champs fournis par l'appelant sont `Some`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSpec {
    pub ssh_priv_key: Option<Vec<u8>>,
    pub remote_user: Option<String>,
    pub cluster: Option<String>,
}

impl HostRequest {
    /// Passe de validation unique, avant toute logique métier
    pub fn validate(self) -> Result<HostSpec, ModelError> {
        let ssh_priv_key = match self.ssh_priv_key {
            Some(encoded) => Some(base64_bytes::decode(&encoded).map_err(|e| {
                ModelError::Invalid {
                    field: "ssh_priv_key",
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let remote_user = non_blank("remote_user", self.remote_user)?;
        let cluster = non_blank("cluster", self.cluster)?;

        Ok(HostSpec {
            ssh_priv_key,
            remote_user,
            cluster,
        })
    }
}

fn non_blank(field: &'static str, value: Option<String>) -> Result<Option<String>, ModelError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ModelError::Invalid {
            field,
            reason: "must not be empty".into(),
        }),
        other => Ok(other),
    }
}

/// Helper serde : octets <-> chaîne base64 standard
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ENGINE.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode(&s).map_err(serde::de::Error::custom)
    }

    pub fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
        ENGINE.decode(encoded.trim())
    }
}
