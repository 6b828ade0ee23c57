/*!
 * STORE HANDLERS - Interface de persistence unifiée pour hosts et clusters
 *
 * RÔLE :
 * Ce module définit le contrat commun que chaque backend de stockage
 * implémente, et la façade (StoreHandlerManager) qui route chaque opération
 * logique vers le ou les handlers enregistrés pour le type d'entité.
 *
 * FONCTIONNEMENT :
 * - StoreHandler trait = get/save/delete/list sur des `Entity` typées
 * - EntityKind = clé de routage (host, cluster)
 * - StoreModel = lien entre un type Rust et son EntityKind, pour `get::<Host>()`
 * - Les erreurs propres aux handlers (HandlerError) ne sortent jamais de la
 *   façade : elles deviennent NotFound, une liste vide, ou Backend sur save
 *
 * HANDLERS FOURNIS :
 * - memory    : tables en mémoire (tests, déploiements éphémères)
 * - json_file : document JSON sur disque avec cache mémoire
 */

mod json_file;
mod manager;
mod memory;

pub use json_file::JsonFileStoreHandler;
pub use manager::{HandlerSummary, StoreHandlerManager, StoreHandlerManagerBuilder};
pub use memory::MemoryStoreHandler;

use crate::models::{Cluster, Host};
use serde::{Deserialize, Serialize};

/// Type d'entité routable par la façade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Host,
    Cluster,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Host, EntityKind::Cluster];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Host => f.write_str("host"),
            EntityKind::Cluster => f.write_str("cluster"),
        }
    }
}

/// Enregistrement échangé avec les handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Entity {
    Host(Host),
    Cluster(Cluster),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Host(_) => EntityKind::Host,
            Entity::Cluster(_) => EntityKind::Cluster,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Entity::Host(h) => &h.address,
            Entity::Cluster(c) => &c.name,
        }
    }
}

/// Lie un modèle à son EntityKind pour que la façade reste typée
pub trait StoreModel: Sized {
    const KIND: EntityKind;

    fn key(&self) -> &str;
    fn into_entity(self) -> Entity;
    fn from_entity(entity: Entity) -> Option<Self>;
}

impl StoreModel for Host {
    const KIND: EntityKind = EntityKind::Host;

    fn key(&self) -> &str {
        &self.address
    }

    fn into_entity(self) -> Entity {
        Entity::Host(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Host(h) => Some(h),
            _ => None,
        }
    }
}

impl StoreModel for Cluster {
    const KIND: EntityKind = EntityKind::Cluster;

    fn key(&self) -> &str {
        &self.name
    }

    fn into_entity(self) -> Entity {
        Entity::Cluster(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Cluster(c) => Some(c),
            _ => None,
        }
    }
}

/// Erreurs internes d'un handler, converties par la façade
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{kind} `{key}` not found")]
    NotFound { kind: EntityKind, key: String },
    #[error("entity kind {0} not supported by this handler")]
    Unsupported(EntityKind),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Taxonomie visible par les appelants de la façade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} `{key}` not found")]
    NotFound { kind: EntityKind, key: String },
    #[error("no store handler registered for {0}")]
    NoHandler(EntityKind),
    #[error("store handler `{handler}` failed: {reason}")]
    Backend { handler: String, reason: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Métadonnées d'un handler, pour le diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub name: String,
    pub description: String,
}

/// Contrat commun que TOUS les backends de stockage implémentent.
///
/// Les appels sont bloquants : la façade ne réessaie jamais et ne pose aucun
/// timeout, c'est au handler de gérer sa propre politique.
pub trait StoreHandler: Send + Sync {
    /// `Ok(None)` quand la clé est absente
    fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Entity>, HandlerError>;

    /// Retourne l'entité telle que persistée (champs complétés par le backend)
    fn save(&self, entity: &Entity) -> Result<Entity, HandlerError>;

    fn delete(&self, kind: EntityKind, key: &str) -> Result<(), HandlerError>;

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, HandlerError>;

    fn info(&self) -> HandlerInfo;
}
