use super::{Entity, EntityKind, HandlerError, HandlerInfo, StoreHandler};
use crate::models::{Cluster, Host};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tables host/cluster indexées par clé, partagées par les handlers memory et json_file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StoreDocument {
    pub hosts: BTreeMap<String, Host>,
    pub clusters: BTreeMap<String, Cluster>,
}

impl StoreDocument {
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<Entity> {
        match kind {
            EntityKind::Host => self.hosts.get(key).cloned().map(Entity::Host),
            EntityKind::Cluster => self.clusters.get(key).cloned().map(Entity::Cluster),
        }
    }

    pub fn put(&mut self, entity: &Entity) -> Entity {
        match entity {
            Entity::Host(h) => {
                self.hosts.insert(h.address.clone(), h.clone());
            }
            Entity::Cluster(c) => {
                self.clusters.insert(c.name.clone(), c.clone());
            }
        }
        entity.clone()
    }

    pub fn remove(&mut self, kind: EntityKind, key: &str) -> Result<(), HandlerError> {
        let removed = match kind {
            EntityKind::Host => self.hosts.remove(key).is_some(),
            EntityKind::Cluster => self.clusters.remove(key).is_some(),
        };
        if removed {
            Ok(())
        } else {
            Err(HandlerError::NotFound {
                kind,
                key: key.to_string(),
            })
        }
    }

    pub fn list(&self, kind: EntityKind) -> Vec<Entity> {
        match kind {
            EntityKind::Host => self.hosts.values().cloned().map(Entity::Host).collect(),
            EntityKind::Cluster => self.clusters.values().cloned().map(Entity::Cluster).collect(),
        }
    }
}

/// Handler purement en mémoire, perdu au redémarrage
pub struct MemoryStoreHandler {
    name: String,
    tables: Mutex<StoreDocument>,
}

impl MemoryStoreHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Mutex::new(StoreDocument::default()),
        }
    }
}

impl StoreHandler for MemoryStoreHandler {
    fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Entity>, HandlerError> {
        Ok(self.tables.lock().get(kind, key))
    }

    fn save(&self, entity: &Entity) -> Result<Entity, HandlerError> {
        Ok(self.tables.lock().put(entity))
    }

    fn delete(&self, kind: EntityKind, key: &str) -> Result<(), HandlerError> {
        self.tables.lock().remove(kind, key)
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, HandlerError> {
        Ok(self.tables.lock().list(kind))
    }

    fn info(&self) -> HandlerInfo {
        HandlerInfo {
            name: self.name.clone(),
            description: "In-memory tables, lost on restart".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClusterType;
    use crate::store::StoreModel;

    #[test]
    fn test_memory_crud() {
        let handler = MemoryStoreHandler::new("memory");
        let host = Host::new("10.2.0.2");

        assert!(handler.get(EntityKind::Host, "10.2.0.2").unwrap().is_none());
        handler.save(&host.clone().into_entity()).unwrap();
        assert_eq!(
            handler.get(EntityKind::Host, "10.2.0.2").unwrap(),
            Some(Entity::Host(host))
        );
        // même clé, autre type : pas de collision
        assert!(handler.get(EntityKind::Cluster, "10.2.0.2").unwrap().is_none());

        handler.delete(EntityKind::Host, "10.2.0.2").unwrap();
        assert!(matches!(
            handler.delete(EntityKind::Host, "10.2.0.2"),
            Err(HandlerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_memory_list_by_kind() {
        let handler = MemoryStoreHandler::new("memory");
        handler.save(&Host::new("b").into_entity()).unwrap();
        handler.save(&Host::new("a").into_entity()).unwrap();
        handler
            .save(&Cluster::new("c", ClusterType::Host).into_entity())
            .unwrap();

        let keys: Vec<String> = handler
            .list(EntityKind::Host)
            .unwrap()
            .iter()
            .map(|e| e.key().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(handler.list(EntityKind::Cluster).unwrap().len(), 1);
    }
}
