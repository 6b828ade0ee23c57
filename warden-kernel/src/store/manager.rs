use super::{EntityKind, HandlerInfo, StoreError, StoreHandler, StoreModel};
use crate::containermgr::ContainerManager;
use crate::models::Cluster;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Façade unique devant tous les store handlers et container managers.
///
/// Construite une fois au démarrage puis partagée en lecture seule (`Arc`) :
/// aucun état mutable n'est partagé entre requêtes.
pub struct StoreHandlerManager {
    routes: HashMap<EntityKind, Vec<Arc<dyn StoreHandler>>>,
    registrations: Vec<Registration>,
    container_managers: Vec<Arc<dyn ContainerManager>>,
}

struct Registration {
    handler: Arc<dyn StoreHandler>,
    entities: Vec<EntityKind>,
}

/// Résumé d'un handler enregistré, exposé par `/system/stores`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerSummary {
    #[serde(flatten)]
    pub info: HandlerInfo,
    pub entities: Vec<EntityKind>,
}

#[derive(Default)]
pub struct StoreHandlerManagerBuilder {
    registrations: Vec<Registration>,
    container_managers: Vec<Arc<dyn ContainerManager>>,
}

impl StoreHandlerManagerBuilder {
    /// Enregistre un handler pour les types d'entité donnés.
    /// L'ordre d'enregistrement est l'ordre de consultation.
    pub fn handler<H: StoreHandler + 'static>(self, handler: H, entities: &[EntityKind]) -> Self {
        self.shared_handler(Arc::new(handler), entities)
    }

    pub fn shared_handler(mut self, handler: Arc<dyn StoreHandler>, entities: &[EntityKind]) -> Self {
        let mut kinds = entities.to_vec();
        kinds.sort();
        kinds.dedup();
        self.registrations.push(Registration {
            handler,
            entities: kinds,
        });
        self
    }

    pub fn container_manager<C: ContainerManager + 'static>(self, manager: C) -> Self {
        self.shared_container_manager(Arc::new(manager))
    }

    pub fn shared_container_manager(mut self, manager: Arc<dyn ContainerManager>) -> Self {
        self.container_managers.push(manager);
        self
    }

    pub fn build(self) -> StoreHandlerManager {
        let mut routes: HashMap<EntityKind, Vec<Arc<dyn StoreHandler>>> = HashMap::new();
        for registration in &self.registrations {
            for kind in &registration.entities {
                routes
                    .entry(*kind)
                    .or_default()
                    .push(Arc::clone(&registration.handler));
            }
        }

        StoreHandlerManager {
            routes,
            registrations: self.registrations,
            container_managers: self.container_managers,
        }
    }
}

impl StoreHandlerManager {
    pub fn builder() -> StoreHandlerManagerBuilder {
        StoreHandlerManagerBuilder::default()
    }

    fn handlers_for(&self, kind: EntityKind) -> &[Arc<dyn StoreHandler>] {
        self.routes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Consulte les handlers dans l'ordre d'enregistrement ; le premier qui
    /// trouve gagne. Erreur ou absence = on passe au suivant.
    pub fn get<M: StoreModel>(&self, key: &str) -> Result<M, StoreError> {
        self.locate::<M>(key).map(|(_, model)| model).ok_or_else(|| StoreError::NotFound {
            kind: M::KIND,
            key: key.to_string(),
        })
    }

    /// Comme `get`, avec le handler qui détient l'entité
    fn locate<M: StoreModel>(&self, key: &str) -> Option<(&Arc<dyn StoreHandler>, M)> {
        for handler in self.handlers_for(M::KIND) {
            match handler.get(M::KIND, key) {
                Ok(Some(entity)) => match M::from_entity(entity) {
                    Some(model) => return Some((handler, model)),
                    None => warn!(
                        handler = %handler.info().name,
                        kind = %M::KIND,
                        key,
                        "[store] handler returned an entity of the wrong kind"
                    ),
                },
                Ok(None) => {}
                Err(e) => debug!(
                    handler = %handler.info().name,
                    kind = %M::KIND,
                    key,
                    error = %e,
                    "[store] get failed, trying next handler"
                ),
            }
        }
        None
    }

    /// Délègue au handler propriétaire (le premier enregistré pour le type)
    pub fn save<M: StoreModel>(&self, model: M) -> Result<M, StoreError> {
        let handler = self
            .handlers_for(M::KIND)
            .first()
            .ok_or(StoreError::NoHandler(M::KIND))?;
        Self::save_to(handler, model)
    }

    fn save_to<M: StoreModel>(handler: &Arc<dyn StoreHandler>, model: M) -> Result<M, StoreError> {
        let backend = |reason: String| StoreError::Backend {
            handler: handler.info().name,
            reason,
        };

        let saved = handler
            .save(&model.into_entity())
            .map_err(|e| backend(e.to_string()))?;
        M::from_entity(saved).ok_or_else(|| backend(format!("returned an entity that is not a {}", M::KIND)))
    }

    pub fn delete<M: StoreModel>(&self, key: &str) -> Result<(), StoreError> {
        for handler in self.handlers_for(M::KIND) {
            match handler.delete(M::KIND, key) {
                Ok(()) => return Ok(()),
                Err(e) => debug!(
                    handler = %handler.info().name,
                    kind = %M::KIND,
                    key,
                    error = %e,
                    "[store] delete failed, trying next handler"
                ),
            }
        }

        Err(StoreError::NotFound {
            kind: M::KIND,
            key: key.to_string(),
        })
    }

    /// Fan-out sur tous les handlers du type, concaténés dans l'ordre
    /// d'enregistrement. Un handler en échec contribue zéro entité.
    /// Aucune déduplication : deux handlers peuvent renvoyer la même clé.
    pub fn list<M: StoreModel>(&self) -> Vec<M> {
        let mut out = Vec::new();
        for handler in self.handlers_for(M::KIND) {
            match handler.list(M::KIND) {
                Ok(entities) => out.extend(entities.into_iter().filter_map(M::from_entity)),
                Err(e) => warn!(
                    handler = %handler.info().name,
                    kind = %M::KIND,
                    error = %e,
                    "[store] list failed, handler skipped"
                ),
            }
        }
        out
    }

    /// Ajoute `address` au hostset du cluster (lecture, ajout, save).
    /// Le cluster est réécrit dans le handler qui le détient.
    pub fn add_host_to_cluster(&self, cluster_name: &str, address: &str) -> Result<Cluster, StoreError> {
        let (handler, mut cluster) = self
            .locate::<Cluster>(cluster_name)
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Cluster,
                key: cluster_name.to_string(),
            })?;
        if !cluster.hostset.insert(address.to_string()) {
            return Ok(cluster);
        }
        Self::save_to(handler, cluster)
    }

    /// Retire `address` de tous les clusters qui le référencent, chacun dans
    /// son propre handler. Retourne le nombre de clusters mis à jour.
    pub fn remove_host_from_clusters(&self, address: &str) -> usize {
        let mut updated = 0;
        for handler in self.handlers_for(EntityKind::Cluster) {
            let entities = match handler.list(EntityKind::Cluster) {
                Ok(entities) => entities,
                Err(e) => {
                    warn!(handler = %handler.info().name, address, error = %e, "[store] list failed, clusters not cleaned");
                    continue;
                }
            };

            for mut cluster in entities.into_iter().filter_map(Cluster::from_entity) {
                if !cluster.hostset.remove(address) {
                    continue;
                }
                let name = cluster.name.clone();
                match Self::save_to(handler, cluster) {
                    Ok(_) => updated += 1,
                    Err(e) => warn!(cluster = %name, address, error = %e, "[store] failed to drop host from cluster"),
                }
            }
        }
        updated
    }

    pub fn list_container_managers(&self) -> &[Arc<dyn ContainerManager>] {
        &self.container_managers
    }

    pub fn handler_summaries(&self) -> Vec<HandlerSummary> {
        self.registrations
            .iter()
            .map(|r| HandlerSummary {
                info: r.handler.info(),
                entities: r.entities.clone(),
            })
            .collect()
    }
}
