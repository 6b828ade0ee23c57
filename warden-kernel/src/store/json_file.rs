/*!
 * STORE JSON FILE - Persistance hosts/clusters dans un document JSON
 *
 * FONCTIONNEMENT :
 * - Un seul fichier JSON `{ "hosts": {...}, "clusters": {...} }`
 * - Chargé en cache mémoire au démarrage (créé vide s'il n'existe pas)
 * - Réécrit en entier après chaque mutation (save/delete)
 *
 * Suffisant pour un kernel mono-instance ; un backend clé-valeur distant
 * s'implémente derrière le même trait StoreHandler.
 */

use super::memory::StoreDocument;
use super::{Entity, EntityKind, HandlerError, HandlerInfo, StoreHandler};
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

pub struct JsonFileStoreHandler {
    /// Chemin du fichier de stockage JSON
    storage_path: PathBuf,
    /// Cache en mémoire du document
    cache: Mutex<StoreDocument>,
}

impl JsonFileStoreHandler {
    pub fn new<P: Into<PathBuf>>(storage_path: P) -> Result<Self, HandlerError> {
        let handler = Self {
            storage_path: storage_path.into(),
            cache: Mutex::new(StoreDocument::default()),
        };

        handler.load_from_disk()?;
        info!(path = %handler.storage_path.display(), "[store] json file handler initialized");
        Ok(handler)
    }

    fn load_from_disk(&self) -> Result<(), HandlerError> {
        if !self.storage_path.exists() {
            if let Some(parent) = self.storage_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.storage_path, "{}")?;
        }

        let content = fs::read_to_string(&self.storage_path)?;
        let document: StoreDocument = if content.trim().is_empty() {
            StoreDocument::default()
        } else {
            serde_json::from_str(&content)?
        };

        *self.cache.lock() = document;
        Ok(())
    }

    /// Applique la mutation sur le cache puis réécrit le fichier.
    /// Si l'écriture échoue, le cache est restauré.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreDocument) -> Result<T, HandlerError>) -> Result<T, HandlerError> {
        let mut cache = self.cache.lock();
        let previous = cache.clone();
        let out = f(&mut *cache)?;

        let written = serde_json::to_string_pretty(&*cache)
            .map_err(HandlerError::from)
            .and_then(|json| fs::write(&self.storage_path, json).map_err(HandlerError::from));
        if let Err(e) = written {
            *cache = previous;
            return Err(e);
        }
        Ok(out)
    }
}

impl StoreHandler for JsonFileStoreHandler {
    fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Entity>, HandlerError> {
        Ok(self.cache.lock().get(kind, key))
    }

    fn save(&self, entity: &Entity) -> Result<Entity, HandlerError> {
        let saved = self.mutate(|doc| Ok(doc.put(entity)))?;
        debug!(kind = %entity.kind(), key = entity.key(), "[store] entity written to disk");
        Ok(saved)
    }

    fn delete(&self, kind: EntityKind, key: &str) -> Result<(), HandlerError> {
        self.mutate(|doc| doc.remove(kind, key))?;
        debug!(%kind, key, "[store] entity deleted from disk");
        Ok(())
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, HandlerError> {
        Ok(self.cache.lock().list(kind))
    }

    fn info(&self) -> HandlerInfo {
        HandlerInfo {
            name: format!("json_file:{}", self.storage_path.display()),
            description: "JSON document on local disk with in-memory cache".to_string(),
        }
    }
}
