/*!
Mock Store Handler pour tests sans backend réel

Délègue à un `MemoryStoreHandler`, enregistre chaque appel reçu et peut
basculer en panne pour simuler un backend indisponible.
*/

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use warden_kernel::store::{Entity, EntityKind, HandlerError, HandlerInfo, MemoryStoreHandler, StoreHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Save,
    Delete,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub kind: EntityKind,
    pub key: Option<String>,
}

/// Clonable : les clones partagent stockage, journal et état de panne
#[derive(Clone)]
pub struct MockStoreHandler {
    name: String,
    inner: Arc<MemoryStoreHandler>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    failing: Arc<AtomicBool>,
}

impl MockStoreHandler {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(MemoryStoreHandler::new(name.clone())),
            name,
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handler en panne dès sa création
    pub fn failing(name: impl Into<String>) -> Self {
        let handler = Self::new(name);
        handler.set_failing(true);
        handler
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Injecte une entité sans passer par le journal
    pub fn seed(&self, entity: Entity) -> anyhow::Result<()> {
        self.inner.save(&entity)?;
        Ok(())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, op: StoreOp, kind: EntityKind, key: Option<&str>) -> Result<(), HandlerError> {
        self.calls.lock().push(StoreCall {
            op,
            kind,
            key: key.map(str::to_string),
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(HandlerError::Unavailable(format!("{} is down", self.name)));
        }
        Ok(())
    }
}

impl StoreHandler for MockStoreHandler {
    fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Entity>, HandlerError> {
        self.record(StoreOp::Get, kind, Some(key))?;
        self.inner.get(kind, key)
    }

    fn save(&self, entity: &Entity) -> Result<Entity, HandlerError> {
        self.record(StoreOp::Save, entity.kind(), Some(entity.key()))?;
        self.inner.save(entity)
    }

    fn delete(&self, kind: EntityKind, key: &str) -> Result<(), HandlerError> {
        self.record(StoreOp::Delete, kind, Some(key))?;
        self.inner.delete(kind, key)
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, HandlerError> {
        self.record(StoreOp::List, kind, None)?;
        self.inner.list(kind)
    }

    fn info(&self) -> HandlerInfo {
        HandlerInfo {
            name: self.name.clone(),
            description: "instrumented in-memory store (devkit)".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_kernel::models::Host;

    #[test]
    fn test_records_calls_and_fails_on_demand() {
        let handler = MockStoreHandler::new("mock");
        let clone = handler.clone();

        clone.save(&Entity::Host(Host::new("10.2.0.2"))).unwrap();
        assert!(handler.get(EntityKind::Host, "10.2.0.2").unwrap().is_some());
        assert_eq!(handler.count(StoreOp::Save), 1);
        assert_eq!(handler.calls()[1].key.as_deref(), Some("10.2.0.2"));

        handler.set_failing(true);
        assert!(matches!(
            clone.list(EntityKind::Host),
            Err(HandlerError::Unavailable(_))
        ));
        assert_eq!(handler.count(StoreOp::List), 1);
    }
}
