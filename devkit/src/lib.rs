/*!
# Warden DevKit - Stubs et utilitaires de test

Bibliothèque facilitant les tests du kernel avec :
- Store handler instrumenté (journal d'appels, panne à la demande)
- Container manager scripté, sans orchestrateur réel
- Fixtures hosts/clusters
- Harness HTTP démarrant le vrai router sur un port éphémère
*/

pub mod container_stub;
pub mod fixtures;
pub mod store_stub;
pub mod test_utils;

pub use container_stub::MockContainerManager;
pub use store_stub::{MockStoreHandler, StoreCall, StoreOp};
pub use test_utils::TestHarness;
