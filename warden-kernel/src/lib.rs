/*!
# Warden Kernel - Control plane hosts/clusters

Bibliothèque du kernel, utilisée par le binaire et par les tests d'intégration :
- `store` : façade unique devant les store handlers (mémoire, fichier JSON)
- `hosts` : réconciliation idempotente des hosts
- `status` : agrégation host + cluster + container manager
- `containermgr` : clients des orchestrateurs (Kubernetes)
- `http` : API REST Axum
- `config` : configuration YAML du kernel
*/

pub mod config;
pub mod containermgr;
pub mod hosts;
pub mod http;
pub mod models;
pub mod status;
pub mod store;
