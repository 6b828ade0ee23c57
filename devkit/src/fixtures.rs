//! Données de test partagées

use serde_json::{json, Value};
use warden_kernel::models::{Cluster, ClusterType, Host};

pub const HOST_ADDRESS: &str = "10.2.0.2";
pub const CLUSTER_NAME: &str = "honeynut";
/// "test\n" encodé en base64
pub const SSH_KEY_B64: &str = "dGVzdAo=";
pub const SSH_KEY: &[u8] = b"test\n";

pub fn host(address: &str) -> Host {
    let mut host = Host::new(address);
    host.ssh_priv_key = SSH_KEY.to_vec();
    host
}

pub fn cluster(name: &str, members: &[&str]) -> Cluster {
    let mut cluster = Cluster::new(name, ClusterType::Host);
    cluster.hostset.extend(members.iter().map(|m| m.to_string()));
    cluster
}

pub fn kube_cluster(name: &str, members: &[&str]) -> Cluster {
    Cluster {
        cluster_type: ClusterType::Kubernetes,
        ..cluster(name, members)
    }
}

/// Corps JSON d'un PUT /host/{address} complet
pub fn host_request(cluster: &str) -> Value {
    json!({
        "ssh_priv_key": SSH_KEY_B64,
        "remote_user": "root",
        "cluster": cluster,
    })
}
