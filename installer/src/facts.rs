// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster fact producers
//!
//! Each fact is a small cluster-scoped config object derived from the
//! install config and written to one `manifests/cluster-*-02-config.yml`
//! file. Facts are cheap and fully determined by their inputs, so they are
//! always synthesized rather than restored.

use asset_graph::{Asset, AssetError, AssetId, File, Parents};
use serde_json::{json, Value};

use crate::cluster_id::{ClusterId, CLUSTER_ID};
use crate::installconfig::{InstallConfig, InstallConfigAsset, INSTALL_CONFIG};

pub const INGRESS: AssetId = AssetId::new("facts/ingress");
pub const DNS: AssetId = AssetId::new("facts/dns");
pub const INFRASTRUCTURE: AssetId = AssetId::new("facts/infrastructure");
pub const NETWORKING: AssetId = AssetId::new("facts/networking");

const CONFIG_API_VERSION: &str = "config.openshift.io/v1";

/// The kinds of cluster fact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    Ingress,
    Dns,
    Infrastructure,
    Networking,
}

impl FactKind {
    pub const ALL: [FactKind; 4] = [
        FactKind::Ingress,
        FactKind::Dns,
        FactKind::Infrastructure,
        FactKind::Networking,
    ];

    pub fn id(self) -> AssetId {
        match self {
            FactKind::Ingress => INGRESS,
            FactKind::Dns => DNS,
            FactKind::Infrastructure => INFRASTRUCTURE,
            FactKind::Networking => NETWORKING,
        }
    }

    /// Kind of the emitted config object
    pub fn object_kind(self) -> &'static str {
        match self {
            FactKind::Ingress => "Ingress",
            FactKind::Dns => "DNS",
            FactKind::Infrastructure => "Infrastructure",
            FactKind::Networking => "Network",
        }
    }

    /// Path of the emitted file
    pub fn path(self) -> &'static str {
        match self {
            FactKind::Ingress => "manifests/cluster-ingress-02-config.yml",
            FactKind::Dns => "manifests/cluster-dns-02-config.yml",
            FactKind::Infrastructure => "manifests/cluster-infrastructure-02-config.yml",
            FactKind::Networking => "manifests/cluster-network-02-config.yml",
        }
    }
}

/// Producer of one cluster fact
#[derive(Debug)]
pub struct ClusterFact {
    kind: FactKind,
    files: Vec<File>,
}

impl ClusterFact {
    pub fn new(kind: FactKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
        }
    }

    fn spec(&self, config: &InstallConfig, parents: &Parents) -> asset_graph::Result<Value> {
        let cluster_domain = config.cluster_domain();
        let object = match self.kind {
            FactKind::Ingress => json!({
                "spec": { "domain": format!("apps.{}", cluster_domain) },
            }),
            FactKind::Dns => json!({
                "spec": { "baseDomain": cluster_domain },
            }),
            FactKind::Infrastructure => {
                let infra_id = parents.get::<ClusterId>(CLUSTER_ID)?.infra_id()?;
                let platform = config
                    .platform
                    .name()
                    .ok_or_else(|| AssetError::synthesis(self.kind.id(), "no platform configured"))?;
                json!({
                    "spec": {},
                    "status": {
                        "apiServerURL": format!("https://api.{}:6443", cluster_domain),
                        "etcdDiscoveryDomain": cluster_domain,
                        "infrastructureName": infra_id,
                        "platform": platform_display(platform),
                    },
                })
            }
            FactKind::Networking => {
                let cluster_network: Vec<Value> = config
                    .networking
                    .cluster_network
                    .iter()
                    .map(|entry| json!({ "cidr": entry.cidr, "hostPrefix": entry.host_prefix }))
                    .collect();
                json!({
                    "spec": {
                        "clusterNetwork": cluster_network,
                        "networkType": config.networking.network_type,
                        "serviceNetwork": config.networking.service_network,
                    },
                })
            }
        };
        Ok(object)
    }
}

fn platform_display(name: &str) -> &'static str {
    match name {
        "aws" => "AWS",
        "libvirt" => "Libvirt",
        "openstack" => "OpenStack",
        "vsphere" => "VSphere",
        _ => "None",
    }
}

impl Asset for ClusterFact {
    fn id(&self) -> AssetId {
        self.kind.id()
    }

    fn name(&self) -> &str {
        match self.kind {
            FactKind::Ingress => "Ingress Config",
            FactKind::Dns => "DNS Config",
            FactKind::Infrastructure => "Infrastructure Config",
            FactKind::Networking => "Network Config",
        }
    }

    fn dependencies(&self) -> Vec<AssetId> {
        match self.kind {
            FactKind::Infrastructure => vec![INSTALL_CONFIG, CLUSTER_ID],
            _ => vec![INSTALL_CONFIG],
        }
    }

    fn synthesize(&mut self, parents: &Parents) -> asset_graph::Result<()> {
        let config = parents.get::<InstallConfigAsset>(INSTALL_CONFIG)?.config()?;

        let mut object = self.spec(config, parents)?;
        if let Value::Object(map) = &mut object {
            map.insert("apiVersion".to_string(), json!(CONFIG_API_VERSION));
            map.insert("kind".to_string(), json!(self.kind.object_kind()));
            map.insert("metadata".to_string(), json!({ "name": "cluster" }));
        }

        let data = serde_yaml::to_string(&object)
            .map_err(|error| AssetError::synthesis(self.kind.id(), error.to_string()))?;
        self.files = vec![File::new(self.kind.path(), data)];
        Ok(())
    }

    fn files(&self) -> &[File] {
        &self.files
    }
}

/// One producer per fact kind
pub fn cluster_facts() -> Vec<ClusterFact> {
    FactKind::ALL.into_iter().map(ClusterFact::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installconfig::tests::aws_config;
    use asset_graph::{PersistedFiles, Resolver};

    fn resolve(kind: FactKind) -> String {
        let snapshot = PersistedFiles::new();
        let mut assets: Vec<Box<dyn Asset>> = vec![
            Box::new(InstallConfigAsset::with_config(aws_config())),
            Box::new(ClusterId::with_uuid("0d0c7e5a-6a5c-4f8e-9f0e-1b2c3d4e5f60")),
        ];
        assets.extend(cluster_facts().into_iter().map(|fact| Box::new(fact) as Box<dyn Asset>));
        let mut resolver = Resolver::new(assets, &snapshot).unwrap();

        let fact = resolver.resolve(kind.id()).unwrap();
        assert_eq!(fact.files().len(), 1);
        assert_eq!(fact.files()[0].path, kind.path());
        String::from_utf8(fact.files()[0].data.clone()).unwrap()
    }

    #[test]
    fn test_ingress_domain() {
        let yaml = resolve(FactKind::Ingress);
        assert!(yaml.contains("domain: apps.demo.example.com"));
        assert!(yaml.contains("kind: Ingress"));
        assert!(yaml.contains("apiVersion: config.openshift.io/v1"));
    }

    #[test]
    fn test_infrastructure_uses_cluster_id() {
        let yaml = resolve(FactKind::Infrastructure);
        assert!(yaml.contains("infrastructureName: demo-0d0c7"));
        assert!(yaml.contains("platform: AWS"));
        assert!(yaml.contains("apiServerURL: https://api.demo.example.com:6443"));
    }

    #[test]
    fn test_network_defaults() {
        let yaml = resolve(FactKind::Networking);
        assert!(yaml.contains("10.128.0.0/14"));
        assert!(yaml.contains("hostPrefix: 23"));
        assert!(yaml.contains("networkType: OpenShiftSDN"));
    }

    #[test]
    fn test_fact_is_deterministic() {
        assert_eq!(resolve(FactKind::Dns), resolve(FactKind::Dns));
    }

    #[test]
    fn test_facts_never_restore() {
        let snapshot = PersistedFiles::from_files(vec![File::new(
            FactKind::Dns.path(),
            "stale: true\n",
        )]);
        let mut fact = ClusterFact::new(FactKind::Dns);
        assert!(!fact.restore(&snapshot).unwrap());
    }
}
