// SPDX-License-Identifier: AGPL-3.0-or-later
//! The producer set of one installer pass

use std::collections::HashMap;

use asset_graph::{Asset, AssetId};

use crate::bootkube;
use crate::cluster_id::ClusterId;
use crate::facts;
use crate::installconfig::{InstallConfig, InstallConfigAsset};
use crate::manifests::Manifests;
use crate::tls::{self, KeyMaterial};

/// Builder for the full set of producers the manifests aggregator needs
#[derive(Debug, Default)]
pub struct ProducerSet {
    install_config: Option<InstallConfig>,
    cluster_uuid: Option<String>,
    key_material: HashMap<AssetId, KeyMaterial>,
}

impl ProducerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of restoring `install-config.yaml`
    pub fn install_config(mut self, config: InstallConfig) -> Self {
        self.install_config = Some(config);
        self
    }

    /// Fix the cluster identifier instead of drawing a random one
    pub fn cluster_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.cluster_uuid = Some(uuid.into());
        self
    }

    /// Hand PEM material to the certificate producer `id`
    pub fn key_material(mut self, id: AssetId, material: KeyMaterial) -> Self {
        self.key_material.insert(id, material);
        self
    }

    /// Every producer, in registration order
    pub fn build(mut self) -> Vec<Box<dyn Asset>> {
        let mut assets: Vec<Box<dyn Asset>> = Vec::new();

        assets.push(Box::new(match self.install_config {
            Some(config) => InstallConfigAsset::with_config(config),
            None => InstallConfigAsset::new(),
        }));
        assets.push(Box::new(match self.cluster_uuid {
            Some(uuid) => ClusterId::with_uuid(uuid),
            None => ClusterId::new(),
        }));

        for cert in tls::certificates() {
            let cert = match self.key_material.remove(&cert.id()) {
                Some(material) => cert.with_material(material),
                None => cert,
            };
            assets.push(Box::new(cert));
        }
        for fact in facts::cluster_facts() {
            assets.push(Box::new(fact));
        }
        for template in bootkube::templates() {
            assets.push(Box::new(template));
        }

        assets.push(Box::new(Manifests::new()));
        assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifests::MANIFESTS;
    use asset_graph::{PersistedFiles, Resolver};

    #[test]
    fn test_build_registers_every_producer_once() {
        let assets = ProducerSet::new().build();
        // install config, cluster id, 9 certificates, 4 facts, 18 templates, manifests
        assert_eq!(assets.len(), 34);
        assert!(Resolver::new(assets, &PersistedFiles::new()).is_ok());
    }

    #[test]
    fn test_plan_is_complete_and_acyclic() {
        let snapshot = PersistedFiles::new();
        let resolver = Resolver::new(ProducerSet::new().build(), &snapshot).unwrap();
        let order = resolver.plan(MANIFESTS).unwrap();

        assert_eq!(order.len(), 34);
        assert_eq!(order.last(), Some(&MANIFESTS));
        let position = |id: AssetId| order.iter().position(|entry| *entry == id).unwrap();
        assert!(
            position(crate::installconfig::INSTALL_CONFIG)
                < position(crate::cluster_id::CLUSTER_ID)
        );
        assert!(position(crate::cluster_id::CLUSTER_ID) < position(facts::INFRASTRUCTURE));
    }
}
