// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster identifier

use asset_graph::{Asset, AssetError, AssetId, File, FileFetcher, Parents};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::installconfig::{InstallConfigAsset, INSTALL_CONFIG};

/// Identity of the cluster identifier producer
pub const CLUSTER_ID: AssetId = AssetId::new("cluster-id");

/// File the identifier is persisted to
pub const METADATA_FILENAME: &str = "metadata.json";

/// Persisted cluster metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    pub cluster_name: String,
    #[serde(rename = "clusterID")]
    pub cluster_id: String,
}

/// Producer of the opaque cluster identifier.
///
/// A fresh UUID is drawn on synthesis unless one was fixed at construction.
/// Once persisted in `metadata.json` the identifier is reused on every
/// later run.
#[derive(Debug, Default)]
pub struct ClusterId {
    fixed: Option<String>,
    metadata: Option<ClusterMetadata>,
    files: Vec<File>,
}

impl ClusterId {
    /// Producer drawing a random identifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer that always synthesizes `uuid`
    pub fn with_uuid(uuid: impl Into<String>) -> Self {
        Self {
            fixed: Some(uuid.into()),
            ..Self::default()
        }
    }

    /// The resolved identifier
    pub fn uuid(&self) -> asset_graph::Result<&str> {
        self.metadata
            .as_ref()
            .map(|metadata| metadata.cluster_id.as_str())
            .ok_or_else(|| AssetError::synthesis(CLUSTER_ID, "cluster id was not resolved"))
    }

    /// Short form used in infrastructure names
    pub fn infra_id(&self) -> asset_graph::Result<String> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or_else(|| AssetError::synthesis(CLUSTER_ID, "cluster id was not resolved"))?;
        let suffix: String = metadata.cluster_id.chars().take(5).collect();
        Ok(format!("{}-{}", metadata.cluster_name, suffix))
    }

    fn set(&mut self, metadata: ClusterMetadata, data: Vec<u8>) {
        self.files = vec![File::new(METADATA_FILENAME, data)];
        self.metadata = Some(metadata);
    }
}

impl Asset for ClusterId {
    fn id(&self) -> AssetId {
        CLUSTER_ID
    }

    fn name(&self) -> &str {
        "Cluster ID"
    }

    fn dependencies(&self) -> Vec<AssetId> {
        vec![INSTALL_CONFIG]
    }

    fn synthesize(&mut self, parents: &Parents) -> asset_graph::Result<()> {
        let install_config = parents.get::<InstallConfigAsset>(INSTALL_CONFIG)?.config()?;
        let cluster_id = self
            .fixed
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let metadata = ClusterMetadata {
            cluster_name: install_config.metadata.name.clone(),
            cluster_id,
        };
        let data = serde_json::to_vec_pretty(&metadata)
            .map_err(|error| AssetError::synthesis(CLUSTER_ID, error.to_string()))?;

        debug!(cluster_id = %metadata.cluster_id, "Generated cluster id");
        self.set(metadata, data);
        Ok(())
    }

    fn restore(&mut self, fetcher: &dyn FileFetcher) -> asset_graph::Result<bool> {
        let Some(file) = fetcher.fetch_by_name(METADATA_FILENAME) else {
            return Ok(false);
        };

        let metadata: ClusterMetadata = serde_json::from_slice(&file.data)
            .map_err(|error| AssetError::persisted(METADATA_FILENAME, error))?;
        if metadata.cluster_id.is_empty() {
            return Err(AssetError::persisted(METADATA_FILENAME, "clusterID is empty"));
        }

        self.set(metadata, file.data);
        Ok(true)
    }

    fn files(&self) -> &[File] {
        &self.files
    }
}
