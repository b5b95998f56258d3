// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manifests aggregator
//!
//! Collects the install config, the cluster identifier, the certificate
//! material, the cluster facts and the bootkube template bodies, binds every
//! template against one [`BootkubeTemplateData`] record and merges the
//! results with a redacted status record into a single path-ordered file
//! set under `manifests/`.

use std::collections::BTreeMap;

use asset_graph::merge::{self, FileSetMerger};
use asset_graph::template::Template;
use asset_graph::{Asset, AssetError, AssetId, File, FileFetcher, Parents};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bootkube::{self, TemplateAsset};
use crate::cluster_id::{ClusterId, CLUSTER_ID};
use crate::facts::FactKind;
use crate::installconfig::{self, InstallConfigAsset, INSTALL_CONFIG};
use crate::tls::{self, CertKey};

/// Identity of the manifests aggregator
pub const MANIFESTS: AssetId = AssetId::new("manifests");

/// Directory all manifests are written to
pub const MANIFEST_DIR: &str = "manifests";

/// Path of the status record holding the redacted install config
pub const STATUS_RECORD_PATH: &str = "manifests/cluster-config.yaml";

const STATUS_RECORD_NAMESPACE: &str = "kube-system";
const STATUS_RECORD_NAME: &str = "cluster-config-v1";
const STATUS_RECORD_KEY: &str = "install-config";

/// Lifecycle of the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestState {
    /// Nothing attempted yet
    Uninitialized,
    /// Synthesis in progress
    Resolving,
    /// Generated from upstream producers
    Synthesized,
    /// Loaded from a previous run
    Restored,
    /// Synthesis or restoration failed
    Failed,
}

/// Object metadata of the status record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapMeta {
    pub name: String,
    pub namespace: String,
}

/// Status record: a config map carrying the redacted install config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: ConfigMapMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    fn new(namespace: &str, name: &str, key: &str, value: String) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            metadata: ConfigMapMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            data: BTreeMap::from([(key.to_string(), value)]),
        }
    }
}

/// The named-value record every bootkube template is bound against
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BootkubeTemplateData {
    #[serde(rename = "CVOClusterID")]
    pub cvo_cluster_id: String,
    pub etcd_ca_bundle: String,
    pub etcd_ca_cert: String,
    pub etcd_client_ca_cert: String,
    pub etcd_client_ca_key: String,
    pub etcd_client_cert: String,
    pub etcd_client_key: String,
    #[serde(rename = "EtcdEndpointDNSSuffix")]
    pub etcd_endpoint_dns_suffix: String,
    pub etcd_endpoint_hostnames: Vec<String>,
    pub etcd_metric_ca_cert: String,
    pub etcd_metric_client_cert: String,
    pub etcd_metric_client_key: String,
    pub etcd_signer_cert: String,
    pub etcd_signer_client_cert: String,
    pub etcd_signer_client_key: String,
    pub etcd_signer_key: String,
    #[serde(rename = "McsTLSCert")]
    pub mcs_tls_cert: String,
    #[serde(rename = "McsTLSKey")]
    pub mcs_tls_key: String,
    pub pull_secret_base64: String,
    pub root_ca_cert: String,
}

/// Etcd member hostnames for `replicas` control-plane machines
pub fn etcd_endpoint_hostnames(replicas: u32) -> Vec<String> {
    (0..replicas).map(|index| format!("etcd-{}", index)).collect()
}

fn encode(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

fn pem(id: AssetId, data: &[u8]) -> asset_graph::Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|_| AssetError::synthesis(MANIFESTS, format!("{} is not valid UTF-8", id)))
}

/// The manifests aggregator
#[derive(Debug)]
pub struct Manifests {
    state: ManifestState,
    status_record: Option<ConfigMap>,
    file_list: Vec<File>,
}

impl Default for Manifests {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifests {
    pub fn new() -> Self {
        Self {
            state: ManifestState::Uninitialized,
            status_record: None,
            file_list: Vec::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ManifestState {
        self.state
    }

    /// Status record produced or restored by the last transition
    pub fn status_record(&self) -> Option<&ConfigMap> {
        self.status_record.as_ref()
    }

    /// Restore from the files of a previous run.
    ///
    /// Returns `Ok(false)` when there are no manifests, and also when
    /// manifests exist but the status record does not; in that case the
    /// manifests are regenerated. A status record that cannot be parsed is
    /// an error.
    pub fn load(&mut self, fetcher: &dyn FileFetcher) -> asset_graph::Result<bool> {
        let mut file_list = fetcher.fetch_by_pattern(&format!("{}/*", MANIFEST_DIR))?;
        if file_list.is_empty() {
            return Ok(false);
        }

        let Some(record) = file_list.iter().find(|file| file.path == STATUS_RECORD_PATH) else {
            warn!(
                files = file_list.len(),
                path = STATUS_RECORD_PATH,
                "Manifests found without a status record; they will be regenerated"
            );
            return Ok(false);
        };

        let status_record: ConfigMap = match serde_yaml::from_slice(&record.data) {
            Ok(status_record) => status_record,
            Err(error) => {
                self.state = ManifestState::Failed;
                return Err(AssetError::persisted(STATUS_RECORD_PATH, error));
            }
        };

        merge::sort_files(&mut file_list);
        debug!(files = file_list.len(), "Restored manifests");
        self.status_record = Some(status_record);
        self.file_list = file_list;
        self.state = ManifestState::Restored;
        Ok(true)
    }

    fn generate(&mut self, parents: &Parents) -> asset_graph::Result<()> {
        let install_config = parents.get::<InstallConfigAsset>(INSTALL_CONFIG)?.config()?;

        let redacted = installconfig::redacted_install_config(MANIFESTS, install_config)?;
        let status_record = ConfigMap::new(
            STATUS_RECORD_NAMESPACE,
            STATUS_RECORD_NAME,
            STATUS_RECORD_KEY,
            redacted,
        );
        let status_data = serde_yaml::to_string(&status_record).map_err(|error| {
            AssetError::synthesis(
                MANIFESTS,
                format!(
                    "failed to create {}/{} configmap: {}",
                    STATUS_RECORD_NAMESPACE, STATUS_RECORD_NAME, error
                ),
            )
        })?;

        let data = template_data(parents)?;
        let bootkube_files = bind_templates(parents, &data)?;

        let mut merger = FileSetMerger::new();
        merger
            .extend([File::new(STATUS_RECORD_PATH, status_data)])
            .extend(bootkube_files);
        for kind in FactKind::ALL {
            merger.extend(parents.files(kind.id())?.iter().cloned());
        }
        let file_list = merger.finish()?;

        info!(files = file_list.len(), "Generated manifests");
        self.status_record = Some(status_record);
        self.file_list = file_list;
        Ok(())
    }
}

/// Assemble the binding record from the resolved dependencies
pub fn template_data(parents: &Parents) -> asset_graph::Result<BootkubeTemplateData> {
    let install_config = parents.get::<InstallConfigAsset>(INSTALL_CONFIG)?.config()?;
    let cluster_id = parents.get::<ClusterId>(CLUSTER_ID)?;
    let cert = move |id: AssetId| parents.get::<CertKey>(id);

    let etcd_ca = cert(tls::ETCD_CA)?;
    let etcd_signer = cert(tls::ETCD_SIGNER)?;
    let etcd_signer_client = cert(tls::ETCD_SIGNER_CLIENT)?;
    let etcd_client = cert(tls::ETCD_CLIENT)?;
    let etcd_metric_signer_client = cert(tls::ETCD_METRIC_SIGNER_CLIENT)?;
    let mcs = cert(tls::MCS)?;

    Ok(BootkubeTemplateData {
        cvo_cluster_id: cluster_id.uuid()?.to_string(),
        etcd_ca_bundle: encode(cert(tls::ETCD_CA_BUNDLE)?.cert()?),
        etcd_ca_cert: pem(tls::ETCD_CA, etcd_ca.cert()?)?,
        etcd_client_ca_cert: encode(etcd_ca.cert()?),
        etcd_client_ca_key: encode(etcd_ca.key()?),
        etcd_client_cert: encode(etcd_client.cert()?),
        etcd_client_key: encode(etcd_client.key()?),
        etcd_endpoint_dns_suffix: install_config.cluster_domain(),
        etcd_endpoint_hostnames: etcd_endpoint_hostnames(install_config.control_plane_replicas()),
        etcd_metric_ca_cert: pem(
            tls::ETCD_METRIC_CA_BUNDLE,
            cert(tls::ETCD_METRIC_CA_BUNDLE)?.cert()?,
        )?,
        etcd_metric_client_cert: encode(etcd_metric_signer_client.cert()?),
        etcd_metric_client_key: encode(etcd_metric_signer_client.key()?),
        etcd_signer_cert: encode(etcd_signer.cert()?),
        etcd_signer_client_cert: encode(etcd_signer_client.cert()?),
        etcd_signer_client_key: encode(etcd_signer_client.key()?),
        etcd_signer_key: encode(etcd_signer.key()?),
        mcs_tls_cert: encode(mcs.cert()?),
        mcs_tls_key: encode(mcs.key()?),
        pull_secret_base64: encode(install_config.pull_secret.as_bytes()),
        root_ca_cert: pem(tls::ROOT_CA, cert(tls::ROOT_CA)?.cert()?)?,
    })
}

/// Bind every bootkube template body; the first failure aborts the set
fn bind_templates(
    parents: &Parents,
    data: &BootkubeTemplateData,
) -> asset_graph::Result<Vec<File>> {
    let record = serde_json::to_value(data)
        .map_err(|error| AssetError::synthesis(MANIFESTS, error.to_string()))?;

    bootkube::TEMPLATES
        .iter()
        .map(|(id, _, _)| {
            let file = parents.get::<TemplateAsset>(*id)?.template_file()?;
            let name = file.file_name();
            let source = std::str::from_utf8(&file.data).map_err(|_| AssetError::Binding {
                file: name.to_string(),
                message: "template is not valid UTF-8".to_string(),
            })?;

            let rendered = Template::parse(name, source)?.render_value(&record)?;
            debug!(template = name, "Bound template");
            Ok(File::new(bootkube::manifest_path(name), rendered))
        })
        .collect()
}

impl Asset for Manifests {
    fn id(&self) -> AssetId {
        MANIFESTS
    }

    fn name(&self) -> &str {
        "Common Manifests"
    }

    fn dependencies(&self) -> Vec<AssetId> {
        let mut dependencies = vec![CLUSTER_ID, INSTALL_CONFIG];
        dependencies.extend(FactKind::ALL.iter().map(|kind| kind.id()));
        dependencies.extend(tls::CERTIFICATES.iter().map(|(id, _, _)| *id));
        dependencies.extend(bootkube::TEMPLATES.iter().map(|(id, _, _)| *id));
        dependencies
    }

    fn synthesize(&mut self, parents: &Parents) -> asset_graph::Result<()> {
        self.state = ManifestState::Resolving;
        match self.generate(parents) {
            Ok(()) => {
                self.state = ManifestState::Synthesized;
                Ok(())
            }
            Err(error) => {
                self.state = ManifestState::Failed;
                Err(error)
            }
        }
    }

    fn restore(&mut self, fetcher: &dyn FileFetcher) -> asset_graph::Result<bool> {
        self.load(fetcher)
    }

    fn files(&self) -> &[File] {
        &self.file_list
    }
}
