// SPDX-License-Identifier: AGPL-3.0-or-later
//! The install config: the base configuration record every other producer
//! reads from

use std::collections::BTreeMap;
use std::path::Path;

use asset_graph::redact::{self, Redact};
use asset_graph::{Asset, AssetError, AssetId, FileFetcher, Parents};
use serde::{Deserialize, Serialize};

use crate::error::{InstallerError, Result};

/// Identity of the install config producer
pub const INSTALL_CONFIG: AssetId = AssetId::new("install-config");

/// Name of the install config file inside the output directory
pub const INSTALL_CONFIG_FILENAME: &str = "install-config.yaml";

/// User-supplied description of the cluster to install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallConfig {
    /// Version of the install config format
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Cluster name
    pub metadata: ObjectMeta,

    /// Base DNS domain; the cluster domain is `<name>.<base_domain>`
    pub base_domain: String,

    /// Control-plane machine pool
    pub control_plane: MachinePool,

    /// Compute machine pools
    #[serde(default)]
    pub compute: Vec<MachinePool>,

    /// Cluster networking
    #[serde(default)]
    pub networking: Networking,

    /// Target platform; exactly one variant is set
    pub platform: Platform,

    /// Registry pull secret (sensitive)
    pub pull_secret: String,

    /// Public SSH key for the machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
}

/// Object metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name
    pub name: String,
}

/// A pool of identically configured machines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachinePool {
    /// Pool name
    pub name: String,

    /// Number of machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
}

/// Cluster network layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    /// Network plugin
    #[serde(default = "default_network_type")]
    pub network_type: String,

    /// Pod networks
    #[serde(default = "default_cluster_network")]
    pub cluster_network: Vec<ClusterNetworkEntry>,

    /// Machine network
    #[serde(default = "default_machine_cidr")]
    pub machine_cidr: String,

    /// Service networks
    #[serde(default = "default_service_network")]
    pub service_network: Vec<String>,
}

/// One pod network block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkEntry {
    /// Network block
    pub cidr: String,

    /// Prefix length handed to each node
    pub host_prefix: u8,
}

impl Default for Networking {
    fn default() -> Self {
        Self {
            network_type: default_network_type(),
            cluster_network: default_cluster_network(),
            machine_cidr: default_machine_cidr(),
            service_network: default_service_network(),
        }
    }
}

/// Platform-specific configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsPlatform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libvirt: Option<LibvirtPlatform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenStackPlatform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<VSpherePlatform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub none: Option<NonePlatform>,
}

/// Amazon Web Services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsPlatform {
    pub region: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_tags: BTreeMap<String, String>,
}

/// libvirt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibvirtPlatform {
    #[serde(rename = "URI")]
    pub uri: String,
}

/// OpenStack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackPlatform {
    pub cloud: String,
    pub region: String,
    pub external_network: String,
}

/// VMware vSphere; `username` and `password` are sensitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VSpherePlatform {
    #[serde(rename = "vCenter")]
    pub v_center: String,
    pub username: String,
    pub password: String,
    pub datacenter: String,
    pub default_datastore: String,
}

/// Bare installation with no platform integration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NonePlatform {}

impl Platform {
    /// Name of the configured platform, or `None` when not exactly one is set
    pub fn name(&self) -> Option<&'static str> {
        let set: Vec<&'static str> = [
            self.aws.is_some().then_some("aws"),
            self.libvirt.is_some().then_some("libvirt"),
            self.openstack.is_some().then_some("openstack"),
            self.vsphere.is_some().then_some("vsphere"),
            self.none.is_some().then_some("none"),
        ]
        .into_iter()
        .flatten()
        .collect();

        match set.as_slice() {
            [name] => Some(*name),
            _ => None,
        }
    }
}

impl InstallConfig {
    /// Load an install config from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(InstallerError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: InstallConfig = serde_yaml::from_str(&contents)?;

        config
            .validate()
            .map_err(|message| InstallerError::InvalidConfig { message })?;
        Ok(config)
    }

    /// Validate the install config
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.metadata.name.is_empty() {
            return Err("metadata.name cannot be empty".to_string());
        }
        if self.base_domain.is_empty() {
            return Err("baseDomain cannot be empty".to_string());
        }
        if self.pull_secret.is_empty() {
            return Err("pullSecret cannot be empty".to_string());
        }
        match self.control_plane.replicas {
            None => return Err("controlPlane.replicas must be set".to_string()),
            Some(0) => return Err("controlPlane.replicas must be at least 1".to_string()),
            Some(_) => {}
        }
        if self.platform.name().is_none() {
            return Err("exactly one platform must be configured".to_string());
        }
        Ok(())
    }

    /// Fully qualified cluster domain
    pub fn cluster_domain(&self) -> String {
        format!("{}.{}", self.metadata.name, self.base_domain)
    }

    /// Control-plane replica count; zero only if validation was skipped
    pub fn control_plane_replicas(&self) -> u32 {
        self.control_plane.replicas.unwrap_or_default()
    }
}

impl Redact for InstallConfig {
    fn redacted(&self) -> Self {
        let mut config = self.clone();
        redact::clear(&mut config.pull_secret);
        if let Some(vsphere) = config.platform.vsphere.as_mut() {
            redact::clear(&mut vsphere.username);
            redact::clear(&mut vsphere.password);
        }
        config
    }
}

/// Serialize the redacted form of `config` for the status record
pub fn redacted_install_config(owner: AssetId, config: &InstallConfig) -> asset_graph::Result<String> {
    serde_yaml::to_string(&config.redacted()).map_err(|error| AssetError::Redaction {
        asset: owner,
        message: error.to_string(),
    })
}

/// Producer wrapping the install config.
///
/// A config handed over by the driver takes precedence; otherwise the
/// producer restores `install-config.yaml` from the output directory.
#[derive(Debug, Default)]
pub struct InstallConfigAsset {
    supplied: Option<InstallConfig>,
    config: Option<InstallConfig>,
}

impl InstallConfigAsset {
    /// Producer with no driver-supplied config
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer that synthesizes from `config`
    pub fn with_config(config: InstallConfig) -> Self {
        Self {
            supplied: Some(config),
            config: None,
        }
    }

    /// The resolved install config
    pub fn config(&self) -> asset_graph::Result<&InstallConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| AssetError::synthesis(INSTALL_CONFIG, "install config was not resolved"))
    }
}

impl Asset for InstallConfigAsset {
    fn id(&self) -> AssetId {
        INSTALL_CONFIG
    }

    fn name(&self) -> &str {
        "Install Config"
    }

    fn synthesize(&mut self, _parents: &Parents) -> asset_graph::Result<()> {
        let config = self.supplied.clone().ok_or_else(|| {
            AssetError::synthesis(
                INSTALL_CONFIG,
                format!("no install config supplied and no {} found", INSTALL_CONFIG_FILENAME),
            )
        })?;
        config
            .validate()
            .map_err(|message| AssetError::synthesis(INSTALL_CONFIG, message))?;
        self.config = Some(config);
        Ok(())
    }

    fn restore(&mut self, fetcher: &dyn FileFetcher) -> asset_graph::Result<bool> {
        if self.supplied.is_some() {
            return Ok(false);
        }
        let Some(file) = fetcher.fetch_by_name(INSTALL_CONFIG_FILENAME) else {
            return Ok(false);
        };

        let config: InstallConfig = serde_yaml::from_slice(&file.data)
            .map_err(|error| AssetError::persisted(INSTALL_CONFIG_FILENAME, error))?;
        config
            .validate()
            .map_err(|message| AssetError::persisted(INSTALL_CONFIG_FILENAME, message))?;
        self.config = Some(config);
        Ok(true)
    }
}

// Default value functions

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_network_type() -> String {
    "OpenShiftSDN".to_string()
}

fn default_cluster_network() -> Vec<ClusterNetworkEntry> {
    vec![ClusterNetworkEntry {
        cidr: "10.128.0.0/14".to_string(),
        host_prefix: 23,
    }]
}

fn default_machine_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_service_network() -> Vec<String> {
    vec!["172.30.0.0/16".to_string()]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use asset_graph::{File, PersistedFiles};

    pub(crate) const AWS_CONFIG: &str = r#"
apiVersion: v1
metadata:
  name: demo
baseDomain: example.com
controlPlane:
  name: master
  replicas: 3
compute:
- name: worker
  replicas: 2
platform:
  aws:
    region: us-east-1
pullSecret: '{"auths":{"quay.io":{"auth":"c2VjcmV0"}}}'
"#;

    pub(crate) const VSPHERE_CONFIG: &str = r#"
metadata:
  name: lab
baseDomain: vmware.test
controlPlane:
  name: master
  replicas: 1
platform:
  vsphere:
    vCenter: vcenter.vmware.test
    username: administrator@vsphere.local
    password: hunter2-vsphere
    datacenter: dc1
    defaultDatastore: ds1
pullSecret: '{"auths":{"registry.test":{"auth":"cHVsbA=="}}}'
"#;

    pub(crate) fn aws_config() -> InstallConfig {
        serde_yaml::from_str(AWS_CONFIG).unwrap()
    }

    #[test]
    fn test_parse_install_config() {
        let config = aws_config();
        assert_eq!(config.metadata.name, "demo");
        assert_eq!(config.cluster_domain(), "demo.example.com");
        assert_eq!(config.control_plane_replicas(), 3);
        assert_eq!(config.platform.name(), Some("aws"));
        assert_eq!(config.networking.network_type, "OpenShiftSDN");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = aws_config();
        config.pull_secret.clear();
        assert!(config.validate().is_err());

        let mut config = aws_config();
        config.control_plane.replicas = None;
        assert!(config.validate().is_err());

        let mut config = aws_config();
        config.control_plane.replicas = Some(0);
        assert!(config.validate().is_err());

        let mut config = aws_config();
        config.platform.none = Some(NonePlatform {});
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redaction_clears_vsphere_credentials() {
        let config: InstallConfig = serde_yaml::from_str(VSPHERE_CONFIG).unwrap();
        let redacted = config.redacted();

        assert!(redacted.pull_secret.is_empty());
        let vsphere = redacted.platform.vsphere.as_ref().unwrap();
        assert!(vsphere.username.is_empty());
        assert!(vsphere.password.is_empty());
        assert_eq!(vsphere.v_center, "vcenter.vmware.test");
        assert_eq!(config.platform.vsphere.unwrap().password, "hunter2-vsphere");
    }

    #[test]
    fn test_redaction_passes_other_platforms_through() {
        let config = aws_config();
        let redacted = config.redacted();
        assert!(redacted.pull_secret.is_empty());
        assert_eq!(redacted.platform, config.platform);
    }

    #[test]
    fn test_redacted_yaml_has_no_secrets() {
        let config: InstallConfig = serde_yaml::from_str(VSPHERE_CONFIG).unwrap();
        let yaml = redacted_install_config(INSTALL_CONFIG, &config).unwrap();
        assert!(!yaml.contains("registry.test"));
        assert!(!yaml.contains("hunter2-vsphere"));
        assert!(!yaml.contains("administrator@vsphere.local"));
        assert!(yaml.contains("vcenter.vmware.test"));
    }

    #[test]
    fn test_restore_from_output_dir() {
        let snapshot =
            PersistedFiles::from_files(vec![File::new(INSTALL_CONFIG_FILENAME, AWS_CONFIG)]);
        let mut asset = InstallConfigAsset::new();
        assert!(asset.restore(&snapshot).unwrap());
        assert_eq!(asset.config().unwrap().metadata.name, "demo");
    }

    #[test]
    fn test_restore_malformed_is_error() {
        let snapshot =
            PersistedFiles::from_files(vec![File::new(INSTALL_CONFIG_FILENAME, "metadata: [")]);
        let mut asset = InstallConfigAsset::new();
        assert!(matches!(
            asset.restore(&snapshot),
            Err(AssetError::PersistedState { .. })
        ));
    }

    #[test]
    fn test_supplied_config_wins_over_persisted() {
        let snapshot = PersistedFiles::from_files(vec![File::new(
            INSTALL_CONFIG_FILENAME,
            VSPHERE_CONFIG,
        )]);
        let mut asset = InstallConfigAsset::with_config(aws_config());
        assert!(!asset.restore(&snapshot).unwrap());
    }

    #[test]
    fn test_from_file_missing() {
        let result = InstallConfig::from_file("/nonexistent/install-config.yaml");
        assert!(matches!(result, Err(InstallerError::ConfigNotFound { .. })));
    }
}
