// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bootkube templated-file producers
//!
//! Each producer owns one raw template body. The default body is compiled
//! into the binary; a body persisted under `templates/bootkube/` by an
//! earlier run (or edited there by hand) replaces it on restore. Binding is
//! left to the manifests aggregator, which writes the result to
//! `manifests/<name>` with the `.template` suffix dropped.

use asset_graph::{Asset, AssetError, AssetId, File, FileFetcher, Parents};

/// Directory template bodies are emitted under
pub const TEMPLATE_DIR: &str = "templates/bootkube";

const TEMPLATE_SUFFIX: &str = ".template";

macro_rules! bootkube_templates {
    ($($ident:ident => $file:literal,)*) => {
        $(pub const $ident: AssetId = AssetId::new(concat!("templates/bootkube/", $file));)*

        /// Every bootkube template: identity, file name and default body
        pub const TEMPLATES: &[(AssetId, &str, &str)] = &[
            $(($ident, $file, include_str!(concat!("../../templates/bootkube/", $file))),)*
        ];
    };
}

bootkube_templates! {
    CVO_OVERRIDES => "cvo-overrides.yaml.template",
    ETCD_SERVICE => "etcd-service.yaml.template",
    HOST_ETCD_SERVICE_ENDPOINTS => "host-etcd-service-endpoints.yaml.template",
    HOST_ETCD_SERVICE => "host-etcd-service.yaml.template",
    KUBE_CLOUD_CONFIG => "kube-cloud-config.yaml.template",
    KUBE_SYSTEM_CONFIGMAP_ETCD_CA => "kube-system-configmap-etcd-ca.yaml.template",
    KUBE_SYSTEM_CONFIGMAP_ETCD_SERVING_CA => "kube-system-configmap-etcd-serving-ca.yaml.template",
    KUBE_SYSTEM_CONFIGMAP_ROOT_CA => "kube-system-configmap-root-ca.yaml.template",
    KUBE_SYSTEM_SECRET_ETCD_CLIENT => "kube-system-secret-etcd-client.yaml.template",
    KUBE_SYSTEM_SECRET_ETCD_CLIENT_CA_DEPRECATED => "kube-system-secret-etcd-client-ca.yaml.template",
    KUBE_SYSTEM_SECRET_ETCD_SIGNER => "kube-system-secret-etcd-signer.yaml.template",
    KUBE_SYSTEM_SECRET_ETCD_SIGNER_CLIENT => "kube-system-secret-etcd-signer-client.yaml.template",
    MACHINE_CONFIG_SERVER_TLS_SECRET => "machine-config-server-tls-secret.yaml.template",
    OPENSHIFT_CONFIG_CONFIGMAP_ETCD_METRIC_SERVING_CA => "openshift-config-configmap-etcd-metric-serving-ca.yaml.template",
    OPENSHIFT_CONFIG_SECRET_ETCD_METRIC_CLIENT => "openshift-config-secret-etcd-metric-client.yaml.template",
    OPENSHIFT_CONFIG_SECRET_PULL_SECRET => "openshift-config-secret-pull-secret.yaml.template",
    OPENSHIFT_MACHINE_CONFIG_OPERATOR => "openshift-machine-config-operator.yaml.template",
    PULL => "pull.json.template",
}

/// Output path for a template body: `manifests/<name>` without the suffix
pub fn manifest_path(file_name: &str) -> String {
    let name = file_name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(file_name);
    format!("manifests/{}", name)
}

/// Producer of one raw template body
#[derive(Debug)]
pub struct TemplateAsset {
    id: AssetId,
    file_name: &'static str,
    default_body: &'static str,
    files: Vec<File>,
}

impl TemplateAsset {
    pub fn new(id: AssetId, file_name: &'static str, default_body: &'static str) -> Self {
        Self {
            id,
            file_name,
            default_body,
            files: Vec::new(),
        }
    }

    /// The template file, once resolved
    pub fn template_file(&self) -> asset_graph::Result<&File> {
        self.files
            .first()
            .ok_or_else(|| AssetError::synthesis(self.id, "template was not resolved"))
    }

    fn path(&self) -> String {
        format!("{}/{}", TEMPLATE_DIR, self.file_name)
    }
}

impl Asset for TemplateAsset {
    fn id(&self) -> AssetId {
        self.id
    }

    fn name(&self) -> &str {
        self.file_name
    }

    fn synthesize(&mut self, _parents: &Parents) -> asset_graph::Result<()> {
        self.files = vec![File::new(self.path(), self.default_body)];
        Ok(())
    }

    fn restore(&mut self, fetcher: &dyn FileFetcher) -> asset_graph::Result<bool> {
        match fetcher.fetch_by_name(&self.path()) {
            Some(file) => {
                self.files = vec![file];
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn files(&self) -> &[File] {
        &self.files
    }
}

/// One producer per bootkube template
pub fn templates() -> Vec<TemplateAsset> {
    TEMPLATES
        .iter()
        .map(|(id, file_name, body)| TemplateAsset::new(*id, *file_name, *body))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_graph::template::Template;
    use asset_graph::PersistedFiles;

    #[test]
    fn test_manifest_path_drops_suffix() {
        assert_eq!(manifest_path("pull.json.template"), "manifests/pull.json");
        assert_eq!(
            manifest_path("etcd-service.yaml.template"),
            "manifests/etcd-service.yaml"
        );
        assert_eq!(manifest_path("plain.yaml"), "manifests/plain.yaml");
    }

    #[test]
    fn test_every_default_body_parses() {
        assert_eq!(TEMPLATES.len(), 18);
        for (id, file_name, body) in TEMPLATES {
            assert_eq!(id.as_str(), format!("{}/{}", TEMPLATE_DIR, file_name));
            assert!(Template::parse(*file_name, body).is_ok(), "{file_name} failed to parse");
        }
    }

    #[test]
    fn test_restore_prefers_user_override() {
        let snapshot = PersistedFiles::from_files(vec![File::new(
            "templates/bootkube/pull.json.template",
            "{\"custom\": true}\n",
        )]);
        let mut asset = TemplateAsset::new(PULL, "pull.json.template", "default");
        assert!(asset.restore(&snapshot).unwrap());
        assert_eq!(asset.template_file().unwrap().data, b"{\"custom\": true}\n");
    }

    #[test]
    fn test_restore_not_found() {
        let mut asset = TemplateAsset::new(PULL, "pull.json.template", "default");
        assert!(!asset.restore(&PersistedFiles::new()).unwrap());
        assert!(asset.template_file().is_err());
    }
}
