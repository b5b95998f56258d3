// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kea-Installer: cluster manifest generation for the Kea ecosystem
//!
//! Builds the common manifests of a cluster from an install config through
//! a graph of [`asset_graph::Asset`] producers. Every run restores what an
//! earlier run left in the output directory and only synthesizes what is
//! missing, so repeated runs converge on the same bytes.
//!
//! # Features
//!
//! * **Install config:** validated base record, redacted before it is stored
//! * **Bootkube manifests:** templated files bound against one named-value record
//! * **Cluster facts:** ingress, DNS, infrastructure and network config objects
//! * **Status record:** `cluster-config-v1` config map carrying the redacted config

pub mod bootkube;
pub mod cluster_id;
pub mod config;
pub mod error;
pub mod facts;
pub mod installconfig;
pub mod manifests;
pub mod pipeline;
pub mod producers;
pub mod tls;

pub use config::Config;
pub use error::{InstallerError, Result};
pub use installconfig::InstallConfig;
pub use manifests::{ManifestState, Manifests};
pub use producers::ProducerSet;
