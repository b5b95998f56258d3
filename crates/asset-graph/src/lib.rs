// SPDX-License-Identifier: AGPL-3.0-or-later
//! Asset-Graph: dependency graph of typed producers with idempotent
//! materialization
//!
//! Output artifacts are derived from a directed acyclic graph of
//! [`Asset`] producers. Each producer is either synthesized from its
//! resolved dependencies or restored from files persisted by an earlier
//! run, and the [`Resolver`] guarantees each one runs at most once per
//! pass.
//!
//! # Components
//!
//! * **Producer contract:** [`Asset`], [`Parents`], [`File`]
//! * **Resolution:** [`Resolver`] plans a topological order and memoizes
//! * **Binding:** [`template`] renders bodies against a named-value record
//! * **Merging:** [`merge::FileSetMerger`] yields a path-ordered output set
//! * **Redaction:** [`Redact`] clears sensitive fields before persistence
//! * **Persistence:** [`store`] snapshots and writes output directories

pub mod asset;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod redact;
pub mod resolver;
pub mod store;
pub mod template;

pub use asset::{Asset, AssetId, File, Parents};
pub use error::{AssetError, Result, Step};
pub use fetch::{FileFetcher, PersistedFiles};
pub use merge::FileSetMerger;
pub use redact::Redact;
pub use resolver::{Resolution, Resolver};
