//! Dependency fetching and vendoring.
//!
//! This module handles everything between a raw identifier and a vendored tree:
//!
//! - **Specs**: Parse `org/name[@version]` and classify the source
//! - **Fetching**: Git mirrors with isolated checkouts, or cached registry archives
//! - **Vendoring**: Filtered, destructive sync into `vendor/<org>/<name>`
//! - **Install**: Run the whole pipeline over a manifest, one package at a time
//!
//! ## Commands
//!
//! - `seed install` - Vendor every dependency listed in the `Seedfile`
//! - `seed get <spec>` - Fetch and vendor a single package

mod fetch;
mod install;
mod registry;
mod spec;
mod vendor;

pub use fetch::{DEFAULT_URL_TEMPLATE, SourceFetcher, SourceTree, VcsFetcher};
pub use install::{BatchReport, Installed, Installer, PackageOutcome};
pub use registry::{RegistryFetcher, extract_archive};
pub use spec::{LATEST, PackageSpec, ResolvedSpec, SourceKind, SourceResolver};
pub use vendor::{
    DEFAULT_EXCLUDE_DIRS, DEFAULT_INCLUDE, SyncFilter, SyncStats, plan_destination, sync_tree,
};
