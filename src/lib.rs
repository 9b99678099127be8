//! # seed - dependency fetch-and-vendor engine
//!
//! seed reads a list of package identifiers, fetches each one from a git mirror
//! or from the local archive cache, and copies a filtered snapshot into
//! `vendor/<organization>/<name>`.
//!
//! ## Features
//!
//! - **Two sources**: git hosts through local mirrors, registry hosts through cached archives
//! - **Isolated checkouts**: every git fetch gets its own working copy
//! - **Filtered vendoring**: only source, docs and manifests; no `.git`, `vendor`, CI dirs
//! - **Atomic writes**: files and archives land via temp file + rename
//! - **Per-package results**: one broken dependency never blocks the rest
//!
//! ## Quick Start
//!
//! ```bash
//! # Vendor everything listed in ./Seedfile
//! seed install
//!
//! # Vendor one package at a tag
//! seed get github.com/acme/widget@v1.2.0
//! ```
//!
//! ## Module Organization
//!
//! - [`deps`] - Spec parsing, fetchers, sync engine, install pipeline
//! - [`cache`] - Archive cache and publishing
//! - [`config`] - `Seedfile` parsing and settings

/// Local archive cache and publishing.
pub mod cache;

/// Manifest (`Seedfile`) parsing and settings.
pub mod config;

/// Dependency parsing, fetching and vendoring.
pub mod deps;

/// Error taxonomy shared by the core.
pub mod error;

/// Import listing via `go list`.
pub mod freeze;

/// Terminal UI utilities (tables, spinners).
pub mod ui;
