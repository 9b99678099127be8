//! Package identifiers and source classification.
//!
//! A raw identifier looks like `organization/name[@version]` or
//! `host/organization/name[@version]`. Parsing never touches the filesystem;
//! the version default is only chosen once [`SourceResolver`] knows whether the
//! package comes from a VCS mirror or the archive registry.

use crate::error::{SeedError, SeedResult};
use std::fmt;

/// Version sentinel for registry packages requested without a version.
pub const LATEST: &str = "latest";

/// A parsed, not yet classified, package identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub host: Option<String>,
    pub organization: String,
    pub name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    pub fn parse(raw: &str) -> SeedResult<Self> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(SeedError::invalid_spec(raw, "empty identifier"));
        }
        if input.contains('\\') {
            return Err(SeedError::invalid_spec(raw, "backslashes are not allowed"));
        }

        let (path, version) = match input.split_once('@') {
            Some((path, version)) => {
                if version.is_empty() {
                    return Err(SeedError::invalid_spec(raw, "empty version after '@'"));
                }
                if version.contains('@') {
                    return Err(SeedError::invalid_spec(raw, "more than one '@'"));
                }
                (path, Some(version.to_string()))
            }
            None => (input, None),
        };

        let segments: Vec<&str> = path.split('/').collect();
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            let reason = if bad.is_empty() {
                "empty path segment".to_string()
            } else {
                format!("'{}' is not a valid path segment", bad)
            };
            return Err(SeedError::invalid_spec(raw, reason));
        }

        let (host, organization, name) = match segments.as_slice() {
            [organization, name] => (None, *organization, *name),
            [host, organization, name] => (Some(host.to_string()), *organization, *name),
            [_] => {
                return Err(SeedError::invalid_spec(
                    raw,
                    "expected 'organization/name', the organization is missing",
                ));
            }
            _ => {
                return Err(SeedError::invalid_spec(
                    raw,
                    "expected 'organization/name' or 'host/organization/name'",
                ));
            }
        };

        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return Err(SeedError::invalid_spec(raw, "empty package name"));
        }

        Ok(Self {
            host,
            organization: organization.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Vcs,
    Registry,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vcs => write!(f, "git"),
            Self::Registry => write!(f, "registry"),
        }
    }
}

/// A spec with its source kind and version settled. Fetchers only accept this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpec {
    pub host: String,
    pub organization: String,
    pub name: String,
    pub version: String,
    pub kind: SourceKind,
    /// False when `version` was filled in from the source kind's default.
    pub pinned: bool,
}

impl fmt::Display for ResolvedSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.host, self.organization, self.name, self.version
        )
    }
}

/// Classifies specs by host. Pure: no I/O, never fails.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    registry_domains: Vec<String>,
    default_host: String,
    default_branch: String,
}

impl SourceResolver {
    pub fn new(
        registry_domains: Vec<String>,
        default_host: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            registry_domains,
            default_host: default_host.into(),
            default_branch: default_branch.into(),
        }
    }

    pub fn kind(&self, spec: &PackageSpec) -> SourceKind {
        let host = spec.host.as_deref().unwrap_or(&self.default_host);
        if self
            .registry_domains
            .iter()
            .any(|domain| domain.eq_ignore_ascii_case(host))
        {
            SourceKind::Registry
        } else {
            SourceKind::Vcs
        }
    }

    pub fn resolve(&self, spec: PackageSpec) -> ResolvedSpec {
        let kind = self.kind(&spec);
        let pinned = spec.version.is_some();
        let version = spec.version.unwrap_or_else(|| match kind {
            SourceKind::Vcs => self.default_branch.clone(),
            SourceKind::Registry => LATEST.to_string(),
        });

        ResolvedSpec {
            host: spec.host.unwrap_or_else(|| self.default_host.clone()),
            organization: spec.organization,
            name: spec.name,
            version,
            kind,
            pinned,
        }
    }
}
