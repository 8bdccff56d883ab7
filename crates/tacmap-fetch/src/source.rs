//! Storage candidates and deployment-host detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The backend a candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    /// CDN mirror of the data repository.
    Cdn,
    /// Release assets of the origin repository.
    Origin,
    /// Copy bundled with the deployment itself.
    Local,
}

impl SourceKind {
    /// Short label used in logs and metrics.
    pub const fn as_label(&self) -> &'static str {
        match self {
            SourceKind::Cdn => "cdn",
            SourceKind::Origin => "origin",
            SourceKind::Local => "local",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Where a candidate's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Remote base URL; the logical path is appended.
    Url(String),
    /// Directory on disk; the logical path is joined onto it.
    Directory(PathBuf),
}

/// One storage candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Backend this candidate belongs to.
    pub kind: SourceKind,
    /// Base location.
    pub location: Location,
}

impl Source {
    /// Create a URL-backed candidate.
    pub fn url(kind: SourceKind, base: impl Into<String>) -> Self {
        Self {
            kind,
            location: Location::Url(base.into()),
        }
    }

    /// Create a directory-backed candidate.
    pub fn directory(kind: SourceKind, dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            location: Location::Directory(dir.into()),
        }
    }

    /// Full URL or file path for a logical resource path.
    pub fn target(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        match &self.location {
            Location::Url(base) => format!("{}/{}", base.trim_end_matches('/'), path),
            Location::Directory(dir) => dir.join(path).display().to_string(),
        }
    }
}

/// Deployment environment, detected from the serving host name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentHost {
    /// Loopback or unnamed host: data is bundled in a directory next to the app.
    Development,
    /// Any other host: the bundled copy is served by the site itself.
    Production,
}

impl DeploymentHost {
    /// Classify a host name (with or without port).
    pub fn detect(host: &str) -> Self {
        let host = host.trim();
        let name = if let Some(rest) = host.strip_prefix('[') {
            // [::1]:8080
            rest.split(']').next().unwrap_or_default()
        } else if host.matches(':').count() == 1 {
            host.split(':').next().unwrap_or_default()
        } else {
            host
        };

        match name {
            "" | "localhost" | "127.0.0.1" | "0.0.0.0" | "::1" => DeploymentHost::Development,
            _ if name.ends_with(".localhost") => DeploymentHost::Development,
            _ => DeploymentHost::Production,
        }
    }
}

/// Storage configuration: where each backend lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// CDN mirror base URL.
    pub cdn_base: Option<String>,
    /// Origin repository release base URL.
    pub origin_base: Option<String>,
    /// Directory holding the bundled copy on development hosts.
    pub local_dir: Option<PathBuf>,
    /// Public URL of the deployment, serving the bundled copy on production hosts.
    pub site_url: Option<String>,
    /// Host name the application is served from.
    pub host: String,
}

impl SourceConfig {
    /// Candidates in priority order: CDN mirror, origin release, bundled copy.
    ///
    /// Host detection picks where the bundled copy is read from; the other
    /// location is used when the preferred one is not configured.
    pub fn candidates(&self) -> Vec<Source> {
        let mut sources = Vec::with_capacity(3);

        if let Some(base) = &self.cdn_base {
            sources.push(Source::url(SourceKind::Cdn, base.clone()));
        }
        if let Some(base) = &self.origin_base {
            sources.push(Source::url(SourceKind::Origin, base.clone()));
        }

        let dir = self
            .local_dir
            .as_ref()
            .map(|d| Source::directory(SourceKind::Local, d.clone()));
        let site = self
            .site_url
            .as_ref()
            .map(|u| Source::url(SourceKind::Local, u.clone()));
        let local = match DeploymentHost::detect(&self.host) {
            DeploymentHost::Development => dir.or(site),
            DeploymentHost::Production => site.or(dir),
        };
        sources.extend(local);

        sources
    }
}
