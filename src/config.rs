//! Supervisor configuration and pod path resolution.
//!
//! [`SupervisorConfig`] collects the inputs a supervisor is built from.
//! [`PodPaths::resolve`] validates the identifier and derives everything the
//! supervisor needs to locate the pod:
//!
//! ```text
//! identifier "web", services dir "/docker/services"
//!   pod home  → /docker/services/web
//!   manifest  → /docker/services/web/pod-web.yaml
//!   pod name  → web_pod
//! ```

use crate::constants::{
    DEFAULT_LOG_DRIVER, DEFAULT_NETWORK, DEFAULT_SERVICES_DIR, MANIFEST_EXTENSION,
    MANIFEST_PREFIX, POD_NAME_SUFFIX,
};
use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

// =============================================================================
// Engine Arguments
// =============================================================================

/// Optional arguments passed to the engine when the pod is started.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineArgs {
    /// Network the pod joins (`--network`).
    pub network: Option<String>,
    /// Log driver for the pod (`--log-driver`).
    pub log_driver: Option<String>,
    /// Engine log level for the start call (`--log-level`).
    pub log_level: Option<String>,
}

impl EngineArgs {
    /// Returns the default network and log driver, no log level.
    pub fn defaults() -> Self {
        Self {
            network: Some(DEFAULT_NETWORK.to_string()),
            log_driver: Some(DEFAULT_LOG_DRIVER.to_string()),
            log_level: None,
        }
    }

    /// Renders the flag/value pairs in a fixed order.
    pub fn to_args(&self) -> Vec<String> {
        let pairs = [
            ("--network", &self.network),
            ("--log-driver", &self.log_driver),
            ("--log-level", &self.log_level),
        ];

        let mut args = Vec::new();
        for (flag, value) in pairs {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        }
        args
    }
}

// =============================================================================
// Supervisor Config
// =============================================================================

/// Inputs a [`crate::Supervisor`] is constructed from.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Single path segment naming the pod.
    pub identifier: String,
    /// Directory holding one subdirectory per identifier.
    pub services_dir: PathBuf,
    /// Extra arguments for the engine's start call.
    pub engine_args: EngineArgs,
    /// Stop and force-remove a same-named pod before starting.
    pub replace_existing: bool,
    /// Remove the pod after stopping it.
    pub remove_on_exit: bool,
}

impl SupervisorConfig {
    /// Creates a config with default paths, replace and remove enabled.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            services_dir: PathBuf::from(DEFAULT_SERVICES_DIR),
            engine_args: EngineArgs::defaults(),
            replace_existing: true,
            remove_on_exit: true,
        }
    }

    /// Sets the services base directory.
    #[must_use]
    pub fn with_services_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.services_dir = dir.into();
        self
    }

    /// Sets the engine start arguments.
    #[must_use]
    pub fn with_engine_args(mut self, args: EngineArgs) -> Self {
        self.engine_args = args;
        self
    }

    /// Enables or disables replacing an existing pod.
    #[must_use]
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    /// Enables or disables pod removal on exit.
    #[must_use]
    pub fn with_remove(mut self, remove: bool) -> Self {
        self.remove_on_exit = remove;
        self
    }
}

// =============================================================================
// Pod Paths
// =============================================================================

/// Validated locations and names derived from an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodPaths {
    /// The identifier the paths were derived from.
    pub identifier: String,
    /// `<services_dir>/<identifier>`.
    pub pod_home: PathBuf,
    /// `<pod_home>/pod-<identifier>.yaml`.
    pub manifest_path: PathBuf,
    /// `<identifier>_pod`.
    pub pod_name: String,
}

impl PodPaths {
    /// Validates `identifier` and checks that pod home and manifest exist.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIdentifier`] if the identifier is not exactly one
    ///   normal path segment.
    /// - [`Error::PodHomeNotFound`] / [`Error::ManifestNotFound`] if either
    ///   path is missing.
    pub fn resolve(services_dir: &Path, identifier: &str) -> Result<Self> {
        validate_identifier(identifier)?;

        let pod_home = services_dir.join(identifier);
        if !pod_home.is_dir() {
            return Err(Error::PodHomeNotFound(pod_home));
        }

        let manifest_path = pod_home.join(manifest_file_name(identifier));
        if !manifest_path.exists() {
            return Err(Error::ManifestNotFound(manifest_path));
        }

        Ok(Self {
            identifier: identifier.to_string(),
            pod_home,
            manifest_path,
            pod_name: pod_name(identifier),
        })
    }
}

/// Engine-side pod name for an identifier.
pub fn pod_name(identifier: &str) -> String {
    format!("{identifier}{POD_NAME_SUFFIX}")
}

/// Manifest file name for an identifier.
pub fn manifest_file_name(identifier: &str) -> String {
    format!("{MANIFEST_PREFIX}{identifier}.{MANIFEST_EXTENSION}")
}

/// Rejects anything but a single normal path segment.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    if identifier.is_empty() {
        return Err(invalid("identifier is empty"));
    }
    if identifier.contains('/') {
        return Err(invalid("identifier has path parts"));
    }

    let mut components = Path::new(identifier).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("identifier is not a single path segment")),
    }
}
