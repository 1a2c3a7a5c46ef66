//! Error types for the pod supervisor.

use std::path::PathBuf;

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while supervising a pod.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Identifier is not a single path segment.
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    // =========================================================================
    // Not Found Errors
    // =========================================================================
    /// Pod home directory does not exist.
    #[error("pod home does not exist: {}", .0.display())]
    PodHomeNotFound(PathBuf),

    /// Pod manifest does not exist inside the pod home.
    #[error("pod definition does not exist: {}", .0.display())]
    ManifestNotFound(PathBuf),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// Engine command exited unsuccessfully.
    #[error("engine command `{command}` failed ({}): {}", describe_status(.status), .stderr.trim())]
    EngineCommand {
        command: String,
        /// Exit code, `None` when the command was terminated by a signal.
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Engine binary could not be executed at all.
    #[error("failed to execute engine command `{command}`: {source}")]
    EngineSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine produced inspect output that is not a pod description.
    #[error("failed to parse inspect output for pod '{pod}': {reason}")]
    InspectParse { pod: String, reason: String },

    // =========================================================================
    // Signal Errors
    // =========================================================================
    /// Registering an OS signal listener failed.
    #[error("failed to install handler for {signal}: {source}")]
    SignalSetup {
        signal: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for identifier validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidIdentifier { .. })
    }

    /// Returns true when the pod home or manifest is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PodHomeNotFound(_) | Self::ManifestNotFound(_))
    }

    /// Returns the engine exit code if this error came from a finished engine command.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::EngineCommand { status, .. } => *status,
            _ => None,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}
