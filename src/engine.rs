//! Engine client trait - the supervisor's view of the container engine.
//!
//! This trait defines the pod operations the supervisor needs:
//! - `exists`: Check whether a pod with a given name is present
//! - `start`: Create and start a pod from a manifest
//! - `stop` / `remove` / `force_remove`: Tear a pod down
//! - `kill`: Send a signal to every container of a pod
//! - `inspect`: Describe the pod's containers and their states
//! - `logs_since`: Fetch recent output of one container
//!
//! # Failure Policy
//!
//! Implementations never retry. Every failure surfaces as an
//! [`Error`](crate::error::Error) carrying the command, exit status and
//! captured output; deciding what a failure means is up to the caller.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Container State
// =============================================================================

/// State of a single container as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Container has been created but not started.
    Created,
    /// Container has been configured but not created.
    Configured,
    /// Container has been initialized but not started.
    Initialized,
    /// Container is running.
    Running,
    /// Container is paused.
    Paused,
    /// Container is being stopped.
    Stopping,
    /// Container has stopped.
    Stopped,
    /// Container process has exited.
    Exited,
    /// Container is being removed.
    Removing,
    /// Any state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ContainerStatus {
    /// Returns true if the container is running.
    pub fn is_running(&self) -> bool {
        *self == Self::Running
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Configured => write!(f, "configured"),
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
            Self::Removing => write!(f, "removing"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Pod Description
// =============================================================================

/// One container entry of a pod description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDescription {
    /// Engine-assigned container ID.
    #[serde(default)]
    pub id: String,
    /// Container name; used for log retrieval.
    pub name: String,
    /// Current state.
    pub state: ContainerStatus,
}

impl ContainerDescription {
    /// Creates a container entry with an empty ID.
    pub fn new(name: impl Into<String>, state: ContainerStatus) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            state,
        }
    }
}

/// Machine-readable pod description returned by [`PodEngine::inspect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PodDescription {
    /// Pod name.
    #[serde(default)]
    pub name: String,
    /// Containers of the pod, infra container included.
    #[serde(default)]
    pub containers: Vec<ContainerDescription>,
}

/// Inspect output is a single object on older engines and a one-element
/// array on newer ones.
#[derive(Deserialize)]
#[serde(untagged)]
enum InspectOutput {
    Many(Vec<PodDescription>),
    One(PodDescription),
}

impl PodDescription {
    /// Parses the engine's inspect JSON for `pod`.
    pub fn from_json(pod: &str, json: &str) -> Result<Self> {
        let parsed: InspectOutput =
            serde_json::from_str(json).map_err(|e| Error::InspectParse {
                pod: pod.to_string(),
                reason: e.to_string(),
            })?;

        match parsed {
            InspectOutput::Many(descriptions) => {
                descriptions
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::InspectParse {
                        pod: pod.to_string(),
                        reason: "inspect returned no pods".to_string(),
                    })
            }
            InspectOutput::One(description) => Ok(description),
        }
    }

    /// Containers whose state is anything but running.
    pub fn non_running(&self) -> impl Iterator<Item = &ContainerDescription> {
        self.containers.iter().filter(|c| !c.state.is_running())
    }
}

// =============================================================================
// Command Output
// =============================================================================

/// Captured result of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal.
    pub status: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true if the command exited with code 0.
    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Converts a failed output into [`Error::EngineCommand`].
    pub fn into_error(self, command: impl Into<String>) -> Error {
        Error::EngineCommand {
            command: command.into(),
            status: self.status,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

// =============================================================================
// Engine Trait
// =============================================================================

/// Container engine facade used by the supervisor.
///
/// Every call runs to completion before returning. The supervisor awaits
/// calls one at a time, so implementations never see concurrent mutation of
/// the same pod from one supervisor.
///
/// # Implementations
///
/// - `PodmanEngine`: invokes the `podman` CLI
#[async_trait]
pub trait PodEngine: Send + Sync {
    /// Returns the engine name.
    fn name(&self) -> &str;

    /// Checks whether a pod named `pod` exists.
    ///
    /// The engine's "not found" exit code yields `Ok(false)`, not an error.
    async fn exists(&self, pod: &str) -> Result<bool>;

    /// Creates and starts a pod from the manifest at `manifest`.
    ///
    /// # Arguments
    ///
    /// * `manifest` - Full path of the manifest; its directory becomes the
    ///   working directory of the engine call
    /// * `extra_args` - Flag/value pairs appended to the start command
    async fn start(&self, manifest: &Path, extra_args: &[String]) -> Result<()>;

    /// Stops a pod, allowing `timeout` before containers are killed.
    async fn stop(&self, pod: &str, timeout: Duration) -> Result<()>;

    /// Removes a pod even if it is still running.
    async fn force_remove(&self, pod: &str) -> Result<()>;

    /// Removes a stopped pod.
    async fn remove(&self, pod: &str) -> Result<()>;

    /// Sends signal number `signal` to every container of the pod.
    async fn kill(&self, pod: &str, signal: i32) -> Result<()>;

    /// Describes the pod and the state of each container.
    async fn inspect(&self, pod: &str) -> Result<PodDescription>;

    /// Returns the output a container produced since `since`.
    async fn logs_since(&self, container: &str, since: DateTime<Utc>) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSPECT_OBJECT: &str = r#"{
        "Id": "4f1c",
        "Name": "web_pod",
        "State": "Running",
        "Containers": [
            {"Id": "aa11", "Name": "4f1c-infra", "State": "running"},
            {"Id": "bb22", "Name": "web_pod-nginx", "State": "exited"}
        ]
    }"#;

    #[test]
    fn test_parse_object() {
        let pod = PodDescription::from_json("web_pod", INSPECT_OBJECT).unwrap();
        assert_eq!(pod.name, "web_pod");
        assert_eq!(pod.containers.len(), 2);
        assert_eq!(pod.containers[0].state, ContainerStatus::Running);
        assert_eq!(pod.containers[1].state, ContainerStatus::Exited);
    }

    #[test]
    fn test_parse_array() {
        let json = format!("[{INSPECT_OBJECT}]");
        let pod = PodDescription::from_json("web_pod", &json).unwrap();
        let down: Vec<_> = pod.non_running().map(|c| c.name.as_str()).collect();
        assert_eq!(down, vec!["web_pod-nginx"]);
    }

    #[test]
    fn test_parse_unknown_state() {
        let json = r#"{"Name": "p", "Containers": [{"Name": "c", "State": "hibernating"}]}"#;
        let pod = PodDescription::from_json("p", json).unwrap();
        assert_eq!(pod.containers[0].state, ContainerStatus::Unknown);
        assert!(!pod.containers[0].state.is_running());
    }

    #[test]
    fn test_parse_errors() {
        let err = PodDescription::from_json("p", "[]").unwrap_err();
        assert!(err.to_string().contains("no pods"));

        let err = PodDescription::from_json("p", "Error: no such pod").unwrap_err();
        assert!(matches!(err, Error::InspectParse { .. }));
    }

    #[test]
    fn test_command_output_error() {
        let output = CommandOutput {
            status: Some(125),
            stdout: String::new(),
            stderr: "Error: no pod with name or ID web_pod found\n".to_string(),
        };
        assert!(!output.is_success());
        let err = output.into_error("podman pod stop web_pod");
        assert_eq!(err.exit_status(), Some(125));
        assert!(err.to_string().contains("no pod with name"));
    }
}
