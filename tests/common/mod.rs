//! Shared fixtures for integration tests.
//!
//! `MockEngine` records every call in order and fails or panics on demand.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podkeeper::{
    ContainerDescription, ContainerStatus, Error, PodDescription, PodEngine, Result,
    SupervisorConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exists(String),
    Start { manifest: PathBuf, args: Vec<String> },
    Stop(String, Duration),
    ForceRemove(String),
    Remove(String),
    Kill(String, i32),
    Inspect(String),
    Logs(String, DateTime<Utc>),
}

#[derive(Debug, Default)]
pub struct MockEngine {
    calls: Mutex<Vec<Call>>,
    existing: bool,
    fail_start: bool,
    fail_stop: bool,
    fail_remove: bool,
    fail_kill: bool,
    panic_on_kill: bool,
    fail_inspect: bool,
    containers: Vec<ContainerDescription>,
    logs: String,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            containers: vec![ContainerDescription::new(
                "web_pod-app",
                ContainerStatus::Running,
            )],
            ..Self::default()
        }
    }

    pub fn with_existing_pod(mut self) -> Self {
        self.existing = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn failing_kill(mut self) -> Self {
        self.fail_kill = true;
        self
    }

    pub fn panicking_kill(mut self) -> Self {
        self.panic_on_kill = true;
        self
    }

    pub fn failing_inspect(mut self) -> Self {
        self.fail_inspect = true;
        self
    }

    pub fn with_containers(mut self, containers: Vec<ContainerDescription>) -> Self {
        self.containers = containers;
        self
    }

    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn engine_failure(command: &str) -> Error {
    Error::EngineCommand {
        command: command.to_string(),
        status: Some(125),
        stdout: String::new(),
        stderr: format!("{command}: mock failure\n"),
    }
}

#[async_trait]
impl PodEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn exists(&self, pod: &str) -> Result<bool> {
        self.record(Call::Exists(pod.to_string()));
        Ok(self.existing)
    }

    async fn start(&self, manifest: &Path, extra_args: &[String]) -> Result<()> {
        self.record(Call::Start {
            manifest: manifest.to_path_buf(),
            args: extra_args.to_vec(),
        });
        if self.fail_start {
            return Err(engine_failure("kube play"));
        }
        Ok(())
    }

    async fn stop(&self, pod: &str, timeout: Duration) -> Result<()> {
        self.record(Call::Stop(pod.to_string(), timeout));
        if self.fail_stop {
            return Err(engine_failure("pod stop"));
        }
        Ok(())
    }

    async fn force_remove(&self, pod: &str) -> Result<()> {
        self.record(Call::ForceRemove(pod.to_string()));
        Ok(())
    }

    async fn remove(&self, pod: &str) -> Result<()> {
        self.record(Call::Remove(pod.to_string()));
        if self.fail_remove {
            return Err(engine_failure("pod rm"));
        }
        Ok(())
    }

    async fn kill(&self, pod: &str, signal: i32) -> Result<()> {
        self.record(Call::Kill(pod.to_string(), signal));
        if self.panic_on_kill {
            panic!("mock engine panicked while signaling {pod}");
        }
        if self.fail_kill {
            return Err(engine_failure("pod kill"));
        }
        Ok(())
    }

    async fn inspect(&self, pod: &str) -> Result<PodDescription> {
        self.record(Call::Inspect(pod.to_string()));
        if self.fail_inspect {
            return Err(engine_failure("pod inspect"));
        }
        Ok(PodDescription {
            name: pod.to_string(),
            containers: self.containers.clone(),
        })
    }

    async fn logs_since(&self, container: &str, since: DateTime<Utc>) -> Result<String> {
        self.record(Call::Logs(container.to_string(), since));
        Ok(self.logs.clone())
    }
}

/// Creates `<tmp>/<identifier>/pod-<identifier>.yaml`.
pub fn services_dir_with(identifier: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join(identifier);
    std::fs::create_dir(&home).unwrap();
    std::fs::write(
        home.join(format!("pod-{identifier}.yaml")),
        "apiVersion: v1\nkind: Pod\n",
    )
    .unwrap();
    dir
}

pub fn config_for(services: &TempDir, identifier: &str) -> SupervisorConfig {
    SupervisorConfig::new(identifier).with_services_dir(services.path())
}

/// Counts calls matching `pred`.
pub fn count(calls: &[Call], pred: impl Fn(&Call) -> bool) -> usize {
    calls.iter().filter(|c| pred(c)).count()
}
