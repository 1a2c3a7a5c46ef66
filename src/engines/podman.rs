//! # Podman Engine Client
//!
//! Implements [`PodEngine`] by invoking the `podman` CLI through
//! `tokio::process::Command`.
//!
//! ## Command Mapping
//!
//! | Operation      | Command                                          |
//! |----------------|--------------------------------------------------|
//! | `exists`       | `podman pod exists <pod>`                        |
//! | `start`        | `podman kube play <manifest> [args]` (in pod home)|
//! | `stop`         | `podman pod stop -t <secs> <pod>`                |
//! | `force_remove` | `podman pod rm -f <pod>`                         |
//! | `remove`       | `podman pod rm <pod>`                            |
//! | `kill`         | `podman pod kill --signal <n> <pod>`             |
//! | `inspect`      | `podman pod inspect <pod>`                       |
//! | `logs_since`   | `podman logs --since <rfc3339> <container>`      |
//!
//! Global arguments (for example `--remote` or `--url`) can be placed in
//! front of every subcommand with [`PodmanEngine::with_global_args`].

use crate::constants::{DEFAULT_ENGINE, ENGINE_NOT_FOUND_EXIT_CODE};
use crate::engine::{CommandOutput, PodDescription, PodEngine};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Engine client backed by the `podman` command line.
#[derive(Debug, Clone)]
pub struct PodmanEngine {
    program: PathBuf,
    global_args: Vec<String>,
}

impl Default for PodmanEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PodmanEngine {
    /// Creates a client invoking `podman` from `PATH`.
    pub fn new() -> Self {
        Self::with_program(DEFAULT_ENGINE)
    }

    /// Creates a client invoking the given program.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            global_args: Vec::new(),
        }
    }

    /// Sets arguments placed before every subcommand.
    #[must_use]
    pub fn with_global_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the program this client invokes.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.program.display().to_string();
        for arg in self.global_args.iter().chain(args) {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Runs the engine and captures its output without judging the exit code.
    async fn output(&self, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        let command_line = self.command_line(args);
        debug!(command = %command_line, "running engine command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.global_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| Error::EngineSpawn {
            command: command_line,
            source,
        })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Runs the engine and fails on any non-zero exit.
    async fn run(&self, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        let output = self.output(args, cwd).await?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(output.into_error(self.command_line(args)))
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_string()).collect()
}

#[async_trait]
impl PodEngine for PodmanEngine {
    fn name(&self) -> &str {
        "podman"
    }

    async fn exists(&self, pod: &str) -> Result<bool> {
        let args = args(&["pod", "exists", pod]);
        let output = self.output(&args, None).await?;
        match output.status {
            Some(0) => Ok(true),
            Some(ENGINE_NOT_FOUND_EXIT_CODE) => Ok(false),
            _ => Err(output.into_error(self.command_line(&args))),
        }
    }

    async fn start(&self, manifest: &Path, extra_args: &[String]) -> Result<()> {
        // The manifest is passed relative to its directory so paths inside it
        // resolve against the pod home.
        let (cwd, file) = match (manifest.parent(), manifest.file_name()) {
            (Some(dir), Some(file)) if !dir.as_os_str().is_empty() => {
                (Some(dir), file.to_string_lossy().into_owned())
            }
            _ => (None, manifest.to_string_lossy().into_owned()),
        };

        let mut args = args(&["kube", "play", &file]);
        args.extend(extra_args.iter().cloned());
        self.run(&args, cwd).await.map(drop)
    }

    async fn stop(&self, pod: &str, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs().to_string();
        self.run(&args(&["pod", "stop", "-t", &secs, pod]), None)
            .await
            .map(drop)
    }

    async fn force_remove(&self, pod: &str) -> Result<()> {
        self.run(&args(&["pod", "rm", "-f", pod]), None)
            .await
            .map(drop)
    }

    async fn remove(&self, pod: &str) -> Result<()> {
        self.run(&args(&["pod", "rm", pod]), None).await.map(drop)
    }

    async fn kill(&self, pod: &str, signal: i32) -> Result<()> {
        let signal = signal.to_string();
        self.run(&args(&["pod", "kill", "--signal", &signal, pod]), None)
            .await
            .map(drop)
    }

    async fn inspect(&self, pod: &str) -> Result<PodDescription> {
        let output = self.run(&args(&["pod", "inspect", pod]), None).await?;
        PodDescription::from_json(pod, &output.stdout)
    }

    async fn logs_since(&self, container: &str, since: DateTime<Utc>) -> Result<String> {
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let output = self
            .run(&args(&["logs", "--since", &since, container]), None)
            .await?;
        Ok(output.stdout + &output.stderr)
    }
}
