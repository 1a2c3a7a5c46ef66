//! # Pod Supervisor
//!
//! Owns the lifecycle of one pod: start it, monitor it until a stop is
//! requested, then shut it down exactly once.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────────┐  start ok   ┌────────────┐  stop latched  ┌──────────┐
//!   │ Starting │ ──────────► │ Monitoring │ ─────────────► │ Stopping │
//!   └────┬─────┘             └─────┬──────┘                └────┬─────┘
//!        │ error                   │ wake                       │ remove_on_exit
//!        ▼                         ▼                            ▼
//!     (exit)          Forwarding → Checking → Reloading    ┌──────────┐
//!                        (drained in this fixed order)     │ Removing │
//!                                                          └────┬─────┘
//!                                                               ▼
//!                                                         ┌────────────┐
//!                                                         │ Terminated │
//!                                                         └────────────┘
//! ```
//!
//! ## Event Loop
//!
//! The loop blocks on the relay's wake notification, then drains every
//! pending category in priority order: passthrough signals, health check,
//! reload. Only after the batch completes is the stop latch consulted, so an
//! in-flight engine call is never interrupted.
//!
//! ## Cleanup Guarantee
//!
//! A successful start yields a [`StartedPod`]. Its [`StartedPod::shutdown`]
//! consumes it, so the stop sequence can run at most once per start.
//! [`Supervisor::run`] drives the monitor under `catch_unwind` and calls
//! `shutdown` on every exit path, re-raising a caught panic afterwards.

use crate::config::{EngineArgs, PodPaths, SupervisorConfig};
use crate::constants::{FIRST_STOP_TIMEOUT, REPLACE_STOP_TIMEOUT, SECOND_STOP_TIMEOUT};
use crate::engine::PodEngine;
use crate::error::Result;
use crate::health::HealthMonitor;
use crate::notify::ReadinessReporter;
use crate::relay::{PassthroughQueue, SignalRelay};
use crate::signal::{Signal, signal_name};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// =============================================================================
// Supervisor State
// =============================================================================

/// Lifecycle phase of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Replacing a stale pod and starting from the manifest.
    Starting,
    /// Waiting for work.
    Monitoring,
    /// Forwarding queued passthrough signals.
    Forwarding,
    /// Running a health check.
    Checking,
    /// Forwarding a hangup to the pod.
    Reloading,
    /// Running the two stop attempts.
    Stopping,
    /// Removing the pod.
    Removing,
    /// Shutdown sequence complete.
    Terminated,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Forwarding => write!(f, "forwarding"),
            Self::Checking => write!(f, "checking"),
            Self::Reloading => write!(f, "reloading"),
            Self::Stopping => write!(f, "stopping"),
            Self::Removing => write!(f, "removing"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

// =============================================================================
// Shutdown
// =============================================================================

/// Outcome of each stage of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// First stop attempt succeeded.
    pub first_stop: bool,
    /// Second stop attempt succeeded.
    pub second_stop: bool,
    /// Removal outcome, `None` if removal was not requested.
    pub removed: Option<bool>,
}

impl ShutdownReport {
    /// Returns true if the pod ended up stopped and, if requested, removed.
    pub fn is_clean(&self) -> bool {
        (self.first_stop || self.second_stop) && self.removed.unwrap_or(true)
    }
}

/// A pod that was started and still owes its shutdown sequence.
#[must_use = "a started pod must be shut down"]
pub struct StartedPod {
    engine: Arc<dyn PodEngine>,
    pod_name: String,
    remove_on_exit: bool,
    released: bool,
}

impl std::fmt::Debug for StartedPod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartedPod")
            .field("engine", &self.engine.name())
            .field("pod_name", &self.pod_name)
            .field("remove_on_exit", &self.remove_on_exit)
            .finish()
    }
}

impl StartedPod {
    /// Name of the started pod.
    pub fn pod_name(&self) -> &str {
        &self.pod_name
    }

    /// Runs the shutdown sequence.
    ///
    /// Stops with a 19 s timeout, then again with 5 s regardless of the
    /// first outcome, then removes the pod if configured. Each stage is
    /// best-effort and independent of the others.
    pub async fn shutdown(mut self, state: &mut SupervisorState) -> ShutdownReport {
        self.released = true;
        *state = SupervisorState::Stopping;
        let pod = self.pod_name.as_str();
        info!(pod = %pod, "stopping pod");

        let first_stop = match self.engine.stop(pod, FIRST_STOP_TIMEOUT).await {
            Ok(()) => true,
            Err(e) => {
                error!(pod = %pod, error = %e, "first stop of pod was not successful");
                false
            }
        };

        let second_stop = match self.engine.stop(pod, SECOND_STOP_TIMEOUT).await {
            Ok(()) => true,
            Err(e) => {
                // Already reported once if the first attempt failed too.
                if first_stop {
                    debug!(pod = %pod, error = %e, "second stop failed after successful first stop");
                } else {
                    error!(pod = %pod, error = %e, "second stop of pod was not successful");
                }
                false
            }
        };

        let removed = if self.remove_on_exit {
            *state = SupervisorState::Removing;
            Some(match self.engine.remove(pod).await {
                Ok(()) => true,
                Err(e) => {
                    error!(pod = %pod, error = %e, "removal of pod was not successful");
                    false
                }
            })
        } else {
            None
        };

        *state = SupervisorState::Terminated;
        let report = ShutdownReport {
            first_stop,
            second_stop,
            removed,
        };
        info!(pod = %pod, clean = report.is_clean(), "pod shut down");
        report
    }
}

impl Drop for StartedPod {
    fn drop(&mut self) {
        if !self.released {
            error!(pod = %self.pod_name, "started pod dropped without running the shutdown sequence");
        }
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Supervises a single pod for the lifetime of the process.
pub struct Supervisor {
    paths: PodPaths,
    engine_args: EngineArgs,
    replace_existing: bool,
    remove_on_exit: bool,
    engine: Arc<dyn PodEngine>,
    relay: Arc<SignalRelay>,
    passthrough: PassthroughQueue,
    health: HealthMonitor,
    reporter: ReadinessReporter,
    state: SupervisorState,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("paths", &self.paths)
            .field("engine_args", &self.engine_args)
            .field("replace_existing", &self.replace_existing)
            .field("remove_on_exit", &self.remove_on_exit)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Validates `config` and builds a supervisor.
    ///
    /// No engine call is made here.
    ///
    /// # Errors
    ///
    /// Fails with a validation error for a malformed identifier, or a
    /// not-found error if the pod home or manifest is missing.
    pub fn new(
        config: SupervisorConfig,
        engine: Arc<dyn PodEngine>,
        reporter: ReadinessReporter,
    ) -> Result<Self> {
        let paths = PodPaths::resolve(&config.services_dir, &config.identifier)?;
        let (relay, passthrough) = SignalRelay::channel();

        Ok(Self {
            paths,
            engine_args: config.engine_args,
            replace_existing: config.replace_existing,
            remove_on_exit: config.remove_on_exit,
            engine,
            relay: Arc::new(relay),
            passthrough,
            health: HealthMonitor::new(Utc::now()),
            reporter,
            state: SupervisorState::Starting,
        })
    }

    /// Relay to register as the target of OS signal handlers.
    pub fn relay(&self) -> Arc<SignalRelay> {
        Arc::clone(&self.relay)
    }

    /// Resolved paths and names of the supervised pod.
    pub fn paths(&self) -> &PodPaths {
        &self.paths
    }

    /// Engine-side pod name.
    pub fn pod_name(&self) -> &str {
        &self.paths.pod_name
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Timestamp of the last completed health check.
    pub fn last_check(&self) -> DateTime<Utc> {
        self.health.last_check()
    }

    /// Starts the pod and supervises it until shutdown completes.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the pod could not be started. Once the pod
    /// is started, the shutdown sequence always runs and this returns `Ok`.
    pub async fn run(&mut self) -> Result<ShutdownReport> {
        let pod = self.start().await?;
        self.reporter.notify_ready();

        let monitored = AssertUnwindSafe(self.monitor()).catch_unwind().await;
        if monitored.is_err() {
            error!(pod = %self.paths.pod_name, "monitor loop panicked, shutting pod down");
        }

        let report = pod.shutdown(&mut self.state).await;
        if let Err(panic) = monitored {
            std::panic::resume_unwind(panic);
        }
        Ok(report)
    }

    /// Replaces a stale pod if configured, then starts from the manifest.
    ///
    /// # Errors
    ///
    /// Any engine failure here is fatal and returned as is.
    pub async fn start(&mut self) -> Result<StartedPod> {
        self.state = SupervisorState::Starting;
        let pod = self.paths.pod_name.as_str();

        if self.replace_existing && self.engine.exists(pod).await? {
            info!(pod = %pod, "replacing existing pod");
            self.engine.stop(pod, REPLACE_STOP_TIMEOUT).await?;
            self.engine.force_remove(pod).await?;
        }

        info!(
            pod = %pod,
            manifest = %self.paths.manifest_path.display(),
            at = %self.health.last_check(),
            "starting pod"
        );
        self.engine
            .start(&self.paths.manifest_path, &self.engine_args.to_args())
            .await?;

        Ok(StartedPod {
            engine: Arc::clone(&self.engine),
            pod_name: self.paths.pod_name.clone(),
            remove_on_exit: self.remove_on_exit,
            released: false,
        })
    }

    /// Runs the event loop until a stop has been requested.
    pub async fn monitor(&mut self) {
        self.state = SupervisorState::Monitoring;
        info!(pod = %self.paths.pod_name, "monitoring pod");

        loop {
            self.relay.wait().await;
            self.drain().await;
            self.state = SupervisorState::Monitoring;
            if self.relay.stop_requested() {
                break;
            }
        }

        self.reporter.notify_stopping();
    }

    /// Performs all pending work in priority order.
    async fn drain(&mut self) {
        if self.relay.take_passthrough() {
            self.state = SupervisorState::Forwarding;
            while let Some(signum) = self.passthrough.try_next() {
                self.forward(signum).await;
            }
        }

        if self.relay.take_check() {
            self.state = SupervisorState::Checking;
            let outcome = self
                .health
                .check_once(self.engine.as_ref(), &self.paths.pod_name)
                .await;
            if outcome.triggers_stop() {
                warn!(pod = %self.paths.pod_name, outcome = ?outcome, "health check failed, stopping");
                self.relay.request_stop();
            }
        }

        if self.relay.take_reload() {
            self.state = SupervisorState::Reloading;
            self.forward(Signal::Hup.as_i32()).await;
        }
    }

    /// Forwards `signum` to the pod; failures are logged, not returned.
    async fn forward(&self, signum: i32) {
        let pod = self.paths.pod_name.as_str();
        info!(pod = %pod, signal = %signal_name(signum), "sending signal to pod");
        if let Err(e) = self.engine.kill(pod, signum).await {
            error!(
                pod = %pod,
                signal = %signal_name(signum),
                status = ?e.exit_status(),
                error = %e,
                "error signaling pod"
            );
        }
    }
}
