//! Health monitoring of a running pod.
//!
//! A check inspects the pod and treats every container that is not running
//! as fatal: its recent logs are dumped to stderr and the check asks the
//! supervisor to stop. A pod that cannot be inspected cannot be supervised,
//! so an inspect failure asks for a stop as well.

use crate::constants::LOG_SINCE_SKEW_SECS;
use crate::engine::PodEngine;
use crate::error::Error;
use chrono::{DateTime, TimeDelta, Utc};
use std::io::Write;
use tracing::{error, warn};

/// Result of a single health check.
#[derive(Debug)]
pub enum CheckOutcome {
    /// Every container is running.
    Healthy,
    /// These containers were found not running.
    ContainersDown(Vec<String>),
    /// The pod could not be inspected.
    InspectFailed(Error),
}

impl CheckOutcome {
    /// Returns true if the supervisor should stop.
    pub fn triggers_stop(&self) -> bool {
        !matches!(self, Self::Healthy)
    }
}

/// Tracks the timestamp of the last completed check.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    last_check: DateTime<Utc>,
}

impl HealthMonitor {
    /// Creates a monitor whose first log window starts at `started_at`.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            last_check: started_at,
        }
    }

    /// Timestamp of the previous completed check.
    pub fn last_check(&self) -> DateTime<Utc> {
        self.last_check
    }

    /// Lower bound handed to "logs since" queries.
    pub fn logs_since(&self) -> DateTime<Utc> {
        self.last_check - TimeDelta::seconds(LOG_SINCE_SKEW_SECS)
    }

    /// Inspects `pod` once and reports whether the supervisor should stop.
    ///
    /// The last-check timestamp advances to the moment this check began, but
    /// only after all log collection is done. It does not advance when the
    /// inspect itself fails.
    pub async fn check_once(&mut self, engine: &dyn PodEngine, pod: &str) -> CheckOutcome {
        let check_started = Utc::now();

        let description = match engine.inspect(pod).await {
            Ok(description) => description,
            Err(e) => {
                error!(pod = %pod, error = %e, "failed to inspect pod");
                return CheckOutcome::InspectFailed(e);
            }
        };

        let since = self.logs_since();
        let mut down = Vec::new();
        for container in description.non_running() {
            warn!(
                pod = %pod,
                container = %container.name,
                state = %container.state,
                "container exited"
            );
            dump_logs(engine, &container.name, since).await;
            down.push(container.name.clone());
        }

        if check_started > self.last_check {
            self.last_check = check_started;
        }

        if down.is_empty() {
            CheckOutcome::Healthy
        } else {
            CheckOutcome::ContainersDown(down)
        }
    }
}

async fn dump_logs(engine: &dyn PodEngine, container: &str, since: DateTime<Utc>) {
    match engine.logs_since(container, since).await {
        Ok(logs) => {
            warn!(container = %container, since = %since, "log since last check (-{LOG_SINCE_SKEW_SECS}s):");
            if let Err(e) = write_stderr(logs.as_bytes()) {
                warn!(container = %container, error = %e, "failed to write container logs");
            }
        }
        Err(e) => {
            error!(container = %container, error = %e, "failed to fetch container logs");
        }
    }
}

fn write_stderr(bytes: &[u8]) -> std::io::Result<()> {
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(bytes)?;
    stderr.flush()
}
