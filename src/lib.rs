//! # podkeeper
//!
//! **Supervisor for a single container pod**
//!
//! `podkeeper` runs as a long-lived service process (typically one systemd
//! unit per pod). It starts a pod from its manifest, polls container health
//! on a timer, forwards operator signals to the pod and performs a staged
//! shutdown when asked to stop or when a container dies.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              podkeeper                              │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │   OS signals ──► SignalRelay ──► wake ──► Supervisor event loop     │
//! │   (INT TERM HUP   latches +                  │                      │
//! │    ALRM USR1/2)   FIFO queue                 │                      │
//! │                                   ┌──────────┼───────────┐          │
//! │                                   ▼          ▼           ▼          │
//! │                              forward     HealthMonitor  reload      │
//! │                              (kill)      (inspect/logs) (kill HUP)  │
//! │                                   └──────────┼───────────┘          │
//! │                                              ▼                      │
//! │                                   PodEngine (PodmanEngine)          │
//! │                                              │                      │
//! │   ReadinessReporter ◄── ready / stopping ────┘                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!   Starting ──► Monitoring ⇄ {Forwarding, Checking, Reloading}
//!                    │
//!                    ▼
//!                 Stopping ──► (Removing) ──► Terminated
//! ```
//!
//! All engine calls happen on the supervisor's control task, one at a time.
//! Signal listeners only set latches, queue passthrough signal numbers and
//! wake the loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use podkeeper::{PodmanEngine, ReadinessReporter, Supervisor, SupervisorConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> podkeeper::Result<()> {
//!     let config = SupervisorConfig::new("web");
//!     let mut supervisor = Supervisor::new(
//!         config,
//!         Arc::new(PodmanEngine::new()),
//!         ReadinessReporter::from_env(),
//!     )?;
//!
//!     podkeeper::relay::install_os_handlers(&supervisor.relay(), false)?;
//!     supervisor.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Platform Support
//!
//! Unix only: signal handling relies on `tokio::signal::unix` and readiness
//! reporting on Unix datagram sockets.

pub mod config;
pub mod constants;
pub mod engine;
pub mod engines;
pub mod error;
pub mod health;
pub mod notify;
pub mod relay;
pub mod signal;
pub mod supervisor;

// Re-exports
pub use config::{EngineArgs, PodPaths, SupervisorConfig};
pub use engine::{ContainerDescription, ContainerStatus, PodDescription, PodEngine};
pub use engines::PodmanEngine;
pub use error::{Error, Result};
pub use health::{CheckOutcome, HealthMonitor};
pub use notify::ReadinessReporter;
pub use relay::{PassthroughQueue, SignalRelay};
pub use signal::{Signal, SignalAction};
pub use supervisor::{ShutdownReport, StartedPod, Supervisor, SupervisorState};
