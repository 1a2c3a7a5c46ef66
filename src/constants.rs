//! # Supervisor Constants
//!
//! Timeouts, timer cadence, naming rules and defaults shared by the
//! supervisor, the engine client and the CLI.
//!
//! ## Cross-References
//!
//! - [`crate::supervisor`]: Uses the stop timeouts for the shutdown sequence
//! - [`crate::relay`]: Uses the passthrough queue bounds and timer cadence
//! - [`crate::health`]: Uses the log skew for "logs since" queries
//! - [`crate::config`]: Uses the naming rules to derive paths and pod names

use std::time::Duration;

// =============================================================================
// Paths and Naming
// =============================================================================

/// Base directory containing one subdirectory per pod identifier.
pub const DEFAULT_SERVICES_DIR: &str = "/docker/services";

/// Suffix appended to the identifier to form the engine-side pod name.
pub const POD_NAME_SUFFIX: &str = "_pod";

/// Prefix of the manifest file name inside the pod home.
pub const MANIFEST_PREFIX: &str = "pod-";

/// Extension of the manifest file name inside the pod home.
pub const MANIFEST_EXTENSION: &str = "yaml";

// =============================================================================
// Engine Defaults
// =============================================================================

/// Container engine binary invoked by [`crate::engines::PodmanEngine`].
pub const DEFAULT_ENGINE: &str = "podman";

/// Network the pod joins unless overridden on the command line.
pub const DEFAULT_NETWORK: &str = "brodge";

/// Log driver for the pod unless overridden on the command line.
pub const DEFAULT_LOG_DRIVER: &str = "journald";

/// Exit code of `pod exists` when the pod is not present.
///
/// Any other non-zero code is a genuine engine failure.
pub const ENGINE_NOT_FOUND_EXIT_CODE: i32 = 1;

// =============================================================================
// Shutdown
// =============================================================================

/// Timeout handed to the engine for the first, graceful stop attempt.
pub const FIRST_STOP_TIMEOUT: Duration = Duration::from_secs(19);

/// Timeout handed to the engine for the second stop attempt.
///
/// Issued regardless of the first attempt's outcome.
pub const SECOND_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout used when stopping a pre-existing pod that is about to be replaced.
pub const REPLACE_STOP_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Health Checks
// =============================================================================

/// Delay before the periodic health check fires for the first time.
pub const CHECK_INITIAL_DELAY: Duration = Duration::from_secs(4);

/// Period of the repeating health check timer.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Seconds subtracted from the last check timestamp when fetching logs, so
/// the line that straddles the boundary is not lost.
pub const LOG_SINCE_SKEW_SECS: i64 = 10;

// =============================================================================
// Passthrough Queue
// =============================================================================

/// Capacity of the passthrough signal queue.
pub const PASSTHROUGH_QUEUE_CAPACITY: usize = 64;

/// Longest time a relay waits to enqueue a passthrough signal.
pub const PASSTHROUGH_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// Service Manager
// =============================================================================

/// Environment variable naming the service manager's notification socket.
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

/// Status text reported once the pod is up.
pub const READY_STATUS: &str = "Monitoring pod...";

/// Status text reported when the shutdown sequence begins.
pub const STOPPING_STATUS: &str = "Stopping pod";
