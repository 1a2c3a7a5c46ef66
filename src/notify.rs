//! Readiness and status reporting to the host service manager.
//!
//! Speaks the `sd_notify` datagram protocol: newline-separated `KEY=VALUE`
//! assignments sent to the Unix socket named by `NOTIFY_SOCKET`. A leading
//! `@` selects the Linux abstract namespace.
//!
//! Reporting is best-effort. Without `NOTIFY_SOCKET` every call is a no-op,
//! and delivery failures are logged, never returned.

use crate::constants::{NOTIFY_SOCKET_ENV, READY_STATUS, STOPPING_STATUS};
use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum NotifyTarget {
    Path(PathBuf),
    Abstract(Vec<u8>),
}

/// Sends readiness and status notifications to the service manager.
#[derive(Debug, Clone, Default)]
pub struct ReadinessReporter {
    target: Option<NotifyTarget>,
}

impl ReadinessReporter {
    /// Builds a reporter from the `NOTIFY_SOCKET` environment variable.
    pub fn from_env() -> Self {
        Self::from_socket(std::env::var_os(NOTIFY_SOCKET_ENV))
    }

    /// Builds a reporter that never sends anything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Builds a reporter for the given socket address, if any.
    pub fn from_socket(socket: Option<impl Into<OsString>>) -> Self {
        let target = socket.map(Into::into).and_then(|addr: OsString| {
            let bytes = addr.as_bytes();
            if bytes.is_empty() {
                None
            } else if let Some(name) = bytes.strip_prefix(b"@") {
                Some(NotifyTarget::Abstract(name.to_vec()))
            } else {
                Some(NotifyTarget::Path(PathBuf::from(addr)))
            }
        });
        Self { target }
    }

    /// Returns true if a notification socket is configured.
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Reports that the pod is up and being monitored.
    pub fn notify_ready(&self) {
        self.send(&format!(
            "READY=1\nMAINPID={}\nSTATUS={READY_STATUS}",
            std::process::id()
        ));
    }

    /// Reports that the shutdown sequence is about to begin.
    pub fn notify_stopping(&self) {
        self.notify_status(STOPPING_STATUS);
    }

    /// Reports free-form status text.
    pub fn notify_status(&self, status: &str) {
        self.send(&format!("STATUS={status}"));
    }

    fn send(&self, message: &str) {
        let Some(target) = &self.target else {
            return;
        };
        match deliver(target, message.as_bytes()) {
            Ok(()) => debug!(message = %message.replace('\n', " "), "notified service manager"),
            Err(e) => warn!(error = %e, "failed to notify service manager"),
        }
    }
}

fn deliver(target: &NotifyTarget, message: &[u8]) -> io::Result<()> {
    let socket = UnixDatagram::unbound()?;
    match target {
        NotifyTarget::Path(path) => {
            socket.send_to(message, path)?;
        }
        #[cfg(target_os = "linux")]
        NotifyTarget::Abstract(name) => {
            use std::os::linux::net::SocketAddrExt;
            let addr = std::os::unix::net::SocketAddr::from_abstract_name(name)?;
            socket.send_to_addr(message, &addr)?;
        }
        #[cfg(not(target_os = "linux"))]
        NotifyTarget::Abstract(_) => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "abstract notify sockets require Linux",
            ));
        }
    }
    Ok(())
}
