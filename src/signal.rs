//! OS signals recognized by the supervisor.
//!
//! Signals reach the supervisor as raw numbers. [`Signal`] names the ones the
//! relay listens for and maps each to the category of work it requests.

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Signals
// =============================================================================

/// Signal observed by the supervisor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGINT (interrupt).
    Int,
    /// SIGTERM (graceful shutdown).
    Term,
    /// SIGHUP (hangup).
    Hup,
    /// SIGALRM (interval timer expiry).
    Alrm,
    /// SIGCHLD (child status change).
    Chld,
    /// SIGUSR1.
    Usr1,
    /// SIGUSR2.
    Usr2,
}

/// Category of work a signal asks the event loop to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Leave the event loop and shut the pod down.
    Stop,
    /// Forward a hangup to the pod.
    Reload,
    /// Run a health check.
    Check,
    /// Forward the signal verbatim to the pod.
    Passthrough,
}

impl Signal {
    /// All signals the relay can listen for.
    pub const ALL: [Signal; 7] = [
        Signal::Int,
        Signal::Term,
        Signal::Hup,
        Signal::Alrm,
        Signal::Chld,
        Signal::Usr1,
        Signal::Usr2,
    ];

    /// Returns the signal number.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Int => libc::SIGINT,
            Self::Term => libc::SIGTERM,
            Self::Hup => libc::SIGHUP,
            Self::Alrm => libc::SIGALRM,
            Self::Chld => libc::SIGCHLD,
            Self::Usr1 => libc::SIGUSR1,
            Self::Usr2 => libc::SIGUSR2,
        }
    }

    /// Maps a raw signal number back to a known signal.
    pub fn from_raw(signum: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_i32() == signum)
    }

    /// Returns the work this signal requests from the event loop.
    pub fn action(&self) -> SignalAction {
        match self {
            Self::Int | Self::Term => SignalAction::Stop,
            Self::Hup => SignalAction::Reload,
            Self::Alrm | Self::Chld => SignalAction::Check,
            Self::Usr1 | Self::Usr2 => SignalAction::Passthrough,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "SIGINT"),
            Self::Term => write!(f, "SIGTERM"),
            Self::Hup => write!(f, "SIGHUP"),
            Self::Alrm => write!(f, "SIGALRM"),
            Self::Chld => write!(f, "SIGCHLD"),
            Self::Usr1 => write!(f, "SIGUSR1"),
            Self::Usr2 => write!(f, "SIGUSR2"),
        }
    }
}

/// Parses from signal name or number (e.g., "SIGTERM", "term", "15").
impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(signum) = s.parse::<i32>() {
            return Self::from_raw(signum).ok_or_else(|| format!("unknown signal: {s}"));
        }
        let upper = s.to_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" => Ok(Self::Int),
            "TERM" => Ok(Self::Term),
            "HUP" => Ok(Self::Hup),
            "ALRM" => Ok(Self::Alrm),
            "CHLD" => Ok(Self::Chld),
            "USR1" => Ok(Self::Usr1),
            "USR2" => Ok(Self::Usr2),
            _ => Err(format!("unknown signal: {s}")),
        }
    }
}

/// Human-readable name for a raw signal number, used in log lines.
pub fn signal_name(signum: i32) -> String {
    match Signal::from_raw(signum) {
        Some(signal) => signal.to_string(),
        None => format!("signal {signum}"),
    }
}
