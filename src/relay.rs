//! # Signal Relay
//!
//! Turns asynchronously delivered OS signals into pending work for the
//! event loop.
//!
//! ```text
//!  SIGINT/SIGTERM ──► stop latch ────────┐
//!  SIGHUP         ──► reload latch ──────┤
//!  SIGALRM/timer  ──► check latch ───────┼──► wake ──► event loop
//!  (SIGCHLD)      ──► check latch ───────┤
//!  SIGUSR1/USR2   ──► pipe ──► queue ────┘
//! ```
//!
//! Producers only touch atomics, the bounded queue and the wake
//! notification; they never call the engine. Latches collapse repeated
//! requests of one category into a single pending action. The passthrough
//! queue is the only channel that keeps every entry, in delivery order:
//! each passthrough delivery is written to a socket pair by the signal
//! handler itself and read back by a relay task.
//!
//! The wake notification is a [`Notify`] permit: at most one is stored, so
//! several wake-ups before the loop runs collapse into one.

use crate::constants::{PASSTHROUGH_ENQUEUE_TIMEOUT, PASSTHROUGH_QUEUE_CAPACITY};
use crate::error::{Error, Result};
use crate::signal::{Signal, SignalAction, signal_name};
use signal_hook::SigId;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

// =============================================================================
// Relay
// =============================================================================

/// Producer side of the supervisor's pending work.
#[derive(Debug)]
pub struct SignalRelay {
    stop: AtomicBool,
    reload: AtomicBool,
    check: AtomicBool,
    passthrough: AtomicBool,
    queue: mpsc::Sender<i32>,
    wake: Notify,
}

/// Consumer side of the passthrough queue, owned by the event loop.
#[derive(Debug)]
pub struct PassthroughQueue {
    rx: mpsc::Receiver<i32>,
}

impl PassthroughQueue {
    /// Dequeues the next signal number, or `None` once the queue is empty.
    pub fn try_next(&mut self) -> Option<i32> {
        match self.rx.try_recv() {
            Ok(signum) => Some(signum),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl SignalRelay {
    /// Creates a relay and the queue its passthrough signals land in.
    pub fn channel() -> (Self, PassthroughQueue) {
        let (tx, rx) = mpsc::channel(PASSTHROUGH_QUEUE_CAPACITY);
        let relay = Self {
            stop: AtomicBool::new(false),
            reload: AtomicBool::new(false),
            check: AtomicBool::new(false),
            passthrough: AtomicBool::new(false),
            queue: tx,
            wake: Notify::new(),
        };
        (relay, PassthroughQueue { rx })
    }

    // =========================================================================
    // Producers
    // =========================================================================

    /// Requests a graceful stop.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Requests a reload (hangup forwarded to the pod).
    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Requests a health check.
    pub fn request_check(&self) {
        self.check.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Queues `signum` for forwarding to the pod.
    ///
    /// Waits at most [`PASSTHROUGH_ENQUEUE_TIMEOUT`] for queue space; a signal
    /// that cannot be queued in time is dropped with a warning.
    pub async fn passthrough(&self, signum: i32) {
        match self
            .queue
            .send_timeout(signum, PASSTHROUGH_ENQUEUE_TIMEOUT)
            .await
        {
            Ok(()) => {
                self.passthrough.store(true, Ordering::SeqCst);
                self.wake.notify_one();
            }
            Err(e) => {
                warn!(signal = %signal_name(signum), error = %e, "dropping passthrough signal");
            }
        }
    }

    /// Routes an observed OS signal to its category.
    pub async fn dispatch(&self, signal: Signal) {
        match signal.action() {
            SignalAction::Stop => {
                info!(signal = %signal, "destroy signal");
                self.request_stop();
            }
            SignalAction::Reload => {
                info!(signal = %signal, "reload signal");
                self.request_reload();
            }
            SignalAction::Check => self.request_check(),
            SignalAction::Passthrough => self.passthrough(signal.as_i32()).await,
        }
    }

    // =========================================================================
    // Consumer
    // =========================================================================

    /// Waits for the wake notification, consuming it.
    pub async fn wait(&self) {
        self.wake.notified().await;
    }

    /// Returns true once a stop has been requested. Never cleared.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Clears and returns the reload latch.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    /// Clears and returns the check latch.
    pub fn take_check(&self) -> bool {
        self.check.swap(false, Ordering::SeqCst)
    }

    /// Clears and returns the passthrough latch.
    pub fn take_passthrough(&self) -> bool {
        self.passthrough.swap(false, Ordering::SeqCst)
    }
}

// =============================================================================
// OS Wiring
// =============================================================================

fn signal_kind(signal: Signal) -> SignalKind {
    match signal {
        Signal::Int => SignalKind::interrupt(),
        Signal::Term => SignalKind::terminate(),
        Signal::Hup => SignalKind::hangup(),
        Signal::Alrm => SignalKind::alarm(),
        Signal::Chld => SignalKind::child(),
        Signal::Usr1 => SignalKind::user_defined1(),
        Signal::Usr2 => SignalKind::user_defined2(),
    }
}

/// Signal handlers that record each passthrough delivery as one byte.
///
/// The handler writes the signal number into a socket pair from inside the
/// signal context, so the reader sees every delivery, in delivery order.
/// Dropping the hooks unregisters the handlers before the write end closes.
struct PassthroughHooks {
    ids: Vec<SigId>,
    _writer: StdUnixStream,
}

impl PassthroughHooks {
    fn register(signals: &[Signal]) -> Result<(Self, UnixStream)> {
        let (writer, reader) = StdUnixStream::pair()?;
        writer.set_nonblocking(true)?;
        reader.set_nonblocking(true)?;
        let reader = UnixStream::from_std(reader)?;

        let fd = writer.as_raw_fd();
        let mut hooks = Self {
            ids: Vec::with_capacity(signals.len()),
            _writer: writer,
        };
        for &sig in signals {
            let setup_error = |source| Error::SignalSetup {
                signal: sig.to_string(),
                source,
            };
            let byte = u8::try_from(sig.as_i32()).map_err(|_| {
                setup_error(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "signal number does not fit the relay encoding",
                ))
            })?;

            let action = move || write_byte(fd, byte);
            // SAFETY: the action only calls write(2), which is async-signal-safe.
            let id = unsafe { signal_hook::low_level::register(sig.as_i32(), action) }
                .map_err(setup_error)?;
            hooks.ids.push(id);
        }
        Ok((hooks, reader))
    }
}

impl Drop for PassthroughHooks {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

fn write_byte(fd: RawFd, byte: u8) {
    // A full socket buffer drops the delivery; nothing else is safe here.
    // SAFETY: `fd` stays open until every handler using it is unregistered.
    let _ = unsafe { libc::write(fd, std::ptr::from_ref(&byte).cast(), 1) };
}

async fn relay_passthrough(relay: Arc<SignalRelay>, _hooks: PassthroughHooks, reader: UnixStream) {
    let mut buf = [0u8; 64];
    loop {
        if let Err(e) = reader.readable().await {
            warn!(error = %e, "passthrough signal pipe failed");
            break;
        }
        match reader.try_read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for &signum in &buf[..n] {
                    relay.passthrough(i32::from(signum)).await;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                warn!(error = %e, "passthrough signal pipe failed");
                break;
            }
        }
    }
    debug!("passthrough signal pipe closed");
}

/// Registers OS signal listeners that feed `relay`.
///
/// Stop, reload and check signals go through Tokio signal streams; repeated
/// deliveries may merge there, which the latches would collapse anyway.
/// Passthrough signals are recorded by a raw handler per delivery so none
/// is merged or reordered.
///
/// SIGCHLD is only mapped to a health check when `check_on_child_exit` is
/// set: every engine call the supervisor makes ends with a SIGCHLD, so the
/// mapping turns each check into the trigger for the next one.
///
/// Must be called from within a Tokio runtime. All listeners are registered
/// before any task is spawned, so an error leaves nothing running. Aborting
/// the returned tasks unregisters the passthrough handlers.
pub fn install_os_handlers(
    relay: &Arc<SignalRelay>,
    check_on_child_exit: bool,
) -> Result<Vec<JoinHandle<()>>> {
    let (passthrough, latched): (Vec<Signal>, Vec<Signal>) = Signal::ALL
        .into_iter()
        .filter(|s| *s != Signal::Chld || check_on_child_exit)
        .partition(|s| s.action() == SignalAction::Passthrough);

    let mut streams = Vec::with_capacity(latched.len());
    for sig in latched {
        let stream = signal(signal_kind(sig)).map_err(|source| Error::SignalSetup {
            signal: sig.to_string(),
            source,
        })?;
        streams.push((sig, stream));
    }
    let (hooks, reader) = PassthroughHooks::register(&passthrough)?;

    let mut handles: Vec<JoinHandle<()>> = streams
        .into_iter()
        .map(|(sig, mut stream)| {
            let relay = Arc::clone(relay);
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    relay.dispatch(sig).await;
                }
                debug!(signal = %sig, "signal stream closed");
            })
        })
        .collect();
    handles.push(tokio::spawn(relay_passthrough(
        Arc::clone(relay),
        hooks,
        reader,
    )));

    Ok(handles)
}

/// Spawns the periodic health-check timer.
///
/// First fires after `initial_delay`, then every `period`. A tick that
/// could not fire on time is delayed rather than bursted.
pub fn spawn_check_timer(
    relay: Arc<SignalRelay>,
    initial_delay: Duration,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            relay.request_check();
        }
    })
}
