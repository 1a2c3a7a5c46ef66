//! Tests for OS signal delivery through the installed handlers.
//!
//! Signals are process-wide, so these tests live in their own binary and
//! take a shared lock while handlers are installed.

use podkeeper::relay::install_os_handlers;
use podkeeper::{PassthroughQueue, SignalRelay};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

static SIGNALS: Mutex<()> = Mutex::const_new(());

fn raise(signum: i32) {
    assert_eq!(unsafe { libc::raise(signum) }, 0);
}

async fn drain_until(queue: &mut PassthroughQueue, expected: usize) -> Vec<i32> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    while seen.len() < expected && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
        while let Some(signum) = queue.try_next() {
            seen.push(signum);
        }
    }
    seen
}

#[tokio::test]
async fn test_burst_passthrough_keeps_every_delivery_in_order() {
    let _guard = SIGNALS.lock().await;
    let (relay, mut queue) = SignalRelay::channel();
    let relay = Arc::new(relay);
    let tasks = install_os_handlers(&relay, false).unwrap();

    raise(libc::SIGUSR2);
    raise(libc::SIGUSR1);
    raise(libc::SIGUSR2);
    raise(libc::SIGUSR1);

    let seen = drain_until(&mut queue, 4).await;
    for task in tasks {
        task.abort();
    }

    assert_eq!(
        seen,
        vec![libc::SIGUSR2, libc::SIGUSR1, libc::SIGUSR2, libc::SIGUSR1]
    );
    assert!(relay.take_passthrough());
    assert!(!relay.take_reload());
    assert!(!relay.stop_requested());
}

#[tokio::test]
async fn test_repeated_hangups_collapse_into_one_reload() {
    let _guard = SIGNALS.lock().await;
    let (relay, mut queue) = SignalRelay::channel();
    let relay = Arc::new(relay);
    let tasks = install_os_handlers(&relay, false).unwrap();

    for _ in 0..3 {
        raise(libc::SIGHUP);
    }

    tokio::time::timeout(Duration::from_secs(5), relay.wait())
        .await
        .expect("hangup should wake the relay");
    tokio::time::sleep(Duration::from_millis(100)).await;
    for task in tasks {
        task.abort();
    }

    assert!(relay.take_reload());
    assert!(!relay.take_reload());
    assert!(!relay.take_passthrough());
    assert_eq!(queue.try_next(), None);
}

#[tokio::test]
async fn test_alarm_requests_check() {
    let _guard = SIGNALS.lock().await;
    let (relay, _queue) = SignalRelay::channel();
    let relay = Arc::new(relay);
    let tasks = install_os_handlers(&relay, false).unwrap();

    raise(libc::SIGALRM);
    tokio::time::timeout(Duration::from_secs(5), relay.wait())
        .await
        .expect("alarm should wake the relay");
    for task in tasks {
        task.abort();
    }

    assert!(relay.take_check());
    assert!(!relay.stop_requested());
}
