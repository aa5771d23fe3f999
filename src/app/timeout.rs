use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

/// How long a timed-out operation gets to observe its cancellation before the caller moves on.
pub const GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Advisory cancellation handed to a guarded operation. The operation has to poll it; nothing
/// forces it to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requests: Arc<AtomicUsize>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.requests.load(Ordering::SeqCst) > 0
    }

    /// Number of times cancellation was requested.
    pub fn cancel_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Runs `operation` on a dedicated thread and waits at most `deadline` for it.
///
/// Returns true only if the operation finished in time. On timeout the operation's token is
/// cancelled once and the caller waits up to [`GRACE_PERIOD`] more before returning false. A
/// false result says nothing about whether the operation has stopped: anything it holds may
/// still be in use.
pub fn run_with_timeout<F>(operation: F, deadline: Duration) -> bool
where
    F: FnOnce(&CancelToken) + Send + 'static,
{
    run_with_timeout_and_grace(operation, deadline, GRACE_PERIOD)
}

pub fn run_with_timeout_and_grace<F>(operation: F, deadline: Duration, grace: Duration) -> bool
where
    F: FnOnce(&CancelToken) + Send + 'static,
{
    let token = CancelToken::new();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let worker_token = token.clone();
    let spawned = std::thread::Builder::new()
        .name("timeout-run".to_string())
        .spawn(move || {
            operation(&worker_token);
            let _ = done_tx.send(());
        });
    let handle = match spawned {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "failed to start timeout run");
            return false;
        }
    };

    let deadline_ms = deadline.as_millis() as u64;
    let grace_ms = grace.as_millis() as u64;
    info!(deadline_ms, "starting timeout run");
    match done_rx.recv_timeout(deadline) {
        Ok(()) => {
            info!("finished run before timeout");
            let _ = handle.join();
            true
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!("timeout, requesting shutdown");
            token.cancel();
            match done_rx.recv_timeout(grace) {
                Ok(()) => info!("timed-out run stopped within grace period"),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(grace_ms, "timed-out run still active after grace period")
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("timed-out run terminated abnormally")
                }
            }
            false
        }
        // The sender is gone without reporting completion: the operation panicked.
        Err(RecvTimeoutError::Disconnected) => {
            error!("unexpected failure in timeout run");
            let _ = handle.join();
            false
        }
    }
}
