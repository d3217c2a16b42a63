//! Serialises calls to a rate limited API.
//!
//! The status board accepts one request per second per client. Every call
//! goes through a single [`RequestGate`]: the lock is held while waiting out
//! the spacing and for the duration of the call itself, so concurrent
//! product evaluations queue up instead of tripping the remote limit.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Default spacing between consecutive board calls.
pub const DEFAULT_REQUEST_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RequestGate {
    spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_SPACING)
    }
}

impl RequestGate {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_call: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Runs `call` once at least `spacing` has passed since the previous
    /// call started. Calls never overlap.
    pub async fn run<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let ready_at = previous + self.spacing;
            if ready_at > Instant::now() {
                trace!("request gate waiting {:?}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
        call.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn first_call_is_not_delayed() {
        let gate = RequestGate::new(Duration::from_secs(1));
        let started = Instant::now();
        gate.run(async {}).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_calls_are_spaced() {
        let gate = RequestGate::new(Duration::from_secs(1));
        let started = Instant::now();
        let mut starts = Vec::new();
        for _ in 0..3 {
            gate.run(async { starts.push(started.elapsed()) }).await;
        }
        assert_eq!(
            starts,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_overlap() {
        let gate = Arc::new(RequestGate::new(Duration::from_secs(1)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            let in_flight = Arc::clone(&in_flight);
            handles.push(tokio::spawn(async move {
                gate.run(async {
                    assert_eq!(in_flight.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
