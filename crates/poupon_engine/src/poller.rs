//! Fixed-interval polling of long-running server tasks.
//!
//! The retry policy is deliberately simple: check, sleep for the configured
//! interval, check again. There is no backoff and no attempt limit. Bounds
//! come only from an optional timeout and a [`CancelToken`].

use crate::client::ResourceClient;
use crate::config::PollConfig;
use crate::error::{EngineError, EngineResult};
use crate::transport::HttpClient;
use poupon_protocol::{TaskHandle, TaskStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Shared flag that stops a poll loop before its next check.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears a previous cancellation.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Result of one status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The awaited condition holds.
    Done,
    /// Not yet; check again after the interval.
    Pending,
}

/// Blocks until a remote condition is reached.
#[derive(Debug, Clone)]
pub struct TaskPoller {
    config: PollConfig,
    cancel: CancelToken,
}

impl TaskPoller {
    /// Creates a poller.
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Uses the given cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the poll configuration.
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Runs `check` until it reports [`PollStatus::Done`] or fails.
    ///
    /// `check` receives the 1-based attempt number. Returns the number of
    /// checks performed. An error from `check` stops polling and is
    /// returned as is.
    pub fn poll_until<F>(&self, what: &str, mut check: F) -> EngineResult<u32>
    where
        F: FnMut(u32) -> EngineResult<PollStatus>,
    {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            self.cancel.check()?;

            attempt = next_attempt(attempt);
            if check(attempt)? == PollStatus::Done {
                debug!(what, attempt, "poll finished");
                return Ok(attempt);
            }

            if let Some(timeout) = self.config.timeout {
                let elapsed = start.elapsed();
                if elapsed.saturating_add(self.config.interval) > timeout {
                    return Err(EngineError::Timeout {
                        what: what.to_string(),
                        elapsed,
                    });
                }
            }

            if !self.config.interval.is_zero() {
                std::thread::sleep(self.config.interval);
            }
        }
    }

    /// Waits for a server task to finish.
    ///
    /// `OK` completes the wait; any explicit failure status raises
    /// [`EngineError::TaskFailed`]. The server's progress message is logged
    /// on every check.
    pub fn await_task<C: HttpClient>(
        &self,
        client: &ResourceClient<C>,
        handle: &TaskHandle,
    ) -> EngineResult<u32> {
        self.poll_until(&handle.status_uri, |attempt| {
            let state = client.task_status(handle)?;
            let status = state.status();
            if let Some(msg) = state.message() {
                info!(uri = %handle.status_uri, %status, attempt, "{msg}");
            }
            match status {
                TaskStatus::Ok => Ok(PollStatus::Done),
                TaskStatus::InProgress(_) => Ok(PollStatus::Pending),
                TaskStatus::Failed(status) => Err(EngineError::TaskFailed {
                    status,
                    message: state.message().map(str::to_string),
                }),
            }
        })
    }
}

/// Attempt numbers stick at `u32::MAX` on an unbounded poll.
fn next_attempt(attempt: u32) -> u32 {
    attempt.saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::{Credentials, Session};
    use crate::transport::MockHttpClient;
    use std::time::Duration;

    fn immediate() -> TaskPoller {
        TaskPoller::new(PollConfig::new(Duration::ZERO))
    }

    fn client_with_statuses(statuses: &[&str]) -> ResourceClient<MockHttpClient> {
        let session = Session::new(
            ClientConfig::new("https://acme.example.com"),
            MockHttpClient::new(),
        );
        session
            .client()
            .push_response(200, r#"{"userToken": {"token": "tt"}}"#);
        session.authenticate(&Credentials::secret("sst")).unwrap();
        for status in statuses {
            session.client().push_response(
                200,
                format!(r#"{{"taskState": {{"status": "{status}", "msg": "step"}}}}"#),
            );
        }
        ResourceClient::new(session)
    }

    #[test]
    fn pending_pending_ok_takes_three_checks() {
        let client = client_with_statuses(&["PENDING", "PENDING", "OK"]);
        let handle = TaskHandle::import("/gdc/md/p1/tasks/1/status");

        let checks = immediate().await_task(&client, &handle).unwrap();
        assert_eq!(checks, 3);
        // token exchange + three status checks
        assert_eq!(client.session().client().request_count(), 4);
    }

    #[test]
    fn failure_status_halts_polling() {
        let client = client_with_statuses(&["RUNNING", "ERROR", "OK"]);
        let handle = TaskHandle::import("/gdc/md/p1/tasks/1/status");

        let result = immediate().await_task(&client, &handle);
        match result {
            Err(EngineError::TaskFailed { status, message }) => {
                assert_eq!(status, "ERROR");
                assert_eq!(message.as_deref(), Some("step"));
            }
            other => panic!("expected task failure, got {other:?}"),
        }
        assert_eq!(client.session().client().request_count(), 3);
    }

    #[test]
    fn check_error_propagates() {
        let poller = immediate();
        let result = poller.poll_until("thing", |attempt| {
            if attempt < 2 {
                Ok(PollStatus::Pending)
            } else {
                Err(EngineError::Api {
                    status: 500,
                    body: String::new(),
                })
            }
        });
        assert!(matches!(result, Err(EngineError::Api { status: 500, .. })));
    }

    #[test]
    fn cancelled_before_first_check() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let poller = immediate().with_cancel_token(cancel.clone());

        let mut calls = 0;
        let result = poller.poll_until("thing", |_| {
            calls += 1;
            Ok(PollStatus::Done)
        });
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(calls, 0);

        cancel.reset();
        assert_eq!(poller.poll_until("thing", |_| Ok(PollStatus::Done)).unwrap(), 1);
    }

    #[test]
    fn cancel_from_inside_stops_next_check() {
        let cancel = CancelToken::new();
        let poller = immediate().with_cancel_token(cancel.clone());

        let result = poller.poll_until("thing", |attempt| {
            if attempt == 2 {
                cancel.cancel();
            }
            Ok(PollStatus::Pending)
        });
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn timeout_bounds_the_wait() {
        let poller = TaskPoller::new(
            PollConfig::new(Duration::from_millis(5)).with_timeout(Duration::from_millis(20)),
        );
        let mut calls = 0;
        let result = poller.poll_until("slow task", |_| {
            calls += 1;
            Ok(PollStatus::Pending)
        });
        match result {
            Err(EngineError::Timeout { what, .. }) => assert_eq!(what, "slow task"),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(calls >= 1);
        assert!(calls <= 5);
    }

    #[test]
    fn huge_interval_with_timeout_times_out_without_sleeping() {
        let poller =
            TaskPoller::new(PollConfig::new(Duration::MAX).with_timeout(Duration::from_secs(1)));
        let started = Instant::now();
        let result = poller.poll_until("x", |_| Ok(PollStatus::Pending));
        match result {
            Err(EngineError::Timeout { what, .. }) => assert_eq!(what, "x"),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn attempt_counter_saturates() {
        assert_eq!(next_attempt(0), 1);
        assert_eq!(next_attempt(u32::MAX - 1), u32::MAX);
        assert_eq!(next_attempt(u32::MAX), u32::MAX);
    }
}
