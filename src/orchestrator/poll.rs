// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Cancellable Polling
 * Every wait in a run goes through here so cancellation and deadlines are
 * observed between engine calls
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::{CancelReason, ScanError, ScanResult};
use crate::types::Progress;

/// Raises cancellation for every `CancelSignal` cloned from the same pair
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes cancellation raised through the matching `CancelHandle`
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a linked cancellation handle and signal
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is raised. Pending forever if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Interval waits and engine calls bounded by a cancel signal and an optional deadline
pub struct Poller {
    cancel: CancelSignal,
    deadline: Option<Instant>,
}

impl Poller {
    pub fn new(cancel: CancelSignal, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// Deadline measured from now
    pub fn with_timeout(cancel: CancelSignal, timeout: Option<Duration>) -> Self {
        Self::new(cancel, timeout.map(|t| Instant::now() + t))
    }

    /// Fail fast if the run should already have stopped
    pub fn check(&self) -> ScanResult<()> {
        if self.cancel.is_cancelled() {
            return Err(cancelled(CancelReason::Signal));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(cancelled(CancelReason::DeadlineExceeded));
            }
        }
        Ok(())
    }

    /// Sleep for `duration`, waking early on cancellation or deadline
    pub async fn wait(&self, duration: Duration) -> ScanResult<()> {
        self.check()?;

        let wake = Instant::now() + duration;
        let (wake, hits_deadline) = match self.deadline {
            Some(deadline) if deadline <= wake => (deadline, true),
            _ => (wake, false),
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(CancelReason::Signal)),
            _ = tokio::time::sleep_until(wake) => {
                if hits_deadline {
                    Err(cancelled(CancelReason::DeadlineExceeded))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Run one engine call, abandoning it on cancellation or deadline
    pub async fn run<T, Fut>(&self, call: Fut) -> ScanResult<T>
    where
        Fut: Future<Output = ScanResult<T>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(CancelReason::Signal)),
            _ = deadline => Err(cancelled(CancelReason::DeadlineExceeded)),
            result = call => result,
        }
    }

    /// Wait `interval`, query `status`, repeat until progress reaches 100.
    ///
    /// Any status error ends the poll. `on_progress` sees every observed value.
    pub async fn until_complete<F, Fut, P>(
        &self,
        interval: Duration,
        mut status: F,
        mut on_progress: P,
    ) -> ScanResult<Progress>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ScanResult<Progress>>,
        P: FnMut(Progress),
    {
        let mut polls: u64 = 0;
        loop {
            self.wait(interval).await?;
            let progress = self.run(status()).await?;
            polls += 1;
            on_progress(progress);

            if progress.is_complete() {
                debug!(polls = polls, "Poll complete");
                return Ok(progress);
            }
        }
    }
}

fn cancelled(reason: CancelReason) -> ScanError {
    ScanError::Cancelled { reason }
}
