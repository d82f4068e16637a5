//! Deadline-carrying run context.
//!
//! A [`RunContext`] is created once per run and copied into every device
//! task. It never cancels work on its own: operations that want to honour
//! the deadline wrap their futures with [`RunContext::run`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Returned when a bounded operation outlives its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("context deadline exceeded")]
pub struct DeadlineExceeded;

/// Copyable handle on an optional deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context with no deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// Derive a context that expires after `timeout`, or earlier if this
    /// context already expires sooner.
    ///
    /// A timeout too large to represent as an instant adds no bound.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let Some(candidate) = Instant::now().checked_add(timeout) else {
            return *self;
        };
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail fast with [`DeadlineExceeded`] if the context has expired.
    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        if self.is_expired() {
            Err(DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Drive `fut` to completion unless the deadline fires first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DeadlineExceeded>
    where
        F: Future<Output = T>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::background()
    }
}
