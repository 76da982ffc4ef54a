//! Failure isolation for a single unit of work.
//!
//! A unit (one constraint toggle, partition action, table sync or view
//! refresh) yields a [`UnitOutcome`] instead of a `Result`, so its failure
//! cannot be propagated past the unit boundary with `?`. Panics inside a unit
//! are contained the same way.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::warn;

use crate::error::{RefreshError, Result};

/// Result of one isolated unit.
#[derive(Debug)]
pub enum UnitOutcome<T> {
    /// The unit completed.
    Done(T),
    /// The unit failed; the run continues.
    Failed(RefreshError),
}

impl<T> UnitOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, UnitOutcome::Done(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&RefreshError> {
        match self {
            UnitOutcome::Done(_) => None,
            UnitOutcome::Failed(e) => Some(e),
        }
    }
}

impl<T> From<Result<T>> for UnitOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(v) => UnitOutcome::Done(v),
            Err(e) => UnitOutcome::Failed(e),
        }
    }
}

/// Run `fut` as an isolated unit.
///
/// Past `limit` the unit counts as failed, but `fut` is still driven to
/// completion before this returns: the blocking ODBC call underneath cannot
/// be abandoned, and nothing may run against the target after the phase
/// that owns the unit has ended.
pub async fn isolate<T, F>(limit: Option<Duration>, fut: F) -> UnitOutcome<T>
where
    F: Future<Output = Result<T>>,
{
    let fut = AssertUnwindSafe(fut).catch_unwind();
    tokio::pin!(fut);

    let settled = match limit {
        None => fut.await,
        Some(limit) => {
            tokio::select! {
                settled = &mut fut => settled,
                _ = tokio::time::sleep(limit) => {
                    let secs = limit.as_secs();
                    warn!("Unit exceeded {}s, waiting for in-flight work to settle", secs);
                    return match fut.await {
                        Ok(Ok(_)) => UnitOutcome::Failed(RefreshError::Overran(secs)),
                        _ => UnitOutcome::Failed(RefreshError::Timeout(secs)),
                    };
                }
            }
        }
    };

    match settled {
        Ok(result) => result.into(),
        Err(panic) => UnitOutcome::Failed(RefreshError::unit(
            "unit",
            panic_message(panic.as_ref()),
        )),
    }
}

/// Text of a panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
