// Request context
//
// Caller-supplied cancellation and deadline for a single session call.
// Every network operation races the in-flight request against both, so no
// call outlives the context that started it.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, Error};

/// Cancellation token plus optional deadline, passed to every session call.
///
/// Cloning shares the token: canceling any clone cancels them all.
/// Use [`child`](Self::child) to derive a context that can be canceled
/// independently of its parent.
///
/// ```no_run
/// # use std::time::Duration;
/// # use unifly_guest::RequestContext;
/// let ctx = RequestContext::with_timeout(Duration::from_secs(5));
/// let handle = ctx.clone();
/// // elsewhere: handle.cancel();
/// # drop(handle);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no deadline that is only stopped by [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::new().deadline_at(deadline)
    }

    /// Wrap an existing token, e.g. one owned by an application shutdown path.
    pub fn from_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Set (or tighten) the deadline. A later deadline than the current one
    /// is ignored.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Derive a context that is canceled with this one but can also be
    /// canceled on its own. The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every clone and child of it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the context is already canceled or past its deadline.
    pub fn check(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled(CancelReason::Canceled));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::Cancelled(CancelReason::DeadlineExceeded));
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context stops it first.
    ///
    /// The future is dropped (aborting the request) as soon as the token is
    /// canceled or the deadline passes.
    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        self.check()?;

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled(CancelReason::Canceled)),
            () = expired => Err(Error::Cancelled(CancelReason::DeadlineExceeded)),
            result = fut => result,
        }
    }
}
