// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cancellation and deadlines for token requests.
//!
//! A [Context] travels with each token request. Token providers may use it to
//! abandon work early, and the
//! [CachedTokenProvider][crate::token_cache::CachedTokenProvider] uses it to
//! stop waiting on a blocking refresh once the caller gives up.
//!
//! ```
//! # use google_cloud_auth_cache::context::Context;
//! # use std::time::Duration;
//! # tokio_test::block_on(async {
//! let parent = Context::background();
//! let ctx = parent.with_timeout(Duration::from_secs(30));
//! assert!(ctx.deadline().is_some());
//! assert!(!ctx.is_done());
//!
//! ctx.cancel();
//! assert!(ctx.is_done());
//! // Cancelling a child never cancels the parent.
//! assert!(!parent.is_done());
//! # });
//! ```

use crate::errors::CredentialsError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The reason a [Context] is done.
///
/// Available as the [source][std::error::Error::source] of the
/// [CredentialsError] returned by [Context::err] and [Context::done].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The context, or one of its parents, was cancelled.
    #[error("context cancelled")]
    Cancelled,
    /// The deadline of the context, or one of its parents, has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl From<ContextError> for CredentialsError {
    fn from(value: ContextError) -> Self {
        // A later request with a longer deadline may succeed. A cancelled
        // request was abandoned on purpose.
        let retryable = matches!(value, ContextError::DeadlineExceeded);
        CredentialsError::new(retryable, value)
    }
}

/// A cancellable, optionally deadline-bound, request context.
///
/// Contexts form a tree: a child is done when its parent is done, when it is
/// cancelled, or when the earliest deadline along its chain passes.
/// [Context::background] is the root, it is never done.
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Returns a context that is never cancelled and has no deadline.
    ///
    /// Background token refreshes use this context, so they are not abandoned
    /// when the request that triggered them finishes.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a child context that inherits the parent's deadline.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Returns a child context that is done at `deadline`, or earlier if the
    /// parent has an earlier deadline.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Returns a child context that is done after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancels this context and all its children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The instant at which this context is done, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason the context is done, or `None` if it is not.
    pub fn err(&self) -> Option<CredentialsError> {
        if self.cancel.is_cancelled() {
            return Some(ContextError::Cancelled.into());
        }
        match self.deadline {
            Some(d) if d <= Instant::now() => Some(ContextError::DeadlineExceeded.into()),
            _ => None,
        }
    }

    /// Returns `true` if the context is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Waits until the context is done and returns the reason.
    ///
    /// Never completes for [Context::background].
    pub async fn done(&self) -> CredentialsError {
        let reason = match self.deadline {
            None => {
                self.cancel.cancelled().await;
                ContextError::Cancelled
            }
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => ContextError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
        };
        reason.into()
    }
}
