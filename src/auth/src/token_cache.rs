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

//! A caching [TokenProvider] with proactive refreshes.
//!
//! [CachedTokenProvider] wraps another [TokenProvider] and keeps the most
//! recent token. On each request the cache classifies that token:
//!
//! * [TokenState::Fresh]: the token is returned as-is.
//! * [TokenState::Stale]: the token is close to its expiration. It is
//!   returned immediately, and a single background refresh is started.
//! * [TokenState::Invalid]: there is no usable token. The caller waits while
//!   the cache fetches a new one.
//!
//! Example usage:
//!
//! ```
//! # use google_cloud_auth_cache::context::Context;
//! # use google_cloud_auth_cache::token::{Token, TokenProvider, from_fn};
//! # use google_cloud_auth_cache::token_cache::Builder;
//! # use std::time::Duration;
//! # tokio_test::block_on(async {
//! let provider = from_fn(|_ctx: Context| async {
//!     Ok(Token {
//!         token: "abc123".into(),
//!         token_type: "Bearer".into(),
//!         expires_at: Some(tokio::time::Instant::now() + Duration::from_secs(3600)),
//!         metadata: None,
//!     })
//! });
//! let cache = Builder::new(provider)
//!     .with_early_token_refresh(Duration::from_secs(300))
//!     .build();
//! let token = cache.token(&Context::background()).await?;
//! assert_eq!(token.token, "abc123");
//! # Ok::<(), google_cloud_auth_cache::errors::CredentialsError>(())
//! # });
//! ```

use crate::Result;
use crate::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::errors::CredentialsError;
use crate::token::{DEFAULT_EARLY_TOKEN_REFRESH, Token, TokenProvider};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// The classification of a cached token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
    /// The token is usable and outside the early refresh window.
    Fresh,
    /// The token is usable, but expires within the early refresh window.
    Stale,
    /// There is no token, the token is empty, or it has expired.
    Invalid,
}

/// A [TokenProvider] that caches the tokens of another provider.
///
/// Cloning a `CachedTokenProvider` is cheap, and the clones share the same
/// cached token.
///
/// The cache guarantees at most one background refresh in flight. If a
/// background refresh fails, the error is logged and no further background
/// refreshes are attempted until the token expires. At that point callers
/// fetch a token synchronously and observe any error.
#[derive(Clone, Debug)]
pub struct CachedTokenProvider {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    provider: Arc<dyn TokenProvider>,
    clock: Arc<dyn Clock>,
    disable_auto_refresh: bool,
    early_token_refresh: Duration,
    disable_async_refresh: bool,
    // The token and its bookkeeping change together, they share one lock.
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    token: Option<Token>,
    // Incremented on every store. A background refresh only applies its
    // result to the token it was started for.
    generation: u64,
    refresh_running: bool,
    refresh_failed: bool,
}

impl CacheState {
    fn store(&mut self, token: Token) {
        self.token = Some(token);
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Configures and creates a [CachedTokenProvider].
///
/// If the wrapped provider is already a [CachedTokenProvider] (or an
/// `Arc<CachedTokenProvider>`), [Builder::build] returns that cache and the
/// options in this builder are ignored.
#[derive(Debug)]
pub struct Builder {
    provider: Wrapped,
    disable_auto_refresh: bool,
    early_token_refresh: Option<Duration>,
    disable_async_refresh: bool,
    clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug)]
enum Wrapped {
    Cached(CachedTokenProvider),
    Provider(Arc<dyn TokenProvider>),
}

impl Builder {
    /// Creates a builder wrapping `provider`.
    pub fn new<T>(provider: T) -> Self
    where
        T: TokenProvider + 'static,
    {
        let provider = match existing_cache(&provider) {
            Some(cache) => Wrapped::Cached(cache),
            None => Wrapped::Provider(Arc::new(provider)),
        };
        Self {
            provider,
            disable_auto_refresh: false,
            early_token_refresh: None,
            disable_async_refresh: false,
            clock: None,
        }
    }

    /// Never refresh a token once one has been fetched.
    ///
    /// With this option the cache returns the first non-empty token forever,
    /// even after it expires.
    pub fn with_disable_auto_refresh(mut self, v: bool) -> Self {
        self.disable_auto_refresh = v;
        self
    }

    /// Sets how long before its expiration a token becomes stale.
    ///
    /// Stale tokens are still returned, but trigger a background refresh. A
    /// zero duration selects the default of [DEFAULT_EARLY_TOKEN_REFRESH].
    pub fn with_early_token_refresh(mut self, v: Duration) -> Self {
        self.early_token_refresh = Some(v);
        self
    }

    /// Always refresh tokens synchronously.
    ///
    /// With this option callers wait for a new token whenever the cached token
    /// is within [DEFAULT_EARLY_TOKEN_REFRESH] of its expiration, instead of
    /// receiving the stale token while it is refreshed in the background.
    pub fn with_disable_async_refresh(mut self, v: bool) -> Self {
        self.disable_async_refresh = v;
        self
    }

    /// Sets the clock used to classify tokens. Defaults to [SystemClock].
    pub fn with_clock<C>(mut self, v: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Some(Arc::new(v));
        self
    }

    /// Creates the [CachedTokenProvider].
    pub fn build(self) -> CachedTokenProvider {
        let provider = match self.provider {
            Wrapped::Cached(cache) => {
                tracing::debug!("token provider is already cached, reusing the existing cache");
                return cache;
            }
            Wrapped::Provider(p) => p,
        };
        let early_token_refresh = self
            .early_token_refresh
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_EARLY_TOKEN_REFRESH);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        CachedTokenProvider {
            inner: Arc::new(Inner {
                provider,
                clock,
                disable_auto_refresh: self.disable_auto_refresh,
                early_token_refresh,
                disable_async_refresh: self.disable_async_refresh,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }
}

fn existing_cache<T>(provider: &T) -> Option<CachedTokenProvider>
where
    T: TokenProvider + 'static,
{
    let any = provider as &dyn Any;
    if let Some(cache) = any.downcast_ref::<CachedTokenProvider>() {
        return Some(cache.clone());
    }
    any.downcast_ref::<Arc<CachedTokenProvider>>()
        .map(|cache| CachedTokenProvider::clone(cache))
}

impl CachedTokenProvider {
    /// Wraps `provider` using the default options.
    ///
    /// Equivalent to `Builder::new(provider).build()`.
    pub fn new<T>(provider: T) -> Self
    where
        T: TokenProvider + 'static,
    {
        Builder::new(provider).build()
    }

    /// Returns `true` if `self` and `other` share the same cached token.
    pub fn same_cache(&self, other: &CachedTokenProvider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the current classification of the cached token.
    ///
    /// Waits if a synchronous refresh is in progress.
    pub async fn state(&self) -> TokenState {
        let state = self.inner.state.lock().await;
        self.inner.classify(state.token.as_ref())
    }
}

impl Inner {
    fn classify(&self, token: Option<&Token>) -> TokenState {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return TokenState::Invalid;
        };
        let Some(expires_at) = token.expires_at else {
            return TokenState::Fresh;
        };
        match expires_at.checked_duration_since(self.clock.now()) {
            None => TokenState::Invalid,
            Some(left) if left.is_zero() => TokenState::Invalid,
            Some(left) if left <= self.early_token_refresh => TokenState::Stale,
            Some(_) => TokenState::Fresh,
        }
    }

    // The lock may be held across a synchronous refresh, give up waiting for it
    // if the caller does.
    async fn lock(&self, ctx: &Context) -> Result<MutexGuard<'_, CacheState>> {
        tokio::select! {
            biased;
            guard = self.state.lock() => Ok(guard),
            err = ctx.done() => Err(err),
        }
    }

    async fn token_non_blocking(self: &Arc<Self>, ctx: &Context) -> Result<Token> {
        let mut state = self.lock(ctx).await?;
        if self.disable_auto_refresh {
            if let Some(token) = state.token.as_ref().filter(|t| !t.is_empty()) {
                return Ok(token.clone());
            }
        }
        let kind = self.classify(state.token.as_ref());
        match (kind, state.token.clone()) {
            (TokenState::Fresh, Some(token)) => return Ok(token),
            (TokenState::Stale, Some(token)) => {
                self.start_refresh(&mut state);
                return Ok(token);
            }
            _ => {}
        }
        drop(state);
        self.token_blocking(ctx).await
    }

    async fn token_blocking(&self, ctx: &Context) -> Result<Token> {
        // Holding the lock for the whole check-fetch-store sequence serializes
        // concurrent blocking refreshes.
        let mut state = self.lock(ctx).await?;
        state.refresh_failed = false;
        if let Some(token) = state.token.as_ref() {
            let usable = token.is_valid_at(self.clock.now())
                || (self.disable_auto_refresh && !token.is_empty());
            if usable {
                return Ok(token.clone());
            }
        }

        tracing::debug!("fetching token synchronously");
        let token = tokio::select! {
            biased;
            result = self.provider.token(ctx) => result?,
            err = ctx.done() => return Err(err),
        };
        state.store(token.clone());
        Ok(token)
    }

    fn start_refresh(self: &Arc<Self>, state: &mut CacheState) {
        if state.refresh_running || state.refresh_failed {
            return;
        }
        // The stale token is served either way, only the refresh is skipped.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                "token is stale but there is no tokio runtime, skipping background refresh"
            );
            return;
        };
        state.refresh_running = true;
        tracing::debug!("token is stale, starting background refresh");
        let inner = self.clone();
        let generation = state.generation;
        // Fire-and-forget. The refresh uses a detached context: its result
        // benefits every caller, not just the one that noticed the stale token.
        runtime.spawn(async move { inner.refresh(generation).await });
    }

    async fn refresh(&self, generation: u64) {
        let provider = self.provider.clone();
        // A panic in the provider ends the fetch task only, and is reported
        // as a failed refresh.
        let fetch = tokio::spawn(async move { provider.token(&Context::background()).await });
        let result = fetch.await.unwrap_or_else(|e| Err(CredentialsError::new(false, e)));

        let mut state = self.state.lock().await;
        state.refresh_running = false;
        let current = state.generation == generation;
        match result {
            Ok(token) if current => {
                tracing::debug!("background token refresh succeeded");
                state.store(token);
            }
            Ok(_) => {
                tracing::debug!(
                    "a newer token was stored during the background refresh, discarding its result"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "background token refresh failed");
                // A failure for an older token says nothing about the new one.
                if current {
                    state.refresh_failed = true;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn token(&self, ctx: &Context) -> Result<Token> {
        if self.inner.disable_async_refresh {
            return self.inner.token_blocking(ctx).await;
        }
        self.inner.token_non_blocking(ctx).await
    }
}
