// Copyright 2024 Google LLC
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

//! Types and functions to work with auth [Tokens].
//!
//! [Tokens]: https://cloud.google.com/docs/authentication#token

use crate::Result;
use crate::context::Context;
use crate::errors::CredentialsError;
use http::HeaderValue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long before its expiration a token is no longer considered valid.
///
/// Tokens within this window of their expiration are refreshed before use.
pub const DEFAULT_EARLY_TOKEN_REFRESH: Duration = Duration::from_secs(225);

/// Represents an auth token.
///
/// Tokens are shared between concurrent callers. Treat them as read-only: a
/// refresh always produces a new `Token`, it never changes an existing one.
#[derive(Clone, Default, PartialEq)]
pub struct Token {
    /// The actual token string.
    ///
    /// This is the value used in `Authorization:` header. A token with an
    /// empty value is treated as absent.
    pub token: String,

    /// The type of the token.
    ///
    /// The most common type is `"Bearer"` but other types may appear in the
    /// future.
    pub token_type: String,

    /// The instant at which the token expires.
    ///
    /// If `None`, the token does not expire.
    ///
    /// Note that the `Instant` is not valid across processes. It is
    /// recommended to let the cache refresh tokens within a process instead
    /// of handling expirations yourself.
    pub expires_at: Option<Instant>,

    /// Optional metadata associated with the token.
    ///
    /// Token providers may use this to surface raw fields from the server
    /// response, such as granted scopes or other claims.
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Token {
    /// Returns `true` if the token has no value.
    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// Returns `true` if the token is usable at `now`.
    ///
    /// A valid token is non-empty and either never expires, or expires more
    /// than [DEFAULT_EARLY_TOKEN_REFRESH] after `now`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.is_valid_with_early_expiry(now, DEFAULT_EARLY_TOKEN_REFRESH)
    }

    /// Returns `true` if the token is usable now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    pub(crate) fn is_valid_with_early_expiry(&self, now: Instant, early: Duration) -> bool {
        if self.is_empty() {
            return false;
        }
        match self.expires_at {
            None => true,
            Some(e) => e.checked_duration_since(now).is_some_and(|left| left > early),
        }
    }

    /// Formats the token as an `Authorization` header value.
    ///
    /// The header value is marked as [sensitive][HeaderValue::set_sensitive].
    ///
    /// # Example
    /// ```
    /// # use google_cloud_auth_cache::token::Token;
    /// let token = Token {
    ///     token: "abc123".into(),
    ///     token_type: "Bearer".into(),
    ///     ..Default::default()
    /// };
    /// let value = token.header_value()?;
    /// assert_eq!(value, "Bearer abc123");
    /// assert!(value.is_sensitive());
    /// # Ok::<(), google_cloud_auth_cache::errors::CredentialsError>(())
    /// ```
    pub fn header_value(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("{} {}", self.token_type, self.token))
            .map_err(|e| CredentialsError::new(false, e))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// A source of fresh [Token]s.
///
/// Implementations typically perform network I/O, such as an OAuth2 exchange
/// or a request to the metadata server. Each call should return a newly
/// minted token; caching is the job of
/// [CachedTokenProvider][crate::token_cache::CachedTokenProvider], which
/// implements this same trait.
///
/// Implementations should stop early and return the [Context] error once
/// `ctx` is done.
#[async_trait::async_trait]
pub trait TokenProvider: std::fmt::Debug + Send + Sync {
    /// Fetches a token.
    async fn token(&self, ctx: &Context) -> Result<Token>;
}

#[async_trait::async_trait]
impl<T> TokenProvider for Arc<T>
where
    T: TokenProvider + ?Sized,
{
    async fn token(&self, ctx: &Context) -> Result<Token> {
        (**self).token(ctx).await
    }
}

#[async_trait::async_trait]
impl<T> TokenProvider for Box<T>
where
    T: TokenProvider + ?Sized,
{
    async fn token(&self, ctx: &Context) -> Result<Token> {
        (**self).token(ctx).await
    }
}

/// A [TokenProvider] that always returns the same token.
///
/// Useful for tokens obtained out of band, such as a token passed in through
/// the command line.
#[derive(Clone, Debug)]
pub struct StaticTokenProvider {
    token: Token,
}

impl StaticTokenProvider {
    /// Creates a provider returning `token` on every call.
    pub fn new(token: Token) -> Self {
        Self { token }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _ctx: &Context) -> Result<Token> {
        Ok(self.token.clone())
    }
}

/// A [TokenProvider] backed by an async function. See [from_fn].
#[derive(Clone)]
pub struct TokenProviderFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for TokenProviderFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProviderFn").finish_non_exhaustive()
    }
}

/// Creates a [TokenProvider] from an async function.
///
/// The function receives a clone of the request [Context].
///
/// # Example
/// ```
/// # use google_cloud_auth_cache::context::Context;
/// # use google_cloud_auth_cache::token::{Token, TokenProvider, from_fn};
/// # tokio_test::block_on(async {
/// let provider = from_fn(|_ctx: Context| async {
///     Ok(Token {
///         token: "abc123".into(),
///         token_type: "Bearer".into(),
///         ..Default::default()
///     })
/// });
/// let token = provider.token(&Context::background()).await?;
/// assert_eq!(token.token, "abc123");
/// # Ok::<(), google_cloud_auth_cache::errors::CredentialsError>(())
/// # });
/// ```
pub fn from_fn<F, Fut>(f: F) -> TokenProviderFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Token>> + Send + 'static,
{
    TokenProviderFn { f }
}

#[async_trait::async_trait]
impl<F, Fut> TokenProvider for TokenProviderFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Token>> + Send + 'static,
{
    async fn token(&self, ctx: &Context) -> Result<Token> {
        (self.f)(ctx.clone()).await
    }
}
