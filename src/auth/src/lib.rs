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

//! Google Cloud Client Libraries for Rust - Cached Token Provider
//!
//! This crate contains a cache for short-lived access [Tokens]. Fetching a
//! token usually requires a network round trip, such as an OAuth2 exchange or
//! a request to the metadata server. The
//! [CachedTokenProvider][token_cache::CachedTokenProvider] keeps the most
//! recent token, refreshes it in the background before it expires, and only
//! makes callers wait when there is no usable token at all.
//!
//! The cache wraps any [TokenProvider][token::TokenProvider] and is itself a
//! `TokenProvider`, so it can be used wherever an uncached provider is
//! expected.
//!
//! [Tokens]: https://cloud.google.com/docs/authentication#token

pub mod clock;
pub mod context;
pub mod errors;
pub mod token;

/// The token cache.
pub mod token_cache;

/// A `Result` alias where the `Err` case is
/// `google_cloud_auth_cache::errors::CredentialsError`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;
