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

//! Time sources used to classify cached tokens.

// Using tokio's wrapper makes the cache testable without relying on clock times.
use tokio::time::Instant;

/// A source of the current time.
///
/// The [CachedTokenProvider][crate::token_cache::CachedTokenProvider] compares
/// token expirations against this clock. Applications rarely need anything
/// other than [SystemClock]. Tests may supply a clock they control.
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The default [Clock].
///
/// Reads [tokio::time::Instant::now], which follows the tokio runtime's paused
/// time in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
