// Copyright 2018 The Exonum Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Named loggers passed explicitly into components.
//!
//! A [`Logger`] is a thin handle over the `log` facade carrying a dotted target name.
//! Components receive a logger at construction and derive child loggers with
//! [`Logger::named()`], so that log output can be filtered per component and per
//! public parameters instance (e.g., `RUST_LOG=private_token.auditor=debug`).

use std::{fmt, sync::Arc};

const SEPARATOR: &str = ".";

/// Root logger name of the crate.
pub const ROOT: &str = "private_token";

#[derive(Clone, PartialEq, Eq)]
pub struct Logger {
    target: Arc<str>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_tuple("Logger").field(&&*self.target).finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(ROOT)
    }
}

impl Logger {
    pub fn new(name: &str) -> Self {
        Logger {
            target: Arc::from(name),
        }
    }

    /// Derives a child logger.
    pub fn named(&self, name: &str) -> Self {
        Logger::new(&join(&[self.target(), name]))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn debug(&self, args: fmt::Arguments) {
        log::debug!(target: self.target(), "{}", args);
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}
