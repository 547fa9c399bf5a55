// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logger bootstrap for binaries and tests.

use env_logger::{Builder, Env};

/// Installs `env_logger` as the global logger, filtered by `RUST_LOG` and
/// defaulting to `info`.
///
/// Returns `false` if a logger was already installed; the call is then a
/// no-op, so tests can call it freely.
pub fn init() -> bool {
    init_with_default("info")
}

/// Like [`init`], with an explicit default filter used when `RUST_LOG` is unset.
pub fn init_with_default(default_filter: &str) -> bool {
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .try_init()
        .is_ok()
}
