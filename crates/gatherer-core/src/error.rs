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

//! Error types shared by the bounded structures of the core.

use thiserror::Error;

/// A bounded structure refused a new entry because it is full.
///
/// This is always reported synchronously to the caller and never retried
/// internally. The caller decides whether to retry, drop, or escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityExceeded {
    /// The listener table for an event kind has no free slot left.
    #[error("listener table for '{kind}' is full ({limit} listeners max)")]
    Listeners {
        /// Name of the event kind whose table is full.
        kind: &'static str,
        /// The per-kind listener limit.
        limit: usize,
    },
    /// The deferred event queue has no free slot left.
    #[error("event queue is full ({capacity} events max)")]
    Queue {
        /// The capacity of the queue.
        capacity: usize,
    },
}
