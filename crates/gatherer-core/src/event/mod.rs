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

//! Provides the typed event dispatcher and its building blocks.
//!
//! Event kinds are declared statically with [`event_set!`](crate::event_set):
//! each kind is a plain `Copy` payload struct, and the set is a tagged enum
//! whose size is fixed by its largest member. The [`Dispatcher`] combines:
//!
//! - **Immediate dispatch**: synchronous fan-out on the caller's thread.
//! - **Deferred dispatch**: events are copied into a bounded lock-free
//!   [`RingBuffer`] by any number of producers, and drained in FIFO order
//!   by a single consumer calling [`Dispatcher::update`] once per tick.
//!
//! By keeping these primitives generic, `gatherer-core` lets higher-level
//! crates define their own event sets.

mod dispatcher;
mod kind;
mod listener;
pub mod ring;

pub use self::dispatcher::{
    Dispatcher, DispatcherConfig, DEFAULT_MAX_LISTENERS, DEFAULT_QUEUE_CAPACITY,
};
#[doc(hidden)]
pub use self::kind::max_size;
pub use self::kind::{EventKind, EventSet, MAX_EVENT_PAYLOAD_BYTES};
pub use self::listener::ListenerTable;
pub use self::ring::{Consumer, RingBuffer};
