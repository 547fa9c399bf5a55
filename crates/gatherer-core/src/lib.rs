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

//! # Gatherer Core
//!
//! Foundational crate containing the thread-agnostic concurrency primitives
//! the rest of the engine is built on: the single-assignment [`sync::Future`]
//! and [`sync::Promise`] pair, and the typed [`event::Dispatcher`] with its
//! immediate and deferred delivery paths.
//!
//! Nothing in this crate spawns threads. Scheduling lives in `gatherer-control`.

#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod sync;
pub mod utils;

pub use error::CapacityExceeded;
