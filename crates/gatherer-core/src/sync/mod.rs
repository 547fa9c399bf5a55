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

//! Lock-free synchronization primitives.
//!
//! The main component is the single-assignment [`Future`]/[`Promise`] pair:
//! one producer publishes a value exactly once, any number of readers observe
//! it. Readers never take a lock; they wait with a spin-then-yield backoff.

mod future;

pub use self::future::{promise, Future, Promise};
