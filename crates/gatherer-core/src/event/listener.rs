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

//! Bounded per-kind listener storage.

use super::kind::{EventKind, EventSet};
use crate::error::CapacityExceeded;
use std::fmt;

type Listener<S> = Box<dyn Fn(&S) + Send + Sync>;

/// A bounded array of listeners for every kind of the event set `S`.
///
/// Listeners are typed closures. Whatever state a listener needs is captured
/// by the closure. There is no removal: tables are filled during setup and
/// only read afterwards.
pub struct ListenerTable<S: EventSet> {
    slots: Vec<Vec<Listener<S>>>,
    limit: usize,
}

impl<S: EventSet> ListenerTable<S> {
    /// Creates an empty table accepting at most `limit` listeners per kind.
    pub fn new(limit: usize) -> Self {
        Self {
            slots: (0..S::KIND_COUNT)
                .map(|_| Vec::with_capacity(limit))
                .collect(),
            limit,
        }
    }

    /// Appends a listener for kind `K`.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded::Listeners`] once `K` already has `limit`
    /// listeners. The table is left unchanged.
    pub fn push<K, F>(&mut self, listener: F) -> Result<(), CapacityExceeded>
    where
        K: EventKind<S>,
        F: Fn(&K) + Send + Sync + 'static,
    {
        let limit = self.limit;
        let slot = &mut self.slots[K::INDEX];
        if slot.len() >= limit {
            return Err(CapacityExceeded::Listeners {
                kind: K::NAME,
                limit,
            });
        }

        slot.push(Box::new(move |event: &S| {
            if let Some(payload) = K::from_event(event) {
                listener(payload);
            }
        }));
        Ok(())
    }

    /// Invokes every listener registered for the event's kind, in
    /// registration order, on the calling thread.
    pub fn notify(&self, event: &S) {
        for listener in &self.slots[event.kind_index()] {
            listener(event);
        }
    }

    /// Number of listeners registered for kind `K`.
    pub fn len_of<K: EventKind<S>>(&self) -> usize {
        self.slots[K::INDEX].len()
    }

    /// The per-kind listener limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<S: EventSet> fmt::Debug for ListenerTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<usize> = self.slots.iter().map(Vec::len).collect();
        f.debug_struct("ListenerTable")
            .field("counts", &counts)
            .field("limit", &self.limit)
            .finish()
    }
}
