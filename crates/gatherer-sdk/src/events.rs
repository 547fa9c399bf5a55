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

//! Built-in gameplay events.

use gatherer_core::event_set;

/// A key went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPressedEvent {
    /// Platform key code.
    pub keycode: i32,
}

/// An entity took damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    /// The entity hit.
    pub entity: i32,
    /// Hit points removed.
    pub amount: i32,
}

event_set! {
    /// The event set the default [`Engine`](crate::Engine) dispatches.
    pub enum GameEvent: GameEventKind {
        /// See [`KeyPressedEvent`].
        KeyPressed(KeyPressedEvent),
        /// See [`DamageEvent`].
        Damage(DamageEvent),
    }
}
