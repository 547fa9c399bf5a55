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

//! Static declaration of event kinds.

use std::fmt::Debug;
use std::hash::Hash;

/// A closed set of event kinds, stored as one fixed-size tagged record.
///
/// Implemented by the enum generated with [`event_set!`](crate::event_set).
/// The record size is the size of the enum itself: the largest registered
/// payload plus the tag. It never depends on anything read out of the record.
pub trait EventSet: Copy + Send + Sync + 'static {
    /// The discriminant enum naming each kind in the set.
    type Kind: Copy + Debug + Eq + Hash + Send + Sync + 'static;

    /// Number of kinds in the set.
    const KIND_COUNT: usize;

    /// Size in bytes of the largest payload in the set.
    const MAX_PAYLOAD_BYTES: usize;

    /// Returns the kind tag of this record.
    fn kind(&self) -> Self::Kind;

    /// Returns the dense index of this record's kind, in `0..KIND_COUNT`.
    fn kind_index(&self) -> usize;
}

/// A single payload type registered in the event set `S`.
pub trait EventKind<S: EventSet>: Copy + Send + Sync + 'static {
    /// The kind tag of this payload.
    const KIND: S::Kind;
    /// Dense index of this kind, in `0..S::KIND_COUNT`.
    const INDEX: usize;
    /// Human-readable name, used in diagnostics.
    const NAME: &'static str;

    /// Wraps the payload into a record of the set.
    fn into_event(self) -> S;

    /// Borrows the payload back out of a record, if the record is of this kind.
    fn from_event(event: &S) -> Option<&Self>;
}

/// Largest payload a registered event kind may have, in bytes.
///
/// Records travel through the deferred queue by value, so every kind is
/// kept to what a one-byte length field can describe.
pub const MAX_EVENT_PAYLOAD_BYTES: usize = u8::MAX as usize;

#[doc(hidden)]
pub const fn max_size(sizes: &[usize]) -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < sizes.len() {
        if sizes[i] > max {
            max = sizes[i];
        }
        i += 1;
    }
    max
}

/// Declares an [`EventSet`] and its kinds in one place.
///
/// Generates the record enum, a `#[repr(usize)]` kind enum, an
/// [`EventKind`] impl and a `From` conversion for every payload. A payload
/// larger than [`MAX_EVENT_PAYLOAD_BYTES`] is rejected at compile time.
///
/// ```
/// use gatherer_core::event_set;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// pub struct Ping { pub id: u32 }
///
/// event_set! {
///     /// Events used by the example.
///     pub enum NetEvent: NetEventKind {
///         Ping(Ping),
///     }
/// }
/// ```
///
/// ```compile_fail
/// use gatherer_core::event_set;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// pub struct Snapshot { pub bytes: [u8; 512] }
///
/// event_set! {
///     pub enum BulkEvent: BulkEventKind {
///         Snapshot(Snapshot),
///     }
/// }
/// ```
#[macro_export]
macro_rules! event_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $set:ident : $kinds:ident {
            $( $(#[$vmeta:meta])* $variant:ident($payload:ty) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        $vis enum $set {
            $( $(#[$vmeta])* $variant($payload), )+
        }

        #[doc = concat!("Kind tags of [`", stringify!($set), "`].")]
        #[repr(usize)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $kinds {
            $(
                #[doc = concat!("Tag of [`", stringify!($payload), "`].")]
                $variant,
            )+
        }

        impl $crate::event::EventSet for $set {
            type Kind = $kinds;

            const KIND_COUNT: usize = [$($kinds::$variant),+].len();

            const MAX_PAYLOAD_BYTES: usize =
                $crate::event::max_size(&[$(::std::mem::size_of::<$payload>()),+]);

            fn kind(&self) -> $kinds {
                match self {
                    $( $set::$variant(_) => $kinds::$variant, )+
                }
            }

            fn kind_index(&self) -> usize {
                self.kind() as usize
            }
        }

        $(
            impl $crate::event::EventKind<$set> for $payload {
                const KIND: $kinds = $kinds::$variant;
                const INDEX: usize = $kinds::$variant as usize;
                const NAME: &'static str = stringify!($payload);

                fn into_event(self) -> $set {
                    $set::$variant(self)
                }

                fn from_event(event: &$set) -> Option<&Self> {
                    match event {
                        $set::$variant(payload) => Some(payload),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$payload> for $set {
                fn from(payload: $payload) -> Self {
                    $set::$variant(payload)
                }
            }

            const _: () = assert!(
                ::std::mem::size_of::<$payload>() <= $crate::event::MAX_EVENT_PAYLOAD_BYTES,
                "event payload exceeds MAX_EVENT_PAYLOAD_BYTES"
            );
        )+
    };
}
