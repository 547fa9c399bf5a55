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

//! Turning caught panic payloads into diagnostics.

use std::any::Any;

/// Extracts a human-readable message from a payload returned by
/// [`std::panic::catch_unwind`].
///
/// `panic!` with a literal produces a `&'static str` payload, a formatted
/// `panic!` produces a `String`. Anything else is reported generically.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn extracts_static_and_formatted_messages() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let value = 7;
        let payload = panic::catch_unwind(|| panic!("value was {value}")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "value was 7");
    }

    #[test]
    fn unknown_payload_is_reported_generically() {
        let payload = panic::catch_unwind(|| panic::panic_any(42_u32)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
