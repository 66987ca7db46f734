/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Helpers for log output.
//!
//! The crate logs through the [log](https://docs.rs/log) facade. To see the messages, set
//! up a logging implementation in the embedding binary or test harness.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

/// A readable representation of a byte sequence: the first seven characters of its base64
/// encoding.
pub fn short_hash(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}
