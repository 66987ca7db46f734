/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Serde helpers that render byte vectors as base64 strings in JSON bodies.
//!
//! Use with `#[serde(with = "base64_bytes")]` on `Vec<u8>` fields. Encoding is standard
//! base64 without padding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Encode `bytes` as a base64 string.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

/// Decode a base64 string into bytes.
pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD_NO_PAD.decode(s)
}

pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(de::Error::custom)
}
