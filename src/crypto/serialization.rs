// Copyright 2018 The Exonum Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Supporting routines for serializing crypto types, and the wire codec.
//!
//! Every wire type in the crate is encoded with `bincode` using fixed-width integers;
//! trailing bytes are rejected, so that a given value has exactly one encoding.

use bincode::Options;
use curve25519::ristretto::CompressedRistretto;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

use super::Commitment;
use crate::errors::Result;

/// Upper bound on the size of a decoded value.
const MAX_ENCODED_LEN: u64 = 1 << 26;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .with_limit(MAX_ENCODED_LEN)
}

/// Encodes a value into its canonical byte representation.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(options().serialize(value)?)
}

/// Decodes a value, failing on truncated input, trailing bytes or invalid group elements.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(options().deserialize(bytes)?)
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.compress().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        let compressed = CompressedRistretto::deserialize(deserializer)?;
        compressed
            .decompress()
            .map(Commitment::from_point)
            .ok_or_else(|| D::Error::custom("non-canonical `Commitment`"))
    }
}
