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

//! Confidential tokens over Pedersen commitments.
//!
//! Token values and types are hidden in [commitments](crypto::Commitment). Issuers and
//! senders attach zero-knowledge proofs to their [actions](actions) showing that hidden
//! values are in range and that transfers balance; the [`Validator`](validator::Validator)
//! checks these proofs and signatures against [public parameters](params::PublicParameters)
//! and the ledger, while the [`Auditor`](audit::Auditor) opens every commitment using
//! cleartext [metadata](metadata::TokenRequestMetadata) disclosed to it, and endorses
//! requests that match.

#[macro_use]
extern crate lazy_static;
extern crate bulletproofs;
extern crate byteorder;
extern crate curve25519_dalek as curve25519;
extern crate merlin;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod actions;
pub mod audit;
pub mod builder;
pub mod crypto;
pub mod errors;
pub mod identity;
pub mod issue;
pub mod logging;
pub mod metadata;
pub mod params;
pub mod request;
pub mod storage;
pub mod token;
pub mod transfer;
pub mod validator;

pub use crate::errors::{Error, ErrorKind, Result};

/// Bit length of range proofs in default public parameters.
pub const DEFAULT_BIT_LENGTH: usize = 64;
/// Bit lengths supported by range proofs.
pub const SUPPORTED_BIT_LENGTHS: [usize; 4] = [8, 16, 32, 64];
/// Maximum number of outputs in a single action.
pub const MAX_OUTPUTS: usize = 256;
