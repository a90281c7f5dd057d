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

//! Cryptographic primitives used by provers, verifiers and the auditor.
//!
//! # Commitments
//!
//! Token data is a Pedersen commitment over three generators:
//!
//! ```text
//! data = G0 * hash(type) + G1 * value + G2 * blinding_factor
//! ```
//!
//! `G0` is the *type base*, `G1` the *value base* and `G2` the *blinding base*
//! (see [`PedersenGenerators`]). Subtracting a commitment to the type
//! (`CT = G0 * hash(type) + G2 * type_bf`) from the token data leaves an ordinary
//! two-base Pedersen commitment over `(G1, G2)`, which is what range proofs operate on.
//!
//! # Proofs
//!
//! See [`SameTypeProof`], [`ZeroValueProof`] and [`RangeCorrectness`].
//!
//! [`SameTypeProof`]: crate::crypto::SameTypeProof
//! [`ZeroValueProof`]: crate::crypto::ZeroValueProof
//! [`RangeCorrectness`]: crate::crypto::RangeCorrectness

use bulletproofs::PedersenGens;
use curve25519::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::{Identity, MultiscalarMul},
};
use rand::{CryptoRng, RngCore};
use sha2::Sha512;

use std::{iter, ops};

use crate::errors::{Error, Result};

pub mod proofs;
pub(crate) mod serialization;

pub use self::proofs::{
    RangeCorrectness, RangeCorrectnessProver, SameTypeProof, SameTypeProver, ZeroValueProof,
};
pub use self::serialization::{decode, encode};

/// Label of the generator chain used by default public parameters.
pub const DEFAULT_GENERATORS_LABEL: &[u8] = b"private_token.pedersen.v1";

lazy_static! {
    static ref DEFAULT_GENERATORS: PedersenGenerators =
        PedersenGenerators::derive(DEFAULT_GENERATORS_LABEL);
}

/// Hashes arbitrary bytes (e.g., a token type) to a scalar.
pub fn hash_to_scalar(bytes: &[u8]) -> Scalar {
    Scalar::hash_from_bytes::<Sha512>(bytes)
}

/// Samples a uniformly random scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    Scalar::random(rng)
}

/// Computes `Σ generators[i] * values[i]`.
pub fn commit(values: &[Scalar], generators: &[RistrettoPoint]) -> Result<Commitment> {
    if values.len() != generators.len() {
        return Err(Error::malformed(format!(
            "cannot commit to {} values with {} generators",
            values.len(),
            generators.len()
        )));
    }
    Ok(Commitment {
        inner: RistrettoPoint::multiscalar_mul(values, generators),
    })
}

/// Generators `G0` (type), `G1` (value) and `G2` (blinding) of token commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedersenGenerators {
    points: [RistrettoPoint; 3],
}

impl PedersenGenerators {
    pub const LEN: usize = 3;

    /// Derives generators with unknown mutual discrete logs by hashing `label`.
    pub fn derive(label: &[u8]) -> Self {
        let mut points = [RistrettoPoint::identity(); Self::LEN];
        for (i, point) in points.iter_mut().enumerate() {
            let mut input = label.to_vec();
            input.extend_from_slice(b".G");
            input.push(i as u8);
            *point = RistrettoPoint::hash_from_bytes::<Sha512>(&input);
        }
        PedersenGenerators { points }
    }

    /// Assembles generators, checking that they are pairwise distinct and not the identity.
    pub fn from_points(points: &[RistrettoPoint]) -> Result<Self> {
        if points.len() != Self::LEN {
            return Err(Error::setup(format!(
                "expected {} pedersen generators, got {}",
                Self::LEN,
                points.len()
            )));
        }
        let mut array = [RistrettoPoint::identity(); Self::LEN];
        array.copy_from_slice(points);
        let generators = PedersenGenerators { points: array };
        generators.validate()?;
        Ok(generators)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let identity = RistrettoPoint::identity();
        for (i, point) in self.points.iter().enumerate() {
            if *point == identity {
                return Err(Error::setup(format!("pedersen generator [{}] is the identity", i)));
            }
            if self.points[..i].contains(point) {
                return Err(Error::setup(format!("pedersen generator [{}] is duplicated", i)));
            }
        }
        Ok(())
    }

    pub fn type_base(&self) -> &RistrettoPoint {
        &self.points[0]
    }

    pub fn value_base(&self) -> &RistrettoPoint {
        &self.points[1]
    }

    pub fn blinding_base(&self) -> &RistrettoPoint {
        &self.points[2]
    }

    pub fn as_slice(&self) -> &[RistrettoPoint] {
        &self.points
    }

    /// Two-base generators `(G1, G2)` for range proofs over de-typed commitments.
    pub fn value_gens(&self) -> PedersenGens {
        PedersenGens {
            B: self.points[1],
            B_blinding: self.points[2],
        }
    }

    /// Commitment to token data.
    pub fn commit_token(&self, token_type: &str, value: u64, blinding: &Scalar) -> Commitment {
        let values = [hash_to_scalar(token_type.as_bytes()), Scalar::from(value), *blinding];
        Commitment {
            inner: RistrettoPoint::multiscalar_mul(&values, &self.points),
        }
    }

    /// Commitment to a token type alone: `G0 * hash(type) + G2 * blinding`.
    pub fn commit_type(&self, token_type: &str, blinding: &Scalar) -> Commitment {
        let values = [hash_to_scalar(token_type.as_bytes()), *blinding];
        let bases = [self.points[0], self.points[2]];
        Commitment {
            inner: RistrettoPoint::multiscalar_mul(&values, &bases),
        }
    }
}

impl Default for PedersenGenerators {
    fn default() -> Self {
        *DEFAULT_GENERATORS
    }
}

/// Pedersen commitment, i.e., a point in the Ristretto group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    inner: RistrettoPoint,
}

impl Commitment {
    /// Size of the byte representation of the commitment (i.e., a compressed Ristretto point).
    pub const BYTE_LEN: usize = 32;

    pub fn from_point(point: RistrettoPoint) -> Self {
        Commitment { inner: point }
    }

    /// Attempts to deserialize a commitment from byte slice.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != Self::BYTE_LEN {
            return None;
        }

        let compressed_point = CompressedRistretto::from_slice(slice).ok()?;
        compressed_point
            .decompress()
            .map(|point| Commitment { inner: point })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.compress().as_bytes().to_vec()
    }

    pub fn compress(&self) -> CompressedRistretto {
        self.inner.compress()
    }

    pub fn as_point(&self) -> &RistrettoPoint {
        &self.inner
    }

    pub fn is_identity(&self) -> bool {
        self.inner == RistrettoPoint::identity()
    }
}

impl ops::Add for Commitment {
    type Output = Commitment;

    fn add(self, rhs: Self) -> Commitment {
        Commitment {
            inner: self.inner + rhs.inner,
        }
    }
}

impl ops::Sub for Commitment {
    type Output = Commitment;

    fn sub(self, rhs: Self) -> Commitment {
        Commitment {
            inner: self.inner - rhs.inner,
        }
    }
}

impl ops::Neg for Commitment {
    type Output = Commitment;

    fn neg(self) -> Commitment {
        Commitment { inner: -self.inner }
    }
}

impl iter::Sum for Commitment {
    fn sum<I: Iterator<Item = Commitment>>(iter: I) -> Self {
        iter.fold(Commitment::from_point(RistrettoPoint::identity()), |acc, c| {
            acc + c
        })
    }
}

impl<'a> iter::Sum<&'a Commitment> for Commitment {
    fn sum<I: Iterator<Item = &'a Commitment>>(iter: I) -> Self {
        iter.cloned().sum()
    }
}
