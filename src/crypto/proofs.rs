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

//! Zero-knowledge proofs over token commitments.

use bulletproofs::{BulletproofGens, RangeProof};
use curve25519::{
    ristretto::RistrettoPoint,
    scalar::Scalar,
    traits::VartimeMultiscalarMul,
};
use merlin::Transcript;
use rand::thread_rng;

use super::{random_scalar, Commitment, PedersenGenerators};
use crate::errors::{Error, Result};

const SAME_TYPE_DOMAIN: &[u8] = b"private_token.same_type";
const ZERO_VALUE_DOMAIN: &[u8] = b"private_token.zero_value";
const RANGE_DOMAIN: &[u8] = b"private_token.range";

/// Fiat-Shamir helpers on top of `merlin` transcripts.
pub(crate) trait TranscriptProtocol {
    fn append_point(&mut self, label: &'static [u8], point: &RistrettoPoint);
    fn append_commitments(&mut self, label: &'static [u8], commitments: &[Commitment]);
    fn challenge_scalar(&mut self, label: &'static [u8]) -> Scalar;
}

impl TranscriptProtocol for Transcript {
    fn append_point(&mut self, label: &'static [u8], point: &RistrettoPoint) {
        self.append_message(label, point.compress().as_bytes());
    }

    fn append_commitments(&mut self, label: &'static [u8], commitments: &[Commitment]) {
        self.append_u64(label, commitments.len() as u64);
        for commitment in commitments {
            self.append_message(label, commitment.compress().as_bytes());
        }
    }

    fn challenge_scalar(&mut self, label: &'static [u8]) -> Scalar {
        let mut buf = [0_u8; 64];
        self.challenge_bytes(label, &mut buf);
        Scalar::from_bytes_mod_order_wide(&buf)
    }
}

fn append_generators(transcript: &mut Transcript, gens: &PedersenGenerators) {
    for point in gens.as_slice() {
        transcript.append_point(b"G", point);
    }
}

/// Proof that a commitment `CT = G0 * t + G2 * r` has no value component.
///
/// `CT` is the bridge between token data and range proofs: subtracting it from
/// every token removes the type component, and the subsequent range proofs over
/// `(G1, G2)` only verify if every token carried the same type as `CT`.
/// The proof is bound to the tokens it accompanies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SameTypeProof {
    commitment_to_type: Commitment,
    challenge: Scalar,
    type_response: Scalar,
    blinding_response: Scalar,
}

impl SameTypeProof {
    pub fn commitment_to_type(&self) -> &Commitment {
        &self.commitment_to_type
    }

    fn transcript(gens: &PedersenGenerators, tokens: &[Commitment], ct: &Commitment) -> Transcript {
        let mut transcript = Transcript::new(SAME_TYPE_DOMAIN);
        append_generators(&mut transcript, gens);
        transcript.append_commitments(b"tokens", tokens);
        transcript.append_point(b"CT", ct.as_point());
        transcript
    }

    pub fn verify(&self, gens: &PedersenGenerators, tokens: &[Commitment]) -> Result<()> {
        let ct = &self.commitment_to_type;
        if ct.is_identity() {
            return Err(Error::verification("type commitment is the identity"));
        }

        let nonce = RistrettoPoint::vartime_multiscalar_mul(
            &[self.type_response, self.blinding_response, -self.challenge],
            &[*gens.type_base(), *gens.blinding_base(), *ct.as_point()],
        );
        let mut transcript = Self::transcript(gens, tokens, ct);
        transcript.append_point(b"A", &nonce);
        if transcript.challenge_scalar(b"c") != self.challenge {
            return Err(Error::verification("invalid same type proof"));
        }
        Ok(())
    }
}

/// Produces [`SameTypeProof`]s.
pub struct SameTypeProver<'a> {
    type_scalar: Scalar,
    blinding: Scalar,
    commitment_to_type: Commitment,
    tokens: &'a [Commitment],
    gens: &'a PedersenGenerators,
}

impl<'a> SameTypeProver<'a> {
    pub fn new(
        token_type: &str,
        blinding: Scalar,
        tokens: &'a [Commitment],
        gens: &'a PedersenGenerators,
    ) -> Self {
        SameTypeProver {
            type_scalar: super::hash_to_scalar(token_type.as_bytes()),
            blinding,
            commitment_to_type: gens.commit_type(token_type, &blinding),
            tokens,
            gens,
        }
    }

    pub fn commitment_to_type(&self) -> &Commitment {
        &self.commitment_to_type
    }

    pub fn prove(&self) -> SameTypeProof {
        let mut rng = thread_rng();
        let (type_nonce, blinding_nonce) = (random_scalar(&mut rng), random_scalar(&mut rng));
        let nonce = self.gens.type_base() * type_nonce + self.gens.blinding_base() * blinding_nonce;

        let mut transcript =
            SameTypeProof::transcript(self.gens, self.tokens, &self.commitment_to_type);
        transcript.append_point(b"A", &nonce);
        let challenge = transcript.challenge_scalar(b"c");

        SameTypeProof {
            commitment_to_type: self.commitment_to_type,
            challenge,
            type_response: type_nonce + challenge * self.type_scalar,
            blinding_response: blinding_nonce + challenge * self.blinding,
        }
    }
}

/// Schnorr proof that a commitment opens to value zero, i.e., that it equals
/// `G2 * x` for a known `x`. Used to prove that transfer inputs and outputs balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroValueProof {
    challenge: Scalar,
    response: Scalar,
}

impl ZeroValueProof {
    /// Proves knowledge of `blinding` such that `commitment == G2 * blinding`.
    ///
    /// The caller-supplied `transcript` binds the proof to its context.
    pub fn prove(
        gens: &PedersenGenerators,
        commitment: &Commitment,
        blinding: &Scalar,
        transcript: &mut Transcript,
    ) -> Result<Self> {
        if gens.blinding_base() * blinding != *commitment.as_point() {
            return Err(Error::malformed("commitment does not open to zero value"));
        }

        let nonce = random_scalar(&mut thread_rng());
        transcript.append_message(b"dom-sep", ZERO_VALUE_DOMAIN);
        transcript.append_point(b"D", commitment.as_point());
        transcript.append_point(b"A", &(gens.blinding_base() * nonce));
        let challenge = transcript.challenge_scalar(b"c");
        Ok(ZeroValueProof {
            challenge,
            response: nonce + challenge * blinding,
        })
    }

    pub fn verify(
        &self,
        gens: &PedersenGenerators,
        commitment: &Commitment,
        transcript: &mut Transcript,
    ) -> Result<()> {
        let nonce = RistrettoPoint::vartime_multiscalar_mul(
            &[self.response, -self.challenge],
            &[*gens.blinding_base(), *commitment.as_point()],
        );
        transcript.append_message(b"dom-sep", ZERO_VALUE_DOMAIN);
        transcript.append_point(b"D", commitment.as_point());
        transcript.append_point(b"A", &nonce);
        if transcript.challenge_scalar(b"c") != self.challenge {
            return Err(Error::verification("inputs and outputs do not balance"));
        }
        Ok(())
    }
}

fn range_transcript(index: usize, commitment: &Commitment) -> Transcript {
    let mut transcript = Transcript::new(RANGE_DOMAIN);
    transcript.append_u64(b"index", index as u64);
    transcript.append_point(b"V", commitment.as_point());
    transcript
}

/// Range proofs for a vector of two-base commitments over `(G1, G2)`:
/// one bulletproof per commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeCorrectness {
    proofs: Vec<RangeProof>,
}

impl RangeCorrectness {
    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    pub fn verify(
        &self,
        commitments: &[Commitment],
        gens: &PedersenGenerators,
        bp_gens: &BulletproofGens,
        bit_length: usize,
    ) -> Result<()> {
        if self.proofs.len() != commitments.len() {
            return Err(Error::verification(format!(
                "expected {} range proofs, got {}",
                commitments.len(),
                self.proofs.len()
            )));
        }

        let value_gens = gens.value_gens();
        for (i, (proof, commitment)) in self.proofs.iter().zip(commitments).enumerate() {
            let mut transcript = range_transcript(i, commitment);
            proof
                .verify_single(
                    bp_gens,
                    &value_gens,
                    &mut transcript,
                    &commitment.compress(),
                    bit_length,
                )
                .map_err(|e| {
                    Error::from(e).context(format!("invalid range proof at index [{}]", i))
                })?;
        }
        Ok(())
    }
}

/// Produces [`RangeCorrectness`] proofs.
pub struct RangeCorrectnessProver<'a> {
    commitments: &'a [Commitment],
    values: &'a [u64],
    blindings: &'a [Scalar],
    gens: &'a PedersenGenerators,
    bp_gens: &'a BulletproofGens,
    bit_length: usize,
}

impl<'a> RangeCorrectnessProver<'a> {
    pub fn new(
        commitments: &'a [Commitment],
        values: &'a [u64],
        blindings: &'a [Scalar],
        gens: &'a PedersenGenerators,
        bp_gens: &'a BulletproofGens,
        bit_length: usize,
    ) -> Result<Self> {
        if commitments.len() != values.len() || commitments.len() != blindings.len() {
            return Err(Error::malformed(format!(
                "range prover got {} commitments, {} values and {} blinding factors",
                commitments.len(),
                values.len(),
                blindings.len()
            )));
        }
        if !crate::SUPPORTED_BIT_LENGTHS.contains(&bit_length) {
            return Err(Error::setup(format!("unsupported bit length {}", bit_length)));
        }
        Ok(RangeCorrectnessProver {
            commitments,
            values,
            blindings,
            gens,
            bp_gens,
            bit_length,
        })
    }

    pub fn prove(&self) -> Result<RangeCorrectness> {
        let value_gens = self.gens.value_gens();
        let mut rng = thread_rng();
        let mut proofs = Vec::with_capacity(self.commitments.len());

        for (i, commitment) in self.commitments.iter().enumerate() {
            let value = self.values[i];
            if self.bit_length < 64 && value >> self.bit_length != 0 {
                return Err(Error::malformed(format!(
                    "value at index [{}] does not fit into {} bits",
                    i, self.bit_length
                )));
            }

            let mut transcript = range_transcript(i, commitment);
            let (proof, committed) = RangeProof::prove_single_with_rng(
                self.bp_gens,
                &value_gens,
                &mut transcript,
                value,
                &self.blindings[i],
                self.bit_length,
                &mut rng,
            )?;
            if committed != commitment.compress() {
                return Err(Error::malformed(format!(
                    "witness at index [{}] does not open its commitment",
                    i
                )));
            }
            proofs.push(proof);
        }
        Ok(RangeCorrectness { proofs })
    }
}
