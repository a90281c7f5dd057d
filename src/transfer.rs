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

//! Proofs that transfers preserve token type and value.
//!
//! The prover commits to the token type as `CT` and shows that
//!
//! - `CT` has no value component ([`SameTypeProof`]);
//! - `Σ (In_i - CT) - Σ (Out_j - CT)` is a multiple of the blinding base, i.e., inputs
//!   and outputs balance ([`ZeroValueProof`]);
//! - every de-typed input and output lies in range ([`RangeCorrectness`]), which also
//!   forces all of them to carry the type committed in `CT`.

use curve25519::scalar::Scalar;
use merlin::Transcript;
use rand::thread_rng;

use crate::{
    crypto::{
        self, proofs::TranscriptProtocol, random_scalar, Commitment, RangeCorrectness,
        RangeCorrectnessProver, SameTypeProof, SameTypeProver, ZeroValueProof,
    },
    errors::{Error, Result, ResultExt},
    issue::{check_witnesses, de_type},
    params::PublicParameters,
    token::TokenDataWitness,
};

const BALANCE_DOMAIN: &[u8] = b"private_token.transfer.balance";

/// Type and balance part of a [`TransferProof`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAndSumProof {
    pub same_type: SameTypeProof,
    pub balance: ZeroValueProof,
}

/// Proof attached to a [`TransferAction`](crate::actions::TransferAction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProof {
    pub type_and_sum: TypeAndSumProof,
    pub range_correctness: RangeCorrectness,
}

fn balance_transcript(
    inputs: &[Commitment],
    outputs: &[Commitment],
    commitment_to_type: &Commitment,
) -> Transcript {
    let mut transcript = Transcript::new(BALANCE_DOMAIN);
    transcript.append_commitments(b"inputs", inputs);
    transcript.append_commitments(b"outputs", outputs);
    transcript.append_point(b"CT", commitment_to_type.as_point());
    transcript
}

fn balance_commitment(
    inputs: &[Commitment],
    outputs: &[Commitment],
    commitment_to_type: &Commitment,
) -> Commitment {
    let inputs: Commitment = inputs.iter().map(|c| *c - *commitment_to_type).sum();
    let outputs: Commitment = outputs.iter().map(|c| *c - *commitment_to_type).sum();
    inputs - outputs
}

fn total(witnesses: &[TokenDataWitness]) -> u128 {
    witnesses.iter().map(|w| u128::from(w.value)).sum()
}

pub struct Prover<'a> {
    input_witnesses: &'a [TokenDataWitness],
    inputs: &'a [Commitment],
    output_witnesses: &'a [TokenDataWitness],
    outputs: &'a [Commitment],
    type_blinding: Scalar,
    pp: &'a PublicParameters,
}

impl<'a> Prover<'a> {
    pub fn new(
        input_witnesses: &'a [TokenDataWitness],
        inputs: &'a [Commitment],
        output_witnesses: &'a [TokenDataWitness],
        outputs: &'a [Commitment],
        pp: &'a PublicParameters,
    ) -> Result<Self> {
        check_witnesses(input_witnesses, inputs).context("invalid transfer inputs")?;
        check_witnesses(output_witnesses, outputs).context("invalid transfer outputs")?;
        if input_witnesses[0].token_type != output_witnesses[0].token_type {
            return Err(Error::malformed("inputs and outputs have different token types"));
        }
        if total(input_witnesses) != total(output_witnesses) {
            return Err(Error::malformed("inputs and outputs do not balance"));
        }

        Ok(Prover {
            input_witnesses,
            inputs,
            output_witnesses,
            outputs,
            type_blinding: random_scalar(&mut thread_rng()),
            pp,
        })
    }

    /// Produces a serialized [`TransferProof`].
    pub fn prove(&self) -> Result<Vec<u8>> {
        let gens = self.pp.generators();
        let token_type = &self.input_witnesses[0].token_type;
        let tokens: Vec<_> = self.inputs.iter().chain(self.outputs).cloned().collect();

        let same_type = SameTypeProver::new(token_type, self.type_blinding, &tokens, gens);
        let commitment_to_type = *same_type.commitment_to_type();
        let same_type = same_type.prove();

        let (in_commitments, in_values, in_blindings) = de_type(
            self.input_witnesses,
            self.inputs,
            &commitment_to_type,
            &self.type_blinding,
        );
        let (out_commitments, out_values, out_blindings) = de_type(
            self.output_witnesses,
            self.outputs,
            &commitment_to_type,
            &self.type_blinding,
        );

        let balance_blinding: Scalar =
            in_blindings.iter().sum::<Scalar>() - out_blindings.iter().sum::<Scalar>();
        let balance = ZeroValueProof::prove(
            gens,
            &balance_commitment(self.inputs, self.outputs, &commitment_to_type),
            &balance_blinding,
            &mut balance_transcript(self.inputs, self.outputs, &commitment_to_type),
        )
        .context("cannot prove transfer balance")?;

        let commitments: Vec<_> = in_commitments.into_iter().chain(out_commitments).collect();
        let values: Vec<_> = in_values.into_iter().chain(out_values).collect();
        let blindings: Vec<_> = in_blindings.into_iter().chain(out_blindings).collect();
        let range_correctness = RangeCorrectnessProver::new(
            &commitments,
            &values,
            &blindings,
            gens,
            self.pp.bulletproof_gens(),
            self.pp.bit_length(),
        )
        .and_then(|prover| prover.prove())
        .context("cannot prove range correctness of transfer")?;

        crypto::encode(&TransferProof {
            type_and_sum: TypeAndSumProof { same_type, balance },
            range_correctness,
        })
    }
}

pub struct Verifier<'a> {
    inputs: &'a [Commitment],
    outputs: &'a [Commitment],
    pp: &'a PublicParameters,
}

impl<'a> Verifier<'a> {
    pub fn new(
        inputs: &'a [Commitment],
        outputs: &'a [Commitment],
        pp: &'a PublicParameters,
    ) -> Self {
        Verifier {
            inputs,
            outputs,
            pp,
        }
    }

    /// Verifies a serialized [`TransferProof`]. Any failure, including malformed bytes,
    /// is reported as a verification error.
    pub fn verify(&self, proof: &[u8]) -> Result<()> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(Error::verification("transfer must have inputs and outputs"));
        }
        let proof: TransferProof = crypto::decode(proof)
            .map_err(|e| Error::verification(e.to_string()))
            .context("cannot decode transfer proof")?;

        let gens = self.pp.generators();
        let tokens: Vec<_> = self.inputs.iter().chain(self.outputs).cloned().collect();
        let TypeAndSumProof { same_type, balance } = &proof.type_and_sum;
        same_type
            .verify(gens, &tokens)
            .context("invalid transfer proof")?;

        let commitment_to_type = *same_type.commitment_to_type();
        balance
            .verify(
                gens,
                &balance_commitment(self.inputs, self.outputs, &commitment_to_type),
                &mut balance_transcript(self.inputs, self.outputs, &commitment_to_type),
            )
            .context("invalid transfer proof")?;

        let commitments: Vec<_> = tokens.iter().map(|c| *c - commitment_to_type).collect();
        proof
            .range_correctness
            .verify(
                &commitments,
                gens,
                self.pp.bulletproof_gens(),
                self.pp.bit_length(),
            )
            .map_err(|e| Error::verification(e.to_string()))
            .context("invalid transfer proof")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn witnesses(
        pp: &PublicParameters,
        token_type: &str,
        values: &[u64],
    ) -> (Vec<TokenDataWitness>, Vec<Commitment>) {
        let witnesses: Vec<_> = values
            .iter()
            .map(|&v| TokenDataWitness::new(token_type, v))
            .collect();
        let tokens = witnesses
            .iter()
            .map(|w| w.commitment(pp.generators()))
            .collect();
        (witnesses, tokens)
    }

    #[test]
    fn transfer_proof_verifies() {
        let pp = PublicParameters::setup(16, vec![], vec![]).unwrap();
        let (in_w, inputs) = witnesses(&pp, "USD", &[70, 30]);
        let (out_w, outputs) = witnesses(&pp, "USD", &[45, 50, 5]);

        let proof = Prover::new(&in_w, &inputs, &out_w, &outputs, &pp)
            .unwrap()
            .prove()
            .unwrap();
        Verifier::new(&inputs, &outputs, &pp).verify(&proof).unwrap();

        // Swapping inputs and outputs changes the statement.
        let err = Verifier::new(&outputs, &inputs, &pp).verify(&proof).unwrap_err();
        assert!(err.is_verification());
    }

    #[test]
    fn unbalanced_or_mixed_transfers_are_rejected() {
        let pp = PublicParameters::setup(16, vec![], vec![]).unwrap();
        let (in_w, inputs) = witnesses(&pp, "USD", &[70]);
        let (out_w, outputs) = witnesses(&pp, "USD", &[71]);
        assert!(Prover::new(&in_w, &inputs, &out_w, &outputs, &pp).is_err());

        let (out_w, outputs) = witnesses(&pp, "EUR", &[70]);
        assert!(Prover::new(&in_w, &inputs, &out_w, &outputs, &pp).is_err());
        assert!(Prover::new(&in_w, &inputs, &[], &[], &pp).is_err());
    }

    #[test]
    fn forged_outputs_do_not_verify() {
        let pp = PublicParameters::setup(16, vec![], vec![]).unwrap();
        let (in_w, inputs) = witnesses(&pp, "USD", &[70]);
        let (out_w, outputs) = witnesses(&pp, "USD", &[70]);
        let proof = Prover::new(&in_w, &inputs, &out_w, &outputs, &pp)
            .unwrap()
            .prove()
            .unwrap();

        // An output of a different value cannot be substituted.
        let (_, forged) = witnesses(&pp, "USD", &[80]);
        assert!(Verifier::new(&inputs, &forged, &pp).verify(&proof).is_err());
    }

    #[test]
    fn tampered_proof_does_not_verify() {
        let pp = PublicParameters::setup(8, vec![], vec![]).unwrap();
        let (in_w, inputs) = witnesses(&pp, "USD", &[3]);
        let (out_w, outputs) = witnesses(&pp, "USD", &[1, 2]);
        let proof = Prover::new(&in_w, &inputs, &out_w, &outputs, &pp)
            .unwrap()
            .prove()
            .unwrap();
        let verifier = Verifier::new(&inputs, &outputs, &pp);

        for i in (0..proof.len()).step_by(7) {
            let mut tampered = proof.clone();
            tampered[i] ^= 1 << (i % 8);
            assert!(verifier.verify(&tampered).unwrap_err().is_verification());
        }
    }
}
