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

//! Proofs of well-formedness of issued tokens.
//!
//! An issue proof shows that all issued tokens share one (hidden) type and that every value
//! lies in `[0, 2^bit_length)`. The prover commits to the type as `CT = G0 * hash(type) +
//! G2 * type_bf`, proves that `CT` has no value component, and then proves the range of
//! every de-typed token `C_i - CT` over `(G1, G2)`.

use curve25519::scalar::Scalar;
use rand::thread_rng;

use crate::{
    crypto::{
        self, random_scalar, Commitment, RangeCorrectness, RangeCorrectnessProver, SameTypeProof,
        SameTypeProver,
    },
    errors::{Error, Result, ResultExt},
    params::PublicParameters,
    token::TokenDataWitness,
};

/// Proof attached to an [`IssueAction`](crate::actions::IssueAction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueProof {
    pub same_type: SameTypeProof,
    pub range_correctness: RangeCorrectness,
}

/// Checks that witnesses are usable and all share one type.
pub(crate) fn check_witnesses(
    witnesses: &[TokenDataWitness],
    tokens: &[Commitment],
) -> Result<()> {
    if witnesses.is_empty() {
        return Err(Error::malformed("no token witnesses"));
    }
    if witnesses.len() != tokens.len() {
        return Err(Error::malformed(format!(
            "number of witnesses does not match number of tokens [{}]!=[{}]",
            witnesses.len(),
            tokens.len()
        )));
    }
    let token_type = &witnesses[0].token_type;
    if token_type.is_empty() {
        return Err(Error::malformed("token type is empty"));
    }
    if let Some(i) = witnesses.iter().position(|w| w.token_type != *token_type) {
        return Err(Error::malformed(format!(
            "witness at index [{}] has a different token type",
            i
        )));
    }
    Ok(())
}

/// De-types commitments and blinding factors with respect to a type commitment.
pub(crate) fn de_type(
    witnesses: &[TokenDataWitness],
    tokens: &[Commitment],
    commitment_to_type: &Commitment,
    type_blinding: &Scalar,
) -> (Vec<Commitment>, Vec<u64>, Vec<Scalar>) {
    let commitments = tokens.iter().map(|c| *c - *commitment_to_type).collect();
    let values = witnesses.iter().map(|w| w.value).collect();
    let blindings = witnesses
        .iter()
        .map(|w| w.blinding_factor - type_blinding)
        .collect();
    (commitments, values, blindings)
}

pub struct Prover<'a> {
    witnesses: &'a [TokenDataWitness],
    tokens: &'a [Commitment],
    type_blinding: Scalar,
    pp: &'a PublicParameters,
}

impl<'a> Prover<'a> {
    pub fn new(
        witnesses: &'a [TokenDataWitness],
        tokens: &'a [Commitment],
        pp: &'a PublicParameters,
    ) -> Result<Self> {
        check_witnesses(witnesses, tokens)?;
        Ok(Prover {
            witnesses,
            tokens,
            type_blinding: random_scalar(&mut thread_rng()),
            pp,
        })
    }

    /// Produces a serialized [`IssueProof`].
    pub fn prove(&self) -> Result<Vec<u8>> {
        let gens = self.pp.generators();
        let token_type = &self.witnesses[0].token_type;

        let same_type = SameTypeProver::new(token_type, self.type_blinding, self.tokens, gens);
        let commitment_to_type = *same_type.commitment_to_type();
        let same_type = same_type.prove();

        let (commitments, values, blindings) = de_type(
            self.witnesses,
            self.tokens,
            &commitment_to_type,
            &self.type_blinding,
        );
        let range_correctness = RangeCorrectnessProver::new(
            &commitments,
            &values,
            &blindings,
            gens,
            self.pp.bulletproof_gens(),
            self.pp.bit_length(),
        )
        .and_then(|prover| prover.prove())
        .context("cannot prove range correctness of issued tokens")?;

        crypto::encode(&IssueProof {
            same_type,
            range_correctness,
        })
    }
}

pub struct Verifier<'a> {
    tokens: &'a [Commitment],
    pp: &'a PublicParameters,
}

impl<'a> Verifier<'a> {
    pub fn new(tokens: &'a [Commitment], pp: &'a PublicParameters) -> Self {
        Verifier { tokens, pp }
    }

    /// Verifies a serialized [`IssueProof`]. Any failure, including malformed bytes,
    /// is reported as a verification error.
    pub fn verify(&self, proof: &[u8]) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(Error::verification("no tokens to verify"));
        }
        let proof: IssueProof = crypto::decode(proof)
            .map_err(|e| Error::verification(e.to_string()))
            .context("cannot decode issue proof")?;

        let gens = self.pp.generators();
        proof
            .same_type
            .verify(gens, self.tokens)
            .context("invalid issue proof")?;

        let commitment_to_type = *proof.same_type.commitment_to_type();
        let commitments: Vec<_> = self.tokens.iter().map(|c| *c - commitment_to_type).collect();
        proof
            .range_correctness
            .verify(
                &commitments,
                gens,
                self.pp.bulletproof_gens(),
                self.pp.bit_length(),
            )
            .map_err(|e| Error::verification(e.to_string()))
            .context("invalid issue proof")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(values: &[u64]) -> (PublicParameters, Vec<TokenDataWitness>, Vec<Commitment>) {
        let pp = PublicParameters::setup(16, vec![], vec![]).unwrap();
        let witnesses: Vec<_> = values
            .iter()
            .map(|&v| TokenDataWitness::new("ABC", v))
            .collect();
        let tokens = witnesses
            .iter()
            .map(|w| w.commitment(pp.generators()))
            .collect();
        (pp, witnesses, tokens)
    }

    #[test]
    fn issue_proof_verifies() {
        let (pp, witnesses, tokens) = setup(&[100, 50]);
        let proof = Prover::new(&witnesses, &tokens, &pp).unwrap().prove().unwrap();
        Verifier::new(&tokens, &pp).verify(&proof).unwrap();

        // The proof does not verify for other tokens.
        let (_, _, other_tokens) = setup(&[100, 50]);
        let err = Verifier::new(&other_tokens, &pp).verify(&proof).unwrap_err();
        assert!(err.is_verification());
    }

    #[test]
    fn tampered_proof_does_not_verify() {
        let (pp, witnesses, tokens) = setup(&[7]);
        let proof = Prover::new(&witnesses, &tokens, &pp).unwrap().prove().unwrap();
        let verifier = Verifier::new(&tokens, &pp);

        for i in 0..proof.len() {
            let mut tampered = proof.clone();
            tampered[i] ^= 1 << (i % 8);
            let err = verifier.verify(&tampered).unwrap_err();
            assert!(err.is_verification(), "byte {}: {}", i, err);
        }
        assert!(verifier.verify(&proof[..proof.len() - 1]).is_err());
        assert!(verifier.verify(&[]).is_err());
    }

    #[test]
    fn prover_rejects_bad_witnesses() {
        let (pp, mut witnesses, tokens) = setup(&[1, 2]);
        assert!(Prover::new(&witnesses[..1], &tokens, &pp).is_err());
        assert!(Prover::new(&[], &[], &pp).is_err());

        witnesses[1].token_type = "XYZ".to_owned();
        assert!(Prover::new(&witnesses, &tokens, &pp).is_err());

        // Value out of range for 16 bits.
        let (pp, witnesses, tokens) = setup(&[1 << 20]);
        assert!(Prover::new(&witnesses, &tokens, &pp).unwrap().prove().is_err());

        // Witness does not open the token.
        let (pp, witnesses, _) = setup(&[5]);
        let (_, _, tokens) = setup(&[5]);
        assert!(Prover::new(&witnesses, &tokens, &pp).unwrap().prove().is_err());
    }
}
