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

//! Public parameters agreed upon by all participants of the network.

use bulletproofs::{BulletproofGens, PedersenGens};
use byteorder::{ByteOrder, LittleEndian};
use sha2::{Digest, Sha256};

use std::fmt;

use crate::{
    crypto::{self, PedersenGenerators},
    errors::{Error, Result, ResultExt},
    identity::Identity,
    DEFAULT_BIT_LENGTH, SUPPORTED_BIT_LENGTHS,
};

/// Label of the parameters format.
pub const PARAMS_LABEL: &str = "private_token.pp.v1";

/// Elliptic curve the commitments are defined over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveId {
    Ristretto255,
}

/// Parameters of range proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProofParams {
    /// Values must lie in `[0, 2^bit_length)`.
    pub bit_length: u64,
    /// Number of inner product argument rounds, `log2(bit_length)`.
    pub number_of_rounds: u64,
}

impl RangeProofParams {
    pub fn new(bit_length: usize) -> Result<Self> {
        if !SUPPORTED_BIT_LENGTHS.contains(&bit_length) {
            return Err(Error::setup(format!("unsupported bit length {}", bit_length)));
        }
        Ok(RangeProofParams {
            bit_length: bit_length as u64,
            number_of_rounds: u64::from(bit_length.trailing_zeros()),
        })
    }

    fn validate(&self) -> Result<()> {
        let expected = RangeProofParams::new(self.bit_length as usize)?;
        if expected.number_of_rounds != self.number_of_rounds {
            return Err(Error::setup(format!(
                "{} rounds are inconsistent with bit length {}",
                self.number_of_rounds, self.bit_length
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ParamsData {
    label: String,
    curve: CurveId,
    pedersen_generators: PedersenGenerators,
    range_proof_params: RangeProofParams,
    issuers: Vec<Identity>,
    auditors: Vec<Identity>,
}

/// Public parameters: generators, range proof parameters and the identities
/// of authorized issuers and auditors.
///
/// Parameters are immutable; share them between components with `Arc`.
#[derive(Clone)]
pub struct PublicParameters {
    data: ParamsData,
    bp_gens: BulletproofGens,
    identifier: String,
}

impl fmt::Debug for PublicParameters {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("PublicParameters")
            .field("identifier", &self.identifier)
            .field("curve", &self.data.curve)
            .field("range_proof_params", &self.data.range_proof_params)
            .field("issuers", &self.data.issuers.len())
            .field("auditors", &self.data.auditors.len())
            .finish()
    }
}

impl PartialEq for PublicParameters {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl PublicParameters {
    /// Creates parameters with the default generators.
    pub fn setup(
        bit_length: usize,
        issuers: Vec<Identity>,
        auditors: Vec<Identity>,
    ) -> Result<Self> {
        let data = ParamsData {
            label: PARAMS_LABEL.to_owned(),
            curve: CurveId::Ristretto255,
            pedersen_generators: PedersenGenerators::default(),
            range_proof_params: RangeProofParams::new(bit_length)?,
            issuers,
            auditors,
        };
        Self::from_data(data)
    }

    fn from_data(data: ParamsData) -> Result<Self> {
        validate(&data)?;
        let bytes = crypto::encode(&data)?;
        let bp_gens = BulletproofGens::new(data.range_proof_params.bit_length as usize, 1);
        Ok(PublicParameters {
            identifier: identifier(&bytes),
            data,
            bp_gens,
        })
    }

    /// Restores parameters from their canonical encoding, validating them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let data: ParamsData = crypto::decode(bytes)
            .map_err(|e| Error::setup(e.to_string()))
            .context("cannot decode public parameters")?;
        Self::from_data(data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crypto::encode(&self.data)
    }

    /// Checks well-formedness of the parameters.
    pub fn validate(&self) -> Result<()> {
        validate(&self.data)
    }

    /// Content hash of the parameters, in hex.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    pub fn curve(&self) -> CurveId {
        self.data.curve
    }

    pub fn generators(&self) -> &PedersenGenerators {
        &self.data.pedersen_generators
    }

    /// Generators for range proofs over de-typed commitments.
    pub fn value_gens(&self) -> PedersenGens {
        self.data.pedersen_generators.value_gens()
    }

    pub fn bulletproof_gens(&self) -> &BulletproofGens {
        &self.bp_gens
    }

    pub fn range_proof_params(&self) -> &RangeProofParams {
        &self.data.range_proof_params
    }

    pub fn bit_length(&self) -> usize {
        self.data.range_proof_params.bit_length as usize
    }

    /// Largest value a token may carry.
    pub fn max_value(&self) -> u64 {
        match self.bit_length() {
            64 => u64::max_value(),
            bits => (1 << bits) - 1,
        }
    }

    pub fn issuers(&self) -> &[Identity] {
        &self.data.issuers
    }

    pub fn auditors(&self) -> &[Identity] {
        &self.data.auditors
    }

    pub fn is_issuer(&self, identity: &Identity) -> bool {
        self.data.issuers.contains(identity)
    }

    pub fn is_auditor(&self, identity: &Identity) -> bool {
        self.data.auditors.contains(identity)
    }
}

impl Default for PublicParameters {
    /// Parameters with default generators, the default bit length and no issuers or auditors.
    fn default() -> Self {
        let data = ParamsData {
            label: PARAMS_LABEL.to_owned(),
            curve: CurveId::Ristretto255,
            pedersen_generators: PedersenGenerators::default(),
            range_proof_params: RangeProofParams {
                bit_length: DEFAULT_BIT_LENGTH as u64,
                number_of_rounds: DEFAULT_BIT_LENGTH.trailing_zeros() as u64,
            },
            issuers: vec![],
            auditors: vec![],
        };
        let bytes = crypto::encode(&data).unwrap_or_default();
        PublicParameters {
            identifier: identifier(&bytes),
            bp_gens: BulletproofGens::new(DEFAULT_BIT_LENGTH, 1),
            data,
        }
    }
}

fn validate(data: &ParamsData) -> Result<()> {
    if data.label != PARAMS_LABEL {
        return Err(Error::setup(format!("unknown parameters label `{}`", data.label)));
    }
    data.pedersen_generators.validate()?;
    data.range_proof_params.validate()?;
    if data.issuers.iter().chain(&data.auditors).any(Identity::is_none) {
        return Err(Error::setup("empty issuer or auditor identity"));
    }
    Ok(())
}

fn identifier(bytes: &[u8]) -> String {
    let mut len = [0_u8; 8];
    LittleEndian::write_u64(&mut len, bytes.len() as u64);
    let digest = Sha256::new()
        .chain_update(PARAMS_LABEL.as_bytes())
        .chain_update(&len)
        .chain_update(bytes)
        .finalize();
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_roundtrip() {
        let issuer = Identity::from(b"issuer".to_vec());
        let auditor = Identity::from(b"auditor".to_vec());
        let pp = PublicParameters::setup(32, vec![issuer.clone()], vec![auditor.clone()]).unwrap();
        assert_eq!(pp.range_proof_params().number_of_rounds, 5);
        assert_eq!(pp.max_value(), u64::from(u32::max_value()));
        assert!(pp.is_issuer(&issuer));
        assert!(!pp.is_issuer(&auditor));
        assert!(pp.is_auditor(&auditor));

        let bytes = pp.to_bytes().unwrap();
        let restored = PublicParameters::from_bytes(&bytes).unwrap();
        assert_eq!(restored, pp);
        assert_eq!(restored.identifier(), pp.identifier());
        assert_eq!(pp.identifier().len(), 64);

        let other = PublicParameters::setup(32, vec![issuer], vec![]).unwrap();
        assert_ne!(other.identifier(), pp.identifier());
    }

    #[test]
    fn default_parameters_are_valid() {
        let pp = PublicParameters::default();
        pp.validate().unwrap();
        assert_eq!(pp.bit_length(), DEFAULT_BIT_LENGTH);
        assert_eq!(pp.max_value(), u64::max_value());
        let restored = PublicParameters::from_bytes(&pp.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.identifier(), pp.identifier());
    }

    #[test]
    fn malformed_parameters_are_rejected() {
        assert!(PublicParameters::setup(12, vec![], vec![]).is_err());
        assert!(PublicParameters::setup(16, vec![Identity::default()], vec![]).is_err());

        let mut data = PublicParameters::setup(16, vec![], vec![]).unwrap().data;
        data.range_proof_params.number_of_rounds = 6;
        let err = PublicParameters::from_data(data.clone()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Setup);

        data.range_proof_params.number_of_rounds = 4;
        let g = *data.pedersen_generators.type_base();
        let mut bytes = crypto::encode(&data).unwrap();
        // Overwrite the value base with the type base.
        let g_bytes = g.compress().to_bytes();
        let position = bytes
            .windows(32)
            .position(|window| window == &g_bytes[..])
            .unwrap();
        bytes.copy_within(position..position + 32, position + 32);
        let err = PublicParameters::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Setup);

        assert!(PublicParameters::from_bytes(&bytes[..10]).is_err());
    }
}
