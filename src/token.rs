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

//! Tokens and their openings.

use curve25519::scalar::Scalar;
use rand::thread_rng;

use std::fmt;

use crate::{
    crypto::{self, random_scalar, Commitment, PedersenGenerators},
    errors::{Result, ResultExt},
    identity::Identity,
};

/// Identifier of a ledger output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId {
    pub tx_id: String,
    pub index: u64,
}

impl TokenId {
    pub fn new(tx_id: &str, index: u64) -> Self {
        TokenId {
            tx_id: tx_id.to_owned(),
            index,
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "[{}:{}]", self.tx_id, self.index)
    }
}

/// Token as stored on the ledger: an owner and a commitment to the token type and value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub owner: Identity,
    pub data: Commitment,
}

impl Token {
    pub fn new(owner: Identity, data: Commitment) -> Self {
        Token { owner, data }
    }

    /// Returns `true` if the token has no owner, i.e., it is redeemed.
    pub fn is_redeem(&self) -> bool {
        self.owner.is_none()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot decode token")
    }
}

/// Opening of token data known to the prover.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDataWitness {
    pub token_type: String,
    pub value: u64,
    pub blinding_factor: Scalar,
}

impl fmt::Debug for TokenDataWitness {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("TokenDataWitness")
            .field("token_type", &self.token_type)
            .field("value", &self.value)
            .finish()
    }
}

impl TokenDataWitness {
    /// Creates a witness with a random blinding factor.
    pub fn new(token_type: &str, value: u64) -> Self {
        TokenDataWitness {
            token_type: token_type.to_owned(),
            value,
            blinding_factor: random_scalar(&mut thread_rng()),
        }
    }

    pub fn commitment(&self, gens: &PedersenGenerators) -> Commitment {
        gens.commit_token(&self.token_type, self.value, &self.blinding_factor)
    }

    /// Checks that the witness opens `commitment`.
    pub fn opens(&self, commitment: &Commitment, gens: &PedersenGenerators) -> bool {
        self.commitment(gens) == *commitment
    }
}

impl From<TokenMetadata> for TokenDataWitness {
    fn from(metadata: TokenMetadata) -> Self {
        TokenDataWitness {
            token_type: metadata.token_type,
            value: metadata.value,
            blinding_factor: metadata.blinding_factor,
        }
    }
}

/// Opening of an output disclosed to its recipient and the auditor.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub token_type: String,
    pub value: u64,
    pub blinding_factor: Scalar,
    /// Issuer of the token, for issued outputs.
    pub issuer: Option<Identity>,
}

impl fmt::Debug for TokenMetadata {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("TokenMetadata")
            .field("token_type", &self.token_type)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl TokenMetadata {
    pub fn new(witness: &TokenDataWitness, issuer: Option<Identity>) -> Self {
        TokenMetadata {
            token_type: witness.token_type.clone(),
            value: witness.value,
            blinding_factor: witness.blinding_factor,
            issuer,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot decode token metadata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn witness_opens_commitment() {
        let gens = PedersenGenerators::default();
        let witness = TokenDataWitness::new("USD", 10);
        let commitment = witness.commitment(&gens);
        assert!(witness.opens(&commitment, &gens));

        let mut other = witness.clone();
        other.value = 11;
        assert!(!other.opens(&commitment, &gens));

        let metadata = TokenMetadata::new(&witness, None);
        let restored = TokenMetadata::from_bytes(&metadata.to_bytes().unwrap()).unwrap();
        assert!(TokenDataWitness::from(restored).opens(&commitment, &gens));
    }

    #[test]
    fn redeem_tokens_have_no_owner() {
        let gens = PedersenGenerators::default();
        let data = TokenDataWitness::new("USD", 1).commitment(&gens);
        let token = Token::new(Identity::default(), data);
        assert!(token.is_redeem());
        let token = Token::new(Identity::new(vec![1]), data);
        assert!(!token.is_redeem());
        assert_eq!(Token::from_bytes(&token.to_bytes().unwrap()).unwrap(), token);
    }

    #[test]
    fn debug_output_hides_blinding_factors() {
        let witness = TokenDataWitness::new("USD", 10);
        let debug = format!("{:?}", TokenMetadata::new(&witness, None));
        assert!(!debug.contains("blinding"));
        assert!(!debug.contains("value"));
    }
}
