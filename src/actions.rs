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

//! Issue and transfer actions.
//!
//! Actions are the units of a [`TokenRequest`]: an [`IssueAction`] creates new tokens
//! on behalf of an authorized issuer, a [`TransferAction`] spends existing tokens and creates
//! new ones of the same type and total value. Both carry a zero-knowledge proof produced by
//! the [`issue`](crate::issue) or [`transfer`](crate::transfer) prover.
//!
//! [`TokenRequest`]: crate::request::TokenRequest

use std::collections::{BTreeMap, HashSet};

use crate::{
    crypto::{self, Commitment},
    errors::{Error, Result, ResultExt},
    identity::Identity,
    request::TokenRequest,
    token::{Token, TokenId},
    MAX_OUTPUTS,
};

fn outputs(commitments: Vec<Commitment>, owners: Vec<Identity>) -> Result<Vec<Token>> {
    if commitments.len() != owners.len() {
        return Err(Error::malformed(format!(
            "number of owners does not match number of tokens [{}]!=[{}]",
            owners.len(),
            commitments.len()
        )));
    }
    Ok(owners
        .into_iter()
        .zip(commitments)
        .map(|(owner, data)| Token::new(owner, data))
        .collect())
}

fn check_outputs(outputs: &[Token]) -> Result<()> {
    if outputs.is_empty() {
        return Err(Error::malformed("there are no outputs"));
    }
    if outputs.len() > MAX_OUTPUTS {
        return Err(Error::malformed(format!(
            "too many outputs: {} > {}",
            outputs.len(),
            MAX_OUTPUTS
        )));
    }
    Ok(())
}

/// Action creating new tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAction {
    issuer: Identity,
    outputs: Vec<Token>,
    proof: Vec<u8>,
    metadata: BTreeMap<String, Vec<u8>>,
}

impl IssueAction {
    /// Creates an issue of tokens with data `commitments` owned by `owners`.
    pub fn new(
        issuer: Identity,
        commitments: Vec<Commitment>,
        owners: Vec<Identity>,
        proof: Vec<u8>,
    ) -> Result<Self> {
        Ok(IssueAction {
            issuer,
            outputs: outputs(commitments, owners)?,
            proof,
            metadata: BTreeMap::new(),
        })
    }

    pub fn issuer(&self) -> &Identity {
        &self.issuer
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn outputs(&self) -> &[Token] {
        &self.outputs
    }

    pub fn serialized_outputs(&self) -> Result<Vec<Vec<u8>>> {
        self.outputs.iter().map(Token::to_bytes).collect()
    }

    pub fn commitments(&self) -> Vec<Commitment> {
        self.outputs.iter().map(|token| token.data).collect()
    }

    pub fn is_redeem_at(&self, index: usize) -> bool {
        self.outputs.get(index).map_or(false, Token::is_redeem)
    }

    pub fn proof(&self) -> &[u8] {
        &self.proof
    }

    pub fn metadata(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: &str, value: Vec<u8>) {
        self.metadata.insert(key.to_owned(), value);
    }

    /// Issues have no extra signers.
    pub fn extra_signers(&self) -> &[Identity] {
        &[]
    }

    /// Checks structural well-formedness.
    pub fn validate(&self) -> Result<()> {
        if self.issuer.is_none() {
            return Err(Error::malformed("issuer is not set"));
        }
        check_outputs(&self.outputs)?;
        if let Some(i) = self.outputs.iter().position(Token::is_redeem) {
            return Err(Error::malformed(format!(
                "issue cannot redeem tokens: output [{}] has no owner",
                i
            )));
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot deserialize issue action")
    }
}

/// Input of a transfer: the spent token and its ledger identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInput {
    pub id: TokenId,
    pub token: Token,
}

/// Action spending existing tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferAction {
    inputs: Vec<ActionInput>,
    outputs: Vec<Token>,
    proof: Vec<u8>,
    metadata: BTreeMap<String, Vec<u8>>,
    extra_signers: Vec<Identity>,
}

impl TransferAction {
    /// Creates a transfer spending `input_tokens` with identifiers `inputs`.
    pub fn new(
        inputs: Vec<TokenId>,
        input_tokens: Vec<Token>,
        commitments: Vec<Commitment>,
        owners: Vec<Identity>,
        proof: Vec<u8>,
    ) -> Result<Self> {
        if inputs.len() != input_tokens.len() {
            return Err(Error::malformed(format!(
                "number of input ids does not match number of input tokens [{}]!=[{}]",
                inputs.len(),
                input_tokens.len()
            )));
        }
        let inputs = inputs
            .into_iter()
            .zip(input_tokens)
            .map(|(id, token)| ActionInput { id, token })
            .collect();
        Ok(TransferAction {
            inputs,
            outputs: outputs(commitments, owners)?,
            proof,
            metadata: BTreeMap::new(),
            extra_signers: vec![],
        })
    }

    pub fn inputs(&self) -> &[ActionInput] {
        &self.inputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_ids(&self) -> Vec<TokenId> {
        self.inputs.iter().map(|input| input.id.clone()).collect()
    }

    pub fn input_commitments(&self) -> Vec<Commitment> {
        self.inputs.iter().map(|input| input.token.data).collect()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn outputs(&self) -> &[Token] {
        &self.outputs
    }

    pub fn serialized_outputs(&self) -> Result<Vec<Vec<u8>>> {
        self.outputs.iter().map(Token::to_bytes).collect()
    }

    pub fn commitments(&self) -> Vec<Commitment> {
        self.outputs.iter().map(|token| token.data).collect()
    }

    pub fn is_redeem_at(&self, index: usize) -> bool {
        self.outputs.get(index).map_or(false, Token::is_redeem)
    }

    pub fn is_redeem(&self) -> bool {
        self.outputs.iter().any(Token::is_redeem)
    }

    pub fn proof(&self) -> &[u8] {
        &self.proof
    }

    pub fn metadata(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: &str, value: Vec<u8>) {
        self.metadata.insert(key.to_owned(), value);
    }

    pub fn extra_signers(&self) -> &[Identity] {
        &self.extra_signers
    }

    pub fn add_extra_signer(&mut self, signer: Identity) {
        self.extra_signers.push(signer);
    }

    /// Checks structural well-formedness.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(Error::malformed("there are no inputs"));
        }
        if self.inputs.len() > MAX_OUTPUTS {
            return Err(Error::malformed(format!(
                "too many inputs: {} > {}",
                self.inputs.len(),
                MAX_OUTPUTS
            )));
        }
        check_outputs(&self.outputs)?;

        let mut seen = HashSet::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !seen.insert(&input.id) {
                return Err(Error::malformed(format!("input {} is spent twice", input.id)));
            }
            if input.token.is_redeem() {
                return Err(Error::malformed(format!("input {} has no owner", input.id)));
            }
        }
        if self.extra_signers.iter().any(Identity::is_none) {
            return Err(Error::malformed("extra signer is not set"));
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot deserialize transfer action")
    }
}

/// Deserializes the actions of a token request.
pub trait ActionDeserializer: Send + Sync {
    fn deserialize_actions(
        &self,
        request: &TokenRequest,
    ) -> Result<(Vec<IssueAction>, Vec<TransferAction>)>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultActionDeserializer;

impl ActionDeserializer for DefaultActionDeserializer {
    fn deserialize_actions(
        &self,
        request: &TokenRequest,
    ) -> Result<(Vec<IssueAction>, Vec<TransferAction>)> {
        let issues = request
            .issues
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                IssueAction::deserialize(bytes).with_context(|| format!("issue [{}]", i))
            })
            .collect::<Result<Vec<_>>>()?;
        let transfers = request
            .transfers
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                TransferAction::deserialize(bytes).with_context(|| format!("transfer [{}]", i))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((issues, transfers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crypto::PedersenGenerators, token::TokenDataWitness};

    fn commitments(n: u64) -> Vec<Commitment> {
        let gens = PedersenGenerators::default();
        (0..n)
            .map(|i| TokenDataWitness::new("USD", i).commitment(&gens))
            .collect()
    }

    fn owner(byte: u8) -> Identity {
        Identity::new(vec![byte; 4])
    }

    #[test]
    fn issue_action_serialization() {
        let mut action =
            IssueAction::new(owner(1), commitments(2), vec![owner(2), owner(3)], vec![7; 10])
                .unwrap();
        action.set_metadata("key", b"value".to_vec());
        action.validate().unwrap();

        let bytes = action.serialize().unwrap();
        let restored = IssueAction::deserialize(&bytes).unwrap();
        assert_eq!(restored, action);
        assert_eq!(restored.serialize().unwrap(), bytes);
        assert_eq!(restored.num_outputs(), 2);
        assert_eq!(restored.serialized_outputs().unwrap().len(), 2);
        assert!(!restored.is_redeem_at(0));
        assert!(!restored.is_redeem_at(5));

        assert!(IssueAction::deserialize(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn issue_action_checks() {
        assert!(IssueAction::new(owner(1), commitments(2), vec![owner(2)], vec![]).is_err());

        let action =
            IssueAction::new(owner(1), commitments(1), vec![Identity::default()], vec![]).unwrap();
        assert!(action.is_redeem_at(0));
        assert!(action.validate().is_err());

        let action = IssueAction::new(owner(1), vec![], vec![], vec![]).unwrap();
        assert!(action.validate().is_err());
    }

    #[test]
    fn transfer_action_checks() {
        let inputs = commitments(2);
        let input_tokens: Vec<_> = inputs.iter().map(|c| Token::new(owner(1), *c)).collect();
        let ids = vec![TokenId::new("tx", 0), TokenId::new("tx", 0)];

        let action = TransferAction::new(
            ids,
            input_tokens.clone(),
            commitments(1),
            vec![owner(2)],
            vec![],
        )
        .unwrap();
        let err = action.validate().unwrap_err();
        assert!(err.to_string().contains("spent twice"));

        let ids = vec![TokenId::new("tx", 0), TokenId::new("tx", 1)];
        let mut action = TransferAction::new(
            ids.clone(),
            input_tokens.clone(),
            commitments(1),
            vec![owner(2)],
            vec![],
        )
        .unwrap();
        action.add_extra_signer(owner(9));
        action.validate().unwrap();
        assert_eq!(action.input_ids(), ids);
        assert_eq!(action.input_commitments(), inputs);
        let restored = TransferAction::deserialize(&action.serialize().unwrap()).unwrap();
        assert_eq!(restored, action);

        assert!(TransferAction::new(ids, input_tokens[..1].to_vec(), vec![], vec![], vec![])
            .is_err());
    }
}
