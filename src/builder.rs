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

//! Construction of issue and transfer actions together with their metadata.
//!
//! # Usage
//!
//! An [`Issuer`] creates tokens of a given type; a [`Sender`] spends tokens it holds the
//! openings of. Both return the action to put into a [`TokenRequest`] and the metadata to
//! hand to the auditor and (after [filtering]) to the recipients. Signing the request is
//! left to the caller.
//!
//! [`TokenRequest`]: crate::request::TokenRequest
//! [filtering]: crate::metadata::Metadata::filter_by

use std::{fmt, sync::Arc};

use crate::{
    actions::{IssueAction, TransferAction},
    crypto::Commitment,
    errors::{Error, Result, ResultExt},
    identity::{
        htlc::{Script, ScriptInfo},
        Identity,
    },
    issue,
    metadata::{IssueMetadata, TransferMetadata},
    params::PublicParameters,
    token::{Token, TokenDataWitness, TokenId, TokenMetadata},
    transfer,
};

/// Owner and value of a newly created output.
#[derive(Clone, PartialEq, Eq)]
pub struct Recipient {
    pub owner: Identity,
    pub value: u64,
    pub audit_info: Vec<u8>,
}

impl fmt::Debug for Recipient {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Recipient")
            .field("owner", &self.owner)
            .finish()
    }
}

impl Recipient {
    pub fn new(owner: Identity, value: u64, audit_info: Vec<u8>) -> Self {
        Recipient {
            owner,
            value,
            audit_info,
        }
    }

    /// Output without an owner, removing `value` from circulation.
    pub fn redeem(value: u64) -> Self {
        Recipient::new(Identity::default(), value, vec![])
    }

    /// Output locked by `script`, audited through the audit infos of its sender and
    /// recipient.
    pub fn script(
        script: &Script,
        value: u64,
        sender_audit_info: Vec<u8>,
        recipient_audit_info: Vec<u8>,
    ) -> Result<Self> {
        let info = ScriptInfo {
            sender: sender_audit_info,
            recipient: recipient_audit_info,
        };
        Ok(Recipient::new(script.to_identity()?, value, info.to_bytes()?))
    }
}

/// Token held by a sender together with its opening.
#[derive(Debug, Clone)]
pub struct OwnedToken {
    pub id: TokenId,
    pub token: Token,
    pub metadata: TokenMetadata,
    /// Audit info of the token owner.
    pub audit_info: Vec<u8>,
}

impl OwnedToken {
    pub fn new(id: TokenId, token: Token, metadata: TokenMetadata, audit_info: Vec<u8>) -> Self {
        OwnedToken {
            id,
            token,
            metadata,
            audit_info,
        }
    }

    fn witness(&self) -> TokenDataWitness {
        TokenDataWitness::from(self.metadata.clone())
    }
}

fn outputs(
    token_type: &str,
    recipients: &[Recipient],
    pp: &PublicParameters,
) -> Result<(Vec<TokenDataWitness>, Vec<Commitment>)> {
    if recipients.is_empty() {
        return Err(Error::malformed("no recipients specified"));
    }
    if recipients.len() > crate::MAX_OUTPUTS {
        return Err(Error::malformed(format!(
            "too many recipients: {} > {}",
            recipients.len(),
            crate::MAX_OUTPUTS
        )));
    }
    if let Some(i) = recipients.iter().position(|r| r.value > pp.max_value()) {
        return Err(Error::malformed(format!(
            "value of output [{}] exceeds the maximum {}",
            i,
            pp.max_value()
        )));
    }

    let witnesses: Vec<_> = recipients
        .iter()
        .map(|r| TokenDataWitness::new(token_type, r.value))
        .collect();
    let commitments = witnesses
        .iter()
        .map(|w| w.commitment(pp.generators()))
        .collect();
    Ok((witnesses, commitments))
}

fn outputs_metadata(
    witnesses: &[TokenDataWitness],
    issuer: Option<&Identity>,
) -> Result<Vec<Vec<u8>>> {
    witnesses
        .iter()
        .map(|w| TokenMetadata::new(w, issuer.cloned()).to_bytes())
        .collect()
}

/// Creates issue actions on behalf of an issuer.
#[derive(Debug, Clone)]
pub struct Issuer {
    identity: Identity,
    pp: Arc<PublicParameters>,
}

impl Issuer {
    pub fn new(identity: Identity, pp: Arc<PublicParameters>) -> Self {
        Issuer { identity, pp }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Issues tokens of `token_type` to `recipients`, with fresh blinding factors.
    pub fn issue(
        &self,
        token_type: &str,
        recipients: &[Recipient],
    ) -> Result<(IssueAction, IssueMetadata)> {
        if token_type.is_empty() {
            return Err(Error::malformed("token type is empty"));
        }
        if recipients.iter().any(|r| r.owner.is_none()) {
            return Err(Error::malformed("issue cannot redeem tokens"));
        }
        let (witnesses, commitments) = outputs(token_type, recipients, &self.pp)?;

        let proof = issue::Prover::new(&witnesses, &commitments, &self.pp)
            .and_then(|prover| prover.prove())
            .context("failed to generate issue proof")?;
        let owners = recipients.iter().map(|r| r.owner.clone()).collect();
        let action = IssueAction::new(self.identity.clone(), commitments, owners, proof)?;

        let metadata = IssueMetadata {
            issuer: self.identity.clone(),
            token_ids: vec![],
            outputs_metadata: outputs_metadata(&witnesses, Some(&self.identity))?,
            receivers: recipients.iter().map(|r| r.owner.clone()).collect(),
            receivers_audit_infos: recipients.iter().map(|r| r.audit_info.clone()).collect(),
            extra_signers: vec![],
        };
        Ok((action, metadata))
    }
}

/// Creates transfer actions spending tokens of the caller.
#[derive(Debug, Clone)]
pub struct Sender {
    pp: Arc<PublicParameters>,
}

impl Sender {
    pub fn new(pp: Arc<PublicParameters>) -> Self {
        Sender { pp }
    }

    /// Transfers `inputs` to `recipients`.
    ///
    /// All inputs must carry the same type and their total value must equal the total value
    /// of the outputs.
    pub fn transfer(
        &self,
        inputs: &[OwnedToken],
        recipients: &[Recipient],
    ) -> Result<(TransferAction, TransferMetadata)> {
        let first = inputs
            .first()
            .ok_or_else(|| Error::malformed("no inputs specified"))?;
        let token_type = first.metadata.token_type.clone();

        let input_witnesses: Vec<_> = inputs.iter().map(OwnedToken::witness).collect();
        for (i, (input, witness)) in inputs.iter().zip(&input_witnesses).enumerate() {
            if witness.token_type != token_type {
                return Err(Error::malformed(format!(
                    "input [{}] has type [{}], expected [{}]",
                    i, witness.token_type, token_type
                )));
            }
            if !witness.opens(&input.token.data, self.pp.generators()) {
                return Err(Error::malformed(format!(
                    "metadata of input [{}] does not open the token",
                    i
                )));
            }
        }

        let input_total: u128 = inputs.iter().map(|t| u128::from(t.metadata.value)).sum();
        let output_total: u128 = recipients.iter().map(|r| u128::from(r.value)).sum();
        if input_total != output_total {
            return Err(Error::malformed(format!(
                "input and output values do not balance: {} != {}",
                input_total, output_total
            )));
        }

        let (output_witnesses, commitments) = outputs(&token_type, recipients, &self.pp)?;
        let input_commitments: Vec<_> = inputs.iter().map(|t| t.token.data).collect();
        let proof = transfer::Prover::new(
            &input_witnesses,
            &input_commitments,
            &output_witnesses,
            &commitments,
            &self.pp,
        )
        .and_then(|prover| prover.prove())
        .context("failed to generate transfer proof")?;

        let action = TransferAction::new(
            inputs.iter().map(|t| t.id.clone()).collect(),
            inputs.iter().map(|t| t.token.clone()).collect(),
            commitments,
            recipients.iter().map(|r| r.owner.clone()).collect(),
            proof,
        )?;

        let audit_infos: Vec<_> = recipients.iter().map(|r| r.audit_info.clone()).collect();
        let metadata = TransferMetadata {
            token_ids: inputs.iter().map(|t| t.id.clone()).collect(),
            senders: inputs.iter().map(|t| t.token.owner.clone()).collect(),
            sender_audit_infos: inputs.iter().map(|t| t.audit_info.clone()).collect(),
            outputs_metadata: outputs_metadata(&output_witnesses, None)?,
            outputs_audit_info: audit_infos.clone(),
            receivers: recipients.iter().map(|r| r.owner.clone()).collect(),
            receiver_audit_infos: audit_infos,
            extra_signers: vec![],
        };
        Ok((action, metadata))
    }
}
