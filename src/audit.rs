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

//! Auditing of token requests.
//!
//! The auditor receives a token request together with the full [`TokenRequestMetadata`]
//! and checks that every commitment opens to the disclosed type and value, and that every
//! owner is the one described by the disclosed audit info. A request passing the check is
//! [endorsed](Auditor::endorse) by signing it.

use sha2::{Digest, Sha256};

use std::{fmt, sync::Arc};

use crate::{
    actions::{IssueAction, TransferAction},
    errors::{Error, Result, ResultExt},
    identity::{
        htlc::{Script, ScriptInfo},
        Deserializer, IdentityType, Matcher, SigningIdentity, TypedIdentity,
    },
    logging::Logger,
    metadata::{IssueMetadata, TokenRequestMetadata, TransferMetadata},
    params::PublicParameters,
    request::TokenRequest,
    token::{Token, TokenDataWitness, TokenMetadata},
};

/// Token together with the information that lets the auditor learn its content.
#[derive(Debug, Clone)]
pub struct AuditableToken {
    pub token: Token,
    /// Opening of the token data; inputs are audited without one.
    pub opening: Option<TokenDataWitness>,
    /// Audit info of the owner.
    pub owner_info: Vec<u8>,
}

impl AuditableToken {
    pub fn new(token: Token, owner_info: Vec<u8>, opening: Option<TokenDataWitness>) -> Self {
        AuditableToken {
            token,
            opening,
            owner_info,
        }
    }
}

/// Inspects tokens and owners of token requests.
pub struct Auditor {
    pp: Arc<PublicParameters>,
    deserializer: Arc<dyn Deserializer>,
    signer: Option<Arc<dyn SigningIdentity>>,
    logger: Logger,
}

impl fmt::Debug for Auditor {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Auditor")
            .field("pp", &self.pp.identifier())
            .field("signer", &self.signer.as_ref().map(|s| s.identity()))
            .finish()
    }
}

impl Auditor {
    pub fn new(
        pp: Arc<PublicParameters>,
        deserializer: Arc<dyn Deserializer>,
        signer: Option<Arc<dyn SigningIdentity>>,
        logger: &Logger,
    ) -> Self {
        let logger = logger.named("auditor").named(pp.identifier());
        Auditor {
            pp,
            deserializer,
            signer,
            logger,
        }
    }

    pub fn signer(&self) -> Option<&dyn SigningIdentity> {
        self.signer.as_ref().map(|signer| &**signer)
    }

    /// Checks `request` against its `metadata`.
    ///
    /// `input_tokens[k]` lists the tokens spent by the `k`-th transfer, as read from the ledger.
    pub fn check(
        &self,
        request: &TokenRequest,
        metadata: &TokenRequestMetadata,
        input_tokens: &[Vec<Token>],
        tx_id: &str,
    ) -> Result<()> {
        self.logger.debug(format_args!(
            "checking [{}] issues and [{}] transfers of [{}]",
            request.issues.len(),
            request.transfers.len(),
            tx_id
        ));

        let issued = audit_info_for_issues(&request.issues, &metadata.issues)
            .with_context(|| format!("failed getting audit info for issues for [{}]", tx_id))?;
        for (k, outputs) in issued.iter().enumerate() {
            self.inspect_outputs(outputs)
                .with_context(|| format!("audit of {} th issue in tx [{}] failed", k, tx_id))?;
        }

        let (inputs, transferred) =
            audit_info_for_transfers(&request.transfers, &metadata.transfers, input_tokens)
                .with_context(|| {
                    format!("failed getting audit info for transfers for [{}]", tx_id)
                })?;
        for (k, outputs) in transferred.iter().enumerate() {
            self.inspect_outputs(outputs)
                .with_context(|| format!("audit of {} th transfer in tx [{}] failed", k, tx_id))?;
        }
        for (k, inputs) in inputs.iter().enumerate() {
            self.inspect_inputs(inputs)
                .with_context(|| format!("audit of {} th transfer in tx [{}] failed", k, tx_id))?;
        }

        self.logger.debug(format_args!("check of [{}] succeeded", tx_id));
        Ok(())
    }

    /// Signs `request` bound to `tx_id`.
    pub fn endorse(&self, request: Option<&TokenRequest>, tx_id: &str) -> Result<Vec<u8>> {
        let request = request.ok_or_else(|| {
            Error::malformed(format!("audit of tx [{}] failed: token request is nil", tx_id))
        })?;
        let message = request
            .message_to_sign(tx_id)
            .with_context(|| format!("failed marshalling token request [{}]", tx_id))?;

        self.logger.debug(format_args!(
            "endorse [{}][{}]",
            hex::encode(Sha256::digest(&message)),
            tx_id
        ));
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::setup(format!("audit of tx [{}] failed: signer is nil", tx_id))
        })?;
        signer.sign(&message)
    }

    pub fn inspect_outputs(&self, outputs: &[AuditableToken]) -> Result<()> {
        for (i, output) in outputs.iter().enumerate() {
            self.inspect_output(output, i)
                .with_context(|| format!("failed inspecting output [{}]", i))?;
        }
        Ok(())
    }

    /// Checks that the output opens to the disclosed data and, unless redeemed, is owned by
    /// the identity described by its audit info.
    pub fn inspect_output(&self, output: &AuditableToken, index: usize) -> Result<()> {
        let opening = output
            .opening
            .as_ref()
            .ok_or_else(|| Error::malformed(format!("invalid output at index [{}]", index)))?;
        if !opening.opens(&output.token.data, self.pp.generators()) {
            return Err(Error::verification(format!(
                "output at index [{}] does not match the provided opening",
                index
            )));
        }
        if !output.token.is_redeem() {
            self.inspect_token_owner(output, index)
                .with_context(|| format!("failed inspecting output at index [{}]", index))?;
        }
        Ok(())
    }

    pub fn inspect_inputs(&self, inputs: &[AuditableToken]) -> Result<()> {
        for (i, input) in inputs.iter().enumerate() {
            if !input.token.is_redeem() {
                self.inspect_token_owner(input, i)
                    .with_context(|| format!("failed inspecting input at index [{}]", i))?;
            }
        }
        Ok(())
    }

    /// Checks that the audit info of `token` describes its owner.
    pub fn inspect_token_owner(&self, token: &AuditableToken, index: usize) -> Result<()> {
        if token.token.is_redeem() {
            return Err(Error::malformed(format!(
                "token at index [{}] is a redeem token, cannot inspect ownership",
                index
            )));
        }
        if token.owner_info.is_empty() {
            return Err(Error::malformed(format!(
                "failed to inspect owner at index [{}]: owner info is nil",
                index
            )));
        }
        let owner = TypedIdentity::parse(&token.token.owner)
            .with_context(|| format!("owner at index [{}] cannot be unwrapped", index))?;

        match owner.kind()? {
            IdentityType::X509 | IdentityType::Idemix => self
                .deserializer
                .owner_matcher(&token.token.owner, &token.owner_info)
                .with_context(|| format!("failed to get owner matcher for output [{}]", index))?
                .matches(&owner.identity)
                .with_context(|| {
                    format!("owner at index [{}] does not match the provided opening", index)
                }),
            IdentityType::HtlcScript => self.inspect_script_owner(token, index),
        }
    }

    fn inspect_script_owner(&self, token: &AuditableToken, index: usize) -> Result<()> {
        let script = Script::from_identity(&token.token.owner)
            .context("failed getting script sender and recipient")?;
        let info = ScriptInfo::from_bytes(&token.owner_info)?;

        let parties = [
            ("sender", &script.sender, &info.sender),
            ("recipient", &script.recipient, &info.recipient),
        ];
        for (role, party, audit_info) in &parties {
            let raw = TypedIdentity::parse(party)
                .with_context(|| format!("failed to retrieve raw owner from {} in script", role))?;
            self.deserializer
                .owner_matcher(party, audit_info)
                .with_context(|| format!("failed to get matcher for script {}", role))?
                .matches(&raw.identity)
                .with_context(|| {
                    format!(
                        "script {} of token at index [{}] does not match the provided opening",
                        role, index
                    )
                })?;
        }
        Ok(())
    }
}

fn opening(bytes: &[u8]) -> Result<TokenDataWitness> {
    TokenMetadata::from_bytes(bytes).map(TokenDataWitness::from)
}

/// Pairs issued outputs with their openings and receiver audit infos.
pub fn audit_info_for_issues(
    issues: &[Vec<u8>],
    metadata: &[IssueMetadata],
) -> Result<Vec<Vec<AuditableToken>>> {
    if issues.len() != metadata.len() {
        return Err(Error::malformed(
            "number of issues does not match number of provided metadata",
        ));
    }

    let mut result = Vec::with_capacity(issues.len());
    for (k, (raw, metadata)) in issues.iter().zip(metadata).enumerate() {
        let action = IssueAction::deserialize(raw)
            .with_context(|| format!("failed to deserialize issue action at index [{}]", k))?;
        if action.num_outputs() != metadata.outputs_metadata.len() {
            return Err(Error::malformed(
                "number of output does not match number of provided metadata",
            ));
        }

        let mut outputs = Vec::with_capacity(action.num_outputs());
        for (i, output) in action.outputs().iter().enumerate() {
            if output.is_redeem() {
                return Err(Error::malformed("issue cannot redeem tokens"));
            }
            let owner_info = metadata
                .receivers_audit_infos
                .get(i)
                .ok_or_else(|| Error::malformed("issue must have at least one receiver"))?;
            let opening = opening(&metadata.outputs_metadata[i])
                .with_context(|| format!("invalid metadata of output [{}]", i))?;
            outputs.push(AuditableToken::new(
                output.clone(),
                owner_info.clone(),
                Some(opening),
            ));
        }
        result.push(outputs);
    }
    Ok(result)
}

/// Pairs transfer inputs with sender audit infos, and outputs with their openings and output
/// audit infos. Input tokens must be the ones spent by the transfers.
pub fn audit_info_for_transfers(
    transfers: &[Vec<u8>],
    metadata: &[TransferMetadata],
    inputs: &[Vec<Token>],
) -> Result<(Vec<Vec<AuditableToken>>, Vec<Vec<AuditableToken>>)> {
    if transfers.len() != metadata.len() {
        return Err(Error::malformed(
            "number of transfers does not match the number of provided metadata",
        ));
    }
    if inputs.len() != metadata.len() {
        return Err(Error::malformed(
            "number of inputs does not match the number of provided metadata",
        ));
    }

    let mut auditable_inputs = Vec::with_capacity(transfers.len());
    let mut outputs = Vec::with_capacity(transfers.len());
    for (k, metadata) in metadata.iter().enumerate() {
        let action = TransferAction::deserialize(&transfers[k])
            .with_context(|| format!("failed to deserialize transfer action at index [{}]", k))?;
        let tokens = &inputs[k];

        if metadata.sender_audit_infos.len() != tokens.len() {
            return Err(Error::malformed(format!(
                "number of inputs does not match the number of senders [{}]!=[{}]",
                metadata.sender_audit_infos.len(),
                tokens.len()
            )));
        }
        if action.num_inputs() != tokens.len() {
            return Err(Error::malformed(format!(
                "number of inputs does not match the number of spent tokens [{}]!=[{}]",
                action.num_inputs(),
                tokens.len()
            )));
        }
        let mut transfer_inputs = Vec::with_capacity(tokens.len());
        for (i, (token, input)) in tokens.iter().zip(action.inputs()).enumerate() {
            if *token != input.token {
                return Err(Error::verification(format!(
                    "input[{}][{}] does not match the token spent by the transfer",
                    k, i
                )));
            }
            transfer_inputs.push(AuditableToken::new(
                token.clone(),
                metadata.sender_audit_infos[i].clone(),
                None,
            ));
        }
        auditable_inputs.push(transfer_inputs);

        if action.num_outputs() != metadata.outputs_metadata.len()
            || action.num_outputs() != metadata.outputs_audit_info.len()
        {
            return Err(Error::malformed(format!(
                "number of outputs does not match the number of output metadata [{}]!=[{}]",
                action.num_outputs(),
                metadata.outputs_metadata.len()
            )));
        }
        let mut transfer_outputs = Vec::with_capacity(action.num_outputs());
        for (i, output) in action.outputs().iter().enumerate() {
            let opening = opening(&metadata.outputs_metadata[i])
                .with_context(|| format!("invalid metadata of output [{}]", i))?;
            transfer_outputs.push(AuditableToken::new(
                output.clone(),
                metadata.outputs_audit_info[i].clone(),
                Some(opening),
            ));
        }
        outputs.push(transfer_outputs);
    }
    Ok((auditable_inputs, outputs))
}
