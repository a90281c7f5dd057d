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

//! Validation of token requests.
//!
//! The [`Validator`] checks auditor signatures, deserializes the actions of a request and runs
//! an ordered list of rules on every action. Rule order is part of the protocol: signatures are
//! consumed by a [`SignatureProvider`] in the order the rules ask for them, i.e., issuers first,
//! then, per transfer, input owners followed by extra signers.

use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    actions::{ActionDeserializer, DefaultActionDeserializer, IssueAction, TransferAction},
    errors::{Error, Result, ResultExt},
    identity::{
        htlc::{claim_key, Script},
        Identity, IdentityDeserializer, SignatureVerifier,
    },
    issue,
    logging::Logger,
    params::PublicParameters,
    request::TokenRequest,
    storage::Ledger,
    token::TokenId,
    transfer,
};

/// Hands out the signatures of a request one by one, checking each against the expected signer.
pub struct SignatureProvider<'a> {
    message: Vec<u8>,
    signatures: &'a [Vec<u8>],
    cursor: usize,
    verifier: &'a dyn SignatureVerifier,
}

impl<'a> SignatureProvider<'a> {
    pub fn new(
        message: Vec<u8>,
        signatures: &'a [Vec<u8>],
        verifier: &'a dyn SignatureVerifier,
    ) -> Self {
        SignatureProvider {
            message,
            signatures,
            cursor: 0,
            verifier,
        }
    }

    /// Consumes the next signature and checks that `identity` produced it.
    pub fn has_been_signed_by(&mut self, identity: &Identity) -> Result<()> {
        let signature = self.signatures.get(self.cursor).ok_or_else(|| {
            Error::verification(format!("signature [{}] is missing", self.cursor))
        })?;
        self.cursor += 1;
        self.verifier
            .verify(identity, &self.message, signature)
            .map_err(|e| Error::verification(e.to_string()))
            .with_context(|| format!("signature [{}] is not valid", self.cursor - 1))
    }

    pub fn remaining(&self) -> usize {
        self.signatures.len() - self.cursor
    }
}

/// State shared by rules while validating one request.
pub struct Context<'a> {
    pub pp: &'a PublicParameters,
    pub ledger: &'a dyn Ledger,
    pub anchor: &'a str,
    pub signatures: SignatureProvider<'a>,
    /// Inputs spent by the transfers validated so far.
    pub spent: HashSet<TokenId>,
    pub logger: &'a Logger,
}

/// Rule applied to every issue action.
pub trait IssueRule: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, ctx: &mut Context, action: &IssueAction) -> Result<()>;
}

/// Rule applied to every transfer action.
pub trait TransferRule: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, ctx: &mut Context, action: &TransferAction) -> Result<()>;
}

/// Well-formedness, issuer authorization, issuer signature and issue proof.
#[derive(Debug, Default)]
pub struct IssueValidate;

impl IssueRule for IssueValidate {
    fn name(&self) -> &str {
        "IssueValidate"
    }

    fn validate(&self, ctx: &mut Context, action: &IssueAction) -> Result<()> {
        action.validate()?;
        let issuer = action.issuer();
        if !ctx.pp.issuers().is_empty() && !ctx.pp.is_issuer(issuer) {
            return Err(Error::verification(format!(
                "issuer {:?} is not authorized",
                issuer
            )));
        }
        ctx.signatures
            .has_been_signed_by(issuer)
            .context("failed verifying issuer signature")?;
        issue::Verifier::new(&action.commitments(), ctx.pp).verify(action.proof())
    }
}

/// Well-formedness; inputs must be unspent on the ledger, match the embedded tokens and
/// not be spent by another transfer of the same request.
#[derive(Debug, Default)]
pub struct TransferActionValidate;

impl TransferRule for TransferActionValidate {
    fn name(&self) -> &str {
        "TransferActionValidate"
    }

    fn validate(&self, ctx: &mut Context, action: &TransferAction) -> Result<()> {
        action.validate()?;
        for input in action.inputs() {
            if !ctx.spent.insert(input.id.clone()) {
                return Err(Error::verification(format!(
                    "input {} is spent twice in [{}]",
                    input.id, ctx.anchor
                )));
            }
            let stored = ctx
                .ledger
                .get_state(&input.id)?
                .ok_or_else(|| Error::verification(format!("input {} does not exist", input.id)))?;
            if stored != input.token.to_bytes()? {
                return Err(Error::verification(format!(
                    "input {} does not match the ledger state",
                    input.id
                )));
            }
        }
        Ok(())
    }
}

/// Input owners (or the script party entitled at ledger time) and extra signers signed.
#[derive(Debug, Default)]
pub struct TransferSignatureValidate;

impl TransferRule for TransferSignatureValidate {
    fn name(&self) -> &str {
        "TransferSignatureValidate"
    }

    fn validate(&self, ctx: &mut Context, action: &TransferAction) -> Result<()> {
        let now = ctx.ledger.time();
        for input in action.inputs() {
            let owner = &input.token.owner;
            let result = if Script::is_script(owner) {
                let script = Script::from_identity(owner)?;
                ctx.signatures.has_been_signed_by(script.spender(now))
            } else {
                ctx.signatures.has_been_signed_by(owner)
            };
            result.with_context(|| format!("input {} is not signed by its owner", input.id))?;
        }
        for (i, signer) in action.extra_signers().iter().enumerate() {
            ctx.signatures
                .has_been_signed_by(signer)
                .with_context(|| format!("extra signer [{}] did not sign", i))?;
        }
        Ok(())
    }
}

/// Transfer proof: same type, balance and range correctness.
#[derive(Debug, Default)]
pub struct TransferBalanceValidate;

impl TransferRule for TransferBalanceValidate {
    fn name(&self) -> &str {
        "TransferBalanceValidate"
    }

    fn validate(&self, ctx: &mut Context, action: &TransferAction) -> Result<()> {
        let inputs = action.input_commitments();
        let outputs = action.commitments();
        transfer::Verifier::new(&inputs, &outputs, ctx.pp).verify(action.proof())
    }
}

/// Hash time lock rules for script inputs and outputs.
#[derive(Debug, Default)]
pub struct TransferHtlcValidate;

impl TransferRule for TransferHtlcValidate {
    fn name(&self) -> &str {
        "TransferHtlcValidate"
    }

    fn validate(&self, ctx: &mut Context, action: &TransferAction) -> Result<()> {
        let now = ctx.ledger.time();
        for input in action.inputs() {
            if !Script::is_script(&input.token.owner) {
                continue;
            }
            let script = Script::from_identity(&input.token.owner)?;
            if action.num_outputs() != 1 {
                return Err(Error::verification(
                    "an htlc script only transfers the ownership of a token",
                ));
            }
            let output = &action.outputs()[0];

            if now < script.deadline {
                if output.owner != script.recipient {
                    return Err(Error::verification(format!(
                        "output of claim of input {} is not owned by the script recipient",
                        input.id
                    )));
                }
                let pre_image = action
                    .metadata()
                    .get(&claim_key(&script.hash_info.hash))
                    .ok_or_else(|| Error::verification("claim pre-image is missing"))?;
                if !script.hash_info.is_pre_image(pre_image) {
                    return Err(Error::verification(
                        "claim pre-image does not match the script hash",
                    ));
                }
                ctx.logger.debug(format_args!(
                    "claim of input {} before deadline {}",
                    input.id, script.deadline
                ));
            } else {
                if output.owner != script.sender {
                    return Err(Error::verification(format!(
                        "output of reclaim of input {} is not owned by the script sender",
                        input.id
                    )));
                }
                ctx.logger.debug(format_args!(
                    "reclaim of input {} after deadline {}",
                    input.id, script.deadline
                ));
            }
        }

        for (i, output) in action.outputs().iter().enumerate() {
            if Script::is_script(&output.owner) {
                Script::from_identity(&output.owner)?
                    .validate(now)
                    .with_context(|| format!("invalid script at output [{}]", i))?;
            }
        }
        Ok(())
    }
}

/// Actions of a valid request.
#[derive(Debug, Clone)]
pub struct ValidatedActions {
    pub issues: Vec<IssueAction>,
    pub transfers: Vec<TransferAction>,
}

/// Validates token requests against public parameters and the ledger.
pub struct Validator {
    pp: Arc<PublicParameters>,
    verifier: Arc<dyn SignatureVerifier>,
    action_deserializer: Arc<dyn ActionDeserializer>,
    issue_rules: Vec<Box<dyn IssueRule>>,
    transfer_rules: Vec<Box<dyn TransferRule>>,
    logger: Logger,
}

impl fmt::Debug for Validator {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Validator")
            .field("pp", &self.pp.identifier())
            .field(
                "issue_rules",
                &self.issue_rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field(
                "transfer_rules",
                &self.transfer_rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Validator {
    /// Creates a validator with the default rules.
    pub fn new(pp: Arc<PublicParameters>, logger: &Logger) -> Self {
        let logger = logger.named("validator").named(pp.identifier());
        Validator {
            pp,
            verifier: Arc::new(IdentityDeserializer),
            action_deserializer: Arc::new(DefaultActionDeserializer),
            issue_rules: vec![Box::new(IssueValidate)],
            transfer_rules: vec![
                Box::new(TransferActionValidate),
                Box::new(TransferSignatureValidate),
                Box::new(TransferBalanceValidate),
                Box::new(TransferHtlcValidate),
            ],
            logger,
        }
    }

    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_action_deserializer(mut self, deserializer: Arc<dyn ActionDeserializer>) -> Self {
        self.action_deserializer = deserializer;
        self
    }

    /// Appends rules run after the default issue rules.
    pub fn with_extra_issue_rules(mut self, rules: Vec<Box<dyn IssueRule>>) -> Self {
        self.issue_rules.extend(rules);
        self
    }

    /// Appends rules run after the default transfer rules.
    pub fn with_extra_transfer_rules(mut self, rules: Vec<Box<dyn TransferRule>>) -> Self {
        self.transfer_rules.extend(rules);
        self
    }

    pub fn public_parameters(&self) -> &PublicParameters {
        &self.pp
    }

    /// Decodes and validates a serialized request.
    pub fn validate_bytes(
        &self,
        ledger: &dyn Ledger,
        anchor: &str,
        raw_request: &[u8],
    ) -> Result<ValidatedActions> {
        let request = TokenRequest::from_bytes(raw_request)
            .with_context(|| format!("failed to unmarshal token request [{}]", anchor))?;
        self.validate(ledger, anchor, &request)
    }

    /// Validates a request bound to `anchor`.
    pub fn validate(
        &self,
        ledger: &dyn Ledger,
        anchor: &str,
        request: &TokenRequest,
    ) -> Result<ValidatedActions> {
        self.logger.debug(format_args!(
            "validating request [{}] with {} issues and {} transfers",
            anchor,
            request.issues.len(),
            request.transfers.len()
        ));
        let message = request.message_to_sign(anchor)?;

        self.verify_auditing(request, &message)
            .with_context(|| format!("failed to verify auditor signatures of [{}]", anchor))?;

        let (issues, transfers) = self
            .action_deserializer
            .deserialize_actions(request)
            .with_context(|| format!("failed to deserialize actions of [{}]", anchor))?;

        let mut ctx = Context {
            pp: &self.pp,
            ledger,
            anchor,
            signatures: SignatureProvider::new(message, &request.signatures, &*self.verifier),
            spent: HashSet::new(),
            logger: &self.logger,
        };

        for (i, action) in issues.iter().enumerate() {
            for rule in &self.issue_rules {
                rule.validate(&mut ctx, action).with_context(|| {
                    format!("failed validating issue [{}] of [{}]: {}", i, anchor, rule.name())
                })?;
            }
            self.logger
                .debug(format_args!("issue [{}] of [{}] is valid", i, anchor));
        }

        for (i, action) in transfers.iter().enumerate() {
            for rule in &self.transfer_rules {
                rule.validate(&mut ctx, action).with_context(|| {
                    format!("failed validating transfer [{}] of [{}]: {}", i, anchor, rule.name())
                })?;
            }
            self.logger
                .debug(format_args!("transfer [{}] of [{}] is valid", i, anchor));
        }

        if ctx.signatures.remaining() != 0 {
            return Err(Error::malformed(format!(
                "request [{}] carries {} unexpected signatures",
                anchor,
                ctx.signatures.remaining()
            )));
        }

        Ok(ValidatedActions { issues, transfers })
    }

    fn verify_auditing(&self, request: &TokenRequest, message: &[u8]) -> Result<()> {
        for auditor in self.pp.auditors() {
            let signature = request
                .auditor_signatures
                .iter()
                .find(|s| s.identity == *auditor)
                .ok_or_else(|| {
                    Error::verification(format!("auditor {:?} did not sign the request", auditor))
                })?;
            self.verifier
                .verify(auditor, message, &signature.signature)
                .map_err(|e| Error::verification(e.to_string()))
                .with_context(|| format!("invalid signature of auditor {:?}", auditor))?;
        }
        Ok(())
    }
}
