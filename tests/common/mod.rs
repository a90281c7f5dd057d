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

//! Test network shared by integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use private_token::{
    actions::{IssueAction, TransferAction},
    audit::Auditor,
    builder::{Issuer, OwnedToken, Recipient, Sender},
    identity::{Ed25519Signer, IdentityDeserializer, SigningIdentity},
    logging::Logger,
    metadata::{IssueMetadata, TokenRequestMetadata, TransferMetadata},
    params::PublicParameters,
    request::{AuditorSignature, TokenRequest},
    storage::MemoryLedger,
    token::{Token, TokenId, TokenMetadata},
    validator::Validator,
    Result,
};

pub const BIT_LENGTH: usize = 16;
pub const GENESIS_TIME: u64 = 1_000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn x509(enrollment_id: &str) -> Ed25519Signer {
    Ed25519Signer::x509(enrollment_id).unwrap()
}

pub fn recipient(owner: &Ed25519Signer, value: u64) -> Recipient {
    Recipient::new(owner.identity().clone(), value, owner.audit_info().to_vec())
}

pub struct Network {
    pub pp: Arc<PublicParameters>,
    pub issuer: Ed25519Signer,
    pub auditor_signer: Arc<Ed25519Signer>,
    pub auditor: Auditor,
    pub validator: Validator,
    pub ledger: MemoryLedger,
}

impl Network {
    pub fn new() -> Self {
        init_logger();
        let issuer = x509("issuer");
        let auditor_signer = Arc::new(x509("auditor"));
        let pp = Arc::new(
            PublicParameters::setup(
                BIT_LENGTH,
                vec![issuer.identity().clone()],
                vec![auditor_signer.identity().clone()],
            )
            .unwrap(),
        );

        let logger = Logger::default();
        let auditor = Auditor::new(
            pp.clone(),
            Arc::new(IdentityDeserializer),
            Some(auditor_signer.clone() as Arc<dyn SigningIdentity>),
            &logger,
        );
        let validator = Validator::new(pp.clone(), &logger);
        Network {
            pp,
            issuer,
            auditor_signer,
            auditor,
            validator,
            ledger: MemoryLedger::new(GENESIS_TIME),
        }
    }

    pub fn issue(
        &self,
        token_type: &str,
        recipients: &[Recipient],
    ) -> (IssueAction, IssueMetadata) {
        Issuer::new(self.issuer.identity().clone(), self.pp.clone())
            .issue(token_type, recipients)
            .unwrap()
    }

    pub fn transfer(
        &self,
        inputs: &[OwnedToken],
        recipients: &[Recipient],
    ) -> (TransferAction, TransferMetadata) {
        Sender::new(self.pp.clone())
            .transfer(inputs, recipients)
            .unwrap()
    }

    /// Token stored on the ledger together with its opening from `outputs_metadata`.
    pub fn owned(&self, id: TokenId, outputs_metadata: &[u8], audit_info: &[u8]) -> OwnedToken {
        let token = self.ledger.token(&id).unwrap();
        OwnedToken::new(
            id,
            token,
            TokenMetadata::from_bytes(outputs_metadata).unwrap(),
            audit_info.to_vec(),
        )
    }

    /// Audits and endorses the request, then validates and applies it to the ledger.
    pub fn submit(
        &mut self,
        anchor: &str,
        mut request: TokenRequest,
        metadata: &TokenRequestMetadata,
        input_tokens: &[Vec<Token>],
    ) -> Result<Vec<TokenId>> {
        self.auditor.check(&request, metadata, input_tokens, anchor)?;
        self.endorse(anchor, &mut request)?;
        let actions = self.validator.validate(&self.ledger, anchor, &request)?;
        self.ledger.apply(anchor, &actions.issues, &actions.transfers)
    }

    pub fn endorse(&self, anchor: &str, request: &mut TokenRequest) -> Result<()> {
        let signature = self.auditor.endorse(Some(&*request), anchor)?;
        request.auditor_signatures.push(AuditorSignature {
            identity: self.auditor_signer.identity().clone(),
            signature,
        });
        Ok(())
    }

    /// Issues `value` of `token_type` to `owner` and commits the issue as `anchor`.
    pub fn fund(
        &mut self,
        anchor: &str,
        token_type: &str,
        owner: &Ed25519Signer,
        value: u64,
    ) -> OwnedToken {
        let (action, metadata) = self.issue(token_type, &[recipient(owner, value)]);
        let mut request = TokenRequest::new();
        request.add_issue(&action).unwrap();
        request.sign(&self.issuer, anchor).unwrap();

        let request_metadata = TokenRequestMetadata {
            issues: vec![metadata.clone()],
            ..TokenRequestMetadata::default()
        };
        let created = self.submit(anchor, request, &request_metadata, &[]).unwrap();
        self.owned(
            created[0].clone(),
            &metadata.outputs_metadata[0],
            &metadata.receivers_audit_infos[0],
        )
    }
}
