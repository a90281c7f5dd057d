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

//! Token requests submitted to the ledger.

use crate::{
    actions::{IssueAction, TransferAction},
    crypto,
    errors::{Result, ResultExt},
    identity::{Identity, SigningIdentity},
};

/// Signature of an auditor over a token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorSignature {
    pub identity: Identity,
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct SignedContent<'a> {
    issues: &'a [Vec<u8>],
    transfers: &'a [Vec<u8>],
    anchor: &'a str,
}

/// Serialized actions and the signatures authorizing them.
///
/// Signatures are ordered: first the signatures of issuers (one per issue), then, for each
/// transfer, the signatures of the input owners followed by those of the extra signers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub issues: Vec<Vec<u8>>,
    pub transfers: Vec<Vec<u8>>,
    pub signatures: Vec<Vec<u8>>,
    pub auditor_signatures: Vec<AuditorSignature>,
}

impl TokenRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, action: &IssueAction) -> Result<()> {
        self.issues.push(action.serialize()?);
        Ok(())
    }

    pub fn add_transfer(&mut self, action: &TransferAction) -> Result<()> {
        self.transfers.push(action.serialize()?);
        Ok(())
    }

    /// Bytes signed by issuers, owners and auditors, bound to `anchor` (the transaction ID).
    ///
    /// Signatures are not part of the signed content.
    pub fn message_to_sign(&self, anchor: &str) -> Result<Vec<u8>> {
        crypto::encode(&SignedContent {
            issues: &self.issues,
            transfers: &self.transfers,
            anchor,
        })
    }

    /// Appends a signature of `signer` over the request.
    pub fn sign(&mut self, signer: &dyn SigningIdentity, anchor: &str) -> Result<()> {
        let message = self.message_to_sign(anchor)?;
        let signature = signer.sign(&message)?;
        self.signatures.push(signature);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot decode token request")
    }
}
