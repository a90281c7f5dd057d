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

//! Cleartext metadata accompanying token requests.
//!
//! [`TokenRequestMetadata`] carries the openings of every output and the audit info of every
//! party of a request. It travels out-of-band: the auditor receives all of it, while each
//! recipient receives a view [filtered](Metadata::filter_by) down to the outputs it owns.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    actions::{IssueAction, TransferAction},
    crypto,
    errors::{Error, Result, ResultExt},
    identity::Identity,
    logging::Logger,
    token::TokenId,
};

/// Resolves enrollment IDs of identities.
pub trait WalletService: Send + Sync {
    /// Returns the enrollment ID of `identity` from its audit info; empty audit info yields
    /// an empty enrollment ID.
    fn enrollment_id(&self, identity: &Identity, audit_info: &[u8]) -> Result<String>;
}

/// Metadata of an issue action.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub issuer: Identity,
    pub token_ids: Vec<TokenId>,
    pub outputs_metadata: Vec<Vec<u8>>,
    pub receivers: Vec<Identity>,
    pub receivers_audit_infos: Vec<Vec<u8>>,
    pub extra_signers: Vec<Identity>,
}

/// Metadata of a transfer action.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub token_ids: Vec<TokenId>,
    pub senders: Vec<Identity>,
    pub sender_audit_infos: Vec<Vec<u8>>,
    pub outputs_metadata: Vec<Vec<u8>>,
    pub outputs_audit_info: Vec<Vec<u8>>,
    pub receivers: Vec<Identity>,
    pub receiver_audit_infos: Vec<Vec<u8>>,
    pub extra_signers: Vec<Identity>,
}

// Metadata holds secrets; debug output only reveals its shape.
impl fmt::Debug for IssueMetadata {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("IssueMetadata")
            .field("issuer", &self.issuer)
            .field("outputs", &self.outputs_metadata.len())
            .finish()
    }
}

impl fmt::Debug for TransferMetadata {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("TransferMetadata")
            .field("token_ids", &self.token_ids)
            .field("senders", &self.senders.len())
            .field("outputs", &self.outputs_metadata.len())
            .finish()
    }
}

/// Metadata of all actions of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequestMetadata {
    pub issues: Vec<IssueMetadata>,
    pub transfers: Vec<TransferMetadata>,
    pub application: BTreeMap<String, Vec<u8>>,
}

impl TokenRequestMetadata {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot decode token request metadata")
    }
}

/// Token request metadata bound to a wallet service.
#[derive(Clone)]
pub struct Metadata {
    wallet_service: Arc<dyn WalletService>,
    token_request_metadata: TokenRequestMetadata,
    logger: Logger,
}

impl fmt::Debug for Metadata {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Metadata")
            .field("token_request_metadata", &self.token_request_metadata)
            .finish()
    }
}

impl Metadata {
    pub fn new(
        wallet_service: Arc<dyn WalletService>,
        token_request_metadata: TokenRequestMetadata,
        logger: &Logger,
    ) -> Self {
        Metadata {
            wallet_service,
            token_request_metadata,
            logger: logger.named("metadata"),
        }
    }

    pub fn token_request_metadata(&self) -> &TokenRequestMetadata {
        &self.token_request_metadata
    }

    /// Returns a view with only the outputs owned by one of `enrollment_ids`.
    ///
    /// Every output keeps its slot; outputs of other owners get empty metadata and audit info.
    /// Transfer senders are disclosed only if at least one output of the transfer is kept.
    /// Transfer token IDs are never disclosed. Application metadata is passed through.
    pub fn filter_by(&self, enrollment_ids: &[&str]) -> Result<Metadata> {
        let source = &self.token_request_metadata;
        let mut filtered = TokenRequestMetadata::default();

        for issue in &source.issues {
            let mut result = IssueMetadata {
                issuer: issue.issuer.clone(),
                token_ids: issue.token_ids.clone(),
                extra_signers: issue.extra_signers.clone(),
                ..IssueMetadata::default()
            };

            for (i, audit_info) in issue.receivers_audit_infos.iter().enumerate() {
                let receiver = issue.receivers.get(i).ok_or_else(|| {
                    Error::malformed(format!("issue receiver [{}] is missing", i))
                })?;
                let eid = self
                    .wallet_service
                    .enrollment_id(receiver, audit_info)
                    .context("failed getting enrollment ID")?;

                if enrollment_ids.contains(&eid.as_str()) {
                    result
                        .outputs_metadata
                        .push(slot(&issue.outputs_metadata, i, "output metadata")?);
                    result.receivers_audit_infos.push(audit_info.clone());
                } else {
                    self.logger
                        .debug(format_args!("skipping issue for [{}]", eid));
                    result.outputs_metadata.push(vec![]);
                    result.receivers_audit_infos.push(vec![]);
                }
                result.receivers.push(receiver.clone());
            }
            filtered.issues.push(result);
        }

        for transfer in &source.transfers {
            let mut result = TransferMetadata {
                extra_signers: transfer.extra_signers.clone(),
                ..TransferMetadata::default()
            };

            let mut skip = true;
            for (i, audit_info) in transfer.receiver_audit_infos.iter().enumerate() {
                let receiver = transfer.receivers.get(i).ok_or_else(|| {
                    Error::malformed(format!("transfer receiver [{}] is missing", i))
                })?;
                let eid = self
                    .wallet_service
                    .enrollment_id(receiver, audit_info)
                    .context("failed getting enrollment ID")?;

                if enrollment_ids.contains(&eid.as_str()) {
                    self.logger
                        .debug(format_args!("keeping transfer for [{}]", eid));
                    result
                        .outputs_metadata
                        .push(slot(&transfer.outputs_metadata, i, "output metadata")?);
                    result
                        .outputs_audit_info
                        .push(slot(&transfer.outputs_audit_info, i, "output audit info")?);
                    result.receiver_audit_infos.push(audit_info.clone());
                    skip = false;
                } else {
                    self.logger
                        .debug(format_args!("skipping transfer for [{}]", eid));
                    result.outputs_metadata.push(vec![]);
                    result.outputs_audit_info.push(vec![]);
                    result.receiver_audit_infos.push(vec![]);
                }
                result.receivers.push(receiver.clone());
            }

            if !skip {
                for (i, sender) in transfer.senders.iter().enumerate() {
                    result.senders.push(sender.clone());
                    result
                        .sender_audit_infos
                        .push(slot(&transfer.sender_audit_infos, i, "sender audit info")?);
                }
            }

            self.logger.debug(format_args!(
                "keeping transfer with [{}] out of [{}] outputs",
                result.outputs_metadata.iter().filter(|m| !m.is_empty()).count(),
                transfer.outputs_metadata.len()
            ));
            filtered.transfers.push(result);
        }

        filtered.application = source.application.clone();

        self.logger.debug(format_args!(
            "filtered metadata for {} enrollment IDs from [{}:{}] to [{}:{}]",
            enrollment_ids.len(),
            source.issues.len(),
            source.transfers.len(),
            filtered.issues.len(),
            filtered.transfers.len()
        ));

        Ok(Metadata {
            wallet_service: Arc::clone(&self.wallet_service),
            token_request_metadata: filtered,
            logger: self.logger.clone(),
        })
    }

    /// Identifiers of all tokens spent by the transfers.
    pub fn spent_token_ids(&self) -> Vec<TokenId> {
        self.token_request_metadata
            .transfers
            .iter()
            .flat_map(|transfer| transfer.token_ids.iter().cloned())
            .collect()
    }

    pub fn issue(&self, index: usize) -> Result<IssueMetadataView> {
        let issues = &self.token_request_metadata.issues;
        issues
            .get(index)
            .map(|inner| IssueMetadataView { inner })
            .ok_or_else(|| out_of_range(index, issues.len()))
    }

    pub fn transfer(&self, index: usize) -> Result<TransferMetadataView> {
        let transfers = &self.token_request_metadata.transfers;
        transfers
            .get(index)
            .map(|inner| TransferMetadataView { inner })
            .ok_or_else(|| out_of_range(index, transfers.len()))
    }
}

fn slot(values: &[Vec<u8>], index: usize, what: &str) -> Result<Vec<u8>> {
    values
        .get(index)
        .cloned()
        .ok_or_else(|| Error::malformed(format!("{} [{}] is missing", what, index)))
}

fn out_of_range(index: usize, len: usize) -> Error {
    Error::malformed(format!("index [{}] out of range [0:{}]", index, len))
}

fn match_extra_signers(expected: &[Identity], actual: &[Identity]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(Error::malformed(format!(
            "expected [{}] extra signers but got [{}]",
            expected.len(),
            actual.len()
        )));
    }
    if let Some(i) = (0..actual.len()).find(|&i| expected[i] != actual[i]) {
        return Err(Error::malformed(format!(
            "expected extra signer {:?} but got {:?}",
            expected[i], actual[i]
        )));
    }
    Ok(())
}

/// Metadata of one issue.
#[derive(Debug, Clone, Copy)]
pub struct IssueMetadataView<'a> {
    inner: &'a IssueMetadata,
}

impl<'a> From<&'a IssueMetadata> for IssueMetadataView<'a> {
    fn from(inner: &'a IssueMetadata) -> Self {
        IssueMetadataView { inner }
    }
}

impl<'a> IssueMetadataView<'a> {
    pub fn metadata(&self) -> &'a IssueMetadata {
        self.inner
    }

    /// Checks that this metadata describes `action`.
    pub fn match_action(&self, action: &IssueAction) -> Result<()> {
        action.validate().context("failed validating issue action")?;

        let m = self.inner;
        if !m.token_ids.is_empty() {
            return Err(Error::malformed(format!(
                "expected [0] inputs but got [{}]",
                m.token_ids.len()
            )));
        }
        if m.outputs_metadata.len() != action.num_outputs() {
            return Err(Error::malformed(format!(
                "expected [{}] outputs but got [{}]",
                m.outputs_metadata.len(),
                action.num_outputs()
            )));
        }
        if m.receivers.len() != m.receivers_audit_infos.len() {
            return Err(Error::malformed(format!(
                "expected [{}] receiver audit infos but got [{}]",
                m.receivers.len(),
                m.receivers_audit_infos.len()
            )));
        }
        match_extra_signers(&m.extra_signers, action.extra_signers())
    }

    pub fn is_output_absent(&self, index: usize) -> bool {
        self.inner
            .outputs_metadata
            .get(index)
            .map_or(true, Vec::is_empty)
    }
}

/// Metadata of one transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferMetadataView<'a> {
    inner: &'a TransferMetadata,
}

impl<'a> From<&'a TransferMetadata> for TransferMetadataView<'a> {
    fn from(inner: &'a TransferMetadata) -> Self {
        TransferMetadataView { inner }
    }
}

impl<'a> TransferMetadataView<'a> {
    pub fn metadata(&self) -> &'a TransferMetadata {
        self.inner
    }

    /// Checks that this metadata describes `action`.
    pub fn match_action(&self, action: &TransferAction) -> Result<()> {
        action.validate().context("failed validating transfer action")?;

        let m = self.inner;
        if !m.token_ids.is_empty() && m.senders.len() != m.token_ids.len() {
            return Err(Error::malformed(format!(
                "expected [{}] token IDs and senders but got [{}]",
                m.token_ids.len(),
                m.senders.len()
            )));
        }
        if m.senders.len() != m.sender_audit_infos.len() {
            return Err(Error::malformed(format!(
                "expected [{}] senders and sender audit infos but got [{}]",
                m.senders.len(),
                m.sender_audit_infos.len()
            )));
        }
        if m.outputs_metadata.len() != action.num_outputs() {
            return Err(Error::malformed(format!(
                "expected [{}] outputs but got [{}]",
                m.outputs_metadata.len(),
                action.num_outputs()
            )));
        }
        if m.outputs_audit_info.len() != action.num_outputs() {
            return Err(Error::malformed(format!(
                "expected [{}] output audit info but got [{}]",
                action.num_outputs(),
                m.outputs_audit_info.len()
            )));
        }
        if m.receivers.len() != m.receiver_audit_infos.len() {
            return Err(Error::malformed(format!(
                "expected [{}] receiver audit infos but got [{}]",
                m.receivers.len(),
                m.receiver_audit_infos.len()
            )));
        }
        match_extra_signers(&m.extra_signers, action.extra_signers())
    }

    pub fn is_output_absent(&self, index: usize) -> bool {
        self.inner
            .outputs_metadata
            .get(index)
            .map_or(true, Vec::is_empty)
    }

    pub fn is_input_absent(&self, index: usize) -> bool {
        self.inner
            .senders
            .get(index)
            .map_or(true, Identity::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wallet service reading the enrollment ID straight from the audit info.
    struct PlainWalletService;

    impl WalletService for PlainWalletService {
        fn enrollment_id(&self, _: &Identity, audit_info: &[u8]) -> Result<String> {
            String::from_utf8(audit_info.to_vec()).map_err(|e| Error::malformed(e.to_string()))
        }
    }

    fn metadata() -> Metadata {
        let transfer = TransferMetadata {
            token_ids: vec![TokenId::new("tx0", 0)],
            senders: vec![Identity::new(b"carol".to_vec())],
            sender_audit_infos: vec![b"carol".to_vec()],
            outputs_metadata: vec![b"m0".to_vec(), b"m1".to_vec()],
            outputs_audit_info: vec![b"a0".to_vec(), b"a1".to_vec()],
            receivers: vec![Identity::new(b"alice".to_vec()), Identity::new(b"bob".to_vec())],
            receiver_audit_infos: vec![b"alice".to_vec(), b"bob".to_vec()],
            extra_signers: vec![],
        };
        let issue = IssueMetadata {
            issuer: Identity::new(b"issuer".to_vec()),
            outputs_metadata: vec![b"m".to_vec()],
            receivers: vec![Identity::new(b"bob".to_vec())],
            receivers_audit_infos: vec![b"bob".to_vec()],
            ..IssueMetadata::default()
        };
        let mut application = BTreeMap::new();
        application.insert("app".to_owned(), b"data".to_vec());
        Metadata::new(
            Arc::new(PlainWalletService),
            TokenRequestMetadata {
                issues: vec![issue],
                transfers: vec![transfer],
                application,
            },
            &Logger::default(),
        )
    }

    #[test]
    fn filter_keeps_matching_outputs() {
        let source = metadata();
        let filtered = source.filter_by(&["alice"]).unwrap();
        let trm = filtered.token_request_metadata();

        let transfer = &trm.transfers[0];
        assert_eq!(transfer.outputs_metadata, vec![b"m0".to_vec(), vec![]]);
        assert_eq!(transfer.outputs_audit_info, vec![b"a0".to_vec(), vec![]]);
        assert_eq!(transfer.receiver_audit_infos, vec![b"alice".to_vec(), vec![]]);
        assert_eq!(transfer.receivers.len(), 2);
        assert_eq!(transfer.senders, source.token_request_metadata().transfers[0].senders);
        assert!(transfer.token_ids.is_empty());

        let issue = &trm.issues[0];
        assert_eq!(issue.issuer, Identity::new(b"issuer".to_vec()));
        assert_eq!(issue.outputs_metadata, vec![Vec::<u8>::new()]);
        assert_eq!(trm.application, source.token_request_metadata().application);

        let view = filtered.transfer(0).unwrap();
        assert!(!view.is_output_absent(0));
        assert!(view.is_output_absent(1));
        assert!(view.is_output_absent(2));
        assert!(!view.is_input_absent(0));
        assert!(filtered.issue(0).unwrap().is_output_absent(0));
        assert!(filtered.issue(1).is_err());
        assert!(filtered.transfer(1).is_err());
    }

    #[test]
    fn filter_without_matches_hides_senders() {
        let source = metadata();
        let filtered = source.filter_by(&["dave"]).unwrap();
        let transfer = &filtered.token_request_metadata().transfers[0];
        assert!(transfer.senders.is_empty());
        assert!(transfer.sender_audit_infos.is_empty());
        assert_eq!(transfer.outputs_metadata.len(), 2);
        assert!(transfer.outputs_metadata.iter().all(Vec::is_empty));
        assert!(filtered.transfer(0).unwrap().is_input_absent(0));

        // The source is left untouched.
        assert_eq!(source.token_request_metadata().transfers[0].senders.len(), 1);
        assert_eq!(source.spent_token_ids(), vec![TokenId::new("tx0", 0)]);
        assert!(filtered.spent_token_ids().is_empty());
    }

    #[test]
    fn filter_is_idempotent() {
        let source = metadata();
        let once = source.filter_by(&["bob"]).unwrap();
        let twice = once.filter_by(&["bob"]).unwrap();
        assert_eq!(once.token_request_metadata(), twice.token_request_metadata());
    }

    #[test]
    fn extra_signer_mismatch_reports_expected_first() {
        let alice = Identity::new(b"alice".to_vec());
        let bob = Identity::new(b"bob".to_vec());

        let err = match_extra_signers(&[alice.clone()], &[]).unwrap_err();
        assert!(err
            .to_string()
            .contains("expected [1] extra signers but got [0]"));

        let err = match_extra_signers(&[alice.clone()], &[bob.clone()]).unwrap_err();
        let message = format!("expected extra signer {:?} but got {:?}", alice, bob);
        assert!(err.to_string().contains(&message));
        match_extra_signers(&[alice.clone()], &[alice]).unwrap();
    }
}
