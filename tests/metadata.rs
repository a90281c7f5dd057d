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

//! Filtering of request metadata for recipients.

extern crate private_token;

mod common;

use std::{collections::BTreeMap, sync::Arc};

use private_token::{
    actions::TransferAction,
    builder::Recipient,
    identity::{
        htlc::{Encoding, HashFunction, HashInfo, Script},
        IdentityDeserializer, SigningIdentity,
    },
    logging::Logger,
    metadata::{Metadata, TokenRequestMetadata},
    token::TokenMetadata,
};

use crate::common::{recipient, x509, Network, GENESIS_TIME};

/// Alice pays 6 to Bob, 3 to a script from Alice to Carol, and keeps 1.
fn request_metadata() -> (TransferAction, Metadata) {
    let mut network = Network::new();
    let alice = x509("alice");
    let bob = x509("bob");
    let carol = x509("carol");
    let inputs = [network.fund("tx1", "USD", &alice, 10)];

    let script = Script {
        sender: alice.identity().clone(),
        recipient: carol.identity().clone(),
        deadline: GENESIS_TIME + 10,
        hash_info: HashInfo::new(b"secret", HashFunction::Sha256, Encoding::Hex),
    };
    let locked = Recipient::script(
        &script,
        3,
        alice.audit_info().to_vec(),
        carol.audit_info().to_vec(),
    )
    .unwrap();
    let (action, transfer) = network.transfer(
        &inputs,
        &[recipient(&bob, 6), locked, recipient(&alice, 1)],
    );

    let mut application = BTreeMap::new();
    application.insert("memo".to_owned(), b"rent".to_vec());
    let metadata = TokenRequestMetadata {
        transfers: vec![transfer],
        application,
        ..TokenRequestMetadata::default()
    };
    let metadata = Metadata::new(Arc::new(IdentityDeserializer), metadata, &Logger::default());
    (action, metadata)
}

#[test]
fn recipients_only_see_their_outputs() {
    let (action, metadata) = request_metadata();
    let full = metadata.transfer(0).unwrap();
    full.match_action(&action).unwrap();

    let for_bob = metadata.filter_by(&["bob"]).unwrap();
    let view = for_bob.transfer(0).unwrap();
    view.match_action(&action).unwrap();
    assert!(!view.is_output_absent(0));
    assert!(view.is_output_absent(1));
    assert!(view.is_output_absent(2));
    assert!(!view.is_input_absent(0));

    let opening = TokenMetadata::from_bytes(&view.metadata().outputs_metadata[0]).unwrap();
    assert_eq!(opening.value, 6);
    assert_eq!(
        for_bob.token_request_metadata().application,
        metadata.token_request_metadata().application
    );
    // Spent token identifiers are only known to the full metadata.
    assert_eq!(metadata.spent_token_ids().len(), 1);
    assert!(for_bob.spent_token_ids().is_empty());

    // The script output is disclosed to the script recipient.
    let for_carol = metadata.filter_by(&["carol"]).unwrap();
    let view = for_carol.transfer(0).unwrap();
    assert!(view.is_output_absent(0));
    assert!(!view.is_output_absent(1));

    let for_both = metadata.filter_by(&["alice", "bob"]).unwrap();
    let view = for_both.transfer(0).unwrap();
    assert!(!view.is_output_absent(0));
    assert!(view.is_output_absent(1));
    assert!(!view.is_output_absent(2));
}

#[test]
fn outsiders_see_no_senders() {
    let (action, metadata) = request_metadata();
    let filtered = metadata.filter_by(&["dave"]).unwrap();
    let transfer = &filtered.token_request_metadata().transfers[0];

    assert!(transfer.senders.is_empty());
    assert!(transfer.sender_audit_infos.is_empty());
    assert!(transfer.token_ids.is_empty());
    assert_eq!(transfer.outputs_metadata.len(), 3);
    assert!(transfer.outputs_metadata.iter().all(Vec::is_empty));
    assert!(transfer.outputs_audit_info.iter().all(Vec::is_empty));
    assert!(transfer.receiver_audit_infos.iter().all(Vec::is_empty));
    assert_eq!(transfer.receivers.len(), 3);

    let view = filtered.transfer(0).unwrap();
    view.match_action(&action).unwrap();
    assert!(view.is_input_absent(0));
    assert!(filtered.transfer(1).is_err());
    assert!(filtered.issue(0).is_err());

    // Filtering does not touch the source.
    let source = &metadata.token_request_metadata().transfers[0];
    assert_eq!(source.senders.len(), 1);
    assert!(source.outputs_metadata.iter().all(|m| !m.is_empty()));
}

#[test]
fn filtering_is_idempotent() {
    let (_, metadata) = request_metadata();
    let cases: [&[&str]; 4] = [&["bob"], &["carol"], &["alice", "carol"], &[]];
    for eids in &cases {
        let once = metadata.filter_by(eids).unwrap();
        let twice = once.filter_by(eids).unwrap();
        assert_eq!(once.token_request_metadata(), twice.token_request_metadata());
    }
}
