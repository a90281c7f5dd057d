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

//! Ledger read set.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    actions::{IssueAction, TransferAction},
    errors::{Error, Result},
    token::{Token, TokenId},
};

/// Read access to the ledger state, as seen by the validator.
pub trait Ledger: Send + Sync {
    /// Returns the serialized unspent token with the given identifier.
    fn get_state(&self, id: &TokenId) -> Result<Option<Vec<u8>>>;

    /// Ledger time in Unix seconds, used to evaluate time locks.
    fn time(&self) -> u64;
}

/// Event recorded by [`MemoryLedger`] for every applied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub anchor: String,
    pub created: Vec<TokenId>,
    pub spent: Vec<TokenId>,
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    tokens: BTreeMap<TokenId, Vec<u8>>,
    history: Vec<Event>,
    time: u64,
}

impl MemoryLedger {
    pub fn new(time: u64) -> Self {
        MemoryLedger {
            time,
            ..Self::default()
        }
    }

    pub fn set_time(&mut self, time: u64) {
        self.time = time;
    }

    pub fn token(&self, id: &TokenId) -> Option<Token> {
        self.tokens
            .get(id)
            .and_then(|bytes| Token::from_bytes(bytes).ok())
    }

    /// Unspent tokens, ordered by identifier.
    pub fn unspent(&self) -> impl Iterator<Item = (&TokenId, &Vec<u8>)> {
        self.tokens.iter()
    }

    pub fn history(&self) -> &[Event] {
        &self.history
    }

    /// Applies a validated request.
    ///
    /// Outputs are numbered consecutively within the request, issues first; redeemed
    /// outputs consume an index but are not stored. Returns identifiers of created tokens.
    pub fn apply(
        &mut self,
        anchor: &str,
        issues: &[IssueAction],
        transfers: &[TransferAction],
    ) -> Result<Vec<TokenId>> {
        if self.history.iter().any(|event| event.anchor == anchor) {
            return Err(Error::malformed(format!("request [{}] is already applied", anchor)));
        }
        let spent: Vec<_> = transfers.iter().flat_map(|t| t.input_ids()).collect();
        if let Some(id) = spent.iter().find(|id| !self.tokens.contains_key(*id)) {
            return Err(Error::malformed(format!("input {} does not exist", id)));
        }
        let mut seen = BTreeSet::new();
        if let Some(id) = spent.iter().find(|id| !seen.insert(*id)) {
            return Err(Error::malformed(format!("input {} is spent twice", id)));
        }

        let outputs = issues
            .iter()
            .flat_map(|issue| issue.outputs())
            .chain(transfers.iter().flat_map(|transfer| transfer.outputs()));
        let mut created = vec![];
        let mut new_tokens = vec![];
        for (index, token) in outputs.enumerate() {
            if token.is_redeem() {
                continue;
            }
            let id = TokenId::new(anchor, index as u64);
            new_tokens.push((id.clone(), token.to_bytes()?));
            created.push(id);
        }

        for id in &spent {
            self.tokens.remove(id);
        }
        self.tokens.extend(new_tokens);
        self.history.push(Event {
            anchor: anchor.to_owned(),
            created: created.clone(),
            spent,
        });
        Ok(created)
    }
}

impl Ledger for MemoryLedger {
    fn get_state(&self, id: &TokenId) -> Result<Option<Vec<u8>>> {
        Ok(self.tokens.get(id).cloned())
    }

    fn time(&self) -> u64 {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crypto::PedersenGenerators, identity::Identity, token::TokenDataWitness};

    #[test]
    fn apply_creates_and_spends_tokens() {
        let gens = PedersenGenerators::default();
        let data = TokenDataWitness::new("USD", 5).commitment(&gens);
        let owner = Identity::new(vec![1]);
        let issue = IssueAction::new(
            Identity::new(vec![9]),
            vec![data, data],
            vec![owner.clone(), owner.clone()],
            vec![],
        )
        .unwrap();

        let mut ledger = MemoryLedger::new(10);
        let created = ledger.apply("tx1", &[issue.clone()], &[]).unwrap();
        assert_eq!(created, vec![TokenId::new("tx1", 0), TokenId::new("tx1", 1)]);
        assert_eq!(ledger.token(&created[0]).unwrap().owner, owner);
        assert!(ledger.apply("tx1", &[issue], &[]).is_err());

        let transfer = TransferAction::new(
            vec![created[0].clone()],
            vec![Token::new(owner.clone(), data)],
            vec![data],
            vec![Identity::default()],
            vec![],
        )
        .unwrap();
        let created2 = ledger.apply("tx2", &[], &[transfer.clone()]).unwrap();
        assert!(created2.is_empty());
        assert!(ledger.get_state(&created[0]).unwrap().is_none());
        assert!(ledger.get_state(&created[1]).unwrap().is_some());
        assert_eq!(ledger.history().len(), 2);

        // The input is already spent.
        assert!(ledger.apply("tx3", &[], &[transfer]).is_err());
        assert_eq!(ledger.time(), 10);
    }

    #[test]
    fn apply_rejects_inputs_spent_twice() {
        let gens = PedersenGenerators::default();
        let data = TokenDataWitness::new("USD", 5).commitment(&gens);
        let owner = Identity::new(vec![1]);
        let issue =
            IssueAction::new(Identity::new(vec![9]), vec![data], vec![owner.clone()], vec![])
                .unwrap();
        let mut ledger = MemoryLedger::new(10);
        let created = ledger.apply("tx1", &[issue], &[]).unwrap();

        let transfer = TransferAction::new(
            vec![created[0].clone()],
            vec![Token::new(owner.clone(), data)],
            vec![data],
            vec![owner],
            vec![],
        )
        .unwrap();
        let err = ledger
            .apply("tx2", &[], &[transfer.clone(), transfer])
            .unwrap_err();
        assert!(err.to_string().contains("spent twice"));
        assert!(ledger.get_state(&created[0]).unwrap().is_some());
        assert_eq!(ledger.history().len(), 1);
    }
}
