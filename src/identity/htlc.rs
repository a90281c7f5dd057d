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

//! Hash time lock scripts.
//!
//! A token owned by a script can be *claimed* by the recipient before the deadline by
//! revealing the pre-image of the script hash, or *reclaimed* by the sender once the
//! deadline has passed.

use sha2::{Digest, Sha256, Sha512};

use super::{Identity, IdentityType, TypedIdentity};
use crate::{
    actions::TransferAction,
    crypto,
    errors::{Error, Result, ResultExt},
};

/// Prefix of the transfer metadata key carrying a claim pre-image.
pub const CLAIM_KEY_PREFIX: &str = "htlc.claim.";

/// Metadata key under which the pre-image of `image` is disclosed when claiming.
pub fn claim_key(image: &[u8]) -> String {
    format!("{}{}", CLAIM_KEY_PREFIX, hex::encode(image))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashFunction {
    Sha256,
    Sha512,
}

/// Encoding applied to the digest to get the script image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    None,
    Hex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashInfo {
    pub hash: Vec<u8>,
    pub hash_func: HashFunction,
    pub hash_encoding: Encoding,
}

impl HashInfo {
    /// Locks on the image of `pre_image`.
    pub fn new(pre_image: &[u8], hash_func: HashFunction, hash_encoding: Encoding) -> Self {
        let mut info = HashInfo {
            hash: vec![],
            hash_func,
            hash_encoding,
        };
        info.hash = info.image(pre_image);
        info
    }

    /// Computes the image of `pre_image` under this hash function and encoding.
    pub fn image(&self, pre_image: &[u8]) -> Vec<u8> {
        let digest = match self.hash_func {
            HashFunction::Sha256 => Sha256::digest(pre_image).to_vec(),
            HashFunction::Sha512 => Sha512::digest(pre_image).to_vec(),
        };
        match self.hash_encoding {
            Encoding::None => digest,
            Encoding::Hex => hex::encode(digest).into_bytes(),
        }
    }

    pub fn is_pre_image(&self, pre_image: &[u8]) -> bool {
        !self.hash.is_empty() && self.image(pre_image) == self.hash
    }
}

/// Hash time lock script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub sender: Identity,
    pub recipient: Identity,
    /// Unix time in seconds.
    pub deadline: u64,
    pub hash_info: HashInfo,
}

impl Script {
    pub fn to_identity(&self) -> Result<Identity> {
        TypedIdentity::wrap(IdentityType::HtlcScript, Identity::new(crypto::encode(self)?))
    }

    /// Parses a typed script identity.
    pub fn from_identity(identity: &Identity) -> Result<Self> {
        Self::from_typed(&TypedIdentity::parse(identity)?)
    }

    pub(crate) fn from_typed(typed: &TypedIdentity) -> Result<Self> {
        if typed.kind()? != IdentityType::HtlcScript {
            return Err(Error::malformed(format!(
                "expected a script identity, got [{}]",
                typed.identity_type
            )));
        }
        crypto::decode(typed.identity.as_bytes()).context("cannot decode script")
    }

    /// Returns `true` if `identity` is a script identity.
    pub fn is_script(identity: &Identity) -> bool {
        TypedIdentity::parse(identity)
            .and_then(|typed| typed.kind())
            .map(|kind| kind == IdentityType::HtlcScript)
            .unwrap_or(false)
    }

    /// Checks that the script can lock a newly created output at time `now`.
    pub fn validate(&self, now: u64) -> Result<()> {
        if self.sender.is_none() || self.recipient.is_none() {
            return Err(Error::malformed("script sender and recipient must be set"));
        }
        if Script::is_script(&self.sender) || Script::is_script(&self.recipient) {
            return Err(Error::malformed("script sender and recipient cannot be scripts"));
        }
        if self.hash_info.hash.is_empty() {
            return Err(Error::malformed("script hash is empty"));
        }
        if self.deadline <= now {
            return Err(Error::verification(format!(
                "script deadline {} is not after the current time {}",
                self.deadline, now
            )));
        }
        Ok(())
    }

    /// Identity entitled to spend the script output at time `now`.
    pub fn spender(&self, now: u64) -> &Identity {
        if now < self.deadline {
            &self.recipient
        } else {
            &self.sender
        }
    }
}

/// Audit info of a script owner: audit infos of its sender and recipient.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub sender: Vec<u8>,
    pub recipient: Vec<u8>,
}

impl std::fmt::Debug for ScriptInfo {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter
            .debug_struct("ScriptInfo")
            .field("sender_len", &self.sender.len())
            .field("recipient_len", &self.recipient.len())
            .finish()
    }
}

impl ScriptInfo {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot decode script info")
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }
}

/// Looks for the pre-image of `hash_info` disclosed by a claim among `transfers`.
pub fn find_pre_image<'a, I>(transfers: I, hash_info: &HashInfo) -> Option<Vec<u8>>
where
    I: IntoIterator<Item = &'a TransferAction>,
{
    let key = claim_key(&hash_info.hash);
    transfers
        .into_iter()
        .filter_map(|transfer| transfer.metadata().get(&key))
        .find(|pre_image| hash_info.is_pre_image(pre_image))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Ed25519Signer, SigningIdentity};

    fn script(deadline: u64) -> Script {
        Script {
            sender: Ed25519Signer::x509("alice").unwrap().identity().clone(),
            recipient: Ed25519Signer::x509("bob").unwrap().identity().clone(),
            deadline,
            hash_info: HashInfo::new(b"secret", HashFunction::Sha256, Encoding::Hex),
        }
    }

    #[test]
    fn hash_info_images() {
        let info = HashInfo::new(b"secret", HashFunction::Sha256, Encoding::None);
        assert_eq!(info.hash.len(), 32);
        assert!(info.is_pre_image(b"secret"));
        assert!(!info.is_pre_image(b"Secret"));

        let info = HashInfo::new(b"secret", HashFunction::Sha512, Encoding::Hex);
        assert_eq!(info.hash.len(), 128);
        assert!(info.is_pre_image(b"secret"));
    }

    #[test]
    fn script_identity_roundtrip() {
        let script = script(100);
        let identity = script.to_identity().unwrap();
        assert!(Script::is_script(&identity));
        assert!(!Script::is_script(&script.sender));
        assert_eq!(Script::from_identity(&identity).unwrap(), script);
        assert!(Script::from_identity(&script.sender).is_err());
    }

    #[test]
    fn script_spender_depends_on_time() {
        let script = script(100);
        assert_eq!(script.spender(99), &script.recipient);
        assert_eq!(script.spender(100), &script.sender);
        script.validate(99).unwrap();
        assert!(script.validate(100).is_err());

        let mut nested = script.clone();
        nested.recipient = script.to_identity().unwrap();
        assert!(nested.validate(0).is_err());
    }
}
