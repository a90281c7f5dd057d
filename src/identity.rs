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

//! Identities of token owners, issuers and auditors.
//!
//! Every owner identity on the wire is a [`TypedIdentity`]: a tag naming one of the supported
//! [identity types](IdentityType) followed by the type-specific encoding. Types form a closed
//! set; an unknown tag is rejected everywhere an identity is interpreted.
//!
//! Owners disclose *audit info* to the auditor out-of-band. The auditor turns audit info into an
//! [`OwnerMatcher`] via a [`Deserializer`] and checks that the matcher accepts the owner.

use curve25519::scalar::Scalar;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};

use std::fmt;

use crate::{
    crypto::{self, hash_to_scalar, random_scalar, Commitment, PedersenGenerators},
    errors::{Error, Result, ResultExt},
    metadata::WalletService,
};

pub mod htlc;

pub use self::htlc::{Script, ScriptInfo};

/// Serialized identity. An empty identity denotes "no owner" (a redeemed token).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(Vec<u8>);

impl Identity {
    pub fn new(bytes: Vec<u8>) -> Self {
        Identity(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex-encoded SHA-256 digest of the identity, safe to log.
    pub fn unique_id(&self) -> String {
        hex::encode(Sha256::digest(&self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let id = self.unique_id();
        formatter.debug_tuple("Identity").field(&&id[..16]).finish()
    }
}

impl From<Vec<u8>> for Identity {
    fn from(bytes: Vec<u8>) -> Self {
        Identity(bytes)
    }
}

impl AsRef<[u8]> for Identity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Supported identity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityType {
    /// Certificate-like identity revealing its enrollment ID.
    X509,
    /// Pseudonymous identity hiding its enrollment ID in a commitment.
    Idemix,
    /// Hash time lock script with a sender and a recipient.
    HtlcScript,
}

impl IdentityType {
    pub fn tag(self) -> &'static str {
        match self {
            IdentityType::X509 => "x509",
            IdentityType::Idemix => "idemix",
            IdentityType::HtlcScript => "htlc",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "x509" => Ok(IdentityType::X509),
            "idemix" => Ok(IdentityType::Idemix),
            "htlc" => Ok(IdentityType::HtlcScript),
            _ => Err(Error::malformed(format!("identity type [{}] not recognized", tag))),
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.tag())
    }
}

/// Identity tagged with its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedIdentity {
    pub identity_type: String,
    pub identity: Identity,
}

impl TypedIdentity {
    pub fn new(identity_type: IdentityType, identity: Identity) -> Self {
        TypedIdentity {
            identity_type: identity_type.tag().to_owned(),
            identity,
        }
    }

    /// Wraps a raw identity into a typed one.
    pub fn wrap(identity_type: IdentityType, identity: Identity) -> Result<Identity> {
        TypedIdentity::new(identity_type, identity).to_identity()
    }

    pub fn parse(identity: &Identity) -> Result<Self> {
        crypto::decode(identity.as_bytes()).context("identity cannot be unwrapped")
    }

    pub fn to_identity(&self) -> Result<Identity> {
        crypto::encode(self).map(Identity)
    }

    pub fn kind(&self) -> Result<IdentityType> {
        IdentityType::from_tag(&self.identity_type)
    }
}

/// Raw X.509 identity: the enrollment ID and a signature verification key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X509Identity {
    pub enrollment_id: String,
    pub public_key: [u8; 32],
}

/// Raw Idemix identity: a pseudonym committing to the enrollment ID and revocation handle,
/// and a signature verification key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdemixIdentity {
    pub nym: Commitment,
    pub public_key: [u8; 32],
}

fn nym(enrollment_id: &str, revocation_handle: &[u8], blinding: &Scalar) -> Result<Commitment> {
    let values = [
        hash_to_scalar(enrollment_id.as_bytes()),
        hash_to_scalar(revocation_handle),
        *blinding,
    ];
    crypto::commit(&values, PedersenGenerators::default().as_slice())
}

/// Audit info of a plain (X.509 or Idemix) owner.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub enrollment_id: String,
    pub revocation_handle: Vec<u8>,
    /// Blinding factor of the pseudonym; present for Idemix identities only.
    pub nym_blinding: Option<Scalar>,
}

impl fmt::Debug for AuditInfo {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_struct("AuditInfo").finish()
    }
}

impl AuditInfo {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        crypto::decode(bytes).context("cannot decode audit info")
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crypto::encode(self)
    }
}

/// Checks that an identity belongs to a specific owner.
pub trait Matcher {
    /// Matches a raw (untyped) identity.
    fn matches(&self, identity: &Identity) -> Result<()>;
}

/// Owner matchers for the supported plain identity types.
#[derive(Clone)]
pub enum OwnerMatcher {
    /// Matches X.509 identities by enrollment ID.
    EnrollmentId { enrollment_id: String },
    /// Matches Idemix identities by recomputing the pseudonym.
    Nym {
        enrollment_id: String,
        revocation_handle: Vec<u8>,
        blinding: Scalar,
    },
}

impl fmt::Debug for OwnerMatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OwnerMatcher::EnrollmentId { .. } => formatter.write_str("OwnerMatcher::EnrollmentId"),
            OwnerMatcher::Nym { .. } => formatter.write_str("OwnerMatcher::Nym"),
        }
    }
}

impl Matcher for OwnerMatcher {
    fn matches(&self, identity: &Identity) -> Result<()> {
        match self {
            OwnerMatcher::EnrollmentId { enrollment_id } => {
                let raw: X509Identity = crypto::decode(identity.as_bytes())
                    .map_err(|e| Error::verification(e.to_string()))
                    .context("identity is not an X.509 identity")?;
                if raw.enrollment_id != *enrollment_id {
                    return Err(Error::verification("enrollment ID does not match"));
                }
            }
            OwnerMatcher::Nym {
                enrollment_id,
                revocation_handle,
                blinding,
            } => {
                let raw: IdemixIdentity = crypto::decode(identity.as_bytes())
                    .map_err(|e| Error::verification(e.to_string()))
                    .context("identity is not an Idemix identity")?;
                if raw.nym != nym(enrollment_id, revocation_handle, blinding)? {
                    return Err(Error::verification("pseudonym does not match"));
                }
            }
        }
        Ok(())
    }
}

/// Turns audit info into owner matchers.
pub trait Deserializer: Send + Sync {
    /// Returns a matcher for the plain typed identity `owner` from its audit info.
    fn owner_matcher(&self, owner: &Identity, audit_info: &[u8]) -> Result<OwnerMatcher>;
}

/// Verifies signatures of identities.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, identity: &Identity, message: &[u8], signature: &[u8]) -> Result<()>;
}

/// Signs messages on behalf of an identity.
pub trait SigningIdentity: Send + Sync {
    fn identity(&self) -> &Identity;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Default implementation of identity-related traits for the supported identity types.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDeserializer;

impl IdentityDeserializer {
    fn verifying_key(&self, identity: &Identity) -> Result<VerifyingKey> {
        let typed = TypedIdentity::parse(identity)?;
        let public_key = match typed.kind()? {
            IdentityType::X509 => {
                let raw: X509Identity = crypto::decode(typed.identity.as_bytes())?;
                raw.public_key
            }
            IdentityType::Idemix => {
                let raw: IdemixIdentity = crypto::decode(typed.identity.as_bytes())?;
                raw.public_key
            }
            IdentityType::HtlcScript => {
                return Err(Error::malformed("script identities cannot sign"));
            }
        };
        VerifyingKey::from_bytes(&public_key)
            .map_err(|e| Error::malformed(format!("invalid verification key: {}", e)))
    }
}

impl Deserializer for IdentityDeserializer {
    fn owner_matcher(&self, owner: &Identity, audit_info: &[u8]) -> Result<OwnerMatcher> {
        let typed = TypedIdentity::parse(owner)?;
        match typed.kind()? {
            IdentityType::X509 => {
                let info = AuditInfo::from_bytes(audit_info)?;
                Ok(OwnerMatcher::EnrollmentId {
                    enrollment_id: info.enrollment_id,
                })
            }
            IdentityType::Idemix => {
                let info = AuditInfo::from_bytes(audit_info)?;
                let blinding = info.nym_blinding.ok_or_else(|| {
                    Error::malformed("idemix audit info has no pseudonym blinding")
                })?;
                Ok(OwnerMatcher::Nym {
                    enrollment_id: info.enrollment_id,
                    revocation_handle: info.revocation_handle,
                    blinding,
                })
            }
            IdentityType::HtlcScript => Err(Error::malformed(
                "script owners are matched through their sender and recipient",
            )),
        }
    }
}

impl SignatureVerifier for IdentityDeserializer {
    fn verify(&self, identity: &Identity, message: &[u8], signature: &[u8]) -> Result<()> {
        let key = self.verifying_key(identity)?;
        let signature = Signature::from_slice(signature)
            .map_err(|e| Error::verification(format!("malformed signature: {}", e)))?;
        key.verify_strict(message, &signature)
            .map_err(|_| Error::verification("invalid signature"))
    }
}

impl WalletService for IdentityDeserializer {
    fn enrollment_id(&self, identity: &Identity, audit_info: &[u8]) -> Result<String> {
        if audit_info.is_empty() {
            return Ok(String::new());
        }

        let typed = TypedIdentity::parse(identity)?;
        match typed.kind()? {
            IdentityType::HtlcScript => {
                let script = Script::from_typed(&typed)?;
                let info = ScriptInfo::from_bytes(audit_info)?;
                self.enrollment_id(&script.recipient, &info.recipient)
            }
            _ => Ok(AuditInfo::from_bytes(audit_info)?.enrollment_id),
        }
    }
}

/// Ed25519-backed signing identity.
pub struct Ed25519Signer {
    key: SigningKey,
    identity: Identity,
    audit_info: Vec<u8>,
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Ed25519Signer")
            .field("identity", &self.identity)
            .finish()
    }
}

impl Ed25519Signer {
    /// Generates a fresh X.509 identity.
    pub fn x509(enrollment_id: &str) -> Result<Self> {
        let mut rng = thread_rng();
        let key = SigningKey::generate(&mut rng);
        let raw = X509Identity {
            enrollment_id: enrollment_id.to_owned(),
            public_key: key.verifying_key().to_bytes(),
        };
        let info = AuditInfo {
            enrollment_id: enrollment_id.to_owned(),
            revocation_handle: revocation_handle(&mut rng),
            nym_blinding: None,
        };
        Ok(Ed25519Signer {
            identity: TypedIdentity::wrap(IdentityType::X509, Identity(crypto::encode(&raw)?))?,
            audit_info: info.to_bytes()?,
            key,
        })
    }

    /// Generates a fresh Idemix pseudonym for the enrollment ID.
    pub fn idemix(enrollment_id: &str) -> Result<Self> {
        let mut rng = thread_rng();
        let key = SigningKey::generate(&mut rng);
        let revocation_handle = revocation_handle(&mut rng);
        let blinding = random_scalar(&mut rng);
        let raw = IdemixIdentity {
            nym: nym(enrollment_id, &revocation_handle, &blinding)?,
            public_key: key.verifying_key().to_bytes(),
        };
        let info = AuditInfo {
            enrollment_id: enrollment_id.to_owned(),
            revocation_handle,
            nym_blinding: Some(blinding),
        };
        Ok(Ed25519Signer {
            identity: TypedIdentity::wrap(IdentityType::Idemix, Identity(crypto::encode(&raw)?))?,
            audit_info: info.to_bytes()?,
            key,
        })
    }

    pub fn audit_info(&self) -> &[u8] {
        &self.audit_info
    }
}

fn revocation_handle<R: RngCore>(rng: &mut R) -> Vec<u8> {
    let mut handle = vec![0_u8; 16];
    rng.fill_bytes(&mut handle);
    handle
}

impl SigningIdentity for Ed25519Signer {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(identity: &Identity) -> Identity {
        TypedIdentity::parse(identity).unwrap().identity
    }

    #[test]
    fn x509_owner_matching() {
        let alice = Ed25519Signer::x509("alice").unwrap();
        let bob = Ed25519Signer::x509("bob").unwrap();
        let des = IdentityDeserializer;

        let matcher = des.owner_matcher(alice.identity(), alice.audit_info()).unwrap();
        matcher.matches(&raw(alice.identity())).unwrap();
        let err = matcher.matches(&raw(bob.identity())).unwrap_err();
        assert!(err.is_verification());

        let matcher = des.owner_matcher(alice.identity(), bob.audit_info()).unwrap();
        assert!(matcher.matches(&raw(alice.identity())).is_err());
    }

    #[test]
    fn idemix_owner_matching() {
        let alice = Ed25519Signer::idemix("alice").unwrap();
        let other_alice = Ed25519Signer::idemix("alice").unwrap();
        let des = IdentityDeserializer;

        let matcher = des.owner_matcher(alice.identity(), alice.audit_info()).unwrap();
        matcher.matches(&raw(alice.identity())).unwrap();
        // Another pseudonym of the same enrollment ID has different blinding.
        assert!(matcher.matches(&raw(other_alice.identity())).is_err());
        // X.509 identities are not pseudonyms.
        let x509 = Ed25519Signer::x509("alice").unwrap();
        assert!(matcher.matches(&raw(x509.identity())).is_err());
    }

    #[test]
    fn unknown_identity_types_are_rejected() {
        let identity = TypedIdentity {
            identity_type: "nym-v2".to_owned(),
            identity: Identity::new(vec![1, 2, 3]),
        }
        .to_identity()
        .unwrap();
        let err = IdentityDeserializer.owner_matcher(&identity, &[]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Malformed);
        assert!(err.to_string().contains("not recognized"));
        assert!(IdentityDeserializer.verify(&identity, b"msg", &[0; 64]).is_err());
    }

    #[test]
    fn signatures() {
        let alice = Ed25519Signer::x509("alice").unwrap();
        let bob = Ed25519Signer::idemix("bob").unwrap();
        let signature = alice.sign(b"message").unwrap();

        IdentityDeserializer
            .verify(alice.identity(), b"message", &signature)
            .unwrap();
        assert!(IdentityDeserializer
            .verify(alice.identity(), b"other message", &signature)
            .unwrap_err()
            .is_verification());
        assert!(IdentityDeserializer
            .verify(bob.identity(), b"message", &signature)
            .is_err());
        assert!(IdentityDeserializer
            .verify(alice.identity(), b"message", &signature[..10])
            .is_err());
    }

    #[test]
    fn enrollment_ids() {
        let alice = Ed25519Signer::idemix("alice").unwrap();
        let eid = IdentityDeserializer
            .enrollment_id(alice.identity(), alice.audit_info())
            .unwrap();
        assert_eq!(eid, "alice");
        assert_eq!(
            IdentityDeserializer.enrollment_id(&Identity::default(), &[]).unwrap(),
            ""
        );
    }
}
