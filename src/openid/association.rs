//! Associations between the provider and relying parties.
//!
//! An association is a shared MAC key under an opaque handle, used to sign
//! positive assertions. <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8>

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::crypto;

const HANDLE_BYTES: usize = 16;

/// Signature algorithm of an association, a.k.a. `assoc_type`.
///
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8.3>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssocType {
    HmacSha1,
    HmacSha256,
}

impl AssocType {
    pub(crate) fn from_wire(value: &str) -> Option<AssocType> {
        match value {
            "HMAC-SHA1" => Some(AssocType::HmacSha1),
            "HMAC-SHA256" => Some(AssocType::HmacSha256),
            _ => None,
        }
    }

    pub(crate) const fn as_wire(self) -> &'static str {
        match self {
            AssocType::HmacSha1 => "HMAC-SHA1",
            AssocType::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// MAC key length in bytes, equal to the digest size of the hash.
    pub(crate) const fn mac_key_len(self) -> usize {
        match self {
            AssocType::HmacSha1 => 20,
            AssocType::HmacSha256 => 32,
        }
    }
}

/// Key agreement scheme of an associate request, a.k.a. `session_type`.
///
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8.4>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionType {
    NoEncryption,
    DhSha1,
    DhSha256,
}

impl SessionType {
    pub(crate) fn from_wire(value: &str) -> Option<SessionType> {
        match value {
            "no-encryption" => Some(SessionType::NoEncryption),
            "DH-SHA1" => Some(SessionType::DhSha1),
            "DH-SHA256" => Some(SessionType::DhSha256),
            _ => None,
        }
    }

    pub(crate) const fn as_wire(self) -> &'static str {
        match self {
            SessionType::NoEncryption => "no-encryption",
            SessionType::DhSha1 => "DH-SHA1",
            SessionType::DhSha256 => "DH-SHA256",
        }
    }

    /// The session hash is XORed against the MAC key, so its digest size
    /// must equal the key length of the association algorithm.
    pub(crate) const fn compatible_with(self, assoc_type: AssocType) -> bool {
        match self {
            SessionType::NoEncryption => true,
            SessionType::DhSha1 => matches!(assoc_type, AssocType::HmacSha1),
            SessionType::DhSha256 => matches!(assoc_type, AssocType::HmacSha256),
        }
    }
}

/// A stored association.
///
/// `private` associations are generated unilaterally by the provider to sign
/// an assertion for a relying party without a shared association. They are
/// used only for later `check_authentication` verification and must never be
/// returned from an associate exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub handle: String,
    pub algorithm: AssocType,
    /// Base64-encoded MAC key
    pub secret: String,
    pub expiry: DateTime<Utc>,
    pub private: bool,
}

impl Association {
    /// Generate a fresh association with an unguessable handle and a random
    /// MAC key of the length the algorithm requires.
    pub(crate) fn generate(algorithm: AssocType, lifetime: Duration, private: bool) -> Association {
        let mut handle_bytes = [0u8; HANDLE_BYTES];
        rand::thread_rng().fill_bytes(&mut handle_bytes);

        let mac_key = crypto::random_mac_key(algorithm);

        Association {
            handle: URL_SAFE_NO_PAD.encode(handle_bytes),
            algorithm,
            secret: crypto::b64_encode(&mac_key),
            expiry: Utc::now() + lifetime,
            private,
        }
    }

    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// The decoded MAC key.
    pub(crate) fn mac_key(&self) -> anyhow::Result<Vec<u8>> {
        crypto::b64_decode(&self.secret)
    }
}
