//! Response nonces.
//!
//! Every positive assertion carries a `response_nonce` that starts with the
//! current UTC time at seconds precision followed by a random suffix. A
//! relying party without a shared association sends the assertion back
//! through `check_authentication`, which consumes the nonce; this is the
//! sole guard against replay.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::constants::OPENID_RESPONSE_NONCE_MAX_LEN;

const SALT_BYTES: usize = 4;

/// A stored response nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nonce {
    pub id: String,
    pub expiry: DateTime<Utc>,
}

impl Nonce {
    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// Build a fresh `response_nonce` value.
///
/// Matches the expected format of `2001-02-03T04:05:06Z` followed by eight
/// hex characters of entropy.
pub(crate) fn generate_response_nonce(now: DateTime<Utc>) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut nonce = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    nonce.push_str(&hex::encode(salt));

    debug_assert!(nonce.len() <= OPENID_RESPONSE_NONCE_MAX_LEN);
    nonce
}

#[cfg(test)]
mod test {
    use anyhow::Context;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn nonce_starts_with_utc_seconds_timestamp() -> anyhow::Result<()> {
        let now = Utc.with_ymd_and_hms(2023, 9, 15, 11, 23, 46).unwrap();
        let nonce = generate_response_nonce(now);

        let z = nonce.find('Z').context("nonce doesn't contain a Z")?;
        let (time, salt) = nonce.split_at(z + 1);

        assert_eq!(time, "2023-09-15T11:23:46Z");
        assert_eq!(salt.len(), 8);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        Ok(())
    }

    #[test]
    fn nonces_are_unique() {
        let now = Utc::now();
        assert_ne!(generate_response_nonce(now), generate_response_nonce(now));
    }

    #[test]
    fn stays_within_the_length_limit() {
        let nonce = generate_response_nonce(Utc::now());
        assert!(nonce.len() <= OPENID_RESPONSE_NONCE_MAX_LEN);
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let now = Utc::now();
        let nonce = Nonce {
            id: generate_response_nonce(now),
            expiry: now + chrono::Duration::seconds(30),
        };
        assert!(!nonce.is_expired(now));
        assert!(nonce.is_expired(now + chrono::Duration::seconds(30)));
    }
}
