//! HMAC signing and the Diffie-Hellman associate exchange.
//!
//! - <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.6>
//! - <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.8.4.2>

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::association::{AssocType, SessionType};

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// The 1024-bit modulus of appendix B, used when the relying party does not
/// supply `dh_modulus`.
/// <https://openid.net/specs/openid-authentication-2_0.html#rfc.section.B>
const DEFAULT_DH_MODULUS_HEX: &str = "DCF93A0B883972EC0E19989AC5A2CE310E1D37717E8D9571BB7623\
     731866E61EF75A2E27898B057F9891C2E27A639C3F29B60814581CD3B2CA3986D2683705577D45C2E7E52DC81C7A\
     171876E5CEA74B1448BFDFAF18828EFD2519F14E45E3826634AF1949E5B535CC829A483B8A76223E5D490A257F05\
     BDFF16F2FB22C583AB";

const DEFAULT_DH_GENERATOR: u32 = 2;

pub(crate) fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn b64_decode(text: &str) -> anyhow::Result<Vec<u8>> {
    STANDARD.decode(text).context("invalid base64")
}

/// "Big-endian two's complement" encoding of a nonnegative integer.
///
/// If the high bit of the leading byte is set, a zero byte is prepended so
/// the value stays nonnegative; leading zero bytes already present are kept.
/// <https://openid.net/specs/openid-authentication-2_0.html#btwoc>
pub(crate) fn btwoc(bytes: &[u8]) -> Vec<u8> {
    match bytes.first() {
        None => vec![0],
        Some(&first) if first & 0x80 != 0 => {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.push(0);
            out.extend_from_slice(bytes);
            out
        }
        Some(_) => bytes.to_vec(),
    }
}

/// Byte-wise XOR of two equal-length buffers.
pub(crate) fn xor(lhs: &[u8], rhs: &[u8]) -> Vec<u8> {
    debug_assert_eq!(lhs.len(), rhs.len());
    std::iter::zip(lhs, rhs).map(|(l, r)| l ^ r).collect()
}

/// A plaintext MAC key of the length the association algorithm requires.
pub(crate) fn random_mac_key(algorithm: AssocType) -> Vec<u8> {
    let mut key = vec![0u8; algorithm.mac_key_len()];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Sign `data` with the association's MAC key.
pub(crate) fn hmac_sign(algorithm: AssocType, key: &[u8], data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let sig = match algorithm {
        AssocType::HmacSha1 => {
            let mut mac = HmacSha1::new_from_slice(key).context("invalid HMAC-SHA1 key")?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        AssocType::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(key).context("invalid HMAC-SHA256 key")?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(sig)
}

/// Constant-time comparison of `sig` against the HMAC of `data`.
pub(crate) fn hmac_verify(
    algorithm: AssocType,
    key: &[u8],
    data: &[u8],
    sig: &[u8],
) -> anyhow::Result<bool> {
    let valid = match algorithm {
        AssocType::HmacSha1 => {
            let mut mac = HmacSha1::new_from_slice(key).context("invalid HMAC-SHA1 key")?;
            mac.update(data);
            mac.verify_slice(sig).is_ok()
        }
        AssocType::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(key).context("invalid HMAC-SHA256 key")?;
            mac.update(data);
            mac.verify_slice(sig).is_ok()
        }
    };
    Ok(valid)
}

/// Group parameters of a Diffie-Hellman exchange.
pub(crate) struct DhParams {
    modulus: BigUint,
    generator: BigUint,
}

impl DhParams {
    /// Build from the optional `dh_modulus` and `dh_gen` request fields,
    /// both base64-encoded btwoc integers, falling back to the fixed group.
    pub(crate) fn from_request(
        modulus_b64: Option<&str>,
        generator_b64: Option<&str>,
    ) -> anyhow::Result<DhParams> {
        let modulus = match modulus_b64 {
            Some(text) => {
                let bytes = b64_decode(text).context("couldn't decode dh_modulus")?;
                BigUint::from_bytes_be(&bytes)
            }
            None => default_modulus(),
        };
        let generator = match generator_b64 {
            Some(text) => {
                let bytes = b64_decode(text).context("couldn't decode dh_gen")?;
                BigUint::from_bytes_be(&bytes)
            }
            None => BigUint::from(DEFAULT_DH_GENERATOR),
        };
        if modulus < BigUint::from(4u32) {
            anyhow::bail!("dh_modulus is too small");
        }
        Ok(DhParams { modulus, generator })
    }
}

pub(crate) fn default_modulus() -> BigUint {
    // The constant is well-formed hex, parsing cannot fail.
    BigUint::parse_bytes(DEFAULT_DH_MODULUS_HEX.as_bytes(), 16).unwrap()
}

/// A private exponent in `[1, modulus - 2]`.
fn random_exponent(modulus: &BigUint) -> BigUint {
    let mut buf = vec![0u8; (modulus.bits() as usize + 7) / 8 + 8];
    rand::thread_rng().fill_bytes(&mut buf);
    BigUint::from_bytes_be(&buf) % (modulus - BigUint::from(2u32)) + BigUint::from(1u32)
}

/// The provider's half of a DH associate exchange.
pub(crate) struct DhServerExchange {
    /// `base64(btwoc(g ^ x mod p))`
    pub(crate) dh_server_public: String,
    /// `base64(H(btwoc(g ^ xy mod p)) XOR mac_key)`
    pub(crate) enc_mac_key: String,
}

/// Perform key agreement against `dh_consumer_public` and encrypt the MAC
/// key against the digest of the shared secret.
///
/// The caller guarantees that the session hash length matches the MAC key
/// length (see [`SessionType::compatible_with`]).
pub(crate) fn dh_server_exchange(
    params: &DhParams,
    consumer_public_b64: &str,
    session_type: SessionType,
    mac_key: &[u8],
) -> anyhow::Result<DhServerExchange> {
    let consumer_bytes =
        b64_decode(consumer_public_b64).context("couldn't decode dh_consumer_public")?;
    let consumer_public = BigUint::from_bytes_be(&consumer_bytes);
    if consumer_public < BigUint::from(2u32) || consumer_public >= params.modulus {
        anyhow::bail!("dh_consumer_public is out of range");
    }

    let private = random_exponent(&params.modulus);
    let server_public = params.generator.modpow(&private, &params.modulus);
    let shared = consumer_public.modpow(&private, &params.modulus);

    let digest = session_digest(session_type, &btwoc(&shared.to_bytes_be()))?;
    if digest.len() != mac_key.len() {
        anyhow::bail!("session hash length doesn't match MAC key length");
    }

    Ok(DhServerExchange {
        dh_server_public: b64_encode(&btwoc(&server_public.to_bytes_be())),
        enc_mac_key: b64_encode(&xor(&digest, mac_key)),
    })
}

fn session_digest(session_type: SessionType, input: &[u8]) -> anyhow::Result<Vec<u8>> {
    let digest = match session_type {
        SessionType::DhSha1 => Sha1::digest(input).to_vec(),
        SessionType::DhSha256 => Sha256::digest(input).to_vec(),
        SessionType::NoEncryption => anyhow::bail!("no-encryption session has no hash"),
    };
    Ok(digest)
}

#[cfg(test)]
mod test {
    use anyhow::Context;

    use super::*;

    #[test]
    fn btwoc_prepends_zero_when_high_bit_set() {
        assert_eq!(btwoc(&[0x80]), vec![0x00, 0x80]);
        assert_eq!(btwoc(&[0xff, 0x01]), vec![0x00, 0xff, 0x01]);
    }

    #[test]
    fn btwoc_keeps_value_when_high_bit_clear() {
        assert_eq!(btwoc(&[0x7f]), vec![0x7f]);
        assert_eq!(btwoc(&[0x01, 0x80]), vec![0x01, 0x80]);
    }

    #[test]
    fn btwoc_does_not_strip_leading_zeros() {
        assert_eq!(btwoc(&[0x00, 0x7f]), vec![0x00, 0x7f]);
        assert_eq!(btwoc(&[]), vec![0x00]);
    }

    #[test]
    fn xor_is_byte_wise() {
        assert_eq!(xor(&[0b1010, 0xff], &[0b0110, 0x0f]), vec![0b1100, 0xf0]);
    }

    #[test]
    fn mac_key_lengths() {
        assert_eq!(random_mac_key(AssocType::HmacSha1).len(), 20);
        assert_eq!(random_mac_key(AssocType::HmacSha256).len(), 32);
    }

    #[test]
    fn hmac_sign_then_verify() -> anyhow::Result<()> {
        for algorithm in [AssocType::HmacSha1, AssocType::HmacSha256] {
            let key = random_mac_key(algorithm);
            let sig = hmac_sign(algorithm, &key, b"mode:id_res\n")?;
            assert_eq!(sig.len(), algorithm.mac_key_len());

            assert!(hmac_verify(algorithm, &key, b"mode:id_res\n", &sig)?);
            assert!(!hmac_verify(algorithm, &key, b"mode:cancel\n", &sig)?);

            let mut tampered = sig.clone();
            tampered[0] ^= 1;
            assert!(!hmac_verify(algorithm, &key, b"mode:id_res\n", &tampered)?);
        }
        Ok(())
    }

    /// Play the relying party's side of the exchange and check that the MAC
    /// key can be recovered from `enc_mac_key`.
    #[test]
    fn dh_exchange_recovers_mac_key() -> anyhow::Result<()> {
        let params = DhParams::from_request(None, None)?;

        let consumer_private = random_exponent(&params.modulus);
        let consumer_public = params.generator.modpow(&consumer_private, &params.modulus);
        let consumer_public_b64 = b64_encode(&btwoc(&consumer_public.to_bytes_be()));

        let mac_key = random_mac_key(AssocType::HmacSha256);
        let exchange = dh_server_exchange(
            &params,
            &consumer_public_b64,
            SessionType::DhSha256,
            &mac_key,
        )
        .context("server side of the exchange failed")?;

        let server_public_bytes = b64_decode(&exchange.dh_server_public)?;
        let server_public = BigUint::from_bytes_be(&server_public_bytes);
        let shared = server_public.modpow(&consumer_private, &params.modulus);
        let digest = Sha256::digest(btwoc(&shared.to_bytes_be()));

        let enc_mac_key = b64_decode(&exchange.enc_mac_key)?;
        assert_eq!(xor(&digest, &enc_mac_key), mac_key);
        Ok(())
    }

    #[test]
    fn dh_exchange_with_supplied_group() -> anyhow::Result<()> {
        // 2^61 - 1, a small prime so the test stays fast
        let modulus = BigUint::from(2_305_843_009_213_693_951u64);
        let modulus_b64 = b64_encode(&btwoc(&modulus.to_bytes_be()));
        let generator_b64 = b64_encode(&[3]);

        let params = DhParams::from_request(Some(&modulus_b64), Some(&generator_b64))?;

        let consumer_private = random_exponent(&modulus);
        let consumer_public = BigUint::from(3u32).modpow(&consumer_private, &modulus);
        let consumer_public_b64 = b64_encode(&btwoc(&consumer_public.to_bytes_be()));

        let mac_key = random_mac_key(AssocType::HmacSha1);
        let exchange =
            dh_server_exchange(&params, &consumer_public_b64, SessionType::DhSha1, &mac_key)?;

        let server_public = BigUint::from_bytes_be(&b64_decode(&exchange.dh_server_public)?);
        let shared = server_public.modpow(&consumer_private, &modulus);
        let digest = Sha1::digest(btwoc(&shared.to_bytes_be()));

        assert_eq!(xor(&digest, &b64_decode(&exchange.enc_mac_key)?), mac_key);
        Ok(())
    }

    #[test]
    fn dh_rejects_out_of_range_consumer_key() -> anyhow::Result<()> {
        let params = DhParams::from_request(None, None)?;
        let mac_key = random_mac_key(AssocType::HmacSha256);

        let one = b64_encode(&[1]);
        assert!(dh_server_exchange(&params, &one, SessionType::DhSha256, &mac_key).is_err());
        Ok(())
    }
}
