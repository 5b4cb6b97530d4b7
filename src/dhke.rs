//! Blind Diffie-Hellman key exchange.
//!
//! Three-step protocol between the wallet and the mint:
//! `blind_message` (wallet), `sign_message` (mint), `unblind_message`
//! (wallet). The mint-side steps live here too so the whole exchange can be
//! exercised locally.

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::rand::rngs::OsRng;
use bitcoin::secp256k1::{PublicKey, Scalar, SecretKey};
use strum::EnumIs;

use crate::SECP256K1;

/// Counter window for the hash-to-curve search.
const MAX_COUNTER: u32 = 1 << 16;

#[derive(Debug)]
//
#[derive(EnumIs, thiserror::Error)]
pub enum CryptoError {
    /// no valid x coordinate found within the counter window
    #[error("no curve point for message")]
    HashToCurveFailed,
    /// point arithmetic left the curve (identity) or a response point is bad
    #[error("invalid curve point")]
    InvalidPoint,
    #[error("blinding failed")]
    BlindingFailed,
}

/// Map a message to a curve point.
///
/// `sha256(message || counter)` is read as a compressed x coordinate with an
/// even-y sign byte; invalid x values bump the counter and retry.
pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey, CryptoError> {
    let mut point = [0u8; 33];
    point[0] = 0x02;

    for counter in 0..MAX_COUNTER {
        let hash =
            sha256::Hash::hash(&[message, counter.to_string().as_bytes()].concat());
        point[1..].copy_from_slice(hash.as_byte_array());

        if let Ok(pubkey) = PublicKey::from_slice(&point) {
            return Ok(pubkey);
        }
    }

    Err(CryptoError::HashToCurveFailed)
}

/// Wallet step one: `B_ = H2C(secret) + r*G`.
///
/// A caller-provided blinding factor is only for tests and vectors;
/// production callers pass `None` and get a fresh uniform scalar.
pub fn blind_message(
    secret: &[u8],
    blinding_factor: Option<SecretKey>,
) -> Result<(PublicKey, SecretKey), CryptoError> {
    let y = hash_to_curve(secret)?;

    let r = match blinding_factor {
        Some(r) => r,
        None => SecretKey::new(&mut OsRng),
    };

    let b_ = y
        .combine(&r.public_key(&SECP256K1))
        .map_err(|_| CryptoError::BlindingFailed)?;

    Ok((b_, r))
}

/// Mint step two: `C_ = k*B_`.
pub fn sign_message(k: &SecretKey, blinded_message: &PublicKey) -> Result<PublicKey, CryptoError> {
    blinded_message
        .mul_tweak(&SECP256K1, &Scalar::from(*k))
        .map_err(|_| CryptoError::InvalidPoint)
}

/// Wallet step three: `C = C_ - r*K` where `K` is the mint key for the
/// amount.
pub fn unblind_message(
    blinded_signature: &PublicKey,
    r: &SecretKey,
    mint_pubkey: &PublicKey,
) -> Result<PublicKey, CryptoError> {
    let rk = mint_pubkey
        .mul_tweak(&SECP256K1, &Scalar::from(*r))
        .map_err(|_| CryptoError::InvalidPoint)?;

    blinded_signature
        .combine(&rk.negate(&SECP256K1))
        .map_err(|_| CryptoError::InvalidPoint)
}

/// Mint-side check: `C == k*H2C(secret)`.
pub fn verify_message(
    k: &SecretKey,
    unblinded: &PublicKey,
    secret: &[u8],
) -> Result<bool, CryptoError> {
    let y = hash_to_curve(secret)?;
    let expected = y
        .mul_tweak(&SECP256K1, &Scalar::from(*k))
        .map_err(|_| CryptoError::InvalidPoint)?;

    Ok(*unblinded == expected)
}
