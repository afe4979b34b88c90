//! Crypto primitives for EIP-712 signing
//!
//! Thin seam over the external primitives: Keccak-256, secp256k1
//! recoverable ECDSA, and Ethereum address derivation. The encoder and
//! signer go through this module only, so swapping providers touches a
//! single file.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use tiny_keccak::{Hasher, Keccak};

use crate::error::{Eip712Error, Result};

/// Compute the Keccak-256 hash of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Parse a secp256k1 secret key from hex
///
/// Accepts `0x`-prefixed or bare hex of exactly 64 characters. Rejects
/// non-hex input, wrong lengths, and scalars outside the curve order.
pub fn secret_key_from_hex(private_key: &str) -> Result<SecretKey> {
    let stripped = private_key
        .strip_prefix("0x")
        .or_else(|| private_key.strip_prefix("0X"))
        .unwrap_or(private_key);

    if stripped.len() != 64 {
        return Err(Eip712Error::InvalidPrivateKey(format!(
            "expected 64 hex characters, got {}",
            stripped.len()
        )));
    }

    let bytes = hex::decode(stripped)
        .map_err(|e| Eip712Error::InvalidPrivateKey(format!("invalid hex: {}", e)))?;

    SecretKey::from_slice(&bytes).map_err(|e| Eip712Error::InvalidPrivateKey(e.to_string()))
}

/// Sign a 32-byte digest, returning `(r, s, recovery_id)`
///
/// The secp256k1 primitive always produces a low-s (canonical) signature,
/// so no extra normalization happens here.
pub fn sign_digest(digest: &[u8; 32], secret_key: &SecretKey) -> Result<([u8; 32], [u8; 32], u8)> {
    let secp = Secp256k1::new();

    let message = Message::from_digest_slice(digest)
        .map_err(|e| Eip712Error::SigningFailed(e.to_string()))?;

    let (recovery_id, sig_bytes) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&sig_bytes[0..32]);
    s.copy_from_slice(&sig_bytes[32..64]);

    Ok((r, s, recovery_id.to_i32() as u8))
}

/// Recover the 20-byte signer address from a digest and `(r, s, recovery_id)`
pub fn recover_digest(
    digest: &[u8; 32],
    r: &[u8; 32],
    s: &[u8; 32],
    recovery_id: u8,
) -> Result<[u8; 20]> {
    let secp = Secp256k1::new();

    let rec_id = RecoveryId::from_i32(recovery_id as i32)
        .map_err(|e| Eip712Error::InvalidSignature(format!("invalid recovery id: {}", e)))?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[0..32].copy_from_slice(r);
    sig_bytes[32..64].copy_from_slice(s);

    let recoverable_sig = RecoverableSignature::from_compact(&sig_bytes, rec_id)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let message = Message::from_digest_slice(digest)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let public_key = secp
        .recover_ecdsa(&message, &recoverable_sig)
        .map_err(|e| Eip712Error::InvalidSignature(format!("recovery failed: {}", e)))?;

    Ok(public_key_to_address(&public_key))
}

/// Derive the Ethereum address from a secp256k1 public key
///
/// Keccak-256 of the 64-byte uncompressed key (without the 0x04 prefix),
/// low 20 bytes.
pub fn public_key_to_address(public_key: &PublicKey) -> [u8; 20] {
    let pubkey_bytes = public_key.serialize_uncompressed();
    let hash = keccak256(&pubkey_bytes[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}

/// Derive the Ethereum address for a secret key
pub fn secret_key_to_address(secret_key: &SecretKey) -> [u8; 20] {
    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, secret_key);
    public_key_to_address(&public_key)
}

/// Format a 20-byte address with the EIP-55 mixed-case checksum
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let hex_addr = hex::encode(address);
    let hash = keccak256(hex_addr.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");

    for (i, c) in hex_addr.chars().enumerate() {
        if c.is_ascii_digit() {
            checksummed.push(c);
        } else {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if nibble >= 8 {
                checksummed.push(c.to_ascii_uppercase());
            } else {
                checksummed.push(c);
            }
        }
    }

    checksummed
}
