//! Encrypted keystore (Web3 Secret Storage) decryption
//!
//! Reads version-3 keystore documents: derives the decryption key with
//! scrypt or pbkdf2-hmac-sha256, authenticates the ciphertext with the
//! keccak-256 MAC, then decrypts the secret key with AES-128-CTR.
//! Intermediate key material is zeroized before returning.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use serde::Deserialize;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::crypto::keccak256;
use crate::error::{Eip712Error, Result};

type Aes128Ctr = Ctr128BE<Aes128>;

const KEYSTORE_VERSION: u64 = 3;

#[derive(Debug, Deserialize)]
struct KeystoreFile {
    version: u64,
    #[serde(alias = "Crypto")]
    crypto: CryptoSection,
}

#[derive(Debug, Deserialize)]
struct CryptoSection {
    cipher: String,
    ciphertext: String,
    cipherparams: CipherParams,
    kdf: String,
    kdfparams: KdfParams,
    mac: String,
}

#[derive(Debug, Deserialize)]
struct CipherParams {
    iv: String,
}

#[derive(Debug, Deserialize)]
struct KdfParams {
    dklen: usize,
    salt: String,
    // scrypt
    n: Option<u64>,
    r: Option<u32>,
    p: Option<u32>,
    // pbkdf2
    c: Option<u32>,
    prf: Option<String>,
}

/// Decrypt a keystore document, returning the 32-byte secret key
pub fn decrypt(keystore_json: &[u8], password: &str) -> Result<Vec<u8>> {
    let keystore: KeystoreFile = serde_json::from_slice(keystore_json)
        .map_err(|e| Eip712Error::InvalidKeystore(format!("malformed JSON: {}", e)))?;

    if keystore.version != KEYSTORE_VERSION {
        return Err(Eip712Error::InvalidKeystore(format!(
            "unsupported version: {}",
            keystore.version
        )));
    }

    let crypto = &keystore.crypto;
    if crypto.cipher != "aes-128-ctr" {
        return Err(Eip712Error::InvalidKeystore(format!(
            "unsupported cipher: {}",
            crypto.cipher
        )));
    }

    let ciphertext = decode_hex_field(&crypto.ciphertext, "ciphertext")?;
    let iv = decode_hex_field(&crypto.cipherparams.iv, "iv")?;
    let mac = decode_hex_field(&crypto.mac, "mac")?;
    let salt = decode_hex_field(&crypto.kdfparams.salt, "salt")?;

    if iv.len() != 16 {
        return Err(Eip712Error::InvalidKeystore(format!(
            "iv must be 16 bytes, got {}",
            iv.len()
        )));
    }
    if crypto.kdfparams.dklen < 32 {
        return Err(Eip712Error::InvalidKeystore(format!(
            "dklen must be at least 32, got {}",
            crypto.kdfparams.dklen
        )));
    }

    let mut derived = derive_key(
        password,
        &salt,
        &crypto.kdf,
        &crypto.kdfparams,
    )?;

    // MAC = keccak256(dk[16..32] || ciphertext)
    let mut mac_input = Vec::with_capacity(16 + ciphertext.len());
    mac_input.extend_from_slice(&derived[16..32]);
    mac_input.extend_from_slice(&ciphertext);
    let computed_mac = keccak256(&mac_input);
    mac_input.zeroize();

    if computed_mac.as_slice() != mac.as_slice() {
        derived.zeroize();
        return Err(Eip712Error::InvalidKeystore(
            "MAC mismatch (wrong password?)".into(),
        ));
    }

    let mut plaintext = ciphertext;
    let mut cipher = Aes128Ctr::new_from_slices(&derived[..16], &iv)
        .map_err(|e| Eip712Error::InvalidKeystore(e.to_string()))?;
    cipher.apply_keystream(&mut plaintext);
    derived.zeroize();

    if plaintext.len() != 32 {
        plaintext.zeroize();
        return Err(Eip712Error::InvalidKeystore(format!(
            "decrypted key must be 32 bytes, got {}",
            plaintext.len()
        )));
    }

    Ok(plaintext)
}

fn derive_key(password: &str, salt: &[u8], kdf: &str, params: &KdfParams) -> Result<Vec<u8>> {
    let mut derived = vec![0u8; 32];

    match kdf {
        "scrypt" => {
            let n = params
                .n
                .ok_or_else(|| Eip712Error::InvalidKeystore("scrypt params missing n".into()))?;
            let r = params
                .r
                .ok_or_else(|| Eip712Error::InvalidKeystore("scrypt params missing r".into()))?;
            let p = params
                .p
                .ok_or_else(|| Eip712Error::InvalidKeystore("scrypt params missing p".into()))?;

            if n < 2 || !n.is_power_of_two() {
                return Err(Eip712Error::InvalidKeystore(format!(
                    "scrypt n must be a power of two > 1, got {}",
                    n
                )));
            }

            let log_n = n.trailing_zeros() as u8;
            let scrypt_params = scrypt::Params::new(log_n, r, p, derived.len())
                .map_err(|e| Eip712Error::InvalidKeystore(format!("scrypt params: {}", e)))?;
            scrypt::scrypt(password.as_bytes(), salt, &scrypt_params, &mut derived)
                .map_err(|e| Eip712Error::InvalidKeystore(format!("scrypt failed: {}", e)))?;
        }
        "pbkdf2" => {
            match params.prf.as_deref() {
                Some("hmac-sha256") => {}
                other => {
                    return Err(Eip712Error::InvalidKeystore(format!(
                        "unsupported pbkdf2 prf: {:?}",
                        other
                    )))
                }
            }
            let rounds = params
                .c
                .ok_or_else(|| Eip712Error::InvalidKeystore("pbkdf2 params missing c".into()))?;
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut derived);
        }
        other => {
            return Err(Eip712Error::InvalidKeystore(format!(
                "unsupported kdf: {}",
                other
            )))
        }
    }

    Ok(derived)
}

fn decode_hex_field(value: &str, field: &str) -> Result<Vec<u8>> {
    let stripped = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(stripped)
        .map_err(|e| Eip712Error::InvalidKeystore(format!("invalid {} hex: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vectors from the Web3 Secret Storage definition
    const TEST_PASSWORD: &str = "testpassword";
    const TEST_SECRET: &str = "7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

    const PBKDF2_KEYSTORE: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": {"iv": "6087dab2f9fdbbfaddc31a909735c1e6"},
            "ciphertext": "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
            "kdf": "pbkdf2",
            "kdfparams": {
                "c": 262144,
                "dklen": 32,
                "prf": "hmac-sha256",
                "salt": "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
            },
            "mac": "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    const SCRYPT_KEYSTORE: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": {"iv": "83dbcc02d8ccb40e466191a123791e0e"},
            "ciphertext": "d172bf743a674da9cdad04534d56926ef8358534d458fffccd4e6ad2fbde479c",
            "kdf": "scrypt",
            "kdfparams": {
                "dklen": 32,
                "n": 262144,
                "p": 8,
                "r": 1,
                "salt": "ab0c7876052600dd703518d6fc3fe8984592145b591fc8fb5c6d43190334ba19"
            },
            "mac": "2103ac29920d71da29f15d75b4a16dbe95cfd7ff8faea1056c33131d846e3097"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    #[test]
    fn test_decrypt_pbkdf2_keystore() {
        let key = decrypt(PBKDF2_KEYSTORE.as_bytes(), TEST_PASSWORD).unwrap();
        assert_eq!(hex::encode(key), TEST_SECRET);
    }

    #[test]
    #[ignore = "scrypt with n=262144 takes minutes in debug builds"]
    fn test_decrypt_scrypt_keystore() {
        let key = decrypt(SCRYPT_KEYSTORE.as_bytes(), TEST_PASSWORD).unwrap();
        assert_eq!(hex::encode(key), TEST_SECRET);
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = decrypt(b"not json", TEST_PASSWORD).unwrap_err();
        assert!(matches!(err, Eip712Error::InvalidKeystore(_)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let doc = PBKDF2_KEYSTORE.replace("\"version\": 3", "\"version\": 2");
        let err = decrypt(doc.as_bytes(), TEST_PASSWORD).unwrap_err();
        assert!(matches!(err, Eip712Error::InvalidKeystore(msg) if msg.contains("version")));
    }

    #[test]
    fn test_unsupported_cipher_rejected() {
        let doc = PBKDF2_KEYSTORE.replace("aes-128-ctr", "aes-256-gcm");
        let err = decrypt(doc.as_bytes(), TEST_PASSWORD).unwrap_err();
        assert!(matches!(err, Eip712Error::InvalidKeystore(msg) if msg.contains("cipher")));
    }

    #[test]
    fn test_unsupported_kdf_rejected() {
        let doc = PBKDF2_KEYSTORE.replace("\"kdf\": \"pbkdf2\"", "\"kdf\": \"argon2id\"");
        let err = decrypt(doc.as_bytes(), TEST_PASSWORD).unwrap_err();
        assert!(matches!(err, Eip712Error::InvalidKeystore(msg) if msg.contains("kdf")));
    }
}
