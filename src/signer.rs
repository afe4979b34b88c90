//! EIP-712 signing, recovery, and verification
//!
//! The [`Signer`] owns a secp256k1 key and chain id and produces
//! Ethereum-compatible signatures over typed-data digests. Recovery and
//! verification re-derive the digest through the same pipeline and call
//! the curve's recovery primitive.

use num_bigint::BigUint;
use secp256k1::SecretKey;
use serde_json::{Map, Value};
use zeroize::Zeroize;

use crate::crypto;
use crate::error::{Eip712Error, Result};
use crate::hasher::signing_digest;
use crate::infer::infer_types;
use crate::keystore;
use crate::types::{Domain, Field, Signature, Types};

/// An EIP-712 signer bound to a private key and chain id
///
/// Safe to share across threads; signing borrows the schema, domain, and
/// message immutably and never mutates them.
#[derive(Debug, Clone)]
pub struct Signer {
    secret_key: SecretKey,
    address: String,
    chain_id: u64,
}

impl Signer {
    /// Create a signer from a hex private key
    ///
    /// Accepts `0x`-prefixed and bare hex of 64 characters; anything else
    /// is rejected as an invalid private key.
    pub fn new(private_key: &str, chain_id: u64) -> Result<Self> {
        let secret_key = crypto::secret_key_from_hex(private_key)?;
        let address = crypto::to_checksum_address(&crypto::secret_key_to_address(&secret_key));

        Ok(Self {
            secret_key,
            address,
            chain_id,
        })
    }

    /// Create a signer from an encrypted keystore document
    pub fn from_keystore(keystore_json: &[u8], password: &str, chain_id: u64) -> Result<Self> {
        let mut key_bytes = keystore::decrypt(keystore_json, password)?;
        let secret_key = SecretKey::from_slice(&key_bytes)
            .map_err(|e| Eip712Error::InvalidKeystore(format!("decrypted key: {}", e)));
        key_bytes.zeroize();
        let secret_key = secret_key?;

        let address = crypto::to_checksum_address(&crypto::secret_key_to_address(&secret_key));
        Ok(Self {
            secret_key,
            address,
            chain_id,
        })
    }

    /// The signer's EIP-55 checksummed address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The chain id used by the convenience signing methods
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign an EIP-712 typed-data message
    ///
    /// Validates the schema (cycle detection included), composes the
    /// digest, and signs it. The produced signature has `v` in {27, 28}
    /// and a low-s `s` component, and carries the digest it commits to.
    pub fn sign_typed_data(
        &self,
        domain: &Domain,
        types: &Types,
        primary_type: &str,
        message: &Value,
    ) -> Result<Signature> {
        let digest = signing_digest(domain, types, primary_type, message)?;
        let (r, s, recovery_id) = crypto::sign_digest(&digest, &self.secret_key)?;
        Signature::with_digest(r, s, recovery_id + 27, digest)
    }

    /// Sign a flat message with an inferred schema
    ///
    /// Builds the domain `{name: app_name, version: "1", chainId}`, infers
    /// field types from the values, and signs with primary type
    /// `"Message"`.
    pub fn sign_message(&self, app_name: &str, message: &Map<String, Value>) -> Result<Signature> {
        let domain = Domain {
            chain_id: Some(self.chain_id),
            ..Domain::new(app_name, "1")
        };

        let types = Types::from([("Message".to_string(), infer_types(message))]);

        self.sign_typed_data(
            &domain,
            &types,
            "Message",
            &Value::Object(message.clone()),
        )
    }

    /// Sign an EIP-2612 permit for gasless token approvals
    ///
    /// `token` is the verifying token contract; the permit owner is this
    /// signer's address.
    #[allow(clippy::too_many_arguments)]
    pub fn sign_permit(
        &self,
        token: &str,
        token_name: &str,
        token_version: &str,
        spender: &str,
        value: &BigUint,
        nonce: u64,
        deadline: u64,
    ) -> Result<Signature> {
        let domain = Domain {
            chain_id: Some(self.chain_id),
            verifying_contract: Some(token.to_string()),
            ..Domain::new(token_name, token_version)
        };

        let types = Types::from([(
            "Permit".to_string(),
            vec![
                Field::new("owner", "address"),
                Field::new("spender", "address"),
                Field::new("value", "uint256"),
                Field::new("nonce", "uint256"),
                Field::new("deadline", "uint256"),
            ],
        )]);

        let message = serde_json::json!({
            "owner": self.address,
            "spender": spender,
            "value": value.to_string(),
            "nonce": nonce,
            "deadline": deadline,
        });

        self.sign_typed_data(&domain, &types, "Permit", &message)
    }
}

/// Recover the signing address from a signature
///
/// Re-derives the digest from the supplied typed data and runs public-key
/// recovery. Returns the EIP-55 checksummed address.
pub fn recover_typed_data(
    signature: &Signature,
    domain: &Domain,
    types: &Types,
    primary_type: &str,
    message: &Value,
) -> Result<String> {
    let digest = signing_digest(domain, types, primary_type, message)?;
    let address = crypto::recover_digest(
        &digest,
        &signature.r,
        &signature.s,
        signature.recovery_id(),
    )?;
    Ok(crypto::to_checksum_address(&address))
}

/// Verify a signature against an expected signer address
///
/// Address comparison is case-insensitive, so checksummed and lowercase
/// spellings both work.
pub fn verify_typed_data(
    signature: &Signature,
    expected_address: &str,
    domain: &Domain,
    types: &Types,
    primary_type: &str,
    message: &Value,
) -> Result<bool> {
    let recovered = recover_typed_data(signature, domain, types, primary_type, message)?;

    let expected = expected_address.trim_start_matches("0x").to_lowercase();
    let actual = recovered.trim_start_matches("0x").to_lowercase();
    Ok(expected == actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Hardhat's first two default accounts
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const OTHER_PRIVATE_KEY: &str =
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn mail_fixture() -> (Domain, Types, Value) {
        let domain = Domain {
            chain_id: Some(1),
            verifying_contract: Some("0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC".into()),
            ..Domain::new("Ether Mail", "1")
        };
        let types = Types::from([
            (
                "Person".to_string(),
                vec![Field::new("name", "string"), Field::new("wallet", "address")],
            ),
            (
                "Mail".to_string(),
                vec![
                    Field::new("from", "Person"),
                    Field::new("to", "Person"),
                    Field::new("contents", "string"),
                ],
            ),
        ]);
        let message = json!({
            "from": {"name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"},
            "to": {"name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"},
            "contents": "Hello, Bob!"
        });
        (domain, types, message)
    }

    #[test]
    fn test_new_signer_derives_address() {
        let signer = Signer::new(TEST_PRIVATE_KEY, 1).unwrap();
        assert_eq!(signer.address(), TEST_ADDRESS);
        assert_eq!(signer.chain_id(), 1);

        // bare hex works too
        let bare = Signer::new(TEST_PRIVATE_KEY.trim_start_matches("0x"), 1).unwrap();
        assert_eq!(bare.address(), TEST_ADDRESS);
    }

    #[test]
    fn test_new_signer_rejects_bad_keys() {
        let zero = "00".repeat(32); // zero scalar
        let high = "ff".repeat(32); // above curve order
        let not_hex = "zz".repeat(32);
        let too_long = "ac".repeat(33);
        for bad in [
            "",
            "0x",
            "abcd",
            zero.as_str(),
            high.as_str(),
            not_hex.as_str(),
            too_long.as_str(),
        ] {
            let err = Signer::new(bad, 1).unwrap_err();
            assert!(
                matches!(err, Eip712Error::InvalidPrivateKey(_)),
                "expected key {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_sign_mail_digest_and_roundtrip() {
        let signer = Signer::new(TEST_PRIVATE_KEY, 1).unwrap();
        let (domain, types, message) = mail_fixture();

        let sig = signer
            .sign_typed_data(&domain, &types, "Mail", &message)
            .unwrap();
        assert_eq!(
            sig.digest_hex().unwrap(),
            "0xbe609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
        );
        assert!(sig.v == 27 || sig.v == 28);

        let recovered = recover_typed_data(&sig, &domain, &types, "Mail", &message).unwrap();
        assert_eq!(recovered, TEST_ADDRESS);

        assert!(verify_typed_data(&sig, TEST_ADDRESS, &domain, &types, "Mail", &message).unwrap());
        assert!(verify_typed_data(
            &sig,
            &TEST_ADDRESS.to_lowercase(),
            &domain,
            &types,
            "Mail",
            &message
        )
        .unwrap());
        assert!(!verify_typed_data(
            &sig,
            "0x0000000000000000000000000000000000000001",
            &domain,
            &types,
            "Mail",
            &message
        )
        .unwrap());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = Signer::new(TEST_PRIVATE_KEY, 1).unwrap();
        let (domain, types, message) = mail_fixture();

        let first = signer
            .sign_typed_data(&domain, &types, "Mail", &message)
            .unwrap();
        let second = signer
            .sign_typed_data(&domain, &types, "Mail", &message)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_signers_produce_different_signatures() {
        let (domain, types, message) = mail_fixture();
        let a = Signer::new(TEST_PRIVATE_KEY, 1)
            .unwrap()
            .sign_typed_data(&domain, &types, "Mail", &message)
            .unwrap();
        let b = Signer::new(OTHER_PRIVATE_KEY, 1)
            .unwrap()
            .sign_typed_data(&domain, &types, "Mail", &message)
            .unwrap();
        assert_ne!(a.to_bytes().to_vec(), b.to_bytes().to_vec());
    }

    #[test]
    fn test_sign_message_infers_and_roundtrips() {
        let signer = Signer::new(TEST_PRIVATE_KEY, 1).unwrap();
        let message = match json!({
            "action": "Transfer",
            "to": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB",
            "amount": "1000000000000000000"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let sig = signer.sign_message("MyDApp", &message).unwrap();

        // recovery must use the same inferred schema and domain
        let domain = Domain {
            chain_id: Some(1),
            ..Domain::new("MyDApp", "1")
        };
        let types = Types::from([("Message".to_string(), infer_types(&message))]);
        let recovered = recover_typed_data(
            &sig,
            &domain,
            &types,
            "Message",
            &Value::Object(message.clone()),
        )
        .unwrap();
        assert_eq!(recovered, TEST_ADDRESS);
    }

    #[test]
    fn test_sign_permit_roundtrips_to_owner() {
        let signer = Signer::new(TEST_PRIVATE_KEY, 1).unwrap();
        let value = BigUint::parse_bytes(b"1000000000000000000", 10).unwrap();

        let sig = signer
            .sign_permit(
                "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "USD Coin",
                "2",
                "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
                &value,
                0,
                1893456000,
            )
            .unwrap();
        assert!(sig.v == 27 || sig.v == 28);

        // re-derive with the canonical Permit schema
        let domain = Domain {
            chain_id: Some(1),
            verifying_contract: Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".into()),
            ..Domain::new("USD Coin", "2")
        };
        let types = Types::from([(
            "Permit".to_string(),
            vec![
                Field::new("owner", "address"),
                Field::new("spender", "address"),
                Field::new("value", "uint256"),
                Field::new("nonce", "uint256"),
                Field::new("deadline", "uint256"),
            ],
        )]);
        let message = json!({
            "owner": TEST_ADDRESS,
            "spender": "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
            "value": "1000000000000000000",
            "nonce": 0,
            "deadline": 1893456000,
        });

        let recovered = recover_typed_data(&sig, &domain, &types, "Permit", &message).unwrap();
        assert_eq!(recovered, TEST_ADDRESS);
    }

    #[test]
    fn test_cyclic_schema_rejected_before_signing() {
        let signer = Signer::new(TEST_PRIVATE_KEY, 1).unwrap();
        let domain = Domain {
            chain_id: Some(1),
            ..Domain::new("Cyclic Test", "1")
        };
        let types = Types::from([
            ("A".to_string(), vec![Field::new("b", "B")]),
            ("B".to_string(), vec![Field::new("c", "C")]),
            ("C".to_string(), vec![Field::new("a", "A")]),
        ]);

        let err = signer
            .sign_typed_data(&domain, &types, "A", &json!({"b": {"c": {"a": null}}}))
            .unwrap_err();
        assert!(matches!(err, Eip712Error::CyclicType(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidSchema);
    }

    #[test]
    fn test_recover_rejects_tampered_signature() {
        let signer = Signer::new(TEST_PRIVATE_KEY, 1).unwrap();
        let (domain, types, message) = mail_fixture();

        let sig = signer
            .sign_typed_data(&domain, &types, "Mail", &message)
            .unwrap();
        let mut tampered = sig.clone();
        tampered.r[0] ^= 0xff;

        // recovery either fails or yields a different address
        match recover_typed_data(&tampered, &domain, &types, "Mail", &message) {
            Ok(addr) => assert_ne!(addr, TEST_ADDRESS),
            Err(err) => assert!(matches!(err, Eip712Error::InvalidSignature(_))),
        }
    }
}
