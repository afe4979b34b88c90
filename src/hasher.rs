//! Domain hashing and digest composition
//!
//! Synthesizes the `EIP712Domain` type from the domain fields actually
//! present, computes the domain separator, and combines it with the
//! message struct hash into the final signing digest:
//!
//! `keccak256("\x19\x01" || domainSeparator || hashStruct(message))`

use serde_json::{Map, Value};

use crate::cache;
use crate::codec::{self, is_zero_bytes};
use crate::crypto::keccak256;
use crate::encoder::{hash_struct_in, SchemaContext};
use crate::error::{Eip712Error, Result};
use crate::schema;
use crate::types::{Domain, Field, Types};

/// Magic prefix for EIP-712 digests
const EIP712_PREFIX: &[u8] = b"\x19\x01";

/// The intermediate hashes behind a signing digest
///
/// Useful for callers that hand the pieces to external signers or
/// contracts that re-derive the digest on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestParts {
    /// `hashStruct(EIP712Domain)`
    pub domain_separator: [u8; 32],
    /// `hashStruct(primaryType, message)`
    pub message_hash: [u8; 32],
    /// `keccak256(0x1901 || domain_separator || message_hash)`
    pub digest: [u8; 32],
}

/// Build the `EIP712Domain` field list from the fields present
///
/// `name` and `version` are always present. `chainId` is present whenever
/// it was supplied, zero included. `verifyingContract` and `salt` are
/// present only when non-zero; a supplied all-zero value counts as unset.
pub fn domain_fields(domain: &Domain) -> Result<Vec<Field>> {
    let mut fields = vec![
        Field::new("name", "string"),
        Field::new("version", "string"),
    ];

    if domain.chain_id.is_some() {
        fields.push(Field::new("chainId", "uint256"));
    }
    if let Some(contract) = &domain.verifying_contract {
        if !is_zero_bytes(&codec::parse_address(contract)?) {
            fields.push(Field::new("verifyingContract", "address"));
        }
    }
    if let Some(salt) = &domain.salt {
        if !is_zero_bytes(&parse_salt(salt)?) {
            fields.push(Field::new("salt", "bytes32"));
        }
    }

    Ok(fields)
}

/// Build the domain value mapping for the present fields
fn domain_value(domain: &Domain, fields: &[Field]) -> Value {
    let mut map = Map::new();
    for field in fields {
        match field.name.as_str() {
            "name" => {
                map.insert("name".into(), Value::String(domain.name.clone()));
            }
            "version" => {
                map.insert("version".into(), Value::String(domain.version.clone()));
            }
            "chainId" => {
                if let Some(chain_id) = domain.chain_id {
                    map.insert("chainId".into(), Value::from(chain_id));
                }
            }
            "verifyingContract" => {
                if let Some(contract) = &domain.verifying_contract {
                    map.insert("verifyingContract".into(), Value::String(contract.clone()));
                }
            }
            "salt" => {
                if let Some(salt) = &domain.salt {
                    map.insert("salt".into(), Value::String(salt.clone()));
                }
            }
            _ => {}
        }
    }
    Value::Object(map)
}

fn parse_salt(salt: &str) -> Result<[u8; 32]> {
    let stripped = salt
        .strip_prefix("0x")
        .or_else(|| salt.strip_prefix("0X"))
        .unwrap_or(salt);
    let bytes = hex::decode(stripped)
        .map_err(|e| Eip712Error::invalid_value("bytes32", format!("invalid salt hex: {}", e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        Eip712Error::invalid_value("bytes32", format!("salt must be 32 bytes, got {}", b.len()))
    })
}

/// Compute the digest and its intermediate parts
///
/// Validates the schema (including cycle detection) unless the cache has
/// already seen this schema's fingerprint, injects the synthesized
/// `EIP712Domain` descriptor into a copy of the caller's types, and walks
/// both the domain and the message. A caller-defined `EIP712Domain` type
/// takes precedence over the synthesized one.
pub fn digest_parts(
    domain: &Domain,
    types: &Types,
    primary_type: &str,
    message: &Value,
) -> Result<DigestParts> {
    let mut full_types = types.clone();
    let domain_fields_in_use = match full_types.get("EIP712Domain") {
        Some(predefined) => predefined.clone(),
        None => {
            let synthesized = domain_fields(domain)?;
            full_types.insert("EIP712Domain".to_string(), synthesized.clone());
            synthesized
        }
    };

    let ctx = SchemaContext::new(&full_types);
    if !cache::is_validated(ctx.fingerprint) {
        schema::validate_types(&full_types)?;
        schema::validate_no_cycles(&full_types)?;
        cache::mark_validated(ctx.fingerprint);
    }
    let domain_separator = hash_struct_in(
        ctx,
        "EIP712Domain",
        &domain_value(domain, &domain_fields_in_use),
    )?;

    let message_hash = hash_struct_in(ctx, primary_type, message)?;

    let mut raw = Vec::with_capacity(2 + 32 + 32);
    raw.extend_from_slice(EIP712_PREFIX);
    raw.extend_from_slice(&domain_separator);
    raw.extend_from_slice(&message_hash);

    Ok(DigestParts {
        domain_separator,
        message_hash,
        digest: keccak256(&raw),
    })
}

/// The 32-byte digest a signer commits to
pub fn signing_digest(
    domain: &Domain,
    types: &Types,
    primary_type: &str,
    message: &Value,
) -> Result<[u8; 32]> {
    Ok(digest_parts(domain, types, primary_type, message)?.digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;
    use serde_json::json;
    use std::collections::HashMap;

    fn mail_domain() -> Domain {
        Domain {
            chain_id: Some(1),
            verifying_contract: Some("0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC".into()),
            ..Domain::new("Ether Mail", "1")
        }
    }

    fn mail_types() -> Types {
        HashMap::from([
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
        ])
    }

    fn mail_message() -> Value {
        json!({
            "from": {
                "name": "Cow",
                "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
            },
            "to": {
                "name": "Bob",
                "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"
            },
            "contents": "Hello, Bob!"
        })
    }

    #[test]
    fn test_mail_digest_matches_reference_vector() {
        let digest =
            signing_digest(&mail_domain(), &mail_types(), "Mail", &mail_message()).unwrap();
        assert_eq!(
            hex::encode(digest),
            "be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
        );
    }

    #[test]
    fn test_mail_domain_separator_vector() {
        let parts = digest_parts(&mail_domain(), &mail_types(), "Mail", &mail_message()).unwrap();
        assert_eq!(
            hex::encode(parts.domain_separator),
            "f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
        );
        assert_eq!(
            hex::encode(parts.message_hash),
            "c52c0ee5d84264471806290a3f2c4cecfc5490626bf912d01f240d7a274b371e"
        );
    }

    #[test]
    fn test_domain_fields_presence() {
        // minimal domain: name and version only
        let fields = domain_fields(&Domain::new("App", "1")).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "version"]);

        // chainId zero still counts as present
        let with_zero_chain = Domain {
            chain_id: Some(0),
            ..Domain::new("App", "1")
        };
        let names: Vec<String> = domain_fields(&with_zero_chain)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert!(names.contains(&"chainId".to_string()));

        // all-zero verifying contract and salt count as unset
        let zeroed = Domain {
            verifying_contract: Some("0x0000000000000000000000000000000000000000".into()),
            salt: Some(format!("0x{}", "00".repeat(32))),
            ..Domain::new("App", "1")
        };
        let names: Vec<String> = domain_fields(&zeroed)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert!(!names.contains(&"verifyingContract".to_string()));
        assert!(!names.contains(&"salt".to_string()));
    }

    #[test]
    fn test_domain_field_canonical_order() {
        let full = Domain {
            chain_id: Some(5),
            verifying_contract: Some("0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC".into()),
            salt: Some(format!("0x{}", "ab".repeat(32))),
            ..Domain::new("App", "2")
        };
        let names: Vec<String> = domain_fields(&full)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            ["name", "version", "chainId", "verifyingContract", "salt"]
        );
    }

    #[test]
    fn test_presence_changes_digest() {
        let types = HashMap::from([(
            "Ping".to_string(),
            vec![Field::new("note", "string")],
        )]);
        let message = json!({"note": "hi"});

        let bare = Domain::new("App", "1");
        let with_chain = Domain {
            chain_id: Some(0),
            ..Domain::new("App", "1")
        };

        let a = signing_digest(&bare, &types, "Ping", &message).unwrap();
        let b = signing_digest(&with_chain, &types, "Ping", &message).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_caller_defined_domain_type_wins() {
        // a schema that predefines EIP712Domain without a version field
        let mut types = mail_types();
        types.insert(
            "EIP712Domain".to_string(),
            vec![Field::new("name", "string")],
        );

        let parts = digest_parts(&mail_domain(), &types, "Mail", &mail_message()).unwrap();

        // separator is hashStruct over the predefined single-field type
        let mut expected = Vec::new();
        expected.extend_from_slice(&keccak256(b"EIP712Domain(string name)"));
        expected.extend_from_slice(&keccak256(b"Ether Mail"));
        assert_eq!(parts.domain_separator, keccak256(&expected));
    }

    #[test]
    fn test_invalid_salt_rejected() {
        let bad = Domain {
            salt: Some("0x1234".into()),
            ..Domain::new("App", "1")
        };
        assert!(domain_fields(&bad).is_err());
    }

    #[test]
    fn test_unknown_primary_type_rejected() {
        let err = signing_digest(&mail_domain(), &mail_types(), "Missing", &json!({}))
            .unwrap_err();
        assert!(matches!(err, Eip712Error::UnknownType(_)));
    }
}
