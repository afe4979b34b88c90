//! Core data structures for EIP-712 typed data signing
//!
//! All data that crosses the public API boundary is defined here
//! for consistent serialization.

use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Eip712Error, Result};

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g. "address", "uint256", "Person[]")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Schema: mapping from type name to its ordered field list
pub type Types = HashMap<String, Vec<Field>>;

/// The EIP-712 signing domain
///
/// `name` and `version` are always encoded. The optional fields are encoded
/// only when present: `chain_id` counts as present whenever it is `Some`
/// (zero included); `verifying_contract` and `salt` count as present only
/// when they hold a non-zero value — an all-zero sentinel is treated as
/// unset, consistently across sign and recover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// The human-readable name of the signing domain
    #[serde(default)]
    pub name: String,

    /// The current major version of the signing domain
    #[serde(default)]
    pub version: String,

    /// The EIP-155 chain ID, encoded as uint256
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,

    /// The address of the contract that will verify the signature
    /// (`0x`-prefixed hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<String>,

    /// An optional disambiguating salt (`0x`-prefixed 32-byte hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Domain {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

/// An Ethereum-compatible signature over an EIP-712 digest
///
/// 65 bytes on the wire: `r (32) || s (32) || v (1)` with `v` in {27, 28}.
/// Signatures produced by [`crate::Signer`] also carry the digest that was
/// signed; signatures parsed from bytes do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// r component (32 bytes)
    pub r: [u8; 32],
    /// s component (32 bytes)
    pub s: [u8; 32],
    /// Recovery component, 27 or 28
    pub v: u8,
    /// The 32-byte digest that was signed, when known
    pub digest: Option<[u8; 32]>,
}

impl Signature {
    /// Create from raw components, normalizing `v` from {0, 1} to {27, 28}
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Result<Self> {
        let v = normalize_v(v)?;
        Ok(Self {
            r,
            s,
            v,
            digest: None,
        })
    }

    pub(crate) fn with_digest(r: [u8; 32], s: [u8; 32], v: u8, digest: [u8; 32]) -> Result<Self> {
        let v = normalize_v(v)?;
        Ok(Self {
            r,
            s,
            v,
            digest: Some(digest),
        })
    }

    /// Parse a 65-byte signature (`r || s || v`)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(Eip712Error::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);

        Self::new(r, s, bytes[64])
    }

    /// Parse a `0x`-prefixed (or bare) hex signature
    pub fn from_hex(hex_sig: &str) -> Result<Self> {
        let stripped = hex_sig
            .strip_prefix("0x")
            .or_else(|| hex_sig.strip_prefix("0X"))
            .unwrap_or(hex_sig);
        let bytes = hex::decode(stripped)
            .map_err(|e| Eip712Error::InvalidSignature(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// The recovery id, `v - 27`
    pub fn recovery_id(&self) -> u8 {
        self.v - 27
    }

    /// Serialize to the 65-byte wire form (`r || s || v`)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Lowercase `0x`-prefixed hex of the 65-byte wire form
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Lowercase `0x`-prefixed hex of `r`
    pub fn r_hex(&self) -> String {
        format!("0x{}", hex::encode(self.r))
    }

    /// Lowercase `0x`-prefixed hex of `s`
    pub fn s_hex(&self) -> String {
        format!("0x{}", hex::encode(self.s))
    }

    /// Lowercase `0x`-prefixed hex of the signed digest, when known
    pub fn digest_hex(&self) -> Option<String> {
        self.digest.map(|d| format!("0x{}", hex::encode(d)))
    }
}

fn normalize_v(v: u8) -> Result<u8> {
    match v {
        0 | 1 => Ok(v + 27),
        27 | 28 => Ok(v),
        other => Err(Eip712Error::InvalidSignature(format!(
            "invalid recovery component v: {}",
            other
        ))),
    }
}

/// Wire shape for `Signature` JSON: hex components plus the assembled bytes
#[derive(Serialize, Deserialize)]
struct SignatureRepr {
    r: String,
    s: String,
    v: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    signature: String,
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SignatureRepr {
            r: self.r_hex(),
            s: self.s_hex(),
            v: self.v,
            hash: self.digest_hex(),
            signature: self.to_hex(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = SignatureRepr::deserialize(deserializer)?;
        let mut sig = Signature::from_hex(&repr.signature).map_err(D::Error::custom)?;
        if let Some(hash) = repr.hash {
            let stripped = hash.strip_prefix("0x").unwrap_or(&hash);
            let bytes = hex::decode(stripped).map_err(D::Error::custom)?;
            let digest: [u8; 32] = bytes
                .try_into()
                .map_err(|_| D::Error::custom("hash must be 32 bytes"))?;
            sig.digest = Some(digest);
        }
        Ok(sig)
    }
}
