//! Primitive value encoding
//!
//! Encodes a single leaf value to its 32-byte EIP-712 atomic form and
//! normalizes the spellings accepted at the API boundary (JSON numbers,
//! decimal and hex strings, byte arrays).

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Num, One};
use serde_json::Value;

use crate::crypto::keccak256;
use crate::error::{Eip712Error, Result};
use crate::schema::TypeRef;

/// Encode a primitive leaf value to exactly 32 bytes
///
/// Dynamic `bytes` and `string` values emit the keccak-256 hash of their
/// contents; every other primitive pads to 32 bytes.
pub fn encode_primitive(ty: &TypeRef, value: &Value) -> Result<[u8; 32]> {
    match ty {
        TypeRef::Address => {
            let addr = parse_address_value(value)?;
            let mut out = [0u8; 32];
            out[12..].copy_from_slice(&addr);
            Ok(out)
        }
        TypeRef::Bool => {
            let mut out = [0u8; 32];
            if parse_bool(value)? {
                out[31] = 1;
            }
            Ok(out)
        }
        TypeRef::String => {
            let s = value.as_str().ok_or_else(|| {
                Eip712Error::invalid_value("string", format!("expected text, got {}", value))
            })?;
            Ok(keccak256(s.as_bytes()))
        }
        TypeRef::Bytes => {
            let bytes = parse_bytes(value, "bytes")?;
            Ok(keccak256(&bytes))
        }
        TypeRef::BytesN(n) => {
            let type_name = format!("bytes{}", n);
            let bytes = parse_bytes(value, &type_name)?;
            if bytes.len() > *n {
                return Err(Eip712Error::invalid_value(
                    type_name,
                    format!("got {} bytes", bytes.len()),
                ));
            }
            let mut out = [0u8; 32];
            out[..bytes.len()].copy_from_slice(&bytes);
            Ok(out)
        }
        TypeRef::Uint(bits) => encode_uint(*bits, value),
        TypeRef::Int(bits) => encode_int(*bits, value),
        _ => Err(Eip712Error::InvalidType(format!(
            "{:?} is not a primitive",
            ty
        ))),
    }
}

fn encode_uint(bits: usize, value: &Value) -> Result<[u8; 32]> {
    let type_name = format!("uint{}", bits);
    let n = parse_bigint(value, &type_name)?;

    if n.sign() == Sign::Minus {
        return Err(Eip712Error::invalid_value(
            type_name,
            format!("negative value {}", n),
        ));
    }
    let magnitude = n.magnitude();
    if *magnitude >= (BigUint::one() << bits) {
        return Err(Eip712Error::invalid_value(
            type_name,
            format!("{} exceeds {} bits", n, bits),
        ));
    }

    Ok(big_to_word(magnitude))
}

fn encode_int(bits: usize, value: &Value) -> Result<[u8; 32]> {
    let type_name = format!("int{}", bits);
    let n = parse_bigint(value, &type_name)?;

    let bound = BigInt::one() << (bits - 1);
    if n >= bound || n < -bound.clone() {
        return Err(Eip712Error::invalid_value(
            type_name,
            format!("{} outside int{} range", n, bits),
        ));
    }

    if n.sign() == Sign::Minus {
        // two's complement: value mod 2^256
        let wrapped: BigInt = (BigInt::one() << 256) + &n;
        Ok(big_to_word(wrapped.magnitude()))
    } else {
        Ok(big_to_word(n.magnitude()))
    }
}

fn big_to_word(n: &BigUint) -> [u8; 32] {
    let bytes = n.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Parse an integer leaf: JSON number, base-10 string, or `0x` hex string
fn parse_bigint(value: &Value, type_name: &str) -> Result<BigInt> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(BigInt::from(u))
            } else if let Some(i) = n.as_i64() {
                Ok(BigInt::from(i))
            } else {
                Err(Eip712Error::invalid_value(
                    type_name,
                    format!("non-integer number {}", n),
                ))
            }
        }
        Value::String(s) => {
            let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex_digits) => (hex_digits, 16),
                None => (s.as_str(), 10),
            };
            BigInt::from_str_radix(digits, radix).map_err(|_| {
                Eip712Error::invalid_value(type_name, format!("unparseable integer {:?}", s))
            })
        }
        other => Err(Eip712Error::invalid_value(
            type_name,
            format!("expected integer, got {}", other),
        )),
    }
}

/// Parse a boolean leaf: JSON bool or the strings "true"/"1"/"false"/"0"
fn parse_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(Eip712Error::invalid_value(
                "bool",
                format!("unrecognized spelling {:?}", other),
            )),
        },
        other => Err(Eip712Error::invalid_value(
            "bool",
            format!("expected boolean, got {}", other),
        )),
    }
}

/// Parse an address leaf: `0x` + 40 hex digits (case-insensitive, no
/// checksum enforcement) or a 20-element byte array
fn parse_address_value(value: &Value) -> Result<[u8; 20]> {
    let bytes = match value {
        Value::String(s) => parse_address(s)?.to_vec(),
        Value::Array(_) => parse_bytes(value, "address")?,
        other => {
            return Err(Eip712Error::invalid_value(
                "address",
                format!("expected address, got {}", other),
            ))
        }
    };

    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Eip712Error::invalid_value("address", format!("{} bytes", b.len())))
}

/// Parse a hex address string into its 20 raw bytes
pub fn parse_address(addr: &str) -> Result<[u8; 20]> {
    let stripped = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);

    if stripped.len() != 40 {
        return Err(Eip712Error::invalid_value(
            "address",
            format!("expected 40 hex characters, got {}", stripped.len()),
        ));
    }

    let bytes = hex::decode(stripped)
        .map_err(|e| Eip712Error::invalid_value("address", format!("invalid hex: {}", e)))?;

    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Parse a byte-string leaf: `0x` hex string or an array of integers in
/// the byte range
fn parse_bytes(value: &Value, type_name: &str) -> Result<Vec<u8>> {
    match value {
        Value::String(s) => {
            let stripped = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .ok_or_else(|| {
                    Eip712Error::invalid_value(type_name, "expected 0x-prefixed hex")
                })?;
            hex::decode(stripped)
                .map_err(|e| Eip712Error::invalid_value(type_name, format!("invalid hex: {}", e)))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .filter(|b| *b <= 255)
                    .map(|b| b as u8)
                    .ok_or_else(|| {
                        Eip712Error::invalid_value(type_name, format!("non-byte element {}", item))
                    })
            })
            .collect(),
        other => Err(Eip712Error::invalid_value(
            type_name,
            format!("expected bytes, got {}", other),
        )),
    }
}

/// True when every byte is zero
pub(crate) fn is_zero_bytes(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}
