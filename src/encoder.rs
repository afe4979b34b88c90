//! Recursive value encoding
//!
//! Walks a message value against its schema, encoding every field to a
//! 32-byte word: primitives through the codec, struct references through
//! their struct hash, arrays through the hash of their concatenated
//! element encodings.

use serde_json::Value;

use crate::cache::{self, Fingerprint};
use crate::codec;
use crate::crypto::keccak256;
use crate::error::{Eip712Error, Result};
use crate::schema::TypeRef;
use crate::types::Types;

/// Schema plus cache identity, threaded through the encoding walk
#[derive(Clone, Copy)]
pub(crate) struct SchemaContext<'a> {
    pub types: &'a Types,
    pub fingerprint: Fingerprint,
}

impl<'a> SchemaContext<'a> {
    pub fn new(types: &'a Types) -> Self {
        Self {
            types,
            fingerprint: cache::fingerprint(types),
        }
    }
}

/// `keccak256(typeHash || encoded fields)` for a struct value
///
/// The schema must already be validated; [`crate::hasher::digest_parts`]
/// runs validation before walking values.
pub fn hash_struct(type_name: &str, value: &Value, types: &Types) -> Result<[u8; 32]> {
    hash_struct_in(SchemaContext::new(types), type_name, value)
}

pub(crate) fn hash_struct_in(
    ctx: SchemaContext<'_>,
    type_name: &str,
    value: &Value,
) -> Result<[u8; 32]> {
    Ok(keccak256(&encode_data(ctx, type_name, value)?))
}

/// `typeHash || field encodings` in declared field order
///
/// The value must carry exactly the declared fields: a missing key and an
/// undeclared extra key are both errors.
fn encode_data(ctx: SchemaContext<'_>, type_name: &str, value: &Value) -> Result<Vec<u8>> {
    let fields = ctx
        .types
        .get(type_name)
        .ok_or_else(|| Eip712Error::UnknownType(type_name.to_string()))?;

    let obj = value.as_object().ok_or_else(|| {
        Eip712Error::invalid_value(type_name, format!("expected object, got {}", value))
    })?;

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(&cache::type_hash(ctx.fingerprint, type_name, ctx.types)?);

    for field in fields {
        let field_value = obj
            .get(&field.name)
            .ok_or_else(|| Eip712Error::MissingField(format!("{}.{}", type_name, field.name)))?;

        let ty = TypeRef::parse(&field.type_name)?;
        let word = encode_field(ctx, &ty, &field.type_name, field_value)?;
        encoded.extend_from_slice(&word);
    }

    if obj.len() != fields.len() {
        for key in obj.keys() {
            if !fields.iter().any(|f| f.name == *key) {
                return Err(Eip712Error::UnexpectedField(format!(
                    "{}.{}",
                    type_name, key
                )));
            }
        }
    }

    Ok(encoded)
}

/// Encode one field value to its 32-byte word
fn encode_field(
    ctx: SchemaContext<'_>,
    ty: &TypeRef,
    type_name: &str,
    value: &Value,
) -> Result<[u8; 32]> {
    match ty {
        TypeRef::Struct(name) => {
            if !ctx.types.contains_key(name.as_str()) {
                return Err(Eip712Error::UnknownType(name.clone()));
            }
            hash_struct_in(ctx, name, value)
        }
        TypeRef::Array(element) => {
            let items = expect_array(type_name, value)?;
            hash_array_elements(ctx, element, type_name, items)
        }
        TypeRef::FixedArray(element, expected) => {
            let items = expect_array(type_name, value)?;
            if items.len() != *expected {
                return Err(Eip712Error::ArrayLengthMismatch {
                    type_name: type_name.to_string(),
                    expected: *expected,
                    actual: items.len(),
                });
            }
            hash_array_elements(ctx, element, type_name, items)
        }
        primitive => codec::encode_primitive(primitive, value),
    }
}

/// Hash the concatenated element encodings; an empty array hashes the
/// empty string
fn hash_array_elements(
    ctx: SchemaContext<'_>,
    element: &TypeRef,
    type_name: &str,
    items: &[Value],
) -> Result<[u8; 32]> {
    let mut inner = Vec::with_capacity(32 * items.len());
    for item in items {
        let word = encode_field(ctx, element, type_name, item)?;
        inner.extend_from_slice(&word);
    }
    Ok(keccak256(&inner))
}

fn expect_array<'v>(type_name: &str, value: &'v Value) -> Result<&'v [Value]> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| {
            Eip712Error::invalid_value(type_name, format!("expected array, got {}", value))
        })
}
