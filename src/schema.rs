//! Schema graph for EIP-712 type definitions
//!
//! Parses type references (primitives, custom struct names, and composable
//! `[]` / `[k]` array suffixes), resolves transitive dependencies, produces
//! the canonical type encoding and type hash, and rejects cyclic schemas.

use std::collections::HashSet;

use crate::crypto::keccak256;
use crate::error::{Eip712Error, Result};
use crate::types::{Field, Types};

/// A parsed EIP-712 type reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Address,
    Bool,
    String,
    /// Dynamic byte string, hashed when encoded
    Bytes,
    /// Fixed-width bytes, 1 ..= 32
    BytesN(usize),
    /// Unsigned integer of the given bit width
    Uint(usize),
    /// Signed integer of the given bit width
    Int(usize),
    /// Reference to a struct type defined in the same schema
    Struct(String),
    /// Dynamic-length array
    Array(Box<TypeRef>),
    /// Fixed-length array of exactly `k` elements
    FixedArray(Box<TypeRef>, usize),
}

impl TypeRef {
    /// Parse a type reference string
    ///
    /// Array suffixes compose outward to the right: `uint256[][3]` is a
    /// fixed array of three dynamic `uint256` arrays. Malformed primitive
    /// spellings (`uint257`, `bytes33`, `uint`, width not a multiple of 8)
    /// are rejected rather than treated as custom names.
    pub fn parse(type_name: &str) -> Result<TypeRef> {
        if let Some(stripped) = type_name.strip_suffix(']') {
            let open = stripped
                .rfind('[')
                .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
            let element = Self::parse(&stripped[..open])?;
            let len_spec = &stripped[open + 1..];

            return if len_spec.is_empty() {
                Ok(TypeRef::Array(Box::new(element)))
            } else {
                let len: usize = parse_decimal(len_spec)
                    .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
                Ok(TypeRef::FixedArray(Box::new(element), len))
            };
        }

        match type_name {
            "address" => return Ok(TypeRef::Address),
            "bool" => return Ok(TypeRef::Bool),
            "string" => return Ok(TypeRef::String),
            "bytes" => return Ok(TypeRef::Bytes),
            _ => {}
        }

        if let Some(width) = type_name.strip_prefix("bytes") {
            let n = parse_decimal(width)
                .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
            if !(1..=32).contains(&n) {
                return Err(Eip712Error::InvalidType(type_name.to_string()));
            }
            return Ok(TypeRef::BytesN(n));
        }

        if let Some(width) = type_name.strip_prefix("uint") {
            return Ok(TypeRef::Uint(parse_bit_width(type_name, width)?));
        }
        if let Some(width) = type_name.strip_prefix("int") {
            return Ok(TypeRef::Int(parse_bit_width(type_name, width)?));
        }

        // Anything else is a custom struct name
        if type_name.is_empty()
            || type_name
                .chars()
                .any(|c| c.is_whitespace() || "[](),".contains(c))
        {
            return Err(Eip712Error::InvalidType(type_name.to_string()));
        }

        Ok(TypeRef::Struct(type_name.to_string()))
    }

    /// The struct name referenced through any number of array suffixes
    pub fn base_struct_name(&self) -> Option<&str> {
        match self {
            TypeRef::Struct(name) => Some(name),
            TypeRef::Array(inner) | TypeRef::FixedArray(inner, _) => inner.base_struct_name(),
            _ => None,
        }
    }
}

fn parse_bit_width(type_name: &str, width: &str) -> Result<usize> {
    let bits = parse_decimal(width)
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(Eip712Error::InvalidType(type_name.to_string()));
    }
    Ok(bits)
}

/// Digits only: `usize::from_str` would also accept a `+` sign
fn parse_decimal(s: &str) -> Option<usize> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Validate every type and field definition in the schema
///
/// Checks that type names are non-empty, do not collide with primitive
/// spellings, and that every field's type reference parses and resolves to
/// a primitive or a defined type.
pub fn validate_types(types: &Types) -> Result<()> {
    for (type_name, fields) in types {
        match TypeRef::parse(type_name) {
            Ok(TypeRef::Struct(_)) => {}
            _ => return Err(Eip712Error::InvalidType(type_name.clone())),
        }

        for field in fields {
            if field.name.is_empty() {
                return Err(Eip712Error::InvalidType(format!(
                    "{}: field with empty name",
                    type_name
                )));
            }
            let parsed = TypeRef::parse(&field.type_name)?;
            if let Some(target) = parsed.base_struct_name() {
                if !types.contains_key(target) {
                    return Err(Eip712Error::UnknownType(target.to_string()));
                }
            }
        }
    }
    Ok(())
}

/// Reject schemas whose custom-type reference graph contains a cycle
///
/// Depth-first search from every defined name with an on-stack set. Array
/// suffixes do not break cycles: `Node { children: Node[] }` is cyclic.
pub fn validate_no_cycles(types: &Types) -> Result<()> {
    let mut visited = HashSet::new();
    let mut in_path = HashSet::new();

    for type_name in types.keys() {
        check_cycle(type_name, types, &mut visited, &mut in_path)?;
    }
    Ok(())
}

fn check_cycle(
    type_name: &str,
    types: &Types,
    visited: &mut HashSet<String>,
    in_path: &mut HashSet<String>,
) -> Result<()> {
    if in_path.contains(type_name) {
        return Err(Eip712Error::CyclicType(type_name.to_string()));
    }
    if visited.contains(type_name) {
        return Ok(());
    }

    visited.insert(type_name.to_string());
    in_path.insert(type_name.to_string());

    if let Some(fields) = types.get(type_name) {
        for field in fields {
            let parsed = TypeRef::parse(&field.type_name)?;
            if let Some(target) = parsed.base_struct_name() {
                if types.contains_key(target) {
                    check_cycle(target, types, visited, in_path)?;
                }
            }
        }
    }

    in_path.remove(type_name);
    Ok(())
}

/// Transitive custom-type dependencies of `type_name`
///
/// Returns `type_name` first, then every other reachable custom type in
/// lexicographic order. Primitives are excluded; an unresolved custom
/// reference is an error.
pub fn dependencies(type_name: &str, types: &Types) -> Result<Vec<String>> {
    if !types.contains_key(type_name) {
        return Err(Eip712Error::UnknownType(type_name.to_string()));
    }

    let mut found = HashSet::new();
    let mut to_visit = vec![type_name.to_string()];

    while let Some(current) = to_visit.pop() {
        if !found.insert(current.clone()) {
            continue;
        }

        let fields = types
            .get(&current)
            .ok_or_else(|| Eip712Error::UnknownType(current.clone()))?;

        for field in fields {
            let parsed = TypeRef::parse(&field.type_name)?;
            if let Some(target) = parsed.base_struct_name() {
                if !types.contains_key(target) {
                    return Err(Eip712Error::UnknownType(target.to_string()));
                }
                if !found.contains(target) {
                    to_visit.push(target.to_string());
                }
            }
        }
    }

    found.remove(type_name);
    let mut rest: Vec<String> = found.into_iter().collect();
    rest.sort();

    let mut result = Vec::with_capacity(rest.len() + 1);
    result.push(type_name.to_string());
    result.extend(rest);
    Ok(result)
}

/// Canonical textual encoding of a type and its transitive dependencies
///
/// `TypeName(type1 name1,type2 name2,...)` for the primary type, followed
/// by each dependency in lexicographic order, concatenated without
/// separators.
pub fn encode_type(type_name: &str, types: &Types) -> Result<String> {
    let deps = dependencies(type_name, types)?;

    let mut encoded = String::new();
    for dep in &deps {
        let fields = types
            .get(dep)
            .ok_or_else(|| Eip712Error::UnknownType(dep.clone()))?;
        format_type(dep, fields, &mut encoded);
    }
    Ok(encoded)
}

/// `keccak256(encode_type(type_name))`
pub fn type_hash(type_name: &str, types: &Types) -> Result<[u8; 32]> {
    let encoded = encode_type(type_name, types)?;
    Ok(keccak256(encoded.as_bytes()))
}

fn format_type(type_name: &str, fields: &[Field], out: &mut String) {
    out.push_str(type_name);
    out.push('(');
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&field.type_name);
        out.push(' ');
        out.push_str(&field.name);
    }
    out.push(')');
}
