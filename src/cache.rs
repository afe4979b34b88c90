//! Process-wide derivation cache
//!
//! Memoizes canonical type strings, type hashes, and dependency lists so
//! repeated signings with the same schema skip re-derivation. Entries are
//! pure functions of the schema, keyed by a schema fingerprint plus the
//! target type name; message values are never stored.
//!
//! Reads take the shared lock; a miss computes outside the lock and
//! inserts under the exclusive lock. Concurrent writers may race to insert
//! the same key, which is harmless: every writer computes the same value.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::crypto::keccak256;
use crate::error::Result;
use crate::schema;
use crate::types::Types;

/// Identity of a schema: keccak-256 of its canonical serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

/// Compute the fingerprint of a schema
///
/// Serializes every type as `Name(type1 name1,...)` with type names in
/// sorted order and fields in declared order, then hashes. Two schemas
/// that reuse a type name with different fields get distinct fingerprints.
pub fn fingerprint(types: &Types) -> Fingerprint {
    let mut names: Vec<&String> = types.keys().collect();
    names.sort();

    let mut canonical = String::new();
    for name in names {
        canonical.push_str(name);
        canonical.push('(');
        for (i, field) in types[name].iter().enumerate() {
            if i > 0 {
                canonical.push(',');
            }
            canonical.push_str(&field.type_name);
            canonical.push(' ');
            canonical.push_str(&field.name);
        }
        canonical.push(')');
    }

    Fingerprint(keccak256(canonical.as_bytes()))
}

struct EncoderCache {
    encoded_types: HashMap<(Fingerprint, String), String>,
    type_hashes: HashMap<(Fingerprint, String), [u8; 32]>,
    dependencies: HashMap<(Fingerprint, String), Vec<String>>,
    validated: HashSet<Fingerprint>,
}

lazy_static::lazy_static! {
    static ref ENCODER_CACHE: RwLock<EncoderCache> = RwLock::new(EncoderCache {
        encoded_types: HashMap::new(),
        type_hashes: HashMap::new(),
        dependencies: HashMap::new(),
        validated: HashSet::new(),
    });
}

/// Cached canonical type encoding
pub fn encoded_type(fp: Fingerprint, type_name: &str, types: &Types) -> Result<String> {
    let key = (fp, type_name.to_string());
    if let Some(encoded) = ENCODER_CACHE.read().unwrap().encoded_types.get(&key) {
        return Ok(encoded.clone());
    }

    let encoded = schema::encode_type(type_name, types)?;
    ENCODER_CACHE
        .write()
        .unwrap()
        .encoded_types
        .insert(key, encoded.clone());
    Ok(encoded)
}

/// Cached type hash
pub fn type_hash(fp: Fingerprint, type_name: &str, types: &Types) -> Result<[u8; 32]> {
    let key = (fp, type_name.to_string());
    if let Some(hash) = ENCODER_CACHE.read().unwrap().type_hashes.get(&key) {
        return Ok(*hash);
    }

    let hash = keccak256(encoded_type(fp, type_name, types)?.as_bytes());
    ENCODER_CACHE
        .write()
        .unwrap()
        .type_hashes
        .insert(key, hash);
    Ok(hash)
}

/// Cached dependency list
pub fn dependencies(fp: Fingerprint, type_name: &str, types: &Types) -> Result<Vec<String>> {
    let key = (fp, type_name.to_string());
    if let Some(deps) = ENCODER_CACHE.read().unwrap().dependencies.get(&key) {
        return Ok(deps.clone());
    }

    let deps = schema::dependencies(type_name, types)?;
    ENCODER_CACHE
        .write()
        .unwrap()
        .dependencies
        .insert(key, deps.clone());
    Ok(deps)
}

/// Whether this schema already passed full validation (including cycle
/// detection) in this process
pub fn is_validated(fp: Fingerprint) -> bool {
    ENCODER_CACHE.read().unwrap().validated.contains(&fp)
}

/// Record that this schema passed validation; only called on success
pub fn mark_validated(fp: Fingerprint) {
    ENCODER_CACHE.write().unwrap().validated.insert(fp);
}
