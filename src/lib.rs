//! EIP-712 Typed Data Signing
//!
//! Computes canonical [EIP-712] typed-data hashes, signs them with a
//! secp256k1 private key, and recovers the signing address from a
//! signature. Digests are byte-identical to what a conforming Ethereum
//! client or on-chain verifier computes for the same input.
//!
//! # Architecture
//!
//! - **schema**: type-reference parsing, dependency resolution, canonical
//!   type encoding, cycle detection
//! - **codec** / **encoder**: 32-byte leaf encodings and the recursive
//!   struct/array walk producing struct hashes
//! - **hasher**: domain assembly, domain separator, final signing digest
//! - **cache**: process-wide memoization of schema-derived artifacts
//! - **signer**: the signing/recovery facade, including EIP-2612 permits
//!   and schema inference for flat messages
//! - **keystore**: encrypted keystore (Web3 Secret Storage) decryption
//!
//! # Example
//!
//! ```rust,ignore
//! use eip712_signer::{Domain, Field, Signer, Types, verify_typed_data};
//! use serde_json::json;
//!
//! let signer = Signer::new(private_key_hex, 1)?;
//!
//! let domain = Domain {
//!     chain_id: Some(1),
//!     ..Domain::new("Example App", "1")
//! };
//! let types = Types::from([(
//!     "Person".to_string(),
//!     vec![Field::new("name", "string"), Field::new("wallet", "address")],
//! )]);
//! let message = json!({"name": "Alice", "wallet": "0x00000000000000000000000000000000000000aa"});
//!
//! let sig = signer.sign_typed_data(&domain, &types, "Person", &message)?;
//! assert!(verify_typed_data(&sig, signer.address(), &domain, &types, "Person", &message)?);
//! ```
//!
//! # Thread safety
//!
//! All operations are synchronous and CPU-bound. The only shared mutable
//! state is the derivation cache, which is safe under concurrent signing
//! from many threads. Message values are borrowed immutably for the
//! duration of a call and must not be mutated concurrently elsewhere.
//!
//! [EIP-712]: https://eips.ethereum.org/EIPS/eip-712

pub mod cache;
pub mod codec;
pub mod crypto;
pub mod encoder;
pub mod error;
pub mod hasher;
pub mod infer;
pub mod keystore;
pub mod schema;
pub mod signer;
pub mod types;

pub use cache::{fingerprint, Fingerprint};
pub use crypto::{keccak256, to_checksum_address};
pub use encoder::hash_struct;
pub use error::{Eip712Error, ErrorKind, Result};
pub use hasher::{digest_parts, signing_digest, DigestParts};
pub use infer::infer_types;
pub use schema::{dependencies, encode_type, type_hash, TypeRef};
pub use signer::{recover_typed_data, verify_typed_data, Signer};
pub use types::{Domain, Field, Signature, Types};
