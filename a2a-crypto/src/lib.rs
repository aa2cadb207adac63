//! Pluggable cryptographic primitives for the A2A coordination fabric.
//!
//! Hashing and signature verification are treated as an external collaborator: every other
//! crate in this workspace depends on the `CryptoProvider` trait, never on a concrete algorithm.
//! This keeps consensus, SMR, and voting logic testable with a deterministic stand-in while still
//! shipping a real default backed by `blake3` content hashing and `ed25519-dalek` signatures.

mod digest;
mod keys;
mod provider;

pub use digest::Digest;
pub use keys::{KeyPair, PublicKey, Signature};
pub use provider::{CryptoProvider, Ed25519Blake3Provider};

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed public key: {0}")]
    MalformedKey(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}
