use crate::digest::Digest;
use crate::keys::{self, PublicKey, Signature};

/// Narrow interface every consensus, SMR, and voting component depends on instead of a concrete
/// hash or signature algorithm, keeping cryptography an external, swappable collaborator.
///
/// Swapping `Ed25519Blake3Provider` for a test double that returns fixed digests is how the
/// property tests in `a2a-consensus` get deterministic fixtures without faking an entire PKI.
pub trait CryptoProvider: Send + Sync {
    /// Content-hash arbitrary bytes (used for `ConsensusProposal.digest`, `Snapshot.hash`, …).
    fn hash(&self, bytes: &[u8]) -> Digest;

    /// Verify a detached signature over `message` under `public_key`.
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool;
}

/// Default production provider: BLAKE3 content hashing, Ed25519 signature verification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Blake3Provider;

impl CryptoProvider for Ed25519Blake3Provider {
    fn hash(&self, bytes: &[u8]) -> Digest {
        Digest::from_bytes(*blake3::hash(bytes).as_bytes())
    }

    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        keys::verify(public_key, message, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn hash_is_deterministic() {
        let provider = Ed25519Blake3Provider;
        let a = provider.hash(b"proposal content");
        let b = provider.hash(b"proposal content");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_distinguishes_content() {
        let provider = Ed25519Blake3Provider;
        assert_ne!(provider.hash(b"a"), provider.hash(b"b"));
    }

    #[test]
    fn provider_verifies_signature() {
        let provider = Ed25519Blake3Provider;
        let pair = KeyPair::generate();
        let sig = pair.sign(b"commit(0,1,digest)");
        assert!(provider.verify(&pair.public_key(), b"commit(0,1,digest)", &sig));
    }
}
