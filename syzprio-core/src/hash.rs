//! Content hashing helper used for corpus item signatures.

use sha2::{Digest, Sha256};

/// Hashes already-serialized program bytes into a corpus signature.
///
/// The signature is hex-encoded so it can be used directly as a map key /
/// file name, the same role `hash.String` plays for syzkaller's `Item.Sig`.
pub fn sig(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            write!(out, "{b:02x}").unwrap();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sig_is_deterministic() {
        assert_eq!(sig(b"hello"), sig(b"hello"));
        assert_ne!(sig(b"hello"), sig(b"world"));
    }
}
