use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use models::tth::TTH_BYTES;
use models::TthValue;
use sha2::{Digest, Sha256};

/// Seam to the external content hasher.
///
/// The index never hashes file contents itself; it asks whether a root is
/// already known and, if not, requests hashing. The completion arrives
/// later as a `hash_done` event. `hash_bytes` covers the one synchronous
/// case: fingerprinting a generated listing blob.
pub trait Hasher: Send + Sync {
    fn get_hash(&self, path: &Path) -> Option<TthValue>;
    fn request_hash(&self, path: &Path);
    fn hash_bytes(&self, data: &[u8]) -> TthValue;
}

/// In-process hasher backed by a map of known roots.
///
/// Stands in for the real Tiger-tree hasher: digests are sha-256 roots
/// truncated to the Tiger width, which keeps them deterministic for tests
/// and listing fingerprints.
#[derive(Debug, Default)]
pub struct MemoryHasher {
    known: Mutex<HashMap<PathBuf, TthValue>>,
    requested: Mutex<Vec<PathBuf>>,
}

impl MemoryHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed hash, as the external hasher would.
    pub fn add_known(&self, path: impl Into<PathBuf>, tth: TthValue) {
        self.known.lock().unwrap().insert(path.into(), tth);
    }

    pub fn forget(&self, path: &Path) {
        self.known.lock().unwrap().remove(path);
    }

    /// Drain the paths whose hashing has been requested so far.
    pub fn take_requested(&self) -> Vec<PathBuf> {
        std::mem::take(&mut self.requested.lock().unwrap())
    }

    pub fn digest(data: &[u8]) -> TthValue {
        let digest = Sha256::digest(data);
        let mut out = [0u8; TTH_BYTES];
        out.copy_from_slice(&digest[..TTH_BYTES]);
        TthValue(out)
    }
}

impl Hasher for MemoryHasher {
    fn get_hash(&self, path: &Path) -> Option<TthValue> {
        self.known.lock().unwrap().get(path).copied()
    }

    fn request_hash(&self, path: &Path) {
        self.requested.lock().unwrap().push(path.to_path_buf());
    }

    fn hash_bytes(&self, data: &[u8]) -> TthValue {
        Self::digest(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_paths_are_requested_not_hashed() {
        let hasher = MemoryHasher::new();
        assert!(hasher.get_hash(Path::new("/a/b.mp3")).is_none());
        hasher.request_hash(Path::new("/a/b.mp3"));
        assert_eq!(hasher.take_requested(), vec![PathBuf::from("/a/b.mp3")]);
        assert!(hasher.take_requested().is_empty());
    }

    #[test]
    fn known_paths_resolve() {
        let hasher = MemoryHasher::new();
        let tth = MemoryHasher::digest(b"content");
        hasher.add_known("/a/b.mp3", tth);
        assert_eq!(hasher.get_hash(Path::new("/a/b.mp3")), Some(tth));
    }

    #[test]
    fn byte_digests_are_deterministic() {
        let hasher = MemoryHasher::new();
        assert_eq!(hasher.hash_bytes(b"xml"), hasher.hash_bytes(b"xml"));
        assert_ne!(hasher.hash_bytes(b"xml"), hasher.hash_bytes(b"xml2"));
    }
}
