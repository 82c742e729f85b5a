use std::collections::HashMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use common::crypto::HybridSignature;

/// Signatures accepted within the freshness window, keyed by digest.
///
/// A request timestamped `t` can only pass the freshness check until
/// `t + window`, so an entry is dropped once that moment has passed.
#[derive(Debug, Default)]
pub struct ReplayCache {
    seen: Mutex<HashMap<[u8; 32], i64>>,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `signature` as used until `expires_at_ms`.
    ///
    /// Returns `false` if the same signature was already recorded and has
    /// not yet expired.
    pub fn check_and_record(
        &self,
        signature: &HybridSignature,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> bool {
        let digest = digest(signature);
        let mut seen = self.seen.lock();

        seen.retain(|_, expires| *expires >= now_ms);

        match seen.get(&digest) {
            Some(_) => false,
            None => {
                seen.insert(digest, expires_at_ms);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn digest(signature: &HybridSignature) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(&signature.pre_quantum);
    hasher.update(&signature.post_quantum);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(tag: u8) -> HybridSignature {
        HybridSignature::from_parts(vec![tag; 64], vec![tag; 32])
    }

    #[test]
    fn test_second_use_rejected() {
        let cache = ReplayCache::new();
        assert!(cache.check_and_record(&signature(1), 1_000, 0));
        assert!(!cache.check_and_record(&signature(1), 1_000, 10));
        assert!(cache.check_and_record(&signature(2), 1_000, 10));
    }

    #[test]
    fn test_expired_entries_swept() {
        let cache = ReplayCache::new();
        assert!(cache.check_and_record(&signature(1), 100, 0));
        assert!(cache.check_and_record(&signature(2), 500, 0));
        assert_eq!(cache.len(), 2);

        assert!(cache.check_and_record(&signature(3), 900, 200));
        assert_eq!(cache.len(), 2);
        assert!(cache.check_and_record(&signature(1), 900, 200));
    }
}
