//! Content-derived partition keys.

use sha2::{Digest, Sha256};

/// Length in characters of every partition key.
pub const PARTITION_KEY_LEN: usize = 64;

/// The partition key for an encoded record: the lower-case hex SHA-256 digest
/// of its bytes. Equal payloads always land on the same shard.
pub fn partition_key(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            partition_key(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            partition_key(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    proptest! {
        #[test]
        fn prop_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let key = partition_key(&data);
            prop_assert_eq!(key.len(), PARTITION_KEY_LEN);
            prop_assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            prop_assert_eq!(key, partition_key(&data.clone()));
        }

        #[test]
        fn prop_distinct_payloads_distinct_keys(
            a in proptest::collection::vec(any::<u8>(), 0..64),
            b in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(partition_key(&a), partition_key(&b));
        }
    }
}
