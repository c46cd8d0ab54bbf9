//! Property-based tests for the key hierarchy and message codec
//!
//! These tests verify the fundamental invariants of the hierarchy:
//!
//! 1. **Symmetry**: thread id and thread key are order-independent in the
//!    participant pair
//! 2. **Round-trip**: decrypt(encrypt(m)) == m for all messages
//! 3. **Determinism**: same inputs always produce same outputs
//! 4. **Isolation**: different pairs and different vault keys produce
//!    unrelated thread keys
//! 5. **Uniform failure**: every decryption failure is the same value

use hush_crypto::{DecryptError, EncryptedBlob, NONCE_LEN, VaultKey, decrypt, encrypt, normalize_words, thread_id, thread_key};
use proptest::prelude::*;

// Participant ids are opaque UUID-shaped strings; exercise a wider alphabet
// to pin down byte-order sorting
fn participant_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9-]{1,40}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_thread_id_symmetric(a in participant_id(), b in participant_id()) {
        prop_assert_eq!(thread_id(&a, &b), thread_id(&b, &a));
    }

    #[test]
    fn prop_thread_key_symmetric(
        a in participant_id(),
        b in participant_id(),
        key_bytes in any::<[u8; 32]>(),
    ) {
        let vk = VaultKey::from_bytes(key_bytes);
        let ab = thread_key(&vk, &a, &b);
        let ba = thread_key(&vk, &b, &a);
        prop_assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn prop_thread_key_deterministic(
        a in participant_id(),
        b in participant_id(),
        key_bytes in any::<[u8; 32]>(),
    ) {
        let first = thread_key(&VaultKey::from_bytes(key_bytes), &a, &b);
        let second = thread_key(&VaultKey::from_bytes(key_bytes), &a, &b);
        prop_assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn prop_distinct_pairs_isolate_keys(
        a in participant_id(),
        b in participant_id(),
        c in participant_id(),
        key_bytes in any::<[u8; 32]>(),
    ) {
        prop_assume!(thread_id(&a, &b) != thread_id(&a, &c));
        let vk = VaultKey::from_bytes(key_bytes);
        let ab = thread_key(&vk, &a, &b);
        let ac = thread_key(&vk, &a, &c);
        prop_assert_ne!(ab.as_bytes(), ac.as_bytes());
    }

    #[test]
    fn prop_encrypt_decrypt_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        a in participant_id(),
        b in participant_id(),
        key_bytes in any::<[u8; 32]>(),
    ) {
        let key = thread_key(&VaultKey::from_bytes(key_bytes), &a, &b);
        let blob = encrypt(&key, &plaintext);
        prop_assert_eq!(decrypt(&key, &blob).unwrap(), plaintext);
    }

    #[test]
    fn prop_nonce_freshness(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        key_bytes in any::<[u8; 32]>(),
    ) {
        let key = thread_key(&VaultKey::from_bytes(key_bytes), "a", "b");
        let first = encrypt(&key, &plaintext);
        let second = encrypt(&key, &plaintext);
        prop_assert_ne!(first.iv, second.iv);
        prop_assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn prop_wrong_key_yields_uniform_failure(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        key_bytes in any::<[u8; 32]>(),
        other_bytes in any::<[u8; 32]>(),
    ) {
        prop_assume!(key_bytes != other_bytes);
        let key = thread_key(&VaultKey::from_bytes(key_bytes), "a", "b");
        let other = thread_key(&VaultKey::from_bytes(other_bytes), "a", "b");

        let blob = encrypt(&key, &plaintext);
        prop_assert_eq!(decrypt(&other, &blob), Err(DecryptError));
    }

    #[test]
    fn prop_any_bit_flip_yields_uniform_failure(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        key_bytes in any::<[u8; 32]>(),
        flip_ct: bool,
        bit in 0u8..8,
    ) {
        let key = thread_key(&VaultKey::from_bytes(key_bytes), "a", "b");
        let mut blob = encrypt(&key, &plaintext);

        if flip_ct {
            blob.ciphertext[0] ^= 1 << bit;
        } else {
            blob.iv[0] ^= 1 << bit;
        }

        prop_assert_eq!(decrypt(&key, &blob), Err(DecryptError));
    }

    #[test]
    fn prop_garbage_blob_yields_uniform_failure(
        garbage in prop::collection::vec(any::<u8>(), 0..64),
        iv in any::<[u8; NONCE_LEN]>(),
        key_bytes in any::<[u8; 32]>(),
    ) {
        let key = thread_key(&VaultKey::from_bytes(key_bytes), "a", "b");
        let blob = EncryptedBlob { ciphertext: garbage, iv };
        // Forging a valid tag without the key is negligible; treat any
        // success here as a test failure
        prop_assert_eq!(decrypt(&key, &blob), Err(DecryptError));
    }

    #[test]
    fn prop_normalization_is_idempotent(words in "[ A-Za-z]{0,60}") {
        let once = normalize_words(&words);
        prop_assert_eq!(normalize_words(&once), once.clone());
        if !once.is_empty() {
            prop_assert!(!once.starts_with(' '));
            prop_assert!(!once.ends_with(' '));
            prop_assert!(!once.contains("  "));
        }
    }
}
