//! Deterministic bucketing for percentage rollout.
//!
//! A user's bucket for a segment is FNV-1a (32-bit) over the UTF-8 bytes of
//! `"<user_id>:<slug>"`, reduced modulo 100. The seed format, hash family, and
//! modulus are fixed: changing any of them reshuffles every rollout.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Number of buckets; rollout percentages are compared against this range.
pub const BUCKETS: u32 = 100;

/// FNV-1a, 32-bit.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
  let mut h = FNV_OFFSET_BASIS;
  for &b in bytes {
    h ^= u32::from(b);
    h = h.wrapping_mul(FNV_PRIME);
  }
  h
}

/// The bucket in `0..100` that `user_id` occupies for segment `slug`.
pub fn bucket(user_id: i64, slug: &str) -> u8 {
  let seed = format!("{user_id}:{slug}");
  // Always < 100, so the narrowing cannot truncate.
  (fnv1a_32(seed.as_bytes()) % BUCKETS) as u8
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fnv1a_32_reference_vectors() {
    assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
    assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
    assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
  }

  #[test]
  fn bucket_matches_known_seeds() {
    assert_eq!(fnv1a_32(b"1000:AUTO_HIT"), 0x1164_2d5f);
    assert_eq!(bucket(1000, "AUTO_HIT"), 87);
    assert_eq!(bucket(1000, "AUTO_MISS"), 30);
    assert_eq!(bucket(1000, "VOICE_MESSAGE"), 0);
    assert_eq!(bucket(1000, "NEW_CHECKOUT"), 1);
    assert_eq!(bucket(42, "ROLLOUT_A"), 8);
  }

  #[test]
  fn bucket_is_stable() {
    let first = bucket(9001, "TEST_HASH_DETERMINISM");
    let second = bucket(9001, "TEST_HASH_DETERMINISM");
    assert_eq!(first, second);
    assert_eq!(first, 58);
  }

  #[test]
  fn bucket_depends_on_both_user_and_slug() {
    assert_ne!(bucket(1000, "ROLLOUT_A"), bucket(42, "ROLLOUT_A"));
    assert_ne!(bucket(42, "ROLLOUT_A"), bucket(42, "ROLLOUT_B"));
  }

  #[test]
  fn bucket_always_in_range() {
    for user_id in 1..=500 {
      for slug in ["abc", "DARK_MODE", "segment_with_a_rather_long_name_42"] {
        assert!(bucket(user_id, slug) < 100);
      }
    }
  }
}
