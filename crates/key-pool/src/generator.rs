//! Random key generation.

use rand::RngCore;
use rand::distributions::{Distribution, Uniform};

/// Characters keys are drawn from: `a-z` followed by `A-Z`.
pub const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a key of exactly `length` characters from [`ALPHABET`].
///
/// Every character is drawn uniformly and independently. Nothing here
/// prevents collisions; the pool rejects candidates that are already live or
/// were deleted before.
pub fn random_key<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> String {
    let dist = Uniform::from(0..ALPHABET.len());
    (0..length)
        .map(|_| char::from(ALPHABET[dist.sample(rng)]))
        .collect()
}

/// Number of distinct keys of `length` characters, saturating at `u128::MAX`.
pub fn key_space(length: usize) -> u128 {
    u32::try_from(length)
        .ok()
        .and_then(|exp| (ALPHABET.len() as u128).checked_pow(exp))
        .unwrap_or(u128::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_key_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for length in [1, 8, 32] {
            let key = random_key(&mut rng, length);
            assert_eq!(key.len(), length);
            assert!(key.chars().all(|c| c.is_ascii_alphabetic()));
        }
    }

    #[test]
    fn test_random_key_uses_both_cases() {
        let mut rng = StdRng::seed_from_u64(42);
        let key = random_key(&mut rng, 512);
        assert!(key.chars().any(|c| c.is_ascii_lowercase()));
        assert!(key.chars().any(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_random_key_differs_between_draws() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = random_key(&mut rng, 16);
        let b = random_key(&mut rng, 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_key_through_trait_object() {
        let mut rng: Box<dyn RngCore + Send> = Box::new(StdRng::seed_from_u64(3));
        let key = random_key(rng.as_mut(), 10);
        assert_eq!(key.len(), 10);
    }

    #[test]
    fn test_key_space() {
        assert_eq!(key_space(0), 1);
        assert_eq!(key_space(1), 52);
        assert_eq!(key_space(2), 52 * 52);
        assert_eq!(key_space(100), u128::MAX);
    }
}
