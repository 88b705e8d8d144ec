//! Random identifiers for image tags and container names.
//!
//! Identifiers are lowercase hex drawn from the operating system's secure
//! random source. With `n` identifiers of `length` hex characters, the chance
//! of any collision is bounded by the birthday approximation
//! `1 - exp(-n(n-1) / (2 * 16^length))`; see [`collision_probability`].
//! Collisions are not retried: a duplicate tag or name surfaces as an engine
//! error to the caller.

use crate::error::{Result, SandboxError};

/// Returns `length` lowercase hex characters from a secure random source.
///
/// Reads `ceil(length / 2)` bytes and truncates the encoding, so odd lengths
/// carry no bias toward any nibble value.
///
/// # Errors
///
/// Returns `SandboxError::Config` for a zero length and
/// `SandboxError::Entropy` if the random source is unavailable.
pub fn generate_id(length: usize) -> Result<String> {
    if length == 0 {
        return Err(SandboxError::Config {
            message: "identifier length must be positive".into(),
        });
    }
    let mut bytes = vec![0u8; length.div_ceil(2)];
    getrandom::getrandom(&mut bytes).map_err(|e| SandboxError::Entropy {
        message: e.to_string(),
    })?;
    let mut id = hex::encode(bytes);
    id.truncate(length);
    Ok(id)
}

/// Birthday-bound probability that `count` identifiers of `length` hex
/// characters contain at least one duplicate.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
pub fn collision_probability(length: usize, count: u64) -> f64 {
    if count < 2 {
        return 0.0;
    }
    let space = 16f64.powi(length.min(i32::MAX as usize) as i32);
    let n = count as f64;
    let exponent = -(n * (n - 1.0)) / (2.0 * space);
    -exponent.exp_m1()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn is_lower_hex(s: &str) -> bool {
        s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }

    #[test]
    fn every_length_up_to_64_is_exact_lowercase_hex() {
        for length in 1..=64 {
            let id = generate_id(length).expect("generate");
            assert_eq!(id.len(), length);
            assert!(is_lower_hex(&id), "{id} is not lowercase hex");
        }
    }

    #[test]
    fn ten_thousand_ids_are_distinct() {
        let ids: HashSet<String> = (0..10_000)
            .map(|_| generate_id(16).expect("generate"))
            .collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(matches!(
            generate_id(0),
            Err(SandboxError::Config { .. })
        ));
    }

    #[test]
    fn odd_lengths_use_every_nibble() {
        let seen: HashSet<char> = (0..2_000)
            .filter_map(|_| generate_id(1).expect("generate").chars().next())
            .collect();
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn collision_probability_bounds() {
        assert!(collision_probability(16, 1).abs() < f64::EPSILON);
        let p = collision_probability(16, 10_000);
        assert!(p > 0.0 && p < 1e-9);
        let short = collision_probability(2, 100);
        assert!(short > 0.99);
    }
}
