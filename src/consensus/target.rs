// Compact target ("bits") arithmetic and difficulty retargeting

use crate::core::Hash256;
use primitive_types::{U256, U512};
use std::fmt;

/// Retarget period: two weeks in seconds
pub const TWO_WEEKS: u64 = 60 * 60 * 24 * 14;

/// Compact encoding of the genesis-era (lowest difficulty) target
pub const MAX_TARGET_BITS: u32 = 0x1d00ffff;

/// Difficulty target representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Compact representation (bits field in block header)
    pub bits: u32,
}

impl Target {
    /// Create a new target from bits (compact format)
    pub fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Compact form of a full 256-bit target
    pub fn from_u256(target: U256) -> Self {
        Self {
            bits: target_to_bits(target),
        }
    }

    /// Full 256-bit target
    pub fn to_u256(&self) -> U256 {
        bits_to_target(self.bits)
    }

    /// Check if a hash meets this target. The hash is read as a
    /// little-endian number and must be strictly below the target.
    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        U256::from_little_endian(hash.as_bytes()) < self.to_u256()
    }

    pub fn difficulty(&self) -> f64 {
        difficulty(self.bits)
    }
}

impl fmt::Display for Target {
    /// Full target as 64 hex digits, most significant first
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut raw = [0u8; 32];
        self.to_u256().to_big_endian(&mut raw);
        write!(f, "{}", hex::encode(raw))
    }
}

/// Convert compact bits to full 256-bit target
/// Formula: target = coefficient * 256^(exponent - 3)
///
/// Encodings whose target does not fit in 256 bits expand to zero,
/// a target no hash can meet.
pub fn bits_to_target(bits: u32) -> U256 {
    let exponent = bits >> 24;
    let coefficient = U256::from(bits & 0x00ff_ffff);

    if exponent <= 3 {
        return coefficient >> (8 * (3 - exponent));
    }

    let shift = 8 * (exponent - 3);
    if coefficient.bits() + shift as usize > 256 {
        return U256::zero();
    }
    coefficient << shift
}

/// Convert a 256-bit target back to compact bits.
///
/// The coefficient is the three most significant bytes. When the leading
/// byte has its high bit set, a zero byte is prepended so the compact form
/// is never read as negative.
pub fn target_to_bits(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }

    let mut raw = [0u8; 32];
    target.to_big_endian(&mut raw);
    let first = raw.iter().position(|&b| b != 0).unwrap_or(31);
    let raw = &raw[first..];
    let byte = |i: usize| raw.get(i).copied().unwrap_or(0);

    let (exponent, coefficient) = if raw[0] > 0x7f {
        (raw.len() + 1, [0, byte(0), byte(1)])
    } else {
        (raw.len(), [byte(0), byte(1), byte(2)])
    };

    ((exponent as u32) << 24) | u32::from_be_bytes([0, coefficient[0], coefficient[1], coefficient[2]])
}

/// Genesis-era maximum target: 0xffff * 256^(0x1d - 3)
pub fn max_target() -> U256 {
    bits_to_target(MAX_TARGET_BITS)
}

/// Ratio of the maximum target to the target encoded by `bits`
pub fn difficulty(bits: u32) -> f64 {
    u256_to_f64(max_target()) / u256_to_f64(bits_to_target(bits))
}

/// Next compact target after a retarget period that took
/// `time_differential` seconds.
///
/// The period is clamped to [TWO_WEEKS / 4, TWO_WEEKS * 4] so the target
/// moves by at most a factor of four.
pub fn calculate_new_bits(previous_bits: u32, time_differential: i64) -> u32 {
    let clamped = time_differential.clamp((TWO_WEEKS / 4) as i64, (TWO_WEEKS * 4) as i64) as u64;

    let scaled = bits_to_target(previous_bits).full_mul(U256::from(clamped)) / U512::from(TWO_WEEKS);
    let new_target = U256::try_from(scaled).unwrap_or(U256::MAX);

    target_to_bits(new_target)
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, &word| acc * 18_446_744_073_709_551_616.0 + word as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_to_target_genesis() {
        let expected = U256::from(0x00ffffu64) << (8 * 26);
        assert_eq!(bits_to_target(0x1d00ffff), expected);
        assert_eq!(max_target(), expected);
    }

    #[test]
    fn test_bits_to_target_small_exponent() {
        assert_eq!(bits_to_target(0x03123456), U256::from(0x123456u64));
        assert_eq!(bits_to_target(0x02123400), U256::from(0x1234u64));
        assert_eq!(bits_to_target(0x01120000), U256::from(0x12u64));
    }

    #[test]
    fn test_bits_to_target_overflow_is_zero() {
        assert_eq!(bits_to_target(0xff7fffff), U256::zero());
        assert_eq!(bits_to_target(0x2100ffff), U256::from(0xffffu64) << (8 * 30));
    }

    #[test]
    fn test_canonical_bits_round_trip() {
        for bits in [
            0x1d00ffff, 0x1b0404cb, 0x1a05db8b, 0x18009645, 0x170b0c00, 0x18013ce9, 0x207fffff,
            0x03123456,
        ] {
            assert_eq!(
                target_to_bits(bits_to_target(bits)),
                bits,
                "round trip failed for {:#010x}",
                bits
            );
        }
    }

    #[test]
    fn test_target_to_bits_high_bit_padding() {
        // 0x96 has its high bit set, so the coefficient gains a zero byte
        let target = U256::from(0x964500u64) << (8 * 20);
        assert_eq!(target_to_bits(target), 0x18009645);
        assert_eq!(target_to_bits(target << 8), 0x19009645);
        assert_eq!(target_to_bits(U256::zero()), 0);
    }

    #[test]
    fn test_difficulty() {
        assert_eq!(difficulty(0x1d00ffff), 1.0);

        let d = difficulty(0x18013ce9);
        assert!((d - 888171856257.3206).abs() / d < 1e-12);
    }

    #[test]
    fn test_calculate_new_bits() {
        // Retarget at block 471744 (took 302400 seconds)
        assert_eq!(calculate_new_bits(0x1801d854, 302400), 0x17761500);
    }

    #[test]
    fn test_calculate_new_bits_unchanged_on_schedule() {
        assert_eq!(calculate_new_bits(0x1d00ffff, TWO_WEEKS as i64), 0x1d00ffff);
    }

    #[test]
    fn test_calculate_new_bits_clamped() {
        // Eight weeks clamps to the 4x window
        assert_eq!(calculate_new_bits(0x1d00ffff, 8 * TWO_WEEKS as i64), 0x1d03fffc);
        assert_eq!(
            calculate_new_bits(0x1d00ffff, 8 * TWO_WEEKS as i64),
            calculate_new_bits(0x1d00ffff, 4 * TWO_WEEKS as i64)
        );

        // Negative and tiny periods clamp to a quarter
        assert_eq!(calculate_new_bits(0x1d00ffff, -5), 0x1c3fffc0);
        assert_eq!(calculate_new_bits(0x1d00ffff, 1), 0x1c3fffc0);
    }

    #[test]
    fn test_target_validation() {
        let target = Target::from_bits(0x1d00ffff);

        // Zero hash should always be valid (lowest possible)
        assert!(target.is_met_by(&Hash256::zero()));

        // All 0xff hash should be invalid (highest possible)
        assert!(!target.is_met_by(&Hash256::new([0xff; 32])));

        // Zero target is never met
        assert!(!Target::from_bits(0).is_met_by(&Hash256::zero()));
    }

    #[test]
    fn test_target_from_u256() {
        let target = Target::from_u256(max_target());
        assert_eq!(target.bits, MAX_TARGET_BITS);
        assert_eq!(target.difficulty(), 1.0);
    }

    #[test]
    fn test_target_display() {
        assert_eq!(
            Target::from_bits(0x1d00ffff).to_string(),
            format!("00000000ffff{}", "0".repeat(52))
        );
    }
}
