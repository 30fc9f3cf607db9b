// Proof-of-work target arithmetic

pub mod target;

pub use target::{
    MAX_TARGET_BITS, TWO_WEEKS, Target, bits_to_target, calculate_new_bits, difficulty, max_target,
    target_to_bits,
};
