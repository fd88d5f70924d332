use ahash::RandomState;
use std::hash::Hash;

// Fixed seeds keep hashes stable across translation passes so that anything
// ordered or keyed by them is reproducible.
const SEEDS: [u64; 4] = [
    0x5f3a_9c1e_27b4_d6a0,
    0x8d21_47ce_b39f_0e65,
    0x1b7e_c05a_f248_93dd,
    0xe40c_6b92_7a1f_5c38,
];

pub(crate) fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]).hash_one(value)
}
