//! 排列與重抽樣的共用工具

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const DEFAULT_SEED: u64 = 42;

pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// 上尾排列 p 值，加一校正使 p 值永不為 0
pub fn permutation_pvalue(observed: f64, null_values: &[f64]) -> f64 {
    let ge = null_values
        .iter()
        .filter(|&&v| v >= observed - 1e-12)
        .count() as f64;
    (ge + 1.0) / (null_values.len() as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_pvalue_bounds() {
        assert!((permutation_pvalue(10.0, &[1.0, 2.0, 3.0]) - 0.25).abs() < 1e-12);
        assert_eq!(permutation_pvalue(0.0, &[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(permutation_pvalue(1.0, &[]), 1.0);
    }
}
