//! 多重比較校正
//!
//! 非有限的 p 值不計入比較次數，校正後仍為 NaN。

use std::cmp::Ordering;

/// Benjamini–Hochberg 校正後的 p 值（q 值）
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut adjusted = vec![f64::NAN; pvalues.len()];
    let mut order: Vec<usize> = (0..pvalues.len())
        .filter(|&i| pvalues[i].is_finite())
        .collect();
    let m = order.len();
    if m == 0 {
        return adjusted;
    }

    order.sort_by(|&i, &j| {
        pvalues[i]
            .partial_cmp(&pvalues[j])
            .unwrap_or(Ordering::Equal)
            .then(i.cmp(&j))
    });

    // 由最大排名往回取累積最小值，確保單調
    let mut prev = 1.0_f64;
    for (rank0, &idx) in order.iter().enumerate().rev() {
        let rank = rank0 + 1;
        let adj = (pvalues[idx] * m as f64 / rank as f64).min(1.0);
        prev = prev.min(adj);
        adjusted[idx] = prev;
    }
    adjusted
}

pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| p.is_finite()).count() as f64;
    pvalues
        .iter()
        .map(|&p| if p.is_finite() { (p * m).min(1.0) } else { f64::NAN })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_known_values() {
        let p = [0.01, 0.04, 0.03, 0.005];
        let q = benjamini_hochberg(&p);
        // 排序: 0.005(1) 0.01(2) 0.03(3) 0.04(4)
        assert!((q[3] - 0.02).abs() < 1e-12);
        assert!((q[0] - 0.02).abs() < 1e-12);
        assert!((q[2] - 0.04).abs() < 1e-12);
        assert!((q[1] - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_bh_monotone_in_rank_and_bounded() {
        let p = [0.2, 0.001, 0.9, 0.04, 0.04, 0.5, 0.03];
        let q = benjamini_hochberg(&p);
        let mut idx: Vec<usize> = (0..p.len()).collect();
        idx.sort_by(|&a, &b| p[a].partial_cmp(&p[b]).unwrap());
        for w in idx.windows(2) {
            assert!(q[w[0]] <= q[w[1]] + 1e-15);
        }
        for (raw, adj) in p.iter().zip(&q) {
            assert!(adj >= raw && *adj <= 1.0);
        }
    }

    #[test]
    fn test_nan_is_excluded() {
        let q = benjamini_hochberg(&[0.01, f64::NAN, 0.02]);
        assert!(q[1].is_nan());
        assert!((q[0] - 0.02).abs() < 1e-12);
        let b = bonferroni(&[0.01, f64::NAN, 0.6]);
        assert!((b[0] - 0.02).abs() < 1e-12);
        assert_eq!(b[2], 1.0);
    }
}
