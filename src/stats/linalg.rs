//! nalgebra 矩陣輔助函式

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};

use crate::stats::descriptive::{mean, std_dev};
use crate::utils::error::{AnalysisError, Result};

/// 將矩陣各欄標準化 (ddof = 1)；`names` 用於錯誤訊息
pub fn zscore_columns(m: &DMatrix<f64>, names: &[String]) -> Result<DMatrix<f64>> {
    let mut out = m.clone();
    for j in 0..m.ncols() {
        let col: Vec<f64> = m.column(j).iter().copied().collect();
        let mu = mean(&col);
        let sd = std_dev(&col, 1);
        if !sd.is_finite() || sd <= 0.0 {
            let name = names.get(j).cloned().unwrap_or_else(|| format!("column {}", j));
            return Err(AnalysisError::numerical(format!(
                "'{}' has zero variance after filtering",
                name
            )));
        }
        for i in 0..m.nrows() {
            out[(i, j)] = (m[(i, j)] - mu) / sd;
        }
    }
    Ok(out)
}

/// 對稱矩陣的 -1/2 次方，加入 `ridge` 以避免奇異
pub fn inv_sqrt_sym(s: &DMatrix<f64>, ridge: f64) -> Result<DMatrix<f64>> {
    let n = s.nrows();
    let regularized = s + DMatrix::<f64>::identity(n, n) * ridge;
    let eig = regularized.symmetric_eigen();
    let mut inv_sqrt = DVector::<f64>::zeros(n);
    for (k, &lambda) in eig.eigenvalues.iter().enumerate() {
        if lambda <= 0.0 || !lambda.is_finite() {
            return Err(AnalysisError::numerical(
                "covariance matrix is not positive definite",
            ));
        }
        inv_sqrt[k] = 1.0 / lambda.sqrt();
    }
    let v = &eig.eigenvectors;
    Ok(v * DMatrix::from_diagonal(&inv_sqrt) * v.transpose())
}

/// 依奇異值由大到小排序的 SVD
#[derive(Debug, Clone)]
pub struct SortedSvd {
    pub u: DMatrix<f64>,
    pub singular_values: Vec<f64>,
    /// 右奇異向量，以欄排列
    pub v: DMatrix<f64>,
}

pub fn sorted_svd(m: &DMatrix<f64>) -> Result<SortedSvd> {
    let svd = m.clone().svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| AnalysisError::numerical("SVD did not return U"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| AnalysisError::numerical("SVD did not return V"))?;

    let k = svd.singular_values.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .unwrap_or(Ordering::Equal)
    });

    let u_sorted = DMatrix::from_fn(u.nrows(), k, |i, j| u[(i, order[j])]);
    let v_sorted = DMatrix::from_fn(v_t.ncols(), k, |i, j| v_t[(order[j], i)]);
    Ok(SortedSvd {
        u: u_sorted,
        singular_values: order.iter().map(|&j| svd.singular_values[j]).collect(),
        v: v_sorted,
    })
}

/// 僅計算最大奇異值（排列檢定使用）
pub fn max_singular_value(m: &DMatrix<f64>) -> f64 {
    m.singular_values().max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_svd_descending_and_reconstructs() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 3.0, 0.0, 0.0]);
        let svd = sorted_svd(&m).unwrap();
        assert!((svd.singular_values[0] - 3.0).abs() < 1e-10);
        assert!((svd.singular_values[1] - 1.0).abs() < 1e-10);
        let s = DMatrix::from_diagonal(&DVector::from_vec(svd.singular_values.clone()));
        let rebuilt = &svd.u * s * svd.v.transpose();
        assert!((rebuilt - m).abs().max() < 1e-10);
    }

    #[test]
    fn test_inv_sqrt_sym_of_diagonal() {
        let s = DMatrix::from_diagonal(&DVector::from_vec(vec![4.0, 9.0]));
        let r = inv_sqrt_sym(&s, 0.0).unwrap();
        assert!((r[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((r[(1, 1)] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zscore_columns_rejects_constant() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0]);
        let names = vec!["a".to_string(), "b".to_string()];
        let err = zscore_columns(&m, &names).unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }
}
