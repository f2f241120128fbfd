//! 普通最小平方法 (OLS)

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::utils::error::{AnalysisError, Result};

/// OLS 擬合結果；係數順序為 [截距, 各預測變項...]
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub p_values: Vec<f64>,
    pub ci_low: Vec<f64>,
    pub ci_high: Vec<f64>,
    pub residuals: Vec<f64>,
    pub fitted: Vec<f64>,
    pub r2: f64,
    pub df_resid: usize,
    pub n: usize,
}

impl OlsFit {
    /// 第 `k` 個預測變項（不含截距）的係數
    pub fn slope(&self, k: usize) -> f64 {
        self.coefficients[k + 1]
    }
}

/// 以行向量為預測變項建立含截距的設計矩陣
pub fn design_matrix(predictors: &[&[f64]], n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, predictors.len() + 1, |i, j| {
        if j == 0 {
            1.0
        } else {
            predictors[j - 1][i]
        }
    })
}

/// `y ~ 1 + predictors`
pub fn fit(y: &[f64], predictors: &[&[f64]]) -> Result<OlsFit> {
    let n = y.len();
    if predictors.iter().any(|p| p.len() != n) {
        return Err(AnalysisError::processing(
            "predictor length does not match outcome length",
        ));
    }
    let x = design_matrix(predictors, n);
    fit_matrix(&DVector::from_column_slice(y), &x)
}

/// 95% 信賴區間的 OLS；`x` 需已包含截距欄
pub fn fit_matrix(y: &DVector<f64>, x: &DMatrix<f64>) -> Result<OlsFit> {
    let n = x.nrows();
    let p = x.ncols();
    if n <= p {
        return Err(AnalysisError::InsufficientDataError {
            context: "OLS fit".to_string(),
            available: n,
            required: p + 1,
        });
    }

    let sv = x.singular_values();
    let sv_max = sv.max();
    if !(sv_max > 0.0) || sv.min() / sv_max < 1e-10 {
        return Err(AnalysisError::numerical("design matrix is rank deficient"));
    }

    let xtx = x.transpose() * x;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| AnalysisError::numerical("design matrix is singular"))?;
    let beta = &xtx_inv * (x.transpose() * y);
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(AnalysisError::numerical("non-finite regression coefficients"));
    }

    let fitted = x * &beta;
    let residuals = y - &fitted;
    let df_resid = n - p;
    let sse = residuals.norm_squared();
    let sigma2 = sse / df_resid as f64;

    let y_mean = y.mean();
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r2 = if sst > 0.0 { 1.0 - sse / sst } else { f64::NAN };

    let dist = StudentsT::new(0.0, 1.0, df_resid as f64)
        .map_err(|e| AnalysisError::numerical(format!("t distribution: {}", e)))?;
    let t_crit = dist.inverse_cdf(0.975);

    let mut std_errors = Vec::with_capacity(p);
    let mut t_values = Vec::with_capacity(p);
    let mut p_values = Vec::with_capacity(p);
    let mut ci_low = Vec::with_capacity(p);
    let mut ci_high = Vec::with_capacity(p);
    for k in 0..p {
        let se = (sigma2 * xtx_inv[(k, k)]).max(0.0).sqrt();
        let t = if se > 0.0 { beta[k] / se } else { f64::NAN };
        let pv = if t.is_finite() {
            2.0 * (1.0 - dist.cdf(t.abs()))
        } else {
            f64::NAN
        };
        std_errors.push(se);
        t_values.push(t);
        p_values.push(pv);
        ci_low.push(beta[k] - t_crit * se);
        ci_high.push(beta[k] + t_crit * se);
    }

    Ok(OlsFit {
        coefficients: beta.iter().copied().collect(),
        std_errors,
        t_values,
        p_values,
        ci_low,
        ci_high,
        residuals: residuals.iter().copied().collect(),
        fitted: fitted.iter().copied().collect(),
        r2,
        df_resid,
        n,
    })
}

/// 簡單線性回歸斜率；x 變異為零時回傳 `None`
pub fn simple_slope(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len() as f64;
    if x.len() < 2 {
        return None;
    }
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

/// 加權最小平方法的斜率與截距（Huber IRLS 使用）
pub fn weighted_slope(x: &[f64], y: &[f64], w: &[f64]) -> Option<(f64, f64)> {
    let sw: f64 = w.iter().sum();
    if sw <= 0.0 {
        return None;
    }
    let mx = x.iter().zip(w).map(|(a, wi)| a * wi).sum::<f64>() / sw;
    let my = y.iter().zip(w).map(|(b, wi)| b * wi).sum::<f64>() / sw;
    let sxx: f64 = x.iter().zip(w).map(|(a, wi)| wi * (a - mx).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = x
        .iter()
        .zip(y)
        .zip(w)
        .map(|((a, b), wi)| wi * (a - mx) * (b - my))
        .sum();
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}
