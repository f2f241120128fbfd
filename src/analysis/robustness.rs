//! 穩健性追蹤分析：排列檢定、拔靴信賴區間、穩健回歸、無母數相關

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::adapters::table::TableRow;
use crate::stats::correlation::{kendall_tau_b, pearson, spearman};
use crate::stats::descriptive::{mad, median, percentile};
use crate::stats::ols::{simple_slope, weighted_slope};
use crate::stats::resampling::{permutation_pvalue, seeded_rng};
use crate::utils::error::{AnalysisError, Result};

const HUBER_K: f64 = 1.345;
const HUBER_MAX_ITER: usize = 100;
const MAD_TO_SD: f64 = 0.674_489_750_196_081_7;
const THEIL_SEN_EXACT_LIMIT: usize = 200;
const THEIL_SEN_SAMPLES: usize = 20_000;
const RANSAC_TRIALS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapCi {
    pub beta: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// 有效的重抽樣次數（x 無變異的樣本會被略過）
    pub n_valid: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub method: &'static str,
    pub slope: f64,
    pub intercept: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonparametricCorr {
    pub spearman_rho: f64,
    pub spearman_p: f64,
    pub kendall_tau: f64,
    pub kendall_p: f64,
}

/// `Followup_Summary.csv` 的單列
#[derive(Debug, Clone, Serialize)]
pub struct FollowupSummary {
    pub x: String,
    pub y: String,
    #[serde(rename = "N")]
    pub n: usize,
    pub r_obs: f64,
    pub p_perm: f64,
    #[serde(rename = "boot_CI_low")]
    pub boot_ci_low: f64,
    #[serde(rename = "boot_CI_high")]
    pub boot_ci_high: f64,
    #[serde(rename = "beta_OLS")]
    pub beta_ols: f64,
    #[serde(rename = "beta_Huber")]
    pub beta_huber: f64,
    #[serde(rename = "beta_TheilSen")]
    pub beta_theil_sen: f64,
    #[serde(rename = "beta_RANSAC")]
    pub beta_ransac: f64,
    pub spearman_rho: f64,
    pub spearman_p: f64,
    pub kendall_tau: f64,
    pub kendall_p: f64,
}

impl TableRow for FollowupSummary {
    const HEADERS: &'static [&'static str] = &[
        "x",
        "y",
        "N",
        "r_obs",
        "p_perm",
        "boot_CI_low",
        "boot_CI_high",
        "beta_OLS",
        "beta_Huber",
        "beta_TheilSen",
        "beta_RANSAC",
        "spearman_rho",
        "spearman_p",
        "kendall_tau",
        "kendall_p",
    ];
}

fn check_inputs(x: &[f64], y: &[f64], min: usize) -> Result<()> {
    if x.len() != y.len() {
        return Err(AnalysisError::processing("x and y have different lengths"));
    }
    if x.len() < min {
        return Err(AnalysisError::InsufficientDataError {
            context: "follow-up analysis".to_string(),
            available: x.len(),
            required: min,
        });
    }
    Ok(())
}

/// 雙尾 Pearson 排列檢定，回傳 (r_obs, p)
pub fn permutation_test_corr(x: &[f64], y: &[f64], n_perm: usize, seed: u64) -> Result<(f64, f64)> {
    check_inputs(x, y, 3)?;
    let r_obs = pearson(x, y);
    if !r_obs.is_finite() {
        return Err(AnalysisError::numerical("correlation is undefined (constant input)"));
    }

    let mut rng = seeded_rng(seed);
    let mut shuffled = y.to_vec();
    let null: Vec<f64> = (0..n_perm)
        .map(|_| {
            shuffled.shuffle(&mut rng);
            pearson(x, &shuffled).abs()
        })
        .collect();
    Ok((r_obs, permutation_pvalue(r_obs.abs(), &null)))
}

/// 成對重抽樣的 OLS 斜率百分位信賴區間
pub fn bootstrap_beta(x: &[f64], y: &[f64], n_boot: usize, ci: f64, seed: u64) -> Result<BootstrapCi> {
    check_inputs(x, y, 3)?;
    let (beta, _) = simple_slope(x, y)
        .ok_or_else(|| AnalysisError::numerical("x has zero variance"))?;

    let n = x.len();
    let mut rng = seeded_rng(seed);
    let mut xs = vec![0.0; n];
    let mut ys = vec![0.0; n];
    let mut slopes = Vec::with_capacity(n_boot);
    for _ in 0..n_boot {
        for k in 0..n {
            let i = rng.gen_range(0..n);
            xs[k] = x[i];
            ys[k] = y[i];
        }
        if let Some((b, _)) = simple_slope(&xs, &ys) {
            slopes.push(b);
        }
    }
    if slopes.is_empty() {
        return Err(AnalysisError::numerical("every bootstrap resample was degenerate"));
    }

    let tail = (1.0 - ci) / 2.0 * 100.0;
    Ok(BootstrapCi {
        beta,
        ci_low: percentile(&slopes, tail),
        ci_high: percentile(&slopes, 100.0 - tail),
        n_valid: slopes.len(),
    })
}

pub fn ols_line(x: &[f64], y: &[f64]) -> Result<LineFit> {
    let (slope, intercept) =
        simple_slope(x, y).ok_or_else(|| AnalysisError::numerical("x has zero variance"))?;
    Ok(LineFit {
        method: "OLS",
        slope,
        intercept,
    })
}

/// Huber M 估計 (IRLS)，尺度以殘差 MAD 估計
pub fn huber_line(x: &[f64], y: &[f64]) -> Result<LineFit> {
    let start = ols_line(x, y)?;
    let (mut slope, mut intercept) = (start.slope, start.intercept);

    for _ in 0..HUBER_MAX_ITER {
        let residuals: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(a, b)| b - intercept - slope * a)
            .collect();
        let scale = mad(&residuals) / MAD_TO_SD;
        if scale <= f64::EPSILON {
            break;
        }
        let weights: Vec<f64> = residuals
            .iter()
            .map(|r| {
                let u = (r / scale).abs();
                if u <= HUBER_K {
                    1.0
                } else {
                    HUBER_K / u
                }
            })
            .collect();
        let Some((new_slope, new_intercept)) = weighted_slope(x, y, &weights) else {
            break;
        };
        let change = (new_slope - slope).abs() + (new_intercept - intercept).abs();
        slope = new_slope;
        intercept = new_intercept;
        if change < 1e-10 {
            break;
        }
    }

    Ok(LineFit {
        method: "Huber",
        slope,
        intercept,
    })
}

/// Theil–Sen：兩兩斜率的中位數；樣本大時隨機抽取點對
pub fn theil_sen_line<R: Rng>(x: &[f64], y: &[f64], rng: &mut R) -> Result<LineFit> {
    let n = x.len();
    let mut slopes = Vec::new();
    let mut push = |i: usize, j: usize| {
        let dx = x[j] - x[i];
        if dx != 0.0 {
            slopes.push((y[j] - y[i]) / dx);
        }
    };
    if n <= THEIL_SEN_EXACT_LIMIT {
        for i in 0..n {
            for j in (i + 1)..n {
                push(i, j);
            }
        }
    } else {
        for _ in 0..THEIL_SEN_SAMPLES {
            let i = rng.gen_range(0..n);
            let j = rng.gen_range(0..n);
            if i != j {
                push(i, j);
            }
        }
    }
    if slopes.is_empty() {
        return Err(AnalysisError::numerical("x has zero variance"));
    }

    let slope = median(&slopes);
    let offsets: Vec<f64> = x.iter().zip(y).map(|(a, b)| b - slope * a).collect();
    Ok(LineFit {
        method: "TheilSen",
        slope,
        intercept: median(&offsets),
    })
}

/// RANSAC：以兩點為最小樣本，門檻為 y 的 MAD，最後以共識集重新 OLS
pub fn ransac_line<R: Rng>(x: &[f64], y: &[f64], rng: &mut R) -> Result<LineFit> {
    let n = x.len();
    let threshold = mad(y);
    let mut best: Vec<usize> = Vec::new();

    for _ in 0..RANSAC_TRIALS {
        let sample: Vec<usize> = rand::seq::index::sample(rng, n, 2).into_vec();
        let (i, j) = (sample[0], sample[1]);
        let dx = x[j] - x[i];
        if dx == 0.0 {
            continue;
        }
        let slope = (y[j] - y[i]) / dx;
        let intercept = y[i] - slope * x[i];
        let inliers: Vec<usize> = (0..n)
            .filter(|&k| (y[k] - intercept - slope * x[k]).abs() <= threshold)
            .collect();
        if inliers.len() > best.len() {
            best = inliers;
        }
    }

    let xs: Vec<f64> = best.iter().map(|&k| x[k]).collect();
    let ys: Vec<f64> = best.iter().map(|&k| y[k]).collect();
    match simple_slope(&xs, &ys) {
        Some((slope, intercept)) => Ok(LineFit {
            method: "RANSAC",
            slope,
            intercept,
        }),
        None => {
            tracing::warn!("⚠️ RANSAC found no usable consensus set; using OLS");
            let ols = ols_line(x, y)?;
            Ok(LineFit {
                method: "RANSAC",
                ..ols
            })
        }
    }
}

/// OLS、Huber、Theil–Sen、RANSAC 四種直線擬合
pub fn robust_regressions(x: &[f64], y: &[f64], seed: u64) -> Result<Vec<LineFit>> {
    check_inputs(x, y, 3)?;
    let mut rng = seeded_rng(seed);
    Ok(vec![
        ols_line(x, y)?,
        huber_line(x, y)?,
        theil_sen_line(x, y, &mut rng)?,
        ransac_line(x, y, &mut rng)?,
    ])
}

pub fn nonparametric_corr(x: &[f64], y: &[f64]) -> NonparametricCorr {
    let (spearman_rho, spearman_p) = spearman(x, y);
    let (kendall_tau, kendall_p) = kendall_tau_b(x, y);
    NonparametricCorr {
        spearman_rho,
        spearman_p,
        kendall_tau,
        kendall_p,
    }
}

pub fn slope_of(fits: &[LineFit], method: &str) -> f64 {
    fits.iter()
        .find(|f| f.method == method)
        .map(|f| f.slope)
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::table::assert_headers_match;

    fn line_with_outliers(n: usize) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..n).map(|i| i as f64 / 2.0).collect();
        let mut y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.0 + 0.5 * v + ((i * 13) % 7) as f64 * 0.05)
            .collect();
        // 右端加入大離群值
        for k in 0..3 {
            y[n - 1 - k] -= 30.0;
        }
        (x, y)
    }

    #[test]
    fn test_permutation_p_in_unit_interval() {
        let (x, y) = line_with_outliers(30);
        let (r, p) = permutation_test_corr(&x, &y, 499, 1).unwrap();
        assert!(r.is_finite());
        assert!(p > 0.0 && p <= 1.0);

        let x2: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y2: Vec<f64> = x2.iter().map(|v| v * 0.3 + (v * 1.7).sin()).collect();
        let (_, p2) = permutation_test_corr(&x2, &y2, 499, 1).unwrap();
        assert!((p2 - 1.0 / 500.0).abs() < 1e-12);
    }

    #[test]
    fn test_permutation_rejects_constant_input() {
        assert!(permutation_test_corr(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0], 10, 1).is_err());
    }

    #[test]
    fn test_bootstrap_ci_contains_estimate() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + (v * 0.9).sin() * 3.0).collect();
        let ci = bootstrap_beta(&x, &y, 1000, 0.95, 42).unwrap();
        assert!(ci.ci_low <= ci.beta && ci.beta <= ci.ci_high);
        assert!(ci.ci_low > 1.8 && ci.ci_high < 2.2);
        assert_eq!(ci.n_valid, 1000);
    }

    #[test]
    fn test_robust_fits_resist_outliers() {
        let (x, y) = line_with_outliers(40);
        let fits = robust_regressions(&x, &y, 5).unwrap();
        assert_eq!(fits.len(), 4);
        let ols = slope_of(&fits, "OLS");
        assert!(ols < 0.3, "OLS is pulled down by outliers: {}", ols);
        for method in ["Huber", "TheilSen", "RANSAC"] {
            let b = slope_of(&fits, method);
            assert!((b - 0.5).abs() < 0.1, "{} slope {}", method, b);
        }
    }

    #[test]
    fn test_summary_headers_match_serde_names() {
        assert_headers_match(&FollowupSummary {
            x: "AI_nacc".to_string(),
            y: "tepsconsum".to_string(),
            n: 80,
            r_obs: 0.3,
            p_perm: 0.01,
            boot_ci_low: 0.1,
            boot_ci_high: 0.5,
            beta_ols: 0.3,
            beta_huber: 0.3,
            beta_theil_sen: 0.3,
            beta_ransac: 0.3,
            spearman_rho: 0.3,
            spearman_p: 0.01,
            kendall_tau: 0.2,
            kendall_p: 0.01,
        });
    }

    #[test]
    fn test_nonparametric_perfect_monotone() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0];
        let np = nonparametric_corr(&x, &y);
        assert!((np.spearman_rho - 1.0).abs() < 1e-12);
        assert!((np.kendall_tau - 1.0).abs() < 1e-12);
        assert!(np.kendall_p < 0.05);
    }
}
