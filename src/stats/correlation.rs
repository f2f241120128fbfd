//! 相關係數與其顯著性檢定

use std::collections::HashMap;

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::stats::descriptive::{mean, rank_average};

/// Pearson 相關係數；任一變項無變異時回傳 NaN
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// 相關係數的雙尾 p 值，`t = r * sqrt((n-2)/(1-r^2))`
pub fn correlation_pvalue(r: f64, n: usize) -> f64 {
    if !r.is_finite() || n < 3 {
        return f64::NAN;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

/// Spearman 等級相關 (rho, p)
pub fn spearman(x: &[f64], y: &[f64]) -> (f64, f64) {
    let rho = pearson(&rank_average(x), &rank_average(y));
    (rho, correlation_pvalue(rho, x.len()))
}

// f64::signum 對 0 回傳 1，這裡需要 0
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn tie_sums(values: &[f64]) -> (f64, f64, f64) {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for v in values {
        // -0.0 與 0.0 視為同分
        *counts.entry((v + 0.0).to_bits()).or_default() += 1;
    }
    let mut pairs = 0.0;
    let mut var_term = 0.0;
    let mut third = 0.0;
    for &t in counts.values().filter(|&&t| t > 1) {
        let t = t as f64;
        pairs += t * (t - 1.0);
        var_term += t * (t - 1.0) * (2.0 * t + 5.0);
        third += t * (t - 1.0) * (t - 2.0);
    }
    (pairs, var_term, third)
}

/// Kendall tau-b 與常態近似 p 值（含同分校正）
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len().min(y.len());
    if n < 3 {
        return (f64::NAN, f64::NAN);
    }

    let mut s = 0.0_f64;
    for i in 0..n {
        for j in (i + 1)..n {
            s += sign(x[i] - x[j]) * sign(y[i] - y[j]);
        }
    }

    let nf = n as f64;
    let n0 = nf * (nf - 1.0) / 2.0;
    let (x_pairs, x_var, x_third) = tie_sums(&x[..n]);
    let (y_pairs, y_var, y_third) = tie_sums(&y[..n]);
    let n1 = x_pairs / 2.0;
    let n2 = y_pairs / 2.0;
    let denom = ((n0 - n1) * (n0 - n2)).sqrt();
    if denom <= 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let tau = (s / denom).clamp(-1.0, 1.0);

    let var_s = (nf * (nf - 1.0) * (2.0 * nf + 5.0) - x_var - y_var) / 18.0
        + x_pairs * y_pairs / (2.0 * nf * (nf - 1.0))
        + x_third * y_third / (9.0 * nf * (nf - 1.0) * (nf - 2.0));
    let p = if var_s > 0.0 {
        let z = s / var_s.sqrt();
        match Normal::new(0.0, 1.0) {
            Ok(normal) => (2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0),
            Err(_) => f64::NAN,
        }
    } else {
        f64::NAN
    };
    (tau, p)
}

/// 相關矩陣（各欄之間的 Pearson r）
pub fn correlation_matrix(columns: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = columns.len();
    let mut r = vec![vec![1.0; k]; k];
    for i in 0..k {
        for j in (i + 1)..k {
            let v = pearson(&columns[i], &columns[j]);
            r[i][j] = v;
            r[j][i] = v;
        }
    }
    r
}
