//! 常模偏差模型：以共變項預測腦區測量值，殘差標準化為偏差分數

use serde::{Deserialize, Serialize};

use crate::adapters::table::TableRow;
use crate::domain::dataset::Dataset;
use crate::domain::model::NamedColumn;
use crate::stats::descriptive::{mean, std_dev, zscore};
use crate::stats::gp::GaussianProcess;
use crate::stats::linalg::zscore_columns;
use crate::stats::ols;
use crate::utils::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum NormativeModel {
    None,
    #[default]
    Linear,
    Gpr,
}

/// 每個腦區的模型摘要，寫入 `Normative_Fits.csv`
#[derive(Debug, Clone, Serialize)]
pub struct NormativeFit {
    #[serde(rename = "ROI")]
    pub roi: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "N")]
    pub n: usize,
    #[serde(rename = "R2")]
    pub r2: Option<f64>,
    pub length_scale: Option<f64>,
    pub noise: Option<f64>,
    pub log_marginal_likelihood: Option<f64>,
}

impl TableRow for NormativeFit {
    const HEADERS: &'static [&'static str] = &[
        "ROI",
        "Model",
        "N",
        "R2",
        "length_scale",
        "noise",
        "log_marginal_likelihood",
    ];
}

#[derive(Debug, Clone, Default)]
pub struct NormativeResult {
    pub deviations: Vec<NamedColumn>,
    pub fits: Vec<NormativeFit>,
}

pub fn deviation_name(roi: &str) -> String {
    format!("{}_dev", roi)
}

fn complete_rows(dataset: &Dataset, roi: &str, covars: &[String]) -> Result<Vec<usize>> {
    let mut columns = vec![roi.to_string()];
    columns.extend(covars.iter().cloned());
    let rows = dataset.complete_cases(&columns)?;
    let required = covars.len() + 3;
    if rows.len() < required {
        return Err(AnalysisError::InsufficientDataError {
            context: format!("normative model of {}", roi),
            available: rows.len(),
            required,
        });
    }
    Ok(rows)
}

fn scatter_back(n_rows: usize, rows: &[usize], values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; n_rows];
    for (&row, &v) in rows.iter().zip(values) {
        out[row] = v;
    }
    out
}

/// 線性常模：`roi ~ 1 + covars`，偏差 = 殘差 / 殘差標準差
pub fn residual_deviation(
    dataset: &Dataset,
    rois: &[String],
    covars: &[String],
) -> Result<NormativeResult> {
    let mut result = NormativeResult::default();

    for roi in rois {
        let rows = complete_rows(dataset, roi, covars)?;
        let y = dataset.select(roi, &rows)?;

        let (residuals, r2) = if covars.is_empty() {
            let m = mean(&y);
            (y.iter().map(|v| v - m).collect::<Vec<_>>(), None)
        } else {
            let predictors: Vec<Vec<f64>> = covars
                .iter()
                .map(|c| dataset.select(c, &rows))
                .collect::<Result<_>>()?;
            let refs: Vec<&[f64]> = predictors.iter().map(|p| p.as_slice()).collect();
            let fit = ols::fit(&y, &refs)?;
            (fit.residuals, Some(fit.r2))
        };

        let sd = std_dev(&residuals, 1);
        let deviations: Vec<f64> = if sd.is_finite() && sd > 0.0 {
            residuals.iter().map(|r| r / sd).collect()
        } else {
            tracing::warn!("⚠️ {} has no residual variance; deviations set to NaN", roi);
            vec![f64::NAN; residuals.len()]
        };

        result.deviations.push(NamedColumn::new(
            deviation_name(roi),
            scatter_back(dataset.n_rows(), &rows, &deviations),
        ));
        result.fits.push(NormativeFit {
            roi: roi.clone(),
            model: "linear".to_string(),
            n: rows.len(),
            r2,
            length_scale: None,
            noise: None,
            log_marginal_likelihood: None,
        });
    }

    Ok(result)
}

/// 高斯過程常模：偏差 = (y - μ) / sqrt(σ² + noise)
///
/// 沒有共變項時改用線性模型。
pub fn gpr_deviation(
    dataset: &Dataset,
    rois: &[String],
    covars: &[String],
) -> Result<NormativeResult> {
    if covars.is_empty() {
        tracing::warn!("⚠️ GPR normative model needs covariates; falling back to linear model");
        return residual_deviation(dataset, rois, covars);
    }

    let mut result = NormativeResult::default();
    for roi in rois {
        let rows = complete_rows(dataset, roi, covars)?;
        let y = dataset.select(roi, &rows)?;
        let y_z = zscore(&y).ok_or_else(|| {
            AnalysisError::numerical(format!("'{}' has zero variance after filtering", roi))
        })?;
        let x = zscore_columns(&dataset.matrix(covars, &rows)?, covars)?;

        let gp = GaussianProcess::fit(&x, &y_z)?;
        let (mu, var) = gp.predict(&x)?;
        let deviations: Vec<f64> = y_z
            .iter()
            .zip(mu.iter().zip(&var))
            .map(|(y, (m, v))| (y - m) / (v + gp.noise).sqrt())
            .collect();

        tracing::debug!(
            "GPR {}: length_scale={}, noise={}, lml={:.3}",
            roi,
            gp.length_scale,
            gp.noise,
            gp.log_marginal_likelihood
        );

        result.deviations.push(NamedColumn::new(
            deviation_name(roi),
            scatter_back(dataset.n_rows(), &rows, &deviations),
        ));
        result.fits.push(NormativeFit {
            roi: roi.clone(),
            model: "gpr".to_string(),
            n: rows.len(),
            r2: None,
            length_scale: Some(gp.length_scale),
            noise: Some(gp.noise),
            log_marginal_likelihood: Some(gp.log_marginal_likelihood),
        });
    }

    Ok(result)
}

pub fn normative_deviation(
    dataset: &Dataset,
    model: NormativeModel,
    rois: &[String],
    covars: &[String],
) -> Result<NormativeResult> {
    match model {
        NormativeModel::None => Ok(NormativeResult::default()),
        NormativeModel::Linear => residual_deviation(dataset, rois, covars),
        NormativeModel::Gpr => gpr_deviation(dataset, rois, covars),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::table::assert_headers_match;

    fn dataset() -> Dataset {
        let mut csv = String::from("roi,age\n");
        for i in 0..40 {
            let age = 20.0 + i as f64;
            let wobble = if i % 2 == 0 { 0.5 } else { -0.5 };
            csv.push_str(&format!("{},{}\n", 10.0 + 0.2 * age + wobble, age));
        }
        csv.push_str(",50\n");
        Dataset::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_linear_deviation_is_standardized_residual() {
        let ds = dataset();
        let res = residual_deviation(&ds, &["roi".to_string()], &["age".to_string()]).unwrap();
        let dev = &res.deviations[0];
        assert_eq!(dev.name, "roi_dev");
        assert!(dev.values[40].is_nan());

        let finite: Vec<f64> = dev.values.iter().copied().filter(|v| v.is_finite()).collect();
        assert_eq!(finite.len(), 40);
        assert!(mean(&finite).abs() < 1e-9);
        assert!((std_dev(&finite, 1) - 1.0).abs() < 1e-9);
        assert!(res.fits[0].r2.unwrap() > 0.9);
    }

    #[test]
    fn test_without_covariates_is_zscore() {
        let ds = dataset();
        let res = residual_deviation(&ds, &["roi".to_string()], &[]).unwrap();
        let y: Vec<f64> = ds.numeric("roi").unwrap()[..40].to_vec();
        let z = zscore(&y).unwrap();
        for (a, b) in res.deviations[0].values.iter().zip(&z) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gpr_without_covariates_falls_back_to_linear() {
        let ds = dataset();
        let rois = ["roi".to_string()];
        let gpr = gpr_deviation(&ds, &rois, &[]).unwrap();
        let linear = residual_deviation(&ds, &rois, &[]).unwrap();
        assert_eq!(gpr.fits[0].model, linear.fits[0].model);
        assert!(gpr.fits[0].length_scale.is_none());
        for (a, b) in gpr.deviations[0].values.iter().zip(&linear.deviations[0].values) {
            assert!((a - b).abs() < 1e-12 || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_fit_table_headers_match_serde_names() {
        let res = gpr_deviation(&dataset(), &["roi".to_string()], &["age".to_string()]).unwrap();
        assert_headers_match(&res.fits[0]);
    }

    #[test]
    fn test_gpr_deviation_flags_alternating_noise() {
        let ds = dataset();
        let res = gpr_deviation(&ds, &["roi".to_string()], &["age".to_string()]).unwrap();
        let dev = &res.deviations[0].values;
        assert!(dev[0] > 0.0 && dev[1] < 0.0);
        assert!(res.fits[0].length_scale.is_some());
    }

    #[test]
    fn test_insufficient_data() {
        let csv = "roi,age\n1,2\n2,3\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let err = residual_deviation(&ds, &["roi".to_string()], &["age".to_string()]).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientDataError { .. }));
    }
}
