//! 回歸家族：每個結果變項 × 預測變項組 × 目標變項的標準化 OLS，
//! 以及分組後的多重比較校正

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adapters::table::TableRow;
use crate::domain::dataset::Dataset;
use crate::stats::correction::{benjamini_hochberg, bonferroni};
use crate::stats::descriptive::zscore;
use crate::stats::ols;
use crate::utils::error::{AnalysisError, Result};

/// 一組預測變項，例如 "Asymmetry" → [AI_caud, AI_put]
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorSet {
    pub model: String,
    pub targets: Vec<String>,
}

impl PredictorSet {
    pub fn new(model: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            model: model.into(),
            targets,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionRow {
    #[serde(rename = "Outcome")]
    pub outcome: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Target")]
    pub target: String,
    #[serde(rename = "Beta")]
    pub beta: f64,
    #[serde(rename = "SE")]
    pub se: f64,
    pub t: f64,
    pub p: f64,
    #[serde(rename = "CI_low")]
    pub ci_low: f64,
    #[serde(rename = "CI_high")]
    pub ci_high: f64,
    #[serde(rename = "N")]
    pub n: usize,
    #[serde(rename = "R2")]
    pub r2: f64,
    #[serde(rename = "p_FDR")]
    pub p_fdr: Option<f64>,
    #[serde(rename = "p_Bonf")]
    pub p_bonf: Option<f64>,
    #[serde(rename = "sig_FDR")]
    pub sig_fdr: Option<bool>,
    #[serde(rename = "sig_Bonf")]
    pub sig_bonf: Option<bool>,
}

impl TableRow for RegressionRow {
    const HEADERS: &'static [&'static str] = &[
        "Outcome", "Model", "Target", "Beta", "SE", "t", "p", "CI_low", "CI_high", "N", "R2",
        "p_FDR", "p_Bonf", "sig_FDR", "sig_Bonf",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    Outcome,
    Model,
    Target,
}

impl GroupKey {
    fn value<'a>(&self, row: &'a RegressionRow) -> &'a str {
        match self {
            Self::Outcome => &row.outcome,
            Self::Model => &row.model,
            Self::Target => &row.target,
        }
    }
}

pub const DEFAULT_GROUPS: [GroupKey; 2] = [GroupKey::Outcome, GroupKey::Model];

fn fit_one(
    dataset: &Dataset,
    outcome: &str,
    target: &str,
    covars: &[String],
    standardize: bool,
) -> Result<(ols::OlsFit, usize)> {
    let mut columns = vec![outcome.to_string(), target.to_string()];
    columns.extend(covars.iter().filter(|c| *c != target && *c != outcome).cloned());
    let rows = dataset.complete_cases(&columns)?;
    if rows.len() <= columns.len() {
        return Err(AnalysisError::InsufficientDataError {
            context: format!("{} ~ {}", outcome, target),
            available: rows.len(),
            required: columns.len() + 1,
        });
    }

    let mut data: Vec<Vec<f64>> = columns
        .iter()
        .map(|c| dataset.select(c, &rows))
        .collect::<Result<_>>()?;
    if standardize {
        for (name, values) in columns.iter().zip(data.iter_mut()) {
            *values = zscore(values).ok_or_else(|| {
                AnalysisError::numerical(format!("'{}' has zero variance after filtering", name))
            })?;
        }
    }

    let y = &data[0];
    let predictors: Vec<&[f64]> = data[1..].iter().map(|v| v.as_slice()).collect();
    Ok((ols::fit(y, &predictors)?, rows.len()))
}

/// 逐一擬合 `outcome ~ target + covars`；失敗的組合記錄警告後略過
pub fn run_family(
    dataset: &Dataset,
    outcomes: &[String],
    predictor_sets: &[PredictorSet],
    covars: &[String],
    standardize: bool,
    model_label: &str,
) -> Result<Vec<RegressionRow>> {
    let mut needed: Vec<&str> = outcomes.iter().map(|s| s.as_str()).collect();
    needed.extend(covars.iter().map(|s| s.as_str()));
    for set in predictor_sets {
        needed.extend(set.targets.iter().map(|s| s.as_str()));
    }
    dataset.require_columns(&needed)?;

    let mut rows = Vec::new();
    for outcome in outcomes {
        for set in predictor_sets {
            let model = format!("{}{}", model_label, set.model);
            for target in &set.targets {
                match fit_one(dataset, outcome, target, covars, standardize) {
                    Ok((fit, n)) => rows.push(RegressionRow {
                        outcome: outcome.clone(),
                        model: model.clone(),
                        target: target.clone(),
                        beta: fit.coefficients[1],
                        se: fit.std_errors[1],
                        t: fit.t_values[1],
                        p: fit.p_values[1],
                        ci_low: fit.ci_low[1],
                        ci_high: fit.ci_high[1],
                        n,
                        r2: fit.r2,
                        p_fdr: None,
                        p_bonf: None,
                        sig_fdr: None,
                        sig_bonf: None,
                    }),
                    Err(e) => {
                        tracing::warn!("⚠️ Skipping {} ~ {} [{}]: {}", outcome, target, model, e);
                    }
                }
            }
        }
    }

    tracing::info!("Fitted {} regressions", rows.len());
    Ok(rows)
}

/// 在每個分組內計算 BH-FDR 與 Bonferroni 校正
pub fn add_corrections(mut rows: Vec<RegressionRow>, group_by: &[GroupKey], alpha: f64) -> Vec<RegressionRow> {
    let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        let key = group_by.iter().map(|g| g.value(row).to_string()).collect();
        groups.entry(key).or_default().push(i);
    }

    for indices in groups.values() {
        let pvalues: Vec<f64> = indices.iter().map(|&i| rows[i].p).collect();
        let fdr = benjamini_hochberg(&pvalues);
        let bonf = bonferroni(&pvalues);
        for (k, &i) in indices.iter().enumerate() {
            let row = &mut rows[i];
            row.p_fdr = fdr[k].is_finite().then_some(fdr[k]);
            row.p_bonf = bonf[k].is_finite().then_some(bonf[k]);
            row.sig_fdr = row.p_fdr.map(|p| p < alpha);
            row.sig_bonf = row.p_bonf.map(|p| p < alpha);
        }
    }
    rows
}
