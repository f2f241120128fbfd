use std::collections::BTreeMap;

use crate::adapters::table::write_rows;
use crate::analysis::robustness::{
    bootstrap_beta, nonparametric_corr, permutation_test_corr, robust_regressions, slope_of,
    FollowupSummary, LineFit,
};
use crate::app::pipelines::write_figure;
use crate::config::FollowupConfig;
use crate::core::{Analysis, AnalysisOutput, ConfigProvider, Storage};
use crate::domain::dataset::Dataset;
use crate::utils::error::Result;
use crate::visuals::scatter::{scatter_with_fits, PointGroup, ScatterSpec};

pub const SUMMARY_FILE: &str = "Followup_Summary.csv";
pub const SCATTER_FILE: &str = "Scatter_with_OLS.svg";

/// 單一 x → y 的穩健性檢查
pub struct FollowupPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: FollowupConfig,
}

pub struct FollowupOutcome {
    pub summary: FollowupSummary,
    pub groups: Vec<PointGroup>,
    pub ols: LineFit,
}

impl<S: Storage> FollowupPipeline<S> {
    pub fn new(storage: S, config: FollowupConfig) -> Self {
        Self { storage, config }
    }

    /// x、y 皆有值，且分組欄（若有）不缺失的列
    fn usable_rows(&self, dataset: &Dataset) -> Result<(Vec<usize>, Option<Vec<Option<String>>>)> {
        let rows = dataset.complete_cases(&[self.config.x.as_str(), self.config.y.as_str()])?;
        match &self.config.group {
            Some(group) => {
                let labels = dataset.labels(group)?;
                let rows = rows.into_iter().filter(|&i| labels[i].is_some()).collect();
                Ok((rows, Some(labels)))
            }
            None => Ok((rows, None)),
        }
    }

    fn point_groups(
        &self,
        rows: &[usize],
        x: &[f64],
        y: &[f64],
        labels: Option<&[Option<String>]>,
    ) -> Vec<PointGroup> {
        let Some(labels) = labels else {
            return vec![PointGroup {
                label: "All".to_string(),
                x: x.to_vec(),
                y: y.to_vec(),
            }];
        };
        let group = self.config.group.as_deref().unwrap_or_default();
        let mut by_label: BTreeMap<String, PointGroup> = BTreeMap::new();
        for (k, &row) in rows.iter().enumerate() {
            let Some(label) = &labels[row] else { continue };
            let entry = by_label.entry(label.clone()).or_insert_with(|| PointGroup {
                label: format!("{}={}", group, label),
                x: Vec::new(),
                y: Vec::new(),
            });
            entry.x.push(x[k]);
            entry.y.push(y[k]);
        }
        by_label.into_values().collect()
    }
}

impl<S: Storage> Analysis for FollowupPipeline<S> {
    type Input = Dataset;
    /// 沒有完整資料時為 `None`，不產生輸出
    type Output = Option<FollowupOutcome>;

    fn name(&self) -> &str {
        "followups"
    }

    fn load(&self) -> Result<Dataset> {
        tracing::info!("📂 Loading data from {}", self.config.data);
        let dataset = Dataset::from_path(&self.config.data)?;
        dataset.require_columns(&self.config.columns())?;
        Ok(dataset)
    }

    fn analyze(&self, dataset: Dataset) -> Result<Option<FollowupOutcome>> {
        let config = &self.config;
        let (rows, labels) = self.usable_rows(&dataset)?;
        if rows.is_empty() {
            tracing::error!("❌ No complete cases for x={}, y={}", config.x, config.y);
            return Ok(None);
        }
        let x = dataset.select(&config.x, &rows)?;
        let y = dataset.select(&config.y, &rows)?;
        tracing::info!("📊 {} complete cases for {} → {}", rows.len(), config.x, config.y);

        let seed = self.config.seed();
        let (r_obs, p_perm) = permutation_test_corr(&x, &y, config.n_perm, seed)?;
        tracing::info!("🎲 Permutation test: r={:.3}, p={:.4} ({} permutations)", r_obs, p_perm, config.n_perm);

        let boot = bootstrap_beta(&x, &y, config.n_boot, config.ci, seed)?;
        tracing::info!(
            "🎲 Bootstrap β={:.3}, {:.0}% CI [{:.3}, {:.3}] ({} valid resamples)",
            boot.beta,
            config.ci * 100.0,
            boot.ci_low,
            boot.ci_high,
            boot.n_valid
        );

        let fits = robust_regressions(&x, &y, seed)?;
        for fit in &fits {
            tracing::debug!("{} slope={:.4} intercept={:.4}", fit.method, fit.slope, fit.intercept);
        }
        let nonpar = nonparametric_corr(&x, &y);

        let summary = FollowupSummary {
            x: config.x.clone(),
            y: config.y.clone(),
            n: rows.len(),
            r_obs,
            p_perm,
            boot_ci_low: boot.ci_low,
            boot_ci_high: boot.ci_high,
            beta_ols: slope_of(&fits, "OLS"),
            beta_huber: slope_of(&fits, "Huber"),
            beta_theil_sen: slope_of(&fits, "TheilSen"),
            beta_ransac: slope_of(&fits, "RANSAC"),
            spearman_rho: nonpar.spearman_rho,
            spearman_p: nonpar.spearman_p,
            kendall_tau: nonpar.kendall_tau,
            kendall_p: nonpar.kendall_p,
        };
        let ols = fits
            .iter()
            .find(|f| f.method == "OLS")
            .copied()
            .unwrap_or(LineFit {
                method: "OLS",
                slope: boot.beta,
                intercept: f64::NAN,
            });
        let groups = self.point_groups(&rows, &x, &y, labels.as_deref());

        Ok(Some(FollowupOutcome {
            summary,
            groups,
            ols,
        }))
    }

    fn write(&self, outcome: Option<FollowupOutcome>) -> Result<AnalysisOutput> {
        let mut output = AnalysisOutput::default();
        let Some(outcome) = outcome else {
            return Ok(output);
        };

        output.push(write_rows(
            &self.storage,
            SUMMARY_FILE,
            std::slice::from_ref(&outcome.summary),
        )?);

        let s = &outcome.summary;
        let title = format!(
            "{} → {}  r={:.2}, perm p={:.3}; Spearman ρ={:.2}",
            s.x, s.y, s.r_obs, s.p_perm, s.spearman_rho
        );
        write_figure(
            &self.storage,
            &mut output,
            SCATTER_FILE,
            scatter_with_fits(&ScatterSpec {
                x_label: &s.x,
                y_label: &s.y,
                title: &title,
                groups: &outcome.groups,
                fits: std::slice::from_ref(&outcome.ols),
            }),
        )?;

        Ok(output)
    }
}
