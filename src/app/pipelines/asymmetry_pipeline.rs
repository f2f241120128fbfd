use std::collections::BTreeSet;

use crate::adapters::table::{columns_to_csv, write_rows};
use crate::analysis::asymmetry::{compute_ai, parse_roi_pairs, AsymmetryResult};
use crate::analysis::normative::{normative_deviation, NormativeModel, NormativeResult};
use crate::analysis::regression::{add_corrections, run_family, PredictorSet, RegressionRow};
use crate::app::pipelines::write_figure;
use crate::config::AsymmetryConfig;
use crate::core::{Analysis, AnalysisOutput, Storage};
use crate::domain::dataset::Dataset;
use crate::utils::error::Result;
use crate::utils::file_stem_safe;
use crate::visuals::{forest::forest_plot, heatmap::heatmap_betas};

pub const DEVIATIONS_FILE: &str = "Normative_Deviations.csv";
pub const NORMATIVE_FITS_FILE: &str = "Normative_Fits.csv";
pub const REGRESSION_FILE: &str = "Regression_Summary_with_MCC.csv";

/// 不對稱指數 → 常模偏差 → 迴歸家族 + 多重比較校正
pub struct AsymmetryPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: AsymmetryConfig,
}

#[derive(Debug, Clone)]
pub struct AsymmetryOutcome {
    pub asymmetry: AsymmetryResult,
    pub normative: NormativeResult,
    pub summary: Vec<RegressionRow>,
}

impl<S: Storage> AsymmetryPipeline<S> {
    pub fn new(storage: S, config: AsymmetryConfig) -> Self {
        Self { storage, config }
    }

    /// 配對中出現的所有腦區（排序、去重）
    fn normative_rois(pairs: &[crate::domain::model::RoiPair]) -> Vec<String> {
        pairs
            .iter()
            .flat_map(|p| [p.left.clone(), p.right.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn write_deviations(&self, normative: &NormativeResult) -> Result<String> {
        let n_rows = normative.deviations.first().map(|c| c.values.len()).unwrap_or(0);
        let index: Vec<usize> = (0..n_rows).collect();
        let names: Vec<String> = normative.deviations.iter().map(|c| c.name.clone()).collect();
        let columns: Vec<Vec<f64>> = normative
            .deviations
            .iter()
            .map(|c| c.values.clone())
            .collect();
        let data = columns_to_csv(&index, &names, &columns)?;
        self.storage.write_file(DEVIATIONS_FILE, &data)?;
        Ok(DEVIATIONS_FILE.to_string())
    }
}

impl<S: Storage> Analysis for AsymmetryPipeline<S> {
    type Input = Dataset;
    type Output = AsymmetryOutcome;

    fn name(&self) -> &str {
        "asymmetry"
    }

    fn load(&self) -> Result<Dataset> {
        tracing::info!("📂 Loading data from {}", self.config.data);
        let dataset = Dataset::from_path(&self.config.data)?;
        tracing::info!(
            "📊 Loaded {} rows × {} columns",
            dataset.n_rows(),
            dataset.column_names().len()
        );

        // 一次列出所有缺少的欄位
        let pairs = parse_roi_pairs(&self.config.roi_pairs)?;
        let mut needed: Vec<String> = pairs
            .iter()
            .flat_map(|p| [p.left.clone(), p.right.clone()])
            .collect();
        needed.extend(self.config.outcomes.iter().cloned());
        needed.extend(self.config.covars.iter().cloned());
        dataset.require_columns(&needed)?;
        Ok(dataset)
    }

    fn analyze(&self, mut dataset: Dataset) -> Result<AsymmetryOutcome> {
        let config = &self.config;

        let pairs = parse_roi_pairs(&config.roi_pairs)?;
        tracing::info!("🧠 Computing asymmetry for {} pairs", pairs.len());
        let asymmetry = compute_ai(&dataset, &pairs, config.method, config.composite)?;
        for column in &asymmetry.columns {
            dataset.set_numeric(&column.name, column.values.clone())?;
        }

        let normative = if config.normative == NormativeModel::None {
            NormativeResult::default()
        } else {
            let rois = Self::normative_rois(&pairs);
            tracing::info!(
                "📐 Computing {:?} deviations for {} ROIs (covars={:?})",
                config.normative,
                rois.len(),
                config.covars
            );
            normative_deviation(&dataset, config.normative, &rois, &config.covars)?
        };
        for column in &normative.deviations {
            dataset.set_numeric(&column.name, column.values.clone())?;
        }

        let mut predictor_sets = Vec::new();
        if !asymmetry.columns.is_empty() {
            predictor_sets.push(PredictorSet::new("Asymmetry", asymmetry.names()));
        }
        if !normative.deviations.is_empty() {
            let names = normative.deviations.iter().map(|c| c.name.clone()).collect();
            predictor_sets.push(PredictorSet::new("Deviation", names));
        }

        tracing::info!("📈 Running regression families on outcomes={:?}", config.outcomes);
        let rows = run_family(
            &dataset,
            &config.outcomes,
            &predictor_sets,
            &config.covars,
            true,
            "",
        )?;
        let summary = add_corrections(rows, &config.group_by, config.alpha);
        let n_sig = summary.iter().filter(|r| r.sig_fdr == Some(true)).count();
        tracing::info!(
            "📋 {} regressions, {} significant after FDR (alpha={})",
            summary.len(),
            n_sig,
            config.alpha
        );

        Ok(AsymmetryOutcome {
            asymmetry,
            normative,
            summary,
        })
    }

    fn write(&self, outcome: AsymmetryOutcome) -> Result<AnalysisOutput> {
        let mut output = AnalysisOutput::default();

        if !outcome.normative.deviations.is_empty() {
            output.push(self.write_deviations(&outcome.normative)?);
            output.push(write_rows(
                &self.storage,
                NORMATIVE_FITS_FILE,
                &outcome.normative.fits,
            )?);
        }

        output.push(write_rows(&self.storage, REGRESSION_FILE, &outcome.summary)?);

        // 每個模型各一張熱圖與森林圖
        let models: BTreeSet<&str> = outcome.summary.iter().map(|r| r.model.as_str()).collect();
        for model in models {
            let rows: Vec<RegressionRow> = outcome
                .summary
                .iter()
                .filter(|r| r.model == model)
                .cloned()
                .collect();
            let stem = file_stem_safe(model);
            write_figure(
                &self.storage,
                &mut output,
                &format!("Heatmap_{}.svg", stem),
                heatmap_betas(&rows, &format!("{} → Outcomes (β with p)", model)),
            )?;
            write_figure(
                &self.storage,
                &mut output,
                &format!("Forest_{}.svg", stem),
                forest_plot(&rows, &format!("{} (forest plot)", model)),
            )?;
        }

        Ok(output)
    }
}
