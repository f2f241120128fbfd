use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::config::{pick, require_io, CommonArgs, MergeArgs, RunOptions};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_required_field, Validate,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "run-followups")]
#[command(about = "Robustness checks for a single predictor/outcome pair")]
#[serde(default)]
pub struct FollowupArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub common: CommonArgs,

    #[arg(long, help = "Path to CSV dataset")]
    pub data: Option<String>,

    #[arg(long, help = "Output directory")]
    pub outdir: Option<String>,

    #[arg(long, help = "Predictor column")]
    pub x: Option<String>,

    #[arg(long, help = "Outcome column")]
    pub y: Option<String>,

    #[arg(long, help = "Optional grouping column for stratified scatter")]
    pub group: Option<String>,

    #[arg(long, help = "Permutations for the correlation test [default: 5000]")]
    pub n_perm: Option<usize>,

    #[arg(long, help = "Bootstrap resamples for the slope CI [default: 5000]")]
    pub n_boot: Option<usize>,

    #[arg(long, help = "Bootstrap confidence level [default: 0.95]")]
    pub ci: Option<f64>,
}

impl MergeArgs for FollowupArgs {
    fn config_path(&self) -> Option<&str> {
        self.common.config.as_deref()
    }

    fn merge(self, file: Self) -> Self {
        Self {
            common: self.common.merge(file.common),
            data: pick(self.data, file.data),
            outdir: pick(self.outdir, file.outdir),
            x: pick(self.x, file.x),
            y: pick(self.y, file.y),
            group: pick(self.group, file.group),
            n_perm: pick(self.n_perm, file.n_perm),
            n_boot: pick(self.n_boot, file.n_boot),
            ci: pick(self.ci, file.ci),
        }
    }
}

impl FollowupArgs {
    pub fn resolve(self) -> Result<FollowupConfig> {
        let args = self.with_config_file()?;
        let (data, outdir) = require_io(args.data, args.outdir)?;
        let config = FollowupConfig {
            data,
            outdir,
            x: validate_required_field("x", &args.x)?.clone(),
            y: validate_required_field("y", &args.y)?.clone(),
            group: args.group,
            n_perm: args.n_perm.unwrap_or(5000),
            n_boot: args.n_boot.unwrap_or(5000),
            ci: args.ci.unwrap_or(0.95),
            run: args.common.resolve(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowupConfig {
    pub data: String,
    pub outdir: String,
    pub x: String,
    pub y: String,
    pub group: Option<String>,
    pub n_perm: usize,
    pub n_boot: usize,
    pub ci: f64,
    pub run: RunOptions,
}

impl FollowupConfig {
    /// 需要的欄位：x、y 與可選的分組欄
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![self.x.clone(), self.y.clone()];
        columns.extend(self.group.iter().cloned());
        columns
    }
}

impl ConfigProvider for FollowupConfig {
    fn output_path(&self) -> &str {
        &self.outdir
    }

    fn seed(&self) -> u64 {
        self.run.seed
    }
}

impl Validate for FollowupConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("x", &self.x)?;
        validate_non_empty_string("y", &self.y)?;
        if self.x == self.y {
            return Err(AnalysisError::InvalidConfigValueError {
                field: "y".to_string(),
                value: self.y.clone(),
                reason: "Predictor and outcome must be different columns".to_string(),
            });
        }
        if let Some(group) = &self.group {
            validate_non_empty_string("group", group)?;
        }
        validate_positive_number("n_perm", self.n_perm, 1)?;
        validate_positive_number("n_boot", self.n_boot, 1)?;
        validate_range("ci", self.ci, 0.5, 0.999)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_and_columns() {
        let config = FollowupArgs::parse_from([
            "run-followups", "--data", "TEPSData.csv", "--outdir", "fu", "--x", "AI_nacc", "--y", "tepsconsum",
            "--group", "gender", "--seed", "3",
        ])
        .resolve()
        .unwrap();
        assert_eq!(config.n_perm, 5000);
        assert_eq!(config.n_boot, 5000);
        assert_eq!(config.seed(), 3);
        assert_eq!(config.columns(), vec!["AI_nacc", "tepsconsum", "gender"]);
    }

    #[test]
    fn test_same_x_and_y_rejected() {
        let err = FollowupArgs::parse_from([
            "run-followups", "--data", "d.csv", "--outdir", "o", "--x", "a", "--y", "a",
        ])
        .resolve()
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_missing_predictor() {
        let err = FollowupArgs::parse_from(["run-followups", "--data", "d.csv", "--outdir", "o", "--y", "a"])
            .resolve()
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingConfigError { ref field } if field == "x"));
    }
}
