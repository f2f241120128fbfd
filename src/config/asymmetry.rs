use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::analysis::asymmetry::AsymmetryMethod;
use crate::analysis::normative::NormativeModel;
use crate::analysis::regression::{GroupKey, DEFAULT_GROUPS};
use crate::config::{pick, pick_list, require_io, CommonArgs, MergeArgs, RunOptions};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_list, validate_range, validate_unique, Validate};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "run-asymmetry")]
#[command(about = "Asymmetry indices, normative deviations and regression families with multiple-comparison correction")]
#[serde(default)]
pub struct AsymmetryArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub common: CommonArgs,

    #[arg(long, help = "Path to CSV dataset")]
    pub data: Option<String>,

    #[arg(long, help = "Output directory")]
    pub outdir: Option<String>,

    #[arg(long, num_args = 1.., help = "Space-separated entries like L1:R1 L2:R2 ...")]
    pub roi_pairs: Vec<String>,

    #[arg(long, num_args = 1.., help = "Behavioral outcomes (dependent variables)")]
    pub outcomes: Vec<String>,

    #[arg(long, num_args = 0.., help = "Covariate columns")]
    pub covars: Vec<String>,

    #[arg(long, value_enum, help = "Normative model type [default: linear]")]
    pub normative: Option<NormativeModel>,

    #[arg(long, value_enum, help = "Asymmetry index formula [default: halfnorm]")]
    pub method: Option<AsymmetryMethod>,

    #[arg(long, help = "Compute composite AI (mean of all AIs)")]
    pub composite: bool,

    #[arg(long, help = "Alpha for corrections [default: 0.05]")]
    pub alpha: Option<f64>,

    #[arg(long, value_enum, num_args = 1.., help = "Columns defining a correction family [default: outcome model]")]
    pub group_by: Vec<GroupKey>,
}

impl MergeArgs for AsymmetryArgs {
    fn config_path(&self) -> Option<&str> {
        self.common.config.as_deref()
    }

    fn merge(self, file: Self) -> Self {
        Self {
            common: self.common.merge(file.common),
            data: pick(self.data, file.data),
            outdir: pick(self.outdir, file.outdir),
            roi_pairs: pick_list(self.roi_pairs, file.roi_pairs),
            outcomes: pick_list(self.outcomes, file.outcomes),
            covars: pick_list(self.covars, file.covars),
            normative: pick(self.normative, file.normative),
            method: pick(self.method, file.method),
            composite: self.composite || file.composite,
            alpha: pick(self.alpha, file.alpha),
            group_by: if self.group_by.is_empty() {
                file.group_by
            } else {
                self.group_by
            },
        }
    }
}

impl AsymmetryArgs {
    /// 合併設定檔、補上預設值並驗證
    pub fn resolve(self) -> Result<AsymmetryConfig> {
        let args = self.with_config_file()?;
        let (data, outdir) = require_io(args.data, args.outdir)?;
        let config = AsymmetryConfig {
            data,
            outdir,
            roi_pairs: args.roi_pairs,
            outcomes: args.outcomes,
            covars: args.covars,
            normative: args.normative.unwrap_or_default(),
            method: args.method.unwrap_or_default(),
            composite: args.composite,
            alpha: args.alpha.unwrap_or(0.05),
            group_by: if args.group_by.is_empty() {
                DEFAULT_GROUPS.to_vec()
            } else {
                args.group_by
            },
            run: args.common.resolve(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AsymmetryConfig {
    pub data: String,
    pub outdir: String,
    pub roi_pairs: Vec<String>,
    pub outcomes: Vec<String>,
    pub covars: Vec<String>,
    pub normative: NormativeModel,
    pub method: AsymmetryMethod,
    pub composite: bool,
    pub alpha: f64,
    pub group_by: Vec<GroupKey>,
    pub run: RunOptions,
}

impl ConfigProvider for AsymmetryConfig {
    fn output_path(&self) -> &str {
        &self.outdir
    }

    fn seed(&self) -> u64 {
        self.run.seed
    }
}

impl Validate for AsymmetryConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_list("roi_pairs", &self.roi_pairs)?;
        validate_unique("roi_pairs", &self.roi_pairs)?;
        validate_non_empty_list("outcomes", &self.outcomes)?;
        validate_unique("outcomes", &self.outcomes)?;
        validate_unique("covars", &self.covars)?;
        validate_range("alpha", self.alpha, 0.0, 1.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn args(extra: &[&str]) -> AsymmetryArgs {
        let mut argv = vec!["run-asymmetry"];
        argv.extend_from_slice(extra);
        AsymmetryArgs::parse_from(argv)
    }

    #[test]
    fn test_cli_defaults() {
        let config = args(&[
            "--data", "TEPSData.csv", "--outdir", "out", "--roi-pairs", "lcaud:rcaud", "lnacc:rnacc",
            "--outcomes", "tepsconsum",
        ])
        .resolve()
        .unwrap();
        assert_eq!(config.roi_pairs.len(), 2);
        assert_eq!(config.normative, NormativeModel::Linear);
        assert_eq!(config.method, AsymmetryMethod::HalfNorm);
        assert_eq!(config.group_by, DEFAULT_GROUPS.to_vec());
        assert_eq!(config.alpha, 0.05);
        assert_eq!(config.seed(), 42);
    }

    #[test]
    fn test_missing_outcomes_is_rejected() {
        let err = args(&["--data", "TEPSData.csv", "--outdir", "out", "--roi-pairs", "lcaud:rcaud"])
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("outcomes"));
    }

    #[test]
    fn test_config_file_fills_missing_flags() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
data = "TEPSData.csv"
outdir = "from-file"
roi_pairs = ["lcaud:rcaud"]
outcomes = ["tepsconsum", "tepsantic"]
covars = ["age", "gender"]
normative = "gpr"
alpha = 0.1
seed = 7
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let config = args(&["--config", &path, "--outdir", "from-cli", "--alpha", "0.01"])
            .resolve()
            .unwrap();
        assert_eq!(config.outdir, "from-cli");
        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.normative, NormativeModel::Gpr);
        assert_eq!(config.outcomes.len(), 2);
        assert_eq!(config.covars, vec!["age", "gender"]);
        assert_eq!(config.run.seed, 7);
    }
}
