use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::config::{pick, pick_list, require_io, CommonArgs, MergeArgs, RunOptions};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_list, validate_positive_number, validate_range, validate_unique, Validate,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "run-multivariate")]
#[command(about = "PLS / CCA between ROI and behavioral blocks plus a structural covariance network")]
#[serde(default)]
pub struct MultivariateArgs {
    #[command(flatten)]
    #[serde(flatten)]
    pub common: CommonArgs,

    #[arg(long, help = "Path to CSV dataset")]
    pub data: Option<String>,

    #[arg(long, help = "Output directory")]
    pub outdir: Option<String>,

    #[arg(long, num_args = 1.., help = "ROI columns to use")]
    pub rois: Vec<String>,

    #[arg(long, num_args = 1.., help = "Behavioral items/variables for multivariate")]
    pub items: Vec<String>,

    #[arg(long, num_args = 0.., help = "Covariate columns")]
    pub covars: Vec<String>,

    #[arg(long, help = "Residualize ROIs for covariates before PLS/CCA")]
    pub residualize: bool,

    #[arg(long, help = "Run CCA in addition to PLS")]
    pub do_cca: bool,

    #[arg(long, help = "Number of components to extract [default: 1]")]
    pub n_components: Option<usize>,

    #[arg(long, help = "Permutations for the first component [default: 1000]")]
    pub n_perm: Option<usize>,

    #[arg(long, help = "FDR threshold for network edges [default: 0.05]")]
    pub alpha: Option<f64>,
}

impl MergeArgs for MultivariateArgs {
    fn config_path(&self) -> Option<&str> {
        self.common.config.as_deref()
    }

    fn merge(self, file: Self) -> Self {
        Self {
            common: self.common.merge(file.common),
            data: pick(self.data, file.data),
            outdir: pick(self.outdir, file.outdir),
            rois: pick_list(self.rois, file.rois),
            items: pick_list(self.items, file.items),
            covars: pick_list(self.covars, file.covars),
            residualize: self.residualize || file.residualize,
            do_cca: self.do_cca || file.do_cca,
            n_components: pick(self.n_components, file.n_components),
            n_perm: pick(self.n_perm, file.n_perm),
            alpha: pick(self.alpha, file.alpha),
        }
    }
}

impl MultivariateArgs {
    pub fn resolve(self) -> Result<MultivariateConfig> {
        let args = self.with_config_file()?;
        let (data, outdir) = require_io(args.data, args.outdir)?;
        let config = MultivariateConfig {
            data,
            outdir,
            rois: args.rois,
            items: args.items,
            covars: args.covars,
            residualize: args.residualize,
            do_cca: args.do_cca,
            n_components: args.n_components.unwrap_or(1),
            n_perm: args.n_perm.unwrap_or(1000),
            alpha: args.alpha.unwrap_or(0.05),
            run: args.common.resolve(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MultivariateConfig {
    pub data: String,
    pub outdir: String,
    pub rois: Vec<String>,
    pub items: Vec<String>,
    pub covars: Vec<String>,
    pub residualize: bool,
    pub do_cca: bool,
    pub n_components: usize,
    pub n_perm: usize,
    pub alpha: f64,
    pub run: RunOptions,
}

impl MultivariateConfig {
    /// 只有在指定共變項時才做殘差化
    pub fn residualize_active(&self) -> bool {
        self.residualize && !self.covars.is_empty()
    }
}

impl ConfigProvider for MultivariateConfig {
    fn output_path(&self) -> &str {
        &self.outdir
    }

    fn seed(&self) -> u64 {
        self.run.seed
    }
}

impl Validate for MultivariateConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_list("rois", &self.rois)?;
        validate_unique("rois", &self.rois)?;
        validate_non_empty_list("items", &self.items)?;
        validate_unique("items", &self.items)?;
        validate_unique("covars", &self.covars)?;
        validate_positive_number("n_components", self.n_components, 1)?;
        validate_positive_number("n_perm", self.n_perm, 1)?;
        validate_range("alpha", self.alpha, 0.0, 1.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_cli_defaults() {
        let config = MultivariateArgs::parse_from([
            "run-multivariate", "--data", "TEPSData.csv", "--outdir", "out", "--rois", "lcaud", "rcaud",
            "--items", "item1", "item2", "--do-cca",
        ])
        .resolve()
        .unwrap();
        assert!(config.do_cca);
        assert!(!config.residualize_active());
        assert_eq!(config.n_perm, 1000);
        assert_eq!(config.n_components, 1);
    }

    #[test]
    fn test_yaml_config() {
        let mut file = Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "data: TEPSData.csv\noutdir: mv\nrois: [lcaud, rcaud]\nitems: [item1]\ncovars: [age]\nresidualize: true\nn_perm: 99\n"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let config = MultivariateArgs::parse_from(["run-multivariate", "--config", path.as_str()])
            .resolve()
            .unwrap();
        assert!(config.residualize_active());
        assert_eq!(config.n_perm, 99);
        assert_eq!(config.rois, vec!["lcaud", "rcaud"]);
    }

    #[test]
    fn test_zero_permutations_rejected() {
        let err = MultivariateArgs::parse_from([
            "run-multivariate", "--data", "d.csv", "--outdir", "o", "--rois", "a", "--items", "b", "--n-perm", "0",
        ])
        .resolve()
        .unwrap_err();
        assert!(err.to_string().contains("n_perm"));
    }
}
