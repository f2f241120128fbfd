//! 三個 CLI 工作流程的參數：命令列旗標 + 可選的 TOML / YAML 設定檔
//!
//! 命令列的值優先於設定檔。合併後轉為已解析的 `*Config`，再以 `Validate` 檢查。

pub mod asymmetry;
pub mod file;
pub mod followups;
pub mod multivariate;

pub use asymmetry::{AsymmetryArgs, AsymmetryConfig};
pub use followups::{FollowupArgs, FollowupConfig};
pub use multivariate::{MultivariateArgs, MultivariateConfig};

use clap::Args;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::stats::resampling::DEFAULT_SEED;
use crate::utils::error::Result;
use crate::utils::validation::{validate_file_extension, validate_path, validate_required_field};

/// 各工作流程共用的旗標
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default)]
pub struct CommonArgs {
    /// TOML or YAML file holding the same options as the flags
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Write console logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    #[arg(long, help = "Bundle all outputs into a zip file")]
    pub archive: bool,

    #[arg(long, help = "Random seed for permutations and resampling [default: 42]")]
    pub seed: Option<u64>,

    #[arg(long, help = "Print the resolved configuration and exit")]
    pub dry_run: bool,
}

impl CommonArgs {
    fn merge(self, file: CommonArgs) -> Self {
        Self {
            config: self.config,
            verbose: self.verbose || file.verbose,
            json_logs: self.json_logs || file.json_logs,
            monitor: self.monitor || file.monitor,
            archive: self.archive || file.archive,
            seed: self.seed.or(file.seed),
            dry_run: self.dry_run || file.dry_run,
        }
    }

    fn resolve(self) -> RunOptions {
        RunOptions {
            verbose: self.verbose,
            json_logs: self.json_logs,
            monitor: self.monitor,
            archive: self.archive,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            dry_run: self.dry_run,
        }
    }
}

/// 已解析的執行選項
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub verbose: bool,
    pub json_logs: bool,
    pub monitor: bool,
    pub archive: bool,
    pub seed: u64,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        CommonArgs::default().resolve()
    }
}

/// 命令列參數與設定檔內容的合併（`self` 為命令列）
pub trait MergeArgs: Sized + DeserializeOwned {
    fn config_path(&self) -> Option<&str>;
    fn merge(self, file: Self) -> Self;

    /// 有 `--config` 時讀入設定檔並合併
    fn with_config_file(self) -> Result<Self> {
        match self.config_path().map(str::to_string) {
            Some(path) => {
                let from_file: Self = file::load_config_file(&path)?;
                Ok(self.merge(from_file))
            }
            None => Ok(self),
        }
    }
}

fn pick<T>(cli: Option<T>, file: Option<T>) -> Option<T> {
    cli.or(file)
}

fn pick_list(cli: Vec<String>, file: Vec<String>) -> Vec<String> {
    if cli.is_empty() {
        file
    } else {
        cli
    }
}

/// `--data` 與 `--outdir` 為每個工作流程的必要欄位
fn require_io(data: Option<String>, outdir: Option<String>) -> Result<(String, String)> {
    let data = validate_required_field("data", &data)?.clone();
    let outdir = validate_required_field("outdir", &outdir)?.clone();
    validate_path("data", &data)?;
    validate_file_extension("data", &data, &["csv"])?;
    validate_path("outdir", &outdir)?;
    Ok((data, outdir))
}
