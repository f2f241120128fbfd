//! 三個 CLI 共用的執行流程：引擎、執行紀錄、打包與錯誤回報

use std::path::Path;

use serde::Serialize;

use crate::adapters::storage::LocalStorage;
use crate::config::RunOptions;
use crate::core::engine::AnalysisEngine;
use crate::core::manifest::{archive_name, RunManifest};
use crate::core::{Analysis, AnalysisOutput, ConfigProvider};
use crate::utils::archive::bundle_outputs;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::{ensure_dir, logger};

/// 初始化日誌；失敗時只能寫到 stderr
pub fn init_logging(run: &RunOptions, outdir: &str, bin_target: &str) -> Result<()> {
    ensure_dir(Path::new(outdir))?;
    logger::init_cli_logger(run.verbose, run.json_logs, Path::new(outdir), bin_target)
}

/// 執行分析並寫出 `run_manifest.json`，`--archive` 時另外打包 ZIP；沒有任何輸出時兩者皆略過
pub fn execute<A, C>(workflow: &str, config: &C, run: &RunOptions, analysis: A) -> Result<AnalysisOutput>
where
    A: Analysis,
    C: Serialize + ConfigProvider,
{
    let mut manifest = RunManifest::start(workflow, config)?;
    if run.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mut engine = AnalysisEngine::new_with_monitoring(analysis, run.monitor);
    let output = engine.run()?;

    if output.files.is_empty() {
        tracing::warn!("⚠️ No outputs produced; skipping run manifest and archive");
        return Ok(output);
    }

    let storage = LocalStorage::new(config.output_path());
    if run.archive {
        let name = archive_name(workflow);
        let path = bundle_outputs(storage.base_path(), &name, &output.files)?;
        tracing::info!("📦 Outputs archived to {}", path);
        manifest.archive = Some(name);
    }

    manifest.finish(&output);
    manifest.write(&storage)?;
    if let Some(seconds) = manifest.elapsed_seconds() {
        tracing::info!("⏱️ {} finished in {:.1}s", workflow, seconds);
    }
    Ok(output)
}

/// `--dry-run`：印出解析後的設定
pub fn print_dry_run<C: Serialize>(workflow: &str, config: &C) -> Result<()> {
    tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
    println!("🔍 Dry run for {}:", workflow);
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

pub fn report_success(output: &AnalysisOutput, outdir: &str) {
    tracing::info!("✅ Analysis completed successfully!");
    tracing::info!("📁 Outputs in {}", outdir);
    println!("✅ Analysis completed successfully!");
    println!("📁 {} files written to {}", output.files.len(), outdir);
}

/// 記錄錯誤並回傳對應的結束代碼
pub fn report_failure(e: &AnalysisError) -> i32 {
    tracing::error!(
        "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    e.exit_code()
}

/// 設定錯誤發生在日誌初始化之前，直接寫到 stderr
pub fn report_config_failure(e: &AnalysisError) -> i32 {
    eprintln!("❌ Configuration error: {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    e.exit_code().max(1)
}
