use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::utils::error::Result;

pub const LOG_FILE_NAME: &str = "analysis.log";

/// 預設只開啟本函式庫與呼叫端執行檔的日誌，`RUST_LOG` 優先
fn filter_directives(verbose: bool, bin_target: &str) -> String {
    let level = if verbose { "debug" } else { "info" };
    let lib_target = env!("CARGO_CRATE_NAME");
    if bin_target.is_empty() || bin_target == lib_target {
        format!("{}={}", lib_target, level)
    } else {
        format!("{}={},{}={}", lib_target, level, bin_target, level)
    }
}

fn default_filter(verbose: bool, bin_target: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbose, bin_target)))
}

/// 初始化 CLI 日誌：終端機輸出 + 輸出目錄中的 analysis.log
///
/// `bin_target` 為執行檔的 crate 名稱（`env!("CARGO_CRATE_NAME")`）。
/// 日誌檔以附加模式開啟，同一目錄多次執行會累積在同一檔案。
pub fn init_cli_logger(verbose: bool, json: bool, outdir: &Path, bin_target: &str) -> Result<()> {
    std::fs::create_dir_all(outdir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(outdir.join(LOG_FILE_NAME))?;

    let console = if json {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .boxed()
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Arc::new(file));

    // 測試中可能重複初始化，忽略已設定的 subscriber
    let _ = tracing_subscriber::registry()
        .with(default_filter(verbose, bin_target))
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logger_creates_log_file() {
        let dir = TempDir::new().unwrap();
        init_cli_logger(false, false, dir.path(), "run_followups").unwrap();
        assert!(dir.path().join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_filter_targets_library_and_binary() {
        assert_eq!(filter_directives(false, "run_asymmetry"), "neurostat=info,run_asymmetry=info");
        assert_eq!(filter_directives(true, "run_asymmetry"), "neurostat=debug,run_asymmetry=debug");
        assert_eq!(filter_directives(false, ""), "neurostat=info");
    }
}
