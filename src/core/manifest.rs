use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{AnalysisOutput, Storage};
use crate::utils::error::Result;

pub const MANIFEST_FILE_NAME: &str = "run_manifest.json";

/// 執行紀錄：解析後的設定、起訖時間與輸出檔案
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub workflow: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: serde_json::Value,
    pub outputs: Vec<String>,
    pub archive: Option<String>,
}

impl RunManifest {
    pub fn start<C: Serialize>(workflow: &str, config: &C) -> Result<Self> {
        Ok(Self {
            workflow: workflow.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
            finished_at: None,
            config: serde_json::to_value(config)?,
            outputs: Vec::new(),
            archive: None,
        })
    }

    pub fn finish(&mut self, output: &AnalysisOutput) {
        self.outputs = output.files.clone();
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    pub fn write<S: Storage + ?Sized>(&self, storage: &S) -> Result<String> {
        let data = serde_json::to_vec_pretty(self)?;
        storage.write_file(MANIFEST_FILE_NAME, &data)?;
        Ok(MANIFEST_FILE_NAME.to_string())
    }
}

/// ZIP 檔名：`<workflow>_outputs.zip`
pub fn archive_name(workflow: &str) -> String {
    format!("{}_outputs.zip", workflow)
}
