use std::path::Path;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::utils::error::{AnalysisError, Result};

/// 設定檔格式，依副檔名判斷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => Ok(Self::Toml),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(AnalysisError::InvalidConfigValueError {
                field: "config".to_string(),
                value: path.display().to_string(),
                reason: "Config file must end in .toml, .yaml or .yml".to_string(),
            }),
        }
    }
}

/// 從 TOML / YAML 檔案載入設定
pub fn load_config_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let format = ConfigFormat::from_path(&path)?;
    let content = std::fs::read_to_string(&path)?;
    tracing::debug!("📄 Loading config file {}", path.as_ref().display());
    parse_config_str(&content, format)
}

/// 從字串解析設定
pub fn parse_config_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T> {
    // 處理環境變數替換
    let processed = substitute_env_vars(content)?;

    match format {
        ConfigFormat::Toml => toml::from_str(&processed)
            .map_err(|e| AnalysisError::config(format!("TOML parsing error: {}", e))),
        ConfigFormat::Yaml => serde_yaml::from_str(&processed)
            .map_err(|e| AnalysisError::config(format!("YAML parsing error: {}", e))),
    }
}

/// 替換環境變數 (例如 ${DATA_DIR})；未設定的變數保留原文
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AnalysisError::config(format!("invalid substitution pattern: {}", e)))?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}
