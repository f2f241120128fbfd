pub mod archive;
pub mod error;
pub mod logger;
pub mod monitor;
pub mod validation;

use std::path::Path;

use crate::utils::error::Result;

/// 建立輸出目錄（已存在則略過）
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// 圖檔檔名：模型名稱中的空白改為底線
pub fn file_stem_safe(name: &str) -> String {
    name.replace(' ', "_")
}
