use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::utils::error::Result;

/// 將本次執行的輸出檔案打包成單一 ZIP
///
/// `files` 為相對於 `outdir` 的檔名；不存在的檔案會被略過並記錄警告。
pub fn bundle_outputs(outdir: &Path, archive_name: &str, files: &[String]) -> Result<String> {
    let archive_path = outdir.join(archive_name);
    let file = File::create(&archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut added = 0usize;
    for name in files {
        let path = outdir.join(name);
        if !path.is_file() {
            tracing::warn!("⚠️ Skipping missing output file in archive: {}", name);
            continue;
        }
        let data = std::fs::read(&path)?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&data)?;
        added += 1;
    }

    zip.finish()?;
    tracing::debug!("Archived {} files into {}", added, archive_path.display());
    Ok(archive_path.display().to_string())
}
