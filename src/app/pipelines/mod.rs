pub mod asymmetry_pipeline;
pub mod followup_pipeline;
pub mod multivariate_pipeline;

pub use asymmetry_pipeline::AsymmetryPipeline;
pub use followup_pipeline::FollowupPipeline;
pub use multivariate_pipeline::MultivariatePipeline;

use crate::core::Storage;
use crate::domain::model::AnalysisOutput;
use crate::utils::error::Result;

/// 寫出 SVG；繪圖失敗只記錄警告，不中止流程
pub(crate) fn write_figure<S: Storage + ?Sized>(
    storage: &S,
    output: &mut AnalysisOutput,
    file_name: &str,
    rendered: Result<String>,
) -> Result<()> {
    match rendered {
        Ok(svg) => {
            storage.write_file(file_name, svg.as_bytes())?;
            output.push(file_name);
        }
        Err(e) => {
            tracing::warn!("⚠️ Could not render {}: {}", file_name, e);
            tracing::warn!("💡 {}", e.recovery_suggestion());
        }
    }
    Ok(())
}
