use crate::domain::model::AnalysisOutput;
use crate::utils::error::Result;

pub trait Storage {
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

pub trait ConfigProvider {
    fn output_path(&self) -> &str;
    fn seed(&self) -> u64;
}

/// 分析流程：載入 → 計算 → 輸出
pub trait Analysis {
    type Input;
    type Output;

    fn name(&self) -> &str;
    fn load(&self) -> Result<Self::Input>;
    fn analyze(&self, input: Self::Input) -> Result<Self::Output>;
    fn write(&self, output: Self::Output) -> Result<AnalysisOutput>;
}
