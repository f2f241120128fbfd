pub mod engine;
pub mod manifest;

pub use crate::domain::model::AnalysisOutput;
pub use crate::domain::ports::{Analysis, ConfigProvider, Storage};
pub use crate::utils::error::Result;
