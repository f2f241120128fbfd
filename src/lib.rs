pub mod adapters;
pub mod analysis;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod stats;
pub mod utils;
pub mod visuals;

pub use adapters::storage::LocalStorage;
pub use app::pipelines::{AsymmetryPipeline, FollowupPipeline, MultivariatePipeline};
pub use config::{AsymmetryArgs, FollowupArgs, MultivariateArgs};
pub use core::engine::AnalysisEngine;
pub use domain::dataset::Dataset;
pub use utils::error::{AnalysisError, Result};
