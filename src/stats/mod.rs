pub mod correction;
pub mod correlation;
pub mod descriptive;
pub mod gp;
pub mod linalg;
pub mod ols;
pub mod resampling;
