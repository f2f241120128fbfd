pub mod asymmetry;
pub mod multivariate;
pub mod networks;
pub mod normative;
pub mod regression;
pub mod robustness;
