//! 左右半球不對稱指數 (asymmetry index, AI)

use serde::{Deserialize, Serialize};

use crate::domain::dataset::Dataset;
use crate::domain::model::{NamedColumn, RoiPair};
use crate::utils::error::{AnalysisError, Result};

pub const COMPOSITE_NAME: &str = "AI_composite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum AsymmetryMethod {
    /// (L - R) / ((L + R) / 2)
    #[default]
    HalfNorm,
    /// (L - R) / (L + R)
    Normalized,
    /// L - R
    Difference,
}

impl AsymmetryMethod {
    pub fn index(self, left: f64, right: f64) -> f64 {
        if !left.is_finite() || !right.is_finite() {
            return f64::NAN;
        }
        let (num, den) = match self {
            Self::HalfNorm => (left - right, (left + right) / 2.0),
            Self::Normalized => (left - right, left + right),
            Self::Difference => return left - right,
        };
        if den == 0.0 {
            f64::NAN
        } else {
            num / den
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsymmetryResult {
    pub columns: Vec<NamedColumn>,
}

impl AsymmetryResult {
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// 解析 `L:R` 形式的腦區配對；沒有冒號的項目略過
pub fn parse_roi_pairs<S: AsRef<str>>(entries: &[S]) -> Result<Vec<RoiPair>> {
    let mut pairs = Vec::new();
    for entry in entries {
        let entry = entry.as_ref();
        let Some((left, right)) = entry.split_once(':') else {
            tracing::warn!("⚠️ Ignoring ROI pair without ':' separator: {}", entry);
            continue;
        };
        let (left, right) = (left.trim(), right.trim());
        if left.is_empty() || right.is_empty() {
            return Err(AnalysisError::InvalidConfigValueError {
                field: "roi_pairs".to_string(),
                value: entry.to_string(),
                reason: "both sides of L:R must name a column".to_string(),
            });
        }
        pairs.push(RoiPair::new(left, right));
    }
    Ok(pairs)
}

fn strip_side(name: &str, side: char) -> Option<&str> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.eq_ignore_ascii_case(&side) => {
            let rest = chars.as_str();
            let rest = rest.strip_prefix(['_', '-', '.']).unwrap_or(rest);
            (!rest.is_empty()).then_some(rest)
        }
        _ => None,
    }
}

/// 欄位名稱：`lcaud`/`rcaud` → `AI_caud`；無共同字根時 `AI_<L>_<R>`
pub fn ai_column_name(pair: &RoiPair) -> String {
    match (strip_side(&pair.left, 'l'), strip_side(&pair.right, 'r')) {
        (Some(l), Some(r)) if l.eq_ignore_ascii_case(r) => format!("AI_{}", l),
        _ => format!("AI_{}_{}", pair.left, pair.right),
    }
}

pub fn compute_ai(
    dataset: &Dataset,
    pairs: &[RoiPair],
    method: AsymmetryMethod,
    composite: bool,
) -> Result<AsymmetryResult> {
    let needed: Vec<&str> = pairs
        .iter()
        .flat_map(|p| [p.left.as_str(), p.right.as_str()])
        .collect();
    dataset.require_columns(&needed)?;

    let mut columns: Vec<NamedColumn> = Vec::with_capacity(pairs.len() + 1);
    for pair in pairs {
        let left = dataset.numeric(&pair.left)?;
        let right = dataset.numeric(&pair.right)?;
        let values: Vec<f64> = left
            .iter()
            .zip(right)
            .map(|(&l, &r)| method.index(l, r))
            .collect();

        let mut name = ai_column_name(pair);
        if columns.iter().any(|c| c.name == name) {
            name = format!("AI_{}_{}", pair.left, pair.right);
        }
        let valid = values.iter().filter(|v| v.is_finite()).count();
        tracing::debug!("{}: {} finite values of {}", name, valid, values.len());
        columns.push(NamedColumn::new(name, values));
    }

    if composite && !columns.is_empty() {
        let n = dataset.n_rows();
        let values = (0..n)
            .map(|i| {
                let finite: Vec<f64> = columns
                    .iter()
                    .map(|c| c.values[i])
                    .filter(|v| v.is_finite())
                    .collect();
                if finite.is_empty() {
                    f64::NAN
                } else {
                    finite.iter().sum::<f64>() / finite.len() as f64
                }
            })
            .collect();
        columns.push(NamedColumn::new(COMPOSITE_NAME, values));
    }

    Ok(AsymmetryResult { columns })
}
