//! 多變量關聯分析：PLS 與 CCA，第一成分以排列檢定評估顯著性

use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::adapters::table::{write_rows, TableRow};
use crate::domain::dataset::Dataset;
use crate::domain::model::NamedColumn;
use crate::domain::ports::Storage;
use crate::stats::correlation::pearson;
use crate::stats::linalg::{inv_sqrt_sym, max_singular_value, sorted_svd, zscore_columns};
use crate::stats::ols;
use crate::stats::resampling::{permutation_pvalue, seeded_rng};
use crate::utils::error::{AnalysisError, Result};
use crate::visuals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MultivariateMethod {
    #[serde(rename = "PLS")]
    Pls,
    #[serde(rename = "CCA")]
    Cca,
}

impl MultivariateMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pls => "PLS",
            Self::Cca => "CCA",
        }
    }
}

/// 一個資料區塊：列 = 受試者，欄 = 變項
#[derive(Debug, Clone)]
pub struct Block {
    pub names: Vec<String>,
    pub data: DMatrix<f64>,
}

impl Block {
    pub fn from_dataset(dataset: &Dataset, names: &[String], rows: &[usize]) -> Result<Self> {
        Ok(Self {
            names: names.to_vec(),
            data: dataset.matrix(names, rows)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Component {
    pub index: usize,
    /// PLS 為交叉共變異的奇異值，CCA 為典型相關
    pub singular_value: f64,
    /// X 與 Y 分數之間的相關
    pub r: f64,
    pub x_weights: Vec<f64>,
    pub y_weights: Vec<f64>,
    pub x_loadings: Vec<f64>,
    pub y_loadings: Vec<f64>,
    pub x_scores: Vec<f64>,
    pub y_scores: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct MultivariateResult {
    pub method: MultivariateMethod,
    pub x_names: Vec<String>,
    pub y_names: Vec<String>,
    pub components: Vec<Component>,
    pub p_value: f64,
    pub n_perm: usize,
    pub n: usize,
}

impl MultivariateResult {
    pub fn r(&self) -> f64 {
        self.components.first().map(|c| c.r).unwrap_or(f64::NAN)
    }
}

/// 以共變項的 OLS 殘差取代各欄；不完整的列為 NaN
pub fn residualize_columns(
    dataset: &Dataset,
    columns: &[String],
    covars: &[String],
) -> Result<Vec<NamedColumn>> {
    let mut out = Vec::with_capacity(columns.len());
    for column in columns {
        let mut needed = vec![column.clone()];
        needed.extend(covars.iter().cloned());
        let rows = dataset.complete_cases(&needed)?;
        let y = dataset.select(column, &rows)?;
        let predictors: Vec<Vec<f64>> = covars
            .iter()
            .map(|c| dataset.select(c, &rows))
            .collect::<Result<_>>()?;
        let refs: Vec<&[f64]> = predictors.iter().map(|p| p.as_slice()).collect();
        let fit = ols::fit(&y, &refs)?;

        let mut values = vec![f64::NAN; dataset.n_rows()];
        for (&row, r) in rows.iter().zip(&fit.residuals) {
            values[row] = *r;
        }
        out.push(NamedColumn::new(column.clone(), values));
    }
    Ok(out)
}

fn check_blocks(x: &Block, y: &Block) -> Result<()> {
    if x.data.ncols() == 0 || y.data.ncols() == 0 {
        return Err(AnalysisError::config("both blocks need at least one column"));
    }
    if x.data.nrows() != y.data.nrows() {
        return Err(AnalysisError::processing("blocks have different row counts"));
    }
    if x.data.nrows() < 3 {
        return Err(AnalysisError::InsufficientDataError {
            context: "multivariate analysis".to_string(),
            available: x.data.nrows(),
            required: 3,
        });
    }
    Ok(())
}

fn permute_rows(m: &DMatrix<f64>, perm: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(perm[i], j)])
}

fn column_loadings(block: &DMatrix<f64>, scores: &[f64]) -> Vec<f64> {
    (0..block.ncols())
        .map(|j| {
            let col: Vec<f64> = block.column(j).iter().copied().collect();
            pearson(&col, scores)
        })
        .collect()
}

fn to_vec(m: &DMatrix<f64>) -> Vec<f64> {
    m.iter().copied().collect()
}

/// 讓 X 權重中絕對值最大的元素為正
fn orient(x_w: &mut [f64], y_w: &mut [f64]) {
    let pivot = x_w
        .iter()
        .copied()
        .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
    if pivot < 0.0 {
        x_w.iter_mut().for_each(|v| *v = -*v);
        y_w.iter_mut().for_each(|v| *v = -*v);
    }
}

fn build_component(
    index: usize,
    singular_value: f64,
    mut x_weights: Vec<f64>,
    mut y_weights: Vec<f64>,
    xz: &DMatrix<f64>,
    yz: &DMatrix<f64>,
) -> Component {
    orient(&mut x_weights, &mut y_weights);
    let xw = DMatrix::from_column_slice(x_weights.len(), 1, &x_weights);
    let yw = DMatrix::from_column_slice(y_weights.len(), 1, &y_weights);
    let x_scores = to_vec(&(xz * xw));
    let y_scores = to_vec(&(yz * yw));
    Component {
        index,
        singular_value,
        r: pearson(&x_scores, &y_scores),
        x_loadings: column_loadings(xz, &x_scores),
        y_loadings: column_loadings(yz, &y_scores),
        x_weights,
        y_weights,
        x_scores,
        y_scores,
    }
}

fn permutation_test<F>(n: usize, n_perm: usize, seed: u64, observed: f64, mut statistic: F) -> f64
where
    F: FnMut(&[usize]) -> f64,
{
    let mut rng = seeded_rng(seed);
    let mut perm: Vec<usize> = (0..n).collect();
    let null: Vec<f64> = (0..n_perm)
        .map(|_| {
            perm.shuffle(&mut rng);
            statistic(&perm)
        })
        .collect();
    permutation_pvalue(observed, &null)
}

/// 偏最小平方 (PLS-SVD)：XᵀY 的奇異值分解
pub fn run_pls(x: &Block, y: &Block, n_components: usize, n_perm: usize, seed: u64) -> Result<MultivariateResult> {
    check_blocks(x, y)?;
    let xz = zscore_columns(&x.data, &x.names)?;
    let yz = zscore_columns(&y.data, &y.names)?;
    let cross = xz.transpose() * &yz;
    let svd = sorted_svd(&cross)?;

    let k = n_components.clamp(1, svd.singular_values.len());
    let components: Vec<Component> = (0..k)
        .map(|c| {
            build_component(
                c + 1,
                svd.singular_values[c],
                svd.u.column(c).iter().copied().collect(),
                svd.v.column(c).iter().copied().collect(),
                &xz,
                &yz,
            )
        })
        .collect();

    let xz_t = xz.transpose();
    let p_value = permutation_test(xz.nrows(), n_perm, seed, svd.singular_values[0], |perm| {
        max_singular_value(&(&xz_t * permute_rows(&yz, perm)))
    });

    Ok(MultivariateResult {
        method: MultivariateMethod::Pls,
        x_names: x.names.clone(),
        y_names: y.names.clone(),
        components,
        p_value,
        n_perm,
        n: xz.nrows(),
    })
}

fn whitening(s: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let p = s.nrows() as f64;
    let ridge = 1e-6 * s.trace() / p;
    inv_sqrt_sym(s, ridge)
}

/// 典型相關分析：白化後交叉共變異矩陣的 SVD
pub fn run_cca(x: &Block, y: &Block, n_components: usize, n_perm: usize, seed: u64) -> Result<MultivariateResult> {
    check_blocks(x, y)?;
    let xz = zscore_columns(&x.data, &x.names)?;
    let yz = zscore_columns(&y.data, &y.names)?;
    let scale = 1.0 / (xz.nrows() as f64 - 1.0);

    let wx = whitening(&(xz.transpose() * &xz * scale))?;
    let wy = whitening(&(yz.transpose() * &yz * scale))?;
    let sxy = xz.transpose() * &yz * scale;
    let svd = sorted_svd(&(&wx * &sxy * &wy))?;

    let k = n_components.clamp(1, svd.singular_values.len());
    let components: Vec<Component> = (0..k)
        .map(|c| {
            let a = &wx * svd.u.column(c);
            let b = &wy * svd.v.column(c);
            build_component(
                c + 1,
                svd.singular_values[c].min(1.0),
                a.iter().copied().collect(),
                b.iter().copied().collect(),
                &xz,
                &yz,
            )
        })
        .collect();

    // 排列只改變 Sxy，白化矩陣不變
    let xz_t = xz.transpose();
    let p_value = permutation_test(xz.nrows(), n_perm, seed, svd.singular_values[0], |perm| {
        let sxy_perm = &xz_t * permute_rows(&yz, perm) * scale;
        max_singular_value(&(&wx * sxy_perm * &wy))
    });

    Ok(MultivariateResult {
        method: MultivariateMethod::Cca,
        x_names: x.names.clone(),
        y_names: y.names.clone(),
        components,
        p_value,
        n_perm,
        n: xz.nrows(),
    })
}

#[derive(Debug, Serialize)]
struct WeightRow<'a> {
    #[serde(rename = "Variable")]
    variable: &'a str,
    #[serde(rename = "Component")]
    component: usize,
    #[serde(rename = "Weight")]
    weight: f64,
    #[serde(rename = "Loading")]
    loading: f64,
}

impl TableRow for WeightRow<'_> {
    const HEADERS: &'static [&'static str] = &["Variable", "Component", "Weight", "Loading"];
}

#[derive(Debug, Serialize)]
struct ScoreRow {
    #[serde(rename = "Row")]
    row: usize,
    #[serde(rename = "Component")]
    component: usize,
    #[serde(rename = "X_score")]
    x_score: f64,
    #[serde(rename = "Y_score")]
    y_score: f64,
}

impl TableRow for ScoreRow {
    const HEADERS: &'static [&'static str] = &["Row", "Component", "X_score", "Y_score"];
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    #[serde(rename = "Method")]
    method: MultivariateMethod,
    #[serde(rename = "Component")]
    component: usize,
    r: f64,
    singular_value: f64,
    p_perm: Option<f64>,
    n_perm: usize,
    #[serde(rename = "N")]
    n: usize,
}

impl TableRow for SummaryRow {
    const HEADERS: &'static [&'static str] =
        &["Method", "Component", "r", "singular_value", "p_perm", "n_perm", "N"];
}

fn weight_rows<'a>(names: &'a [String], components: &[Component], x_side: bool) -> Vec<WeightRow<'a>> {
    components
        .iter()
        .flat_map(|c| {
            let (weights, loadings) = if x_side {
                (&c.x_weights, &c.x_loadings)
            } else {
                (&c.y_weights, &c.y_loadings)
            };
            names
                .iter()
                .zip(weights.iter().zip(loadings))
                .map(move |(name, (w, l))| WeightRow {
                    variable: name,
                    component: c.index,
                    weight: *w,
                    loading: *l,
                })
        })
        .collect()
}

/// 寫出權重、分數、摘要表與第一成分的負荷量圖；`row_index` 為原資料列號
pub fn write_outputs<S: Storage + ?Sized>(
    storage: &S,
    prefix: &str,
    result: &MultivariateResult,
    row_index: &[usize],
) -> Result<Vec<String>> {
    let mut files = Vec::new();

    files.push(write_rows(
        storage,
        &format!("{}_X_loadings.csv", prefix),
        &weight_rows(&result.x_names, &result.components, true),
    )?);
    files.push(write_rows(
        storage,
        &format!("{}_Y_loadings.csv", prefix),
        &weight_rows(&result.y_names, &result.components, false),
    )?);

    let scores: Vec<ScoreRow> = result
        .components
        .iter()
        .flat_map(|c| {
            row_index
                .iter()
                .zip(c.x_scores.iter().zip(&c.y_scores))
                .map(move |(&row, (xs, ys))| ScoreRow {
                    row,
                    component: c.index,
                    x_score: *xs,
                    y_score: *ys,
                })
        })
        .collect();
    files.push(write_rows(storage, &format!("{}_scores.csv", prefix), &scores)?);

    let summary: Vec<SummaryRow> = result
        .components
        .iter()
        .map(|c| SummaryRow {
            method: result.method,
            component: c.index,
            r: c.r,
            singular_value: c.singular_value,
            p_perm: (c.index == 1).then_some(result.p_value),
            n_perm: result.n_perm,
            n: result.n,
        })
        .collect();
    files.push(write_rows(storage, &format!("{}_summary.csv", prefix), &summary)?);

    if let Some(first) = result.components.first() {
        let name = format!("{}_loadings.svg", prefix);
        let title = format!(
            "{} component 1 (r={:.2}, perm p={:.3})",
            result.method.label(),
            first.r,
            result.p_value
        );
        match visuals::loadings::plot_loadings(
            &result.x_names,
            &first.x_loadings,
            &result.y_names,
            &first.y_loadings,
            &title,
        ) {
            Ok(svg) => {
                storage.write_file(&name, svg.as_bytes())?;
                files.push(name);
            }
            Err(e) => tracing::warn!("⚠️ Could not render {}: {}", name, e),
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::testing::MemoryStorage;
    use crate::adapters::table::assert_headers_match;

    /// 一個共同潛在因子驅動兩個區塊
    fn blocks(n: usize) -> (Block, Block) {
        let latent: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() + 0.01 * i as f64).collect();
        let noise = |i: usize, k: f64| ((i as f64 + 1.0) * k).cos() * 0.3;
        let x = DMatrix::from_fn(n, 3, |i, j| latent[i] * (j as f64 + 1.0) + noise(i, 1.7 + j as f64));
        let y = DMatrix::from_fn(n, 2, |i, j| latent[i] * (1.0 - 2.0 * j as f64) + noise(i, 3.1 + j as f64));
        (
            Block {
                names: vec!["x1".into(), "x2".into(), "x3".into()],
                data: x,
            },
            Block {
                names: vec!["y1".into(), "y2".into()],
                data: y,
            },
        )
    }

    #[test]
    fn test_pls_recovers_shared_latent() {
        let (x, y) = blocks(60);
        let res = run_pls(&x, &y, 2, 199, 7).unwrap();
        assert_eq!(res.components.len(), 2);
        assert!(res.r().abs() > 0.8);
        assert!(res.p_value > 0.0 && res.p_value <= 0.01);
        assert!(res.components[0].singular_value >= res.components[1].singular_value);
        // y2 與潛在因子反向
        let y_l = &res.components[0].y_loadings;
        assert!(y_l[0] * y_l[1] < 0.0);
    }

    #[test]
    fn test_pls_is_reproducible_with_seed() {
        let (x, y) = blocks(40);
        let a = run_pls(&x, &y, 1, 99, 3).unwrap();
        let b = run_pls(&x, &y, 1, 99, 3).unwrap();
        assert_eq!(a.p_value, b.p_value);
    }

    #[test]
    fn test_cca_canonical_correlation_bounds() {
        let (x, y) = blocks(60);
        let res = run_cca(&x, &y, 1, 99, 11).unwrap();
        let c = &res.components[0];
        assert!(c.singular_value > 0.8 && c.singular_value <= 1.0);
        assert!((c.r - c.singular_value).abs() < 1e-3);
        assert!(res.p_value > 0.0 && res.p_value <= 1.0);
    }

    #[test]
    fn test_table_headers_match_serde_names() {
        assert_headers_match(&WeightRow {
            variable: "x1",
            component: 1,
            weight: 0.5,
            loading: 0.7,
        });
        assert_headers_match(&ScoreRow {
            row: 0,
            component: 1,
            x_score: 0.1,
            y_score: -0.2,
        });
        assert_headers_match(&SummaryRow {
            method: MultivariateMethod::Pls,
            component: 1,
            r: 0.6,
            singular_value: 2.0,
            p_perm: Some(0.01),
            n_perm: 99,
            n: 40,
        });
    }

    #[test]
    fn test_insufficient_rows() {
        let (x, y) = blocks(2);
        assert!(run_pls(&x, &y, 1, 10, 1).is_err());
    }

    #[test]
    fn test_residualize_columns_removes_covariate() {
        let csv = "roi,age\n1,1\n2.1,2\n2.9,3\n4.2,4\n,5\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let cols = residualize_columns(&ds, &["roi".to_string()], &["age".to_string()]).unwrap();
        let values = &cols[0].values;
        assert!(values[4].is_nan());
        let finite: Vec<f64> = values[..4].to_vec();
        let ages = [1.0, 2.0, 3.0, 4.0];
        assert!(pearson(&finite, &ages).abs() < 1e-9);
    }

    #[test]
    fn test_write_outputs_files() {
        let (x, y) = blocks(30);
        let res = run_pls(&x, &y, 1, 19, 1).unwrap();
        let storage = MemoryStorage::default();
        let rows: Vec<usize> = (0..30).collect();
        let files = write_outputs(&storage, "PLS", &res, &rows).unwrap();
        assert!(files.contains(&"PLS_summary.csv".to_string()));
        let summary = storage.get_string("PLS_summary.csv").unwrap();
        assert!(summary.starts_with("Method,Component,r,singular_value,p_perm,n_perm,N\nPLS,1,"));
        assert!(storage.contains("PLS_loadings.svg"));
    }
}
