use std::io::Read;
use std::path::Path;

use nalgebra::DMatrix;

use crate::utils::error::{AnalysisError, Result};

const MISSING_MARKERS: [&str; 5] = ["", "na", "nan", "null", "n/a"];

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// 以欄為單位的資料表：列 = 受試者，欄 = 變項
///
/// 所有非缺失值都能解析為數字的欄位視為數值欄，缺失值存為 NaN。
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

fn is_missing(cell: &str) -> bool {
    let lower = cell.trim().to_ascii_lowercase();
    MISSING_MARKERS.contains(&lower.as_str())
}

fn infer_column(name: String, cells: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = cells
        .iter()
        .map(|c| {
            if is_missing(c) {
                Some(f64::NAN)
            } else {
                c.trim().parse::<f64>().ok()
            }
        })
        .collect();

    let data = match parsed {
        Some(values) => ColumnData::Numeric(values),
        None => ColumnData::Text(cells),
    };
    Column { name, data }
}

impl Dataset {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut n_rows = 0;
        for record in rdr.records() {
            let record = record?;
            for (j, value) in record.iter().enumerate() {
                cells[j].push(value.to_string());
            }
            n_rows += 1;
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| infer_column(name, values))
            .collect();

        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 檢查所有欄位都存在，一次列出全部缺少的欄位名稱
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if !self.has_column(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::MissingColumnError { columns: missing })
        }
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column {
                data: ColumnData::Numeric(values),
                ..
            }) => Ok(values),
            Some(_) => Err(AnalysisError::NonNumericColumnError {
                column: name.to_string(),
            }),
            None => Err(AnalysisError::MissingColumnError {
                columns: vec![name.to_string()],
            }),
        }
    }

    /// 以文字形式取得欄位值（分組使用）；數值欄以原值格式化，缺失為 `None`
    pub fn labels(&self, name: &str) -> Result<Vec<Option<String>>> {
        match self.column(name) {
            Some(Column {
                data: ColumnData::Numeric(values),
                ..
            }) => Ok(values
                .iter()
                .map(|v| if v.is_finite() { Some(v.to_string()) } else { None })
                .collect()),
            Some(Column {
                data: ColumnData::Text(values),
                ..
            }) => Ok(values
                .iter()
                .map(|v| if is_missing(v) { None } else { Some(v.clone()) })
                .collect()),
            None => Err(AnalysisError::MissingColumnError {
                columns: vec![name.to_string()],
            }),
        }
    }

    /// 新增或取代數值欄
    pub fn set_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.n_rows {
            return Err(AnalysisError::processing(format!(
                "column '{}' has {} values but the dataset has {} rows",
                name,
                values.len(),
                self.n_rows
            )));
        }
        let data = ColumnData::Numeric(values);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.data = data,
            None => self.columns.push(Column {
                name: name.to_string(),
                data,
            }),
        }
        Ok(())
    }

    /// 所有指定欄位皆為有限值的列索引（listwise deletion）
    pub fn complete_cases<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        self.require_columns(names)?;
        let columns: Vec<&[f64]> = names
            .iter()
            .map(|n| self.numeric(n.as_ref()))
            .collect::<Result<_>>()?;
        Ok((0..self.n_rows)
            .filter(|&i| columns.iter().all(|c| c[i].is_finite()))
            .collect())
    }

    /// 取出指定列的數值向量
    pub fn select(&self, name: &str, rows: &[usize]) -> Result<Vec<f64>> {
        let values = self.numeric(name)?;
        Ok(rows.iter().map(|&i| values[i]).collect())
    }

    /// 取出指定列、欄組成的矩陣（列 × 欄）
    pub fn matrix<S: AsRef<str>>(&self, names: &[S], rows: &[usize]) -> Result<DMatrix<f64>> {
        let columns: Vec<&[f64]> = names
            .iter()
            .map(|n| self.numeric(n.as_ref()))
            .collect::<Result<_>>()?;
        Ok(DMatrix::from_fn(rows.len(), columns.len(), |i, j| {
            columns[j][rows[i]]
        }))
    }
}
