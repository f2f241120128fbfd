use serde::{Deserialize, Serialize};

/// 左右成對的腦區欄位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiPair {
    pub left: String,
    pub right: String,
}

impl RoiPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// 一個命名的數值欄位（衍生欄，如 AI、偏差分數）
#[derive(Debug, Clone, PartialEq)]
pub struct NamedColumn {
    pub name: String,
    pub values: Vec<f64>,
}

impl NamedColumn {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// 帶有名稱的方陣（相關矩陣）
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl LabeledMatrix {
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// 單次分析輸出的檔案清單
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisOutput {
    pub files: Vec<String>,
}

impl AnalysisOutput {
    pub fn push(&mut self, file: impl Into<String>) {
        self.files.push(file.into());
    }
}
