//! 結果表格的 CSV 序列化

use serde::Serialize;

use crate::domain::model::LabeledMatrix;
use crate::domain::ports::Storage;
use crate::utils::error::{AnalysisError, Result};

/// 可寫成 CSV 的結果列；`HEADERS` 需與 serde 欄名順序一致
pub trait TableRow: Serialize {
    const HEADERS: &'static [&'static str];
}

/// 標題列固定寫出，沒有資料列時仍是一個只有標題的表格
pub fn rows_to_csv<T: TableRow>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(T::HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| AnalysisError::processing(format!("CSV buffer error: {}", e)))
}

/// 序列化並寫入表格，回傳檔名
pub fn write_rows<S: Storage + ?Sized, T: TableRow>(
    storage: &S,
    file_name: &str,
    rows: &[T],
) -> Result<String> {
    let data = rows_to_csv(rows)?;
    storage.write_file(file_name, &data)?;
    tracing::debug!("Wrote {} rows to {}", rows.len(), file_name);
    Ok(file_name.to_string())
}

/// 帶列名的矩陣，第一欄為空白標題的列名
pub fn matrix_to_csv(matrix: &LabeledMatrix) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec![String::new()];
    header.extend(matrix.labels.iter().cloned());
    writer.write_record(&header)?;
    for (label, row) in matrix.labels.iter().zip(&matrix.values) {
        let mut record = vec![label.clone()];
        record.extend(row.iter().map(|v| format_value(*v)));
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| AnalysisError::processing(format!("CSV buffer error: {}", e)))
}

/// 欄名 + 多個數值欄，第一欄為列索引
pub fn columns_to_csv(index: &[usize], names: &[String], columns: &[Vec<f64>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec![String::new()];
    header.extend(names.iter().cloned());
    writer.write_record(&header)?;
    for (i, row_index) in index.iter().enumerate() {
        let mut record = vec![row_index.to_string()];
        record.extend(columns.iter().map(|c| format_value(c[i])));
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| AnalysisError::processing(format!("CSV buffer error: {}", e)))
}

fn format_value(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        #[serde(rename = "Target")]
        target: String,
        #[serde(rename = "p_FDR")]
        p_fdr: Option<f64>,
    }

    impl TableRow for Row {
        const HEADERS: &'static [&'static str] = &["Target", "p_FDR"];
    }

    #[test]
    fn test_rows_to_csv_uses_serde_names() {
        let rows = vec![
            Row {
                target: "AI_caud".to_string(),
                p_fdr: Some(0.01),
            },
            Row {
                target: "AI_put".to_string(),
                p_fdr: None,
            },
        ];
        let text = String::from_utf8(rows_to_csv(&rows).unwrap()).unwrap();
        assert_eq!(text, "Target,p_FDR\nAI_caud,0.01\nAI_put,\n");
    }

    #[test]
    fn test_empty_rows_still_write_header() {
        let rows: Vec<Row> = Vec::new();
        let text = String::from_utf8(rows_to_csv(&rows).unwrap()).unwrap();
        assert_eq!(text, "Target,p_FDR\n");
    }

    #[test]
    fn test_matrix_to_csv_layout() {
        let m = LabeledMatrix {
            labels: vec!["a".to_string(), "b".to_string()],
            values: vec![vec![1.0, 0.5], vec![0.5, 1.0]],
        };
        let text = String::from_utf8(matrix_to_csv(&m).unwrap()).unwrap();
        assert_eq!(text, ",a,b\na,1,0.5\nb,0.5,1\n");
    }
}

/// 測試用：比對 `HEADERS` 與 serde 自動產生的標題列
#[cfg(test)]
pub(crate) fn assert_headers_match<T: TableRow>(sample: &T) {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.serialize(sample).unwrap();
    let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
    let header = text.lines().next().unwrap_or_default();
    assert_eq!(header, T::HEADERS.join(","));
}
