use plotters::prelude::*;

use crate::analysis::regression::RegressionRow;
use crate::domain::model::LabeledMatrix;
use crate::utils::error::Result;
use crate::visuals::{diverging_color, render_svg, FONT};

/// 格狀熱圖：`values[r][c]`，可選擇每格的註解文字
pub struct HeatmapGrid<'a> {
    pub row_labels: &'a [String],
    pub col_labels: &'a [String],
    pub values: &'a [Vec<f64>],
    pub annotations: Option<&'a [Vec<String>]>,
    pub limit: f64,
}

pub fn render_heatmap(grid: &HeatmapGrid<'_>, title: &str) -> Result<String> {
    let n_rows = grid.row_labels.len() as i32;
    let n_cols = grid.col_labels.len() as i32;
    let width = (220 + 90 * n_cols.max(1)) as u32;
    let height = (140 + 40 * n_rows.max(1)) as u32;

    render_svg((width, height), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(150)
            .build_cartesian_2d((0..n_cols).into_segmented(), (0..n_rows).into_segmented())?;

        let col_label = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(c) => grid
                .col_labels
                .get(*c as usize)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        };
        let row_label = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(r) => grid
                .row_labels
                .get(*r as usize)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        };

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n_cols as usize + 1)
            .y_labels(n_rows as usize + 1)
            .x_label_formatter(&col_label)
            .y_label_formatter(&row_label)
            .label_style((FONT, 12))
            .draw()?;

        for (r, row) in grid.values.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                let (r, c) = (r as i32, c as i32);
                chart.draw_series(std::iter::once(Rectangle::new(
                    [
                        (SegmentValue::Exact(c), SegmentValue::Exact(r)),
                        (SegmentValue::Exact(c + 1), SegmentValue::Exact(r + 1)),
                    ],
                    diverging_color(v, grid.limit).filled(),
                )))?;
            }
        }

        if let Some(annotations) = grid.annotations {
            for (r, row) in annotations.iter().enumerate() {
                for (c, text) in row.iter().enumerate() {
                    chart.draw_series(std::iter::once(Text::new(
                        text.clone(),
                        (
                            SegmentValue::CenterOf(c as i32),
                            SegmentValue::CenterOf(r as i32),
                        ),
                        (FONT, 11).into_font().color(&BLACK),
                    )))?;
                }
            }
        }
        Ok(())
    })
}

/// β 熱圖：列 = Target，欄 = Outcome，格內標示 β 與 p
pub fn heatmap_betas(rows: &[RegressionRow], title: &str) -> Result<String> {
    let mut targets: Vec<String> = Vec::new();
    let mut outcomes: Vec<String> = Vec::new();
    for row in rows {
        if !targets.contains(&row.target) {
            targets.push(row.target.clone());
        }
        if !outcomes.contains(&row.outcome) {
            outcomes.push(row.outcome.clone());
        }
    }

    let mut values = vec![vec![f64::NAN; outcomes.len()]; targets.len()];
    let mut annotations = vec![vec![String::new(); outcomes.len()]; targets.len()];
    for row in rows {
        let r = targets.iter().position(|t| *t == row.target).unwrap_or(0);
        let c = outcomes.iter().position(|o| *o == row.outcome).unwrap_or(0);
        values[r][c] = row.beta;
        annotations[r][c] = format!("{:.2} (p={:.3})", row.beta, row.p);
    }

    let limit = values
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(0.1);

    render_heatmap(
        &HeatmapGrid {
            row_labels: &targets,
            col_labels: &outcomes,
            values: &values,
            annotations: Some(&annotations),
            limit,
        },
        title,
    )
}

/// 腦區相關矩陣熱圖，色階固定為 [-1, 1]
pub fn plot_corr_heatmap(matrix: &LabeledMatrix, title: &str) -> Result<String> {
    let annotations: Vec<Vec<String>> = matrix
        .values
        .iter()
        .map(|row| row.iter().map(|v| format!("{:.2}", v)).collect())
        .collect();
    render_heatmap(
        &HeatmapGrid {
            row_labels: &matrix.labels,
            col_labels: &matrix.labels,
            values: &matrix.values,
            annotations: Some(&annotations),
            limit: 1.0,
        },
        title,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corr_heatmap_is_annotated() {
        let m = LabeledMatrix {
            labels: vec!["lcaud".to_string(), "rcaud".to_string()],
            values: vec![vec![1.0, 0.4], vec![0.4, 1.0]],
        };
        let svg = plot_corr_heatmap(&m, "ROI correlation").unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("0.40"));
    }
}
