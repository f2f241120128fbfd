use plotters::prelude::*;

use crate::analysis::regression::RegressionRow;
use crate::utils::error::Result;
use crate::visuals::{padded_range, render_svg, FONT};

/// 森林圖：每個 Target 的 β 與 95% CI，依 Outcome 分組排列
pub fn forest_plot(rows: &[RegressionRow], title: &str) -> Result<String> {
    let mut ordered: Vec<&RegressionRow> = rows.iter().collect();
    ordered.sort_by(|a, b| a.outcome.cmp(&b.outcome));
    let labels: Vec<String> = ordered
        .iter()
        .map(|r| format!("{} | {}", r.outcome, r.target))
        .collect();

    let n = ordered.len() as i32;
    let (lo, hi) = padded_range(
        ordered.iter().flat_map(|r| [r.ci_low, r.ci_high, r.beta]),
        true,
    );
    let height = (120 + 28 * n.max(1)) as u32;

    render_svg((720, height), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(220)
            .build_cartesian_2d(lo..hi, (0..n.max(1)).into_segmented())?;

        let row_label = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(n as usize + 1)
            .y_label_formatter(&row_label)
            .x_desc("β (95% CI)")
            .label_style((FONT, 11))
            .draw()?;

        chart.draw_series(std::iter::once(PathElement::new(
            vec![
                (0.0, SegmentValue::Exact(0)),
                (0.0, SegmentValue::Exact(n.max(1))),
            ],
            BLACK.mix(0.5).stroke_width(1),
        )))?;

        for (i, row) in ordered.iter().enumerate() {
            let y = SegmentValue::CenterOf(i as i32);
            let significant = row.sig_fdr.unwrap_or(row.p < 0.05);
            let color = if significant { RED } else { BLUE };
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(row.ci_low, y.clone()), (row.ci_high, y.clone())],
                color.stroke_width(2),
            )))?;
            chart.draw_series(std::iter::once(Circle::new(
                (row.beta, y),
                4,
                color.filled(),
            )))?;
        }
        Ok(())
    })
}
