use plotters::prelude::*;

use crate::utils::error::Result;
use crate::visuals::{padded_range, render_svg, FONT};

fn draw_panel(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    caption: &str,
    names: &[String],
    loadings: &[f64],
) -> crate::visuals::PlotResult {
    let n = names.len().max(1) as i32;
    let (lo, hi) = padded_range(loadings.iter().copied(), true);

    let mut chart = ChartBuilder::on(area)
        .caption(caption, (FONT, 14))
        .margin(8)
        .x_label_area_size(35)
        .y_label_area_size(120)
        .build_cartesian_2d(lo..hi, (0..n).into_segmented())?;

    let label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => names.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n as usize + 1)
        .y_label_formatter(&label)
        .x_desc("loading")
        .label_style((FONT, 10))
        .draw()?;

    chart.draw_series(loadings.iter().enumerate().map(|(i, &v)| {
        let color = if v >= 0.0 { RGBColor(178, 24, 43) } else { RGBColor(33, 102, 172) };
        let i = i as i32;
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(i)), (v, SegmentValue::Exact(i + 1))],
            color.mix(0.8).filled(),
        );
        bar.set_margin(3, 3, 0, 0);
        bar
    }))?;
    Ok(())
}

/// 第一成分的 X / Y 負荷量長條圖，左右兩欄
pub fn plot_loadings(
    x_names: &[String],
    x_loadings: &[f64],
    y_names: &[String],
    y_loadings: &[f64],
    title: &str,
) -> Result<String> {
    let rows = x_names.len().max(y_names.len()).max(1) as u32;
    let height = 120 + 24 * rows;

    render_svg((960, height), |root| {
        let root = root.titled(title, (FONT, 18))?;
        let panels = root.split_evenly((1, 2));
        draw_panel(&panels[0], "X loadings", x_names, x_loadings)?;
        draw_panel(&panels[1], "Y loadings", y_names, y_loadings)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loadings_plot_renders_both_panels() {
        let x = vec!["AI_caud".to_string(), "AI_nacc".to_string()];
        let y = vec!["item1".to_string(), "item2".to_string(), "item3".to_string()];
        let svg = plot_loadings(&x, &[0.8, -0.4], &y, &[0.5, 0.6, -0.2], "PLS component 1").unwrap();
        assert!(svg.contains("X loadings"));
        assert!(svg.contains("Y loadings"));
    }
}
