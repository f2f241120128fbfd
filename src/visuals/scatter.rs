use plotters::prelude::*;

use crate::analysis::robustness::LineFit;
use crate::utils::error::Result;
use crate::visuals::{padded_range, render_svg, FONT};

/// 一組散佈點（依分組欄位上色）
pub struct PointGroup {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

pub struct ScatterSpec<'a> {
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub title: &'a str,
    pub groups: &'a [PointGroup],
    pub fits: &'a [LineFit],
}

/// 散佈圖加上各方法的擬合直線，x = 0 處畫虛線參考線
pub fn scatter_with_fits(spec: &ScatterSpec<'_>) -> Result<String> {
    let (x_lo, x_hi) = padded_range(spec.groups.iter().flat_map(|g| g.x.iter().copied()), false);
    let (y_lo, y_hi) = padded_range(spec.groups.iter().flat_map(|g| g.y.iter().copied()), false);

    render_svg((720, 600), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(spec.title, (FONT, 16))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(55)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        chart
            .configure_mesh()
            .x_desc(spec.x_label)
            .y_desc(spec.y_label)
            .label_style((FONT, 11))
            .draw()?;

        if x_lo < 0.0 && x_hi > 0.0 {
            chart.draw_series(DashedLineSeries::new(
                vec![(0.0, y_lo), (0.0, y_hi)],
                5,
                5,
                BLACK.mix(0.4).stroke_width(1),
            ))?;
        }

        for (i, group) in spec.groups.iter().enumerate() {
            let color = Palette99::pick(i).mix(0.7);
            chart
                .draw_series(
                    group
                        .x
                        .iter()
                        .zip(&group.y)
                        .map(|(&x, &y)| Circle::new((x, y), 4, color.filled())),
                )?
                .label(group.label.clone())
                .legend(move |(x, y)| Circle::new((x + 8, y), 4, color.filled()));
        }

        for (k, fit) in spec.fits.iter().enumerate() {
            let color = Palette99::pick(spec.groups.len() + k).to_rgba();
            let line = [x_lo, x_hi].map(|x| (x, fit.intercept + fit.slope * x));
            chart
                .draw_series(LineSeries::new(line, color.stroke_width(2)))?
                .label(format!("{} (β={:.2})", fit.method, fit.slope))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK.mix(0.3))
            .label_font((FONT, 10))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_renders_groups_and_fits() {
        let groups = vec![
            PointGroup {
                label: "gender=1".to_string(),
                x: vec![-1.0, 0.0, 1.0],
                y: vec![1.0, 2.0, 3.0],
            },
            PointGroup {
                label: "gender=2".to_string(),
                x: vec![-0.5, 0.5],
                y: vec![1.4, 2.6],
            },
        ];
        let fits = [LineFit {
            method: "OLS",
            slope: 1.0,
            intercept: 2.0,
        }];
        let svg = scatter_with_fits(&ScatterSpec {
            x_label: "AI_nacc",
            y_label: "tepsconsum",
            title: "AI_nacc → tepsconsum",
            groups: &groups,
            fits: &fits,
        })
        .unwrap();
        assert!(svg.contains("gender=1"));
        assert!(svg.contains("OLS"));
    }
}
