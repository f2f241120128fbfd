//! SVG 圖表（plotters）
//!
//! 每個函式回傳 SVG 文字，由呼叫端透過 `Storage` 寫出。

pub mod forest;
pub mod heatmap;
pub mod loadings;
pub mod network;
pub mod scatter;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::utils::error::{AnalysisError, Result};

pub type PlotResult = std::result::Result<(), Box<dyn std::error::Error>>;

pub const FONT: &str = "sans-serif";

/// 建立 SVG 畫布、執行繪圖並回傳 SVG 文字
pub fn render_svg<F>(size: (u32, u32), draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> PlotResult,
{
    let mut buf = String::new();
    {
        let root = SVGBackend::with_string(&mut buf, size).into_drawing_area();
        root.fill(&WHITE).map_err(AnalysisError::plot)?;
        draw(&root).map_err(AnalysisError::plot)?;
        root.present().map_err(AnalysisError::plot)?;
    }
    Ok(buf)
}

/// 藍 – 白 – 紅 的發散色階，`v` 以 `limit` 截斷
pub fn diverging_color(v: f64, limit: f64) -> RGBColor {
    if !v.is_finite() || limit <= 0.0 {
        return RGBColor(220, 220, 220);
    }
    let t = (v / limit).clamp(-1.0, 1.0);
    let (end, w) = if t >= 0.0 {
        ((178.0, 24.0, 43.0), t)
    } else {
        ((33.0, 102.0, 172.0), -t)
    };
    let mix = |c: f64| (255.0 + (c - 255.0) * w).round() as u8;
    RGBColor(mix(end.0), mix(end.1), mix(end.2))
}

/// 座標軸範圍，兩側留白並確保包含 0
pub fn padded_range(values: impl Iterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    let pad = ((hi - lo) * 0.08).max(1e-6);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diverging_color_endpoints() {
        assert_eq!(diverging_color(0.0, 1.0), RGBColor(255, 255, 255));
        assert_eq!(diverging_color(5.0, 1.0), RGBColor(178, 24, 43));
        assert_eq!(diverging_color(-1.0, 1.0), RGBColor(33, 102, 172));
        assert_eq!(diverging_color(f64::NAN, 1.0), RGBColor(220, 220, 220));
    }

    #[test]
    fn test_padded_range() {
        let (lo, hi) = padded_range([0.5, 1.5].into_iter(), true);
        assert!(lo < 0.0 && hi > 1.5);
        assert_eq!(padded_range(std::iter::empty(), false), (-1.0, 1.0));
    }

    #[test]
    fn test_render_svg_produces_document() {
        let svg = render_svg((100, 80), |_root| Ok(())).unwrap();
        assert!(svg.contains("<svg"));
    }
}
