use std::f64::consts::PI;

use plotters::prelude::*;

use crate::analysis::networks::{Graph, Partition};
use crate::utils::error::Result;
use crate::visuals::{render_svg, FONT};

/// 節點排成圓形；正相關邊為紅色、負相關為藍色，節點顏色代表社群
pub fn plot_graph(graph: &Graph, partition: &Partition, title: &str) -> Result<String> {
    let n = graph.node_count();
    let positions: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n.max(1) as f64;
            (angle.cos(), angle.sin())
        })
        .collect();
    let max_weight = graph
        .edges()
        .map(|e| e.weight())
        .fold(0.0_f64, f64::max);

    render_svg((720, 720), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(
                format!("{} ({})", title, partition.method),
                (FONT, 16),
            )
            .margin(30)
            .build_cartesian_2d(-1.35..1.35, -1.35..1.35)?;

        for edge in graph.edges() {
            let color = if edge.r >= 0.0 {
                RGBColor(178, 24, 43)
            } else {
                RGBColor(33, 102, 172)
            };
            let width = if max_weight > 0.0 {
                1 + (3.0 * edge.weight() / max_weight).round() as u32
            } else {
                1
            };
            chart.draw_series(std::iter::once(PathElement::new(
                vec![positions[edge.a], positions[edge.b]],
                color.mix(0.6).stroke_width(width),
            )))?;
        }

        for (i, &(x, y)) in positions.iter().enumerate() {
            let community = partition.membership.get(i).copied().unwrap_or(0);
            let color = Palette99::pick(community);
            chart.draw_series(std::iter::once(Circle::new(
                (x, y),
                8,
                color.filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                graph.node_name(i).to_string(),
                (x * 1.15, y * 1.15),
                (FONT, 11).into_font(),
            )))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::networks::{build_graph, detect_communities, EdgeRow};

    #[test]
    fn test_graph_plot_labels_every_node() {
        let nodes: Vec<String> = ["lcaud", "rcaud", "lput"].iter().map(|s| s.to_string()).collect();
        let edges = vec![EdgeRow {
            node_a: "lcaud".to_string(),
            node_b: "rcaud".to_string(),
            r: 0.7,
            p: 0.001,
            p_fdr: 0.003,
            keep: true,
        }];
        let graph = build_graph(&nodes, &edges).unwrap();
        let partition = detect_communities(&graph);
        let svg = plot_graph(&graph, &partition, "Structural covariance").unwrap();
        for node in &nodes {
            assert!(svg.contains(node.as_str()));
        }
    }
}
