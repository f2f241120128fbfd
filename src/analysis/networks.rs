//! 結構共變網路：腦區間相關矩陣、FDR 篩選的邊、節點與全域指標、模組度

use std::collections::{HashMap, VecDeque};

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::adapters::table::TableRow;
use crate::domain::model::LabeledMatrix;
use crate::stats::correction::benjamini_hochberg;
use crate::stats::correlation::{correlation_matrix, correlation_pvalue};
use crate::utils::error::{AnalysisError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct EdgeRow {
    pub node_a: String,
    pub node_b: String,
    pub r: f64,
    pub p: f64,
    #[serde(rename = "p_FDR")]
    pub p_fdr: f64,
    pub keep: bool,
}

impl TableRow for EdgeRow {
    const HEADERS: &'static [&'static str] = &["node_a", "node_b", "r", "p", "p_FDR", "keep"];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub r: f64,
}

impl Edge {
    pub fn weight(&self) -> f64 {
        self.r.abs()
    }
}

/// 無向加權圖，邊的權重保留 r 的正負號，強度與模組度使用 |r|
#[derive(Debug, Clone)]
pub struct Graph {
    inner: UnGraph<String, f64>,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn node_name(&self, i: usize) -> &str {
        &self.inner[NodeIndex::new(i)]
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.inner.edge_references().map(|e| Edge {
            a: e.source().index(),
            b: e.target().index(),
            r: *e.weight(),
        })
    }

    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.inner.neighbors(NodeIndex::new(i)).map(|n| n.index())
    }

    pub fn degree(&self, i: usize) -> usize {
        self.inner.edges(NodeIndex::new(i)).count()
    }

    pub fn strength(&self, i: usize) -> f64 {
        self.inner
            .edges(NodeIndex::new(i))
            .map(|e| e.weight().abs())
            .sum()
    }

    fn has_edge(&self, i: usize, j: usize) -> bool {
        self.inner
            .find_edge(NodeIndex::new(i), NodeIndex::new(j))
            .is_some()
    }

    fn total_weight(&self) -> f64 {
        self.inner.edge_weights().map(|w| w.abs()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeMetricRow {
    pub node: String,
    pub degree: usize,
    pub strength: f64,
    pub clustering: f64,
    pub betweenness: f64,
    pub community: usize,
}

impl TableRow for NodeMetricRow {
    const HEADERS: &'static [&'static str] =
        &["node", "degree", "strength", "clustering", "betweenness", "community"];
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalMetrics {
    pub n_nodes: usize,
    pub n_edges: usize,
    pub density: f64,
    pub mean_clustering: f64,
    pub global_efficiency: f64,
    pub n_components: usize,
    pub modularity: f64,
    pub n_communities: usize,
    pub community_method: String,
}

impl TableRow for GlobalMetrics {
    const HEADERS: &'static [&'static str] = &[
        "n_nodes",
        "n_edges",
        "density",
        "mean_clustering",
        "global_efficiency",
        "n_components",
        "modularity",
        "n_communities",
        "community_method",
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// 每個節點的社群編號（依最小節點編號排序，從 0 開始）
    pub membership: Vec<usize>,
    pub modularity: f64,
    pub method: &'static str,
}

/// 腦區間的 Pearson 相關矩陣；`columns` 只能包含完整資料
pub fn structural_covariance(names: &[String], columns: &[Vec<f64>]) -> LabeledMatrix {
    LabeledMatrix {
        labels: names.to_vec(),
        values: correlation_matrix(columns),
    }
}

/// 每一對腦區 (i < j) 的 r、p 與 BH-FDR，`keep = p_FDR < alpha`
pub fn fdr_edges(matrix: &LabeledMatrix, n: usize, alpha: f64) -> Vec<EdgeRow> {
    let k = matrix.len();
    let mut rows = Vec::with_capacity(k * k.saturating_sub(1) / 2);
    for i in 0..k {
        for j in (i + 1)..k {
            let r = matrix.get(i, j);
            rows.push(EdgeRow {
                node_a: matrix.labels[i].clone(),
                node_b: matrix.labels[j].clone(),
                r,
                p: correlation_pvalue(r, n),
                p_fdr: f64::NAN,
                keep: false,
            });
        }
    }

    let pvalues: Vec<f64> = rows.iter().map(|e| e.p).collect();
    for (row, q) in rows.iter_mut().zip(benjamini_hochberg(&pvalues)) {
        row.p_fdr = q;
        row.keep = q.is_finite() && q < alpha;
    }
    rows
}

/// 以所有腦區為節點、保留的邊建立圖
pub fn build_graph(nodes: &[String], edges: &[EdgeRow]) -> Result<Graph> {
    let mut inner = UnGraph::<String, f64>::with_capacity(nodes.len(), edges.len());
    let index: HashMap<&str, NodeIndex> = nodes
        .iter()
        .map(|name| (name.as_str(), inner.add_node(name.clone())))
        .collect();
    let index_of = |name: &str| -> Result<NodeIndex> {
        index
            .get(name)
            .copied()
            .ok_or_else(|| AnalysisError::processing(format!("edge references unknown node '{}'", name)))
    };

    for row in edges.iter().filter(|e| e.keep) {
        let a = index_of(&row.node_a)?;
        let b = index_of(&row.node_b)?;
        if a == b || inner.find_edge(a, b).is_some() {
            continue;
        }
        inner.add_edge(a, b, row.r);
    }

    Ok(Graph { inner })
}

pub fn clustering_coefficient(graph: &Graph, i: usize) -> f64 {
    let neighbors: Vec<usize> = graph.neighbors(i).collect();
    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }
    let mut links = 0usize;
    for (x, &a) in neighbors.iter().enumerate() {
        for &b in &neighbors[x + 1..] {
            if graph.has_edge(a, b) {
                links += 1;
            }
        }
    }
    2.0 * links as f64 / (k * (k - 1)) as f64
}

/// Brandes 演算法（不加權），以 (n-1)(n-2)/2 正規化
pub fn betweenness_centrality(graph: &Graph) -> Vec<f64> {
    let n = graph.node_count();
    let mut centrality = vec![0.0; n];

    for s in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist: Vec<i64> = vec![-1; n];
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for w in graph.neighbors(v) {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0_f64; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    // 無向圖每對節點被計算兩次
    let scale = if n > 2 {
        1.0 / ((n - 1) * (n - 2)) as f64
    } else {
        0.0
    };
    centrality.iter().map(|c| c * scale).collect()
}

/// 每個節點所屬的連通元件編號
pub fn connected_components(graph: &Graph) -> Vec<usize> {
    let mut sets = UnionFind::<usize>::new(graph.node_count());
    for e in graph.edges() {
        sets.union(e.a, e.b);
    }
    relabel(&sets.into_labeling())
}

/// 平均 1/d(i, j)，不可達的節點對貢獻 0
pub fn global_efficiency(graph: &Graph) -> f64 {
    let n = graph.node_count();
    if n < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for s in graph.inner.node_indices() {
        for (_, d) in dijkstra(&graph.inner, s, None, |_| 1usize) {
            if d > 0 {
                total += 1.0 / d as f64;
            }
        }
    }
    total / (n * (n - 1)) as f64
}

/// 加權模組度 Q
pub fn modularity(graph: &Graph, membership: &[usize]) -> f64 {
    let two_w = 2.0 * graph.total_weight();
    if two_w <= 0.0 {
        return 0.0;
    }
    let n_comm = membership.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    let mut internal = vec![0.0; n_comm];
    let mut total = vec![0.0; n_comm];
    for e in graph.edges() {
        if membership[e.a] == membership[e.b] {
            internal[membership[e.a]] += 2.0 * e.weight();
        }
    }
    for i in 0..graph.node_count() {
        total[membership[i]] += graph.strength(i);
    }
    internal
        .iter()
        .zip(&total)
        .map(|(inside, tot)| inside / two_w - (tot / two_w).powi(2))
        .sum()
}

fn relabel(membership: &[usize]) -> Vec<usize> {
    let mut mapping: Vec<(usize, usize)> = Vec::new();
    membership
        .iter()
        .map(|&c| match mapping.iter().find(|(old, _)| *old == c) {
            Some((_, new)) => *new,
            None => {
                let new = mapping.len();
                mapping.push((c, new));
                new
            }
        })
        .collect()
}

/// 貪婪模組度最大化：反覆合併 ΔQ 最大的兩個相連社群
pub fn greedy_modularity(graph: &Graph) -> Result<Partition> {
    let n = graph.node_count();
    let two_w = 2.0 * graph.total_weight();
    if n == 0 || two_w <= 0.0 {
        return Err(AnalysisError::numerical("graph has no weighted edges"));
    }

    let mut membership: Vec<usize> = (0..n).collect();
    let mut totals: Vec<f64> = (0..n).map(|i| graph.strength(i) / two_w).collect();

    loop {
        let n_comm = membership.iter().copied().max().map(|m| m + 1).unwrap_or(0);
        let mut between = vec![vec![0.0; n_comm]; n_comm];
        for e in graph.edges() {
            let (ca, cb) = (membership[e.a], membership[e.b]);
            if ca != cb {
                between[ca][cb] += e.weight() / two_w;
                between[cb][ca] += e.weight() / two_w;
            }
        }

        let mut best: Option<(f64, usize, usize)> = None;
        for a in 0..n_comm {
            for b in (a + 1)..n_comm {
                if between[a][b] <= 0.0 {
                    continue;
                }
                let delta = 2.0 * (between[a][b] - totals[a] * totals[b]);
                if best.map(|(d, _, _)| delta > d).unwrap_or(true) {
                    best = Some((delta, a, b));
                }
            }
        }

        match best {
            Some((delta, a, b)) if delta > 1e-12 => {
                for m in membership.iter_mut() {
                    if *m == b {
                        *m = a;
                    }
                }
                totals[a] += totals[b];
                totals.remove(b);
                for m in membership.iter_mut() {
                    if *m > b {
                        *m -= 1;
                    }
                }
            }
            _ => break,
        }
    }

    let membership = relabel(&membership);
    if membership.len() != n {
        return Err(AnalysisError::numerical("greedy modularity produced an invalid partition"));
    }
    let q = modularity(graph, &membership);
    Ok(Partition {
        membership,
        modularity: q,
        method: "greedy_modularity",
    })
}

/// 社群偵測；貪婪法失敗時改用連通元件
pub fn detect_communities(graph: &Graph) -> Partition {
    match greedy_modularity(graph) {
        Ok(partition) => partition,
        Err(e) => {
            tracing::warn!("⚠️ Community detection failed ({}); using connected components", e);
            let membership = connected_components(graph);
            Partition {
                modularity: modularity(graph, &membership),
                membership,
                method: "connected_components",
            }
        }
    }
}

pub fn node_metrics(graph: &Graph, partition: &Partition) -> Vec<NodeMetricRow> {
    let betweenness = betweenness_centrality(graph);
    (0..graph.node_count())
        .map(|i| NodeMetricRow {
            node: graph.node_name(i).to_string(),
            degree: graph.degree(i),
            strength: graph.strength(i),
            clustering: clustering_coefficient(graph, i),
            betweenness: betweenness[i],
            community: partition.membership[i],
        })
        .collect()
}

pub fn global_metrics(graph: &Graph, partition: &Partition) -> GlobalMetrics {
    let n = graph.node_count();
    let m = graph.edge_count();
    let density = if n > 1 {
        2.0 * m as f64 / (n * (n - 1)) as f64
    } else {
        0.0
    };
    let mean_clustering = if n > 0 {
        (0..n).map(|i| clustering_coefficient(graph, i)).sum::<f64>() / n as f64
    } else {
        0.0
    };
    let n_components = petgraph::algo::connected_components(&graph.inner);
    let n_communities = partition
        .membership
        .iter()
        .copied()
        .max()
        .map(|c| c + 1)
        .unwrap_or(0);

    GlobalMetrics {
        n_nodes: n,
        n_edges: m,
        density,
        mean_clustering,
        global_efficiency: global_efficiency(graph),
        n_components,
        modularity: partition.modularity,
        n_communities,
        community_method: partition.method.to_string(),
    }
}
