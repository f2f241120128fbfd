use crate::adapters::table::{matrix_to_csv, write_rows};
use crate::analysis::multivariate::{
    residualize_columns, run_cca, run_pls, write_outputs, Block, MultivariateResult,
};
use crate::analysis::networks::{
    build_graph, detect_communities, fdr_edges, global_metrics, node_metrics, structural_covariance,
    EdgeRow, GlobalMetrics, Graph, NodeMetricRow, Partition,
};
use crate::app::pipelines::write_figure;
use crate::config::MultivariateConfig;
use crate::core::{Analysis, AnalysisOutput, ConfigProvider, Storage};
use crate::domain::dataset::Dataset;
use crate::domain::model::LabeledMatrix;
use crate::utils::error::{AnalysisError, Result};
use crate::visuals::{heatmap::plot_corr_heatmap, network::plot_graph};

pub const ROI_CORR_FILE: &str = "StructuralCovariance_ROI_corr.csv";
pub const EDGES_FILE: &str = "StructuralCovariance_edges_FDR.csv";
pub const NODE_METRICS_FILE: &str = "Network_NodeMetrics.csv";
pub const GLOBAL_METRICS_FILE: &str = "Network_GlobalMetrics.csv";
pub const CORR_HEATMAP_FILE: &str = "Network_Heatmap_ROIcorr.svg";
pub const GRAPH_FILE: &str = "Network_Graph.svg";

/// （可選殘差化）→ PLS（可選 CCA）→ 結構共變網路
pub struct MultivariatePipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: MultivariateConfig,
}

pub struct NetworkOutcome {
    pub correlation: LabeledMatrix,
    pub edges: Vec<EdgeRow>,
    pub graph: Graph,
    pub partition: Partition,
    pub nodes: Vec<NodeMetricRow>,
    pub global: GlobalMetrics,
}

pub struct MultivariateOutcome {
    /// 分析所用的原始資料列號
    pub rows: Vec<usize>,
    pub pls: MultivariateResult,
    pub cca: Option<MultivariateResult>,
    pub network: NetworkOutcome,
}

impl<S: Storage> MultivariatePipeline<S> {
    pub fn new(storage: S, config: MultivariateConfig) -> Self {
        Self { storage, config }
    }

    fn network(&self, roi_block: &Block) -> Result<NetworkOutcome> {
        tracing::info!("🕸️ Computing structural covariance matrix and FDR-pruned edges");
        let columns: Vec<Vec<f64>> = (0..roi_block.data.ncols())
            .map(|j| roi_block.data.column(j).iter().copied().collect())
            .collect();
        let n = roi_block.data.nrows();
        let correlation = structural_covariance(&roi_block.names, &columns);
        let edges = fdr_edges(&correlation, n, self.config.alpha);
        let graph = build_graph(&roi_block.names, &edges)?;
        let partition = detect_communities(&graph);
        let nodes = node_metrics(&graph, &partition);
        let global = global_metrics(&graph, &partition);
        tracing::info!(
            "🕸️ Network: {} nodes, {} edges kept (FDR < {}), {} communities ({}), Q={:.3}",
            global.n_nodes,
            global.n_edges,
            self.config.alpha,
            global.n_communities,
            global.community_method,
            global.modularity
        );
        Ok(NetworkOutcome {
            correlation,
            edges,
            graph,
            partition,
            nodes,
            global,
        })
    }
}

impl<S: Storage> Analysis for MultivariatePipeline<S> {
    type Input = Dataset;
    type Output = MultivariateOutcome;

    fn name(&self) -> &str {
        "multivariate"
    }

    fn load(&self) -> Result<Dataset> {
        tracing::info!("📂 Loading data from {}", self.config.data);
        let dataset = Dataset::from_path(&self.config.data)?;
        let mut needed = self.config.rois.clone();
        needed.extend(self.config.items.iter().cloned());
        needed.extend(self.config.covars.iter().cloned());
        dataset.require_columns(&needed)?;
        tracing::info!("📊 Loaded {} rows", dataset.n_rows());
        Ok(dataset)
    }

    fn analyze(&self, mut dataset: Dataset) -> Result<MultivariateOutcome> {
        let config = &self.config;

        if config.residualize_active() {
            tracing::info!(
                "🧹 Residualizing {} ROIs by covars={:?}",
                config.rois.len(),
                config.covars
            );
            for column in residualize_columns(&dataset, &config.rois, &config.covars)? {
                dataset.set_numeric(&column.name, column.values)?;
            }
        } else if config.residualize {
            tracing::warn!("⚠️ --residualize ignored because no covariates were given");
        }

        let mut needed = config.rois.clone();
        needed.extend(config.items.iter().cloned());
        let rows = dataset.complete_cases(&needed)?;
        tracing::info!("📊 {} complete cases for ROIs and items", rows.len());
        if rows.len() < 3 {
            return Err(AnalysisError::InsufficientDataError {
                context: "multivariate analysis".to_string(),
                available: rows.len(),
                required: 3,
            });
        }

        let x = Block::from_dataset(&dataset, &config.rois, &rows)?;
        let y = Block::from_dataset(&dataset, &config.items, &rows)?;

        tracing::info!("🔗 Running PLS...");
        let pls = run_pls(&x, &y, config.n_components, config.n_perm, self.config.seed())?;
        tracing::info!("🔗 PLS r={:.3}, p={:.3}", pls.r(), pls.p_value);

        let cca = if config.do_cca {
            tracing::info!("🔗 Running CCA...");
            let cca = run_cca(&x, &y, config.n_components, config.n_perm, self.config.seed())?;
            tracing::info!("🔗 CCA r={:.3}, p={:.3}", cca.r(), cca.p_value);
            Some(cca)
        } else {
            None
        };

        let network = self.network(&x)?;

        Ok(MultivariateOutcome {
            rows,
            pls,
            cca,
            network,
        })
    }

    fn write(&self, outcome: MultivariateOutcome) -> Result<AnalysisOutput> {
        let mut output = AnalysisOutput::default();

        for file in write_outputs(&self.storage, "PLS", &outcome.pls, &outcome.rows)? {
            output.push(file);
        }
        if let Some(cca) = &outcome.cca {
            for file in write_outputs(&self.storage, "CCA", cca, &outcome.rows)? {
                output.push(file);
            }
        }

        let network = &outcome.network;
        self.storage
            .write_file(ROI_CORR_FILE, &matrix_to_csv(&network.correlation)?)?;
        output.push(ROI_CORR_FILE);
        write_figure(
            &self.storage,
            &mut output,
            CORR_HEATMAP_FILE,
            plot_corr_heatmap(&network.correlation, "ROI structural covariance (Pearson r)"),
        )?;

        output.push(write_rows(&self.storage, EDGES_FILE, &network.edges)?);
        write_figure(
            &self.storage,
            &mut output,
            GRAPH_FILE,
            plot_graph(&network.graph, &network.partition, "Structural covariance network"),
        )?;
        output.push(write_rows(&self.storage, NODE_METRICS_FILE, &network.nodes)?);
        output.push(write_rows(
            &self.storage,
            GLOBAL_METRICS_FILE,
            std::slice::from_ref(&network.global),
        )?);

        Ok(output)
    }
}
