use crate::core::{Analysis, AnalysisOutput};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// 依序執行 load → analyze → write，並在每個階段記錄資源使用
pub struct AnalysisEngine<A: Analysis> {
    analysis: A,
    monitor: SystemMonitor,
}

impl<A: Analysis> AnalysisEngine<A> {
    pub fn new(analysis: A) -> Self {
        Self::new_with_monitoring(analysis, false)
    }

    pub fn new_with_monitoring(analysis: A, monitor_enabled: bool) -> Self {
        Self {
            analysis,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    pub fn run(&mut self) -> Result<AnalysisOutput> {
        let name = self.analysis.name().to_string();
        tracing::info!("🚀 Starting {} analysis", name);
        self.monitor.log_stats("Start");

        tracing::info!("📥 Loading data...");
        let input = self.analysis.load()?;
        self.monitor.log_stats("Load");

        tracing::info!("🧮 Running {} computations...", name);
        let output = self.analysis.analyze(input)?;
        self.monitor.log_stats("Analyze");

        tracing::info!("💾 Writing outputs...");
        let written = self.analysis.write(output)?;
        self.monitor.log_stats("Write");

        tracing::info!("✅ {} finished: {} files written", name, written.files.len());
        self.monitor.log_final_stats();
        Ok(written)
    }
}
