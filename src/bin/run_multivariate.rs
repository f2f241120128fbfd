use clap::Parser;
use neurostat::app::runner;
use neurostat::config::MultivariateConfig;
use neurostat::{LocalStorage, MultivariateArgs, MultivariatePipeline};

fn main() {
    let args = MultivariateArgs::parse();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => std::process::exit(runner::report_config_failure(&e)),
    };

    // 初始化日誌
    if let Err(e) = runner::init_logging(&config.run, &config.outdir, env!("CARGO_CRATE_NAME")) {
        std::process::exit(runner::report_config_failure(&e));
    }

    tracing::info!("🚀 Starting run-multivariate");
    tracing::debug!("Resolved config: {:?}", config);
    display_config_summary(&config);

    if config.run.dry_run {
        if let Err(e) = runner::print_dry_run("multivariate", &config) {
            std::process::exit(runner::report_failure(&e));
        }
        return;
    }

    let storage = LocalStorage::new(&config.outdir);
    let pipeline = MultivariatePipeline::new(storage, config.clone());

    match runner::execute("multivariate", &config, &config.run, pipeline) {
        Ok(output) => runner::report_success(&output, &config.outdir),
        Err(e) => {
            let exit_code = runner::report_failure(&e);
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

fn display_config_summary(config: &MultivariateConfig) {
    println!("📋 Configuration Summary:");
    println!("  Data: {}", config.data);
    println!("  Output: {}", config.outdir);
    println!("  ROIs ({}): {}", config.rois.len(), config.rois.join(", "));
    println!("  Items ({}): {}", config.items.len(), config.items.join(", "));
    if config.residualize_active() {
        println!("  Residualized by: {}", config.covars.join(", "));
    }
    println!("  CCA: {}", config.do_cca);
    println!("  Permutations: {} (seed {})", config.n_perm, config.run.seed);
    println!();
}
