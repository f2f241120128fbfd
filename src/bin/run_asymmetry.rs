use clap::Parser;
use neurostat::app::runner;
use neurostat::config::AsymmetryConfig;
use neurostat::{AsymmetryArgs, AsymmetryPipeline, LocalStorage};

fn main() {
    let args = AsymmetryArgs::parse();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => std::process::exit(runner::report_config_failure(&e)),
    };

    // 初始化日誌
    if let Err(e) = runner::init_logging(&config.run, &config.outdir, env!("CARGO_CRATE_NAME")) {
        std::process::exit(runner::report_config_failure(&e));
    }

    tracing::info!("🚀 Starting run-asymmetry");
    tracing::debug!("Resolved config: {:?}", config);
    display_config_summary(&config);

    if config.run.dry_run {
        if let Err(e) = runner::print_dry_run("asymmetry", &config) {
            std::process::exit(runner::report_failure(&e));
        }
        return;
    }

    let storage = LocalStorage::new(&config.outdir);
    let pipeline = AsymmetryPipeline::new(storage, config.clone());

    match runner::execute("asymmetry", &config, &config.run, pipeline) {
        Ok(output) => runner::report_success(&output, &config.outdir),
        Err(e) => {
            let exit_code = runner::report_failure(&e);
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

fn display_config_summary(config: &AsymmetryConfig) {
    println!("📋 Configuration Summary:");
    println!("  Data: {}", config.data);
    println!("  Output: {}", config.outdir);
    println!("  ROI pairs: {}", config.roi_pairs.join(" "));
    println!("  Outcomes: {}", config.outcomes.join(", "));
    if !config.covars.is_empty() {
        println!("  Covariates: {}", config.covars.join(", "));
    }
    println!("  Method: {:?}, Normative: {:?}", config.method, config.normative);
    println!("  Composite AI: {}", config.composite);
    println!("  Alpha: {}", config.alpha);
    println!();
}
