use clap::Parser;
use neurostat::app::runner;
use neurostat::config::FollowupConfig;
use neurostat::{FollowupArgs, FollowupPipeline, LocalStorage};

fn main() {
    let args = FollowupArgs::parse();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => std::process::exit(runner::report_config_failure(&e)),
    };

    // 初始化日誌
    if let Err(e) = runner::init_logging(&config.run, &config.outdir, env!("CARGO_CRATE_NAME")) {
        std::process::exit(runner::report_config_failure(&e));
    }

    tracing::info!("🚀 Starting run-followups");
    tracing::debug!("Resolved config: {:?}", config);
    display_config_summary(&config);

    if config.run.dry_run {
        if let Err(e) = runner::print_dry_run("followups", &config) {
            std::process::exit(runner::report_failure(&e));
        }
        return;
    }

    let storage = LocalStorage::new(&config.outdir);
    let pipeline = FollowupPipeline::new(storage, config.clone());

    match runner::execute("followups", &config, &config.run, pipeline) {
        Ok(output) => runner::report_success(&output, &config.outdir),
        Err(e) => {
            let exit_code = runner::report_failure(&e);
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

fn display_config_summary(config: &FollowupConfig) {
    println!("📋 Configuration Summary:");
    println!("  Data: {}", config.data);
    println!("  Output: {}", config.outdir);
    println!("  {} → {}", config.x, config.y);
    if let Some(group) = &config.group {
        println!("  Group: {}", group);
    }
    println!("  Permutations: {}, Bootstrap: {} (CI {})", config.n_perm, config.n_boot, config.ci);
    println!("  Seed: {}", config.run.seed);
    println!();
}
