mod common;

use anyhow::Result;
use clap::Parser;
use neurostat::app::runner;
use neurostat::core::manifest::MANIFEST_FILE_NAME;
use neurostat::{AnalysisEngine, FollowupArgs, FollowupPipeline, LocalStorage};
use tempfile::TempDir;

use common::{column_index, read_csv, write_teps_like_csv};

fn run(data: &str, outdir: &str, extra: &[&str]) -> Result<neurostat::core::AnalysisOutput> {
    let mut argv = vec![
        "run-followups",
        "--data",
        data,
        "--outdir",
        outdir,
        "--n-perm",
        "499",
        "--n-boot",
        "499",
    ];
    argv.extend_from_slice(extra);
    let config = FollowupArgs::parse_from(argv).resolve()?;
    let pipeline = FollowupPipeline::new(LocalStorage::new(&config.outdir), config.clone());
    Ok(AnalysisEngine::new(pipeline).run()?)
}

#[test]
fn test_followup_summary_and_grouped_scatter() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_teps_like_csv(temp_dir.path(), 80);
    let outdir = temp_dir.path().join("fu");
    let output = run(
        data.to_str().unwrap(),
        outdir.to_str().unwrap(),
        &["--x", "lnacc", "--y", "tepsconsum", "--group", "site"],
    )?;
    assert_eq!(output.files, vec!["Followup_Summary.csv", "Scatter_with_OLS.svg"]);

    let (headers, rows) = read_csv(&outdir.join("Followup_Summary.csv"));
    assert_eq!(rows.len(), 1);
    let get = |name: &str| -> f64 { rows[0][column_index(&headers, name)].parse().unwrap() };

    // 第 5 列的 tepsconsum 為 NA
    assert_eq!(get("N"), 79.0);
    assert!(get("r_obs") > 0.0);
    let p = get("p_perm");
    assert!(p > 0.0 && p <= 1.0);
    let beta = get("beta_OLS");
    assert!(get("boot_CI_low") <= beta && beta <= get("boot_CI_high"));
    for column in ["beta_Huber", "beta_TheilSen", "beta_RANSAC", "spearman_rho", "kendall_tau"] {
        assert!(get(column) > 0.0, "{} should be positive", column);
    }

    let svg = std::fs::read_to_string(outdir.join("Scatter_with_OLS.svg"))?;
    assert!(svg.contains("site=A"));
    assert!(svg.contains("site=B"));
    Ok(())
}

#[test]
fn test_no_complete_cases_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = temp_dir.path().join("empty.csv");
    std::fs::write(&data, "x,y\n1,NA\n2,\n3,nan\n")?;
    let outdir = temp_dir.path().join("fu");

    let output = run(
        data.to_str().unwrap(),
        outdir.to_str().unwrap(),
        &["--x", "x", "--y", "y"],
    )?;
    assert!(output.files.is_empty());
    assert!(!outdir.join("Followup_Summary.csv").exists());
    Ok(())
}

#[test]
fn test_runner_skips_manifest_without_outputs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = temp_dir.path().join("empty.csv");
    std::fs::write(&data, "x,y\n1,NA\n2,\n3,nan\n")?;
    let outdir = temp_dir.path().join("fu");
    std::fs::create_dir_all(&outdir)?;

    let config = FollowupArgs::parse_from([
        "run-followups",
        "--data",
        data.to_str().unwrap(),
        "--outdir",
        outdir.to_str().unwrap(),
        "--x",
        "x",
        "--y",
        "y",
        "--archive",
    ])
    .resolve()?;
    let pipeline = FollowupPipeline::new(LocalStorage::new(&config.outdir), config.clone());
    let output = runner::execute("followups", &config, &config.run, pipeline)?;

    assert!(output.files.is_empty());
    assert!(!outdir.join(MANIFEST_FILE_NAME).exists());
    assert!(!outdir.join("followups_outputs.zip").exists());
    Ok(())
}
