mod common;

use anyhow::Result;
use clap::Parser;
use neurostat::app::runner;
use neurostat::core::manifest::MANIFEST_FILE_NAME;
use neurostat::{AnalysisEngine, AnalysisError, AsymmetryArgs, AsymmetryPipeline, LocalStorage};
use tempfile::TempDir;

use common::{column_index, read_csv, write_teps_like_csv};

fn args(data: &str, outdir: &str, extra: &[&str]) -> AsymmetryArgs {
    let mut argv = vec![
        "run-asymmetry",
        "--data",
        data,
        "--outdir",
        outdir,
        "--roi-pairs",
        "lcaud:rcaud",
        "lnacc:rnacc",
        "lput:rput",
        "--outcomes",
        "tepsconsum",
        "tepsantic",
        "--covars",
        "age",
        "gender",
    ];
    argv.extend_from_slice(extra);
    AsymmetryArgs::parse_from(argv)
}

/// 完整流程：AI → 線性常模偏差 → 迴歸家族 + 校正 → 圖檔
#[test]
fn test_asymmetry_workflow_writes_all_outputs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_teps_like_csv(temp_dir.path(), 80);
    let outdir = temp_dir.path().join("out");
    let config = args(data.to_str().unwrap(), outdir.to_str().unwrap(), &["--composite"]).resolve()?;

    let pipeline = AsymmetryPipeline::new(LocalStorage::new(&config.outdir), config.clone());
    let mut engine = AnalysisEngine::new(pipeline);
    let output = engine.run()?;

    for expected in [
        "Normative_Deviations.csv",
        "Normative_Fits.csv",
        "Regression_Summary_with_MCC.csv",
        "Heatmap_Asymmetry.svg",
        "Forest_Asymmetry.svg",
        "Heatmap_Deviation.svg",
        "Forest_Deviation.svg",
    ] {
        assert!(output.files.iter().any(|f| f == expected), "missing {}", expected);
        assert!(outdir.join(expected).exists());
    }

    let (headers, rows) = read_csv(&outdir.join("Regression_Summary_with_MCC.csv"));
    // 2 個結果 × (3 個 AI + 複合 AI + 6 個偏差分數)
    assert_eq!(rows.len(), 2 * (4 + 6));
    let p = column_index(&headers, "p");
    let p_fdr = column_index(&headers, "p_FDR");
    let p_bonf = column_index(&headers, "p_Bonf");
    for row in &rows {
        let raw: f64 = row[p].parse()?;
        let fdr: f64 = row[p_fdr].parse()?;
        let bonf: f64 = row[p_bonf].parse()?;
        assert!(fdr >= raw - 1e-12 && fdr <= 1.0);
        assert!(bonf >= fdr - 1e-12 && bonf <= 1.0);
    }

    // 側化與 tepsconsum 的關聯應在 FDR 後仍顯著
    let target = column_index(&headers, "Target");
    let outcome = column_index(&headers, "Outcome");
    let sig = column_index(&headers, "sig_FDR");
    let nacc = rows
        .iter()
        .find(|r| r[target] == "AI_nacc" && r[outcome] == "tepsconsum")
        .expect("AI_nacc row");
    assert_eq!(nacc[sig], "true");

    let (dev_headers, dev_rows) = read_csv(&outdir.join("Normative_Deviations.csv"));
    assert_eq!(dev_rows.len(), 80);
    assert!(dev_headers.iter().any(|h| h == "lnacc_dev"));
    Ok(())
}

#[test]
fn test_gpr_normative_workflow() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_teps_like_csv(temp_dir.path(), 60);
    let outdir = temp_dir.path().join("out");
    let config = args(
        data.to_str().unwrap(),
        outdir.to_str().unwrap(),
        &["--normative", "gpr"],
    )
    .resolve()?;

    let pipeline = AsymmetryPipeline::new(LocalStorage::new(&config.outdir), config.clone());
    let output = AnalysisEngine::new(pipeline).run()?;
    assert!(output.files.iter().any(|f| f == "Heatmap_Deviation.svg"));

    let (fit_headers, fit_rows) = read_csv(&outdir.join("Normative_Fits.csv"));
    assert_eq!(fit_rows.len(), 6);
    let model = column_index(&fit_headers, "Model");
    let length_scale = column_index(&fit_headers, "length_scale");
    for row in &fit_rows {
        assert_eq!(row[model], "gpr");
        let ls: f64 = row[length_scale].parse()?;
        assert!(ls > 0.0);
    }

    let (dev_headers, dev_rows) = read_csv(&outdir.join("Normative_Deviations.csv"));
    assert_eq!(dev_rows.len(), 60);
    let lnacc = column_index(&dev_headers, "lnacc_dev");
    for row in &dev_rows {
        let v: f64 = row[lnacc].parse()?;
        assert!(v.is_finite());
    }

    let (headers, rows) = read_csv(&outdir.join("Regression_Summary_with_MCC.csv"));
    // 2 個結果 × (3 個 AI + 6 個偏差分數)
    assert_eq!(rows.len(), 2 * (3 + 6));
    let model = column_index(&headers, "Model");
    assert!(rows.iter().any(|r| r[model] == "Deviation"));
    Ok(())
}

#[test]
fn test_normative_none_skips_deviation_family() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_teps_like_csv(temp_dir.path(), 60);
    let outdir = temp_dir.path().join("out");
    let config = args(
        data.to_str().unwrap(),
        outdir.to_str().unwrap(),
        &["--normative", "none", "--method", "difference"],
    )
    .resolve()?;

    let pipeline = AsymmetryPipeline::new(LocalStorage::new(&config.outdir), config.clone());
    let output = AnalysisEngine::new(pipeline).run()?;

    assert!(!output.files.iter().any(|f| f.starts_with("Normative")));
    let (headers, rows) = read_csv(&outdir.join("Regression_Summary_with_MCC.csv"));
    let model = column_index(&headers, "Model");
    assert!(rows.iter().all(|r| r[model] == "Asymmetry"));
    assert_eq!(rows.len(), 2 * 3);
    Ok(())
}

#[test]
fn test_missing_columns_are_all_reported() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_teps_like_csv(temp_dir.path(), 20);
    let outdir = temp_dir.path().join("out");
    let config = AsymmetryArgs::parse_from([
        "run-asymmetry",
        "--data",
        data.to_str().unwrap(),
        "--outdir",
        outdir.to_str().unwrap(),
        "--roi-pairs",
        "lamyg:ramyg",
        "--outcomes",
        "tepsconsum",
    ])
    .resolve()?;

    let pipeline = AsymmetryPipeline::new(LocalStorage::new(&config.outdir), config.clone());
    let err = AnalysisEngine::new(pipeline).run().unwrap_err();
    match &err {
        AnalysisError::MissingColumnError { columns } => {
            assert_eq!(columns, &vec!["lamyg".to_string(), "ramyg".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.exit_code(), 1);
    Ok(())
}

#[test]
fn test_runner_writes_manifest_and_archive() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_teps_like_csv(temp_dir.path(), 50);
    let outdir = temp_dir.path().join("out");
    let config = args(
        data.to_str().unwrap(),
        outdir.to_str().unwrap(),
        &["--archive", "--seed", "11"],
    )
    .resolve()?;

    let pipeline = AsymmetryPipeline::new(LocalStorage::new(&config.outdir), config.clone());
    let output = runner::execute("asymmetry", &config, &config.run, pipeline)?;

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(outdir.join(MANIFEST_FILE_NAME))?)?;
    assert_eq!(manifest["workflow"], "asymmetry");
    assert_eq!(manifest["config"]["run"]["seed"], 11);
    assert_eq!(manifest["archive"], "asymmetry_outputs.zip");
    assert_eq!(manifest["outputs"].as_array().unwrap().len(), output.files.len());

    let archive = std::fs::File::open(outdir.join("asymmetry_outputs.zip"))?;
    let zip = zip::ZipArchive::new(archive)?;
    assert_eq!(zip.len(), output.files.len());
    Ok(())
}
