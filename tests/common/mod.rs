use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// 模擬的 TEPS 型資料：三對腦區、兩個行為結果、三個題項、年齡、性別與施測地點
///
/// `lnacc`/`rnacc` 的不對稱與 `tepsconsum` 相關；所有題項共享同一個潛在因子。
pub fn write_teps_like_csv(dir: &Path, n: usize) -> PathBuf {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut csv = String::from(
        "id,age,gender,site,lcaud,rcaud,lnacc,rnacc,lput,rput,tepsconsum,tepsantic,item1,item2,item3\n",
    );

    for i in 0..n {
        let mut noise = |scale: f64| (rng.gen::<f64>() - 0.5) * 2.0 * scale;
        let age = 20.0 + (i % 40) as f64 + noise(0.5);
        let gender = (i % 2) as f64 + 1.0;
        let site = if i % 3 == 0 { "A" } else { "B" };
        let latent = noise(1.0);
        let lateral = noise(1.0);

        let lcaud = 40.0 + 0.1 * age + 2.0 * latent + noise(1.0);
        let rcaud = 40.0 + 0.1 * age + 2.0 * latent + noise(1.0);
        let lnacc = 10.0 + 0.05 * age + 1.0 * lateral + latent + noise(0.3);
        let rnacc = 10.0 + 0.05 * age - 1.0 * lateral + latent + noise(0.3);
        let lput = 50.0 - 0.1 * age + 1.5 * latent + noise(1.0);
        let rput = 50.0 - 0.1 * age + 1.5 * latent + noise(1.0);
        let tepsconsum = 3.0 + 1.5 * lateral + noise(0.5);
        let tepsantic = 3.0 + noise(1.0);
        let item1 = 2.0 * latent + noise(0.5);
        let item2 = 1.5 * latent + noise(0.5);
        let item3 = -latent + noise(0.5);

        // 第 5 列缺少結果變項
        let consum = if i == 5 {
            "NA".to_string()
        } else {
            format!("{:.4}", tepsconsum)
        };
        writeln!(
            csv,
            "{},{:.2},{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{},{:.4},{:.4},{:.4},{:.4}",
            i + 1,
            age,
            gender,
            site,
            lcaud,
            rcaud,
            lnacc,
            rnacc,
            lput,
            rput,
            consum,
            tepsantic,
            item1,
            item2,
            item3
        )
        .unwrap();
    }

    let path = dir.join("TEPSData.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().iter().map(|h| h.to_string()).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(|v| v.to_string()).collect())
        .collect();
    (headers, rows)
}

pub fn column_index(headers: &[String], name: &str) -> usize {
    headers
        .iter()
        .position(|h| h == name)
        .unwrap_or_else(|| panic!("missing column {}", name))
}
