use anyhow::Context;

use crate::stats::DashboardStats;

const HEADER: [&str; 5] = ["sn", "test_case", "keyword", "error", "line"];

pub fn write_csv(path: &str, stats: &DashboardStats) -> anyhow::Result<()> {
    let wtr = csv::Writer::from_path(path).with_context(|| format!("create {}", path))?;
    write_rows(wtr, stats).with_context(|| format!("write {}", path))
}

pub fn write_tsv(path: &str, stats: &DashboardStats) -> anyhow::Result<()> {
    let wtr = csv::WriterBuilder::new().delimiter(b'\t').from_path(path).with_context(|| format!("create {}", path))?;
    write_rows(wtr, stats).with_context(|| format!("write {}", path))
}

fn write_rows<W: std::io::Write>(mut wtr: csv::Writer<W>, stats: &DashboardStats) -> anyhow::Result<()> {
    wtr.write_record(HEADER)?;
    for (i, f) in stats.failures.iter().enumerate() {
        let err = f.error_message.as_deref().unwrap_or(crate::rules::UNKNOWN_ERROR);
        wtr.write_record([(i + 1).to_string(), f.test_case_name.clone(), f.keyword_name.clone(), err.to_string(), (f.start_line + 1).to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json(path: &str, stats: &DashboardStats) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(stats)?;
    std::fs::write(path, data).with_context(|| format!("write {}", path))
}
