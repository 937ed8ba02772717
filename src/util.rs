use crate::task::Records;
use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Create a run directory and return it
pub fn create_run_dir(base: &Path) -> anyhow::Result<PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    let dir = base.join("runs").join(run_id);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {:?}", dir))?;
    Ok(dir)
}

pub fn write_artifact(dir: &Path, name: &str, content: &str) -> anyhow::Result<()> {
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

pub fn timestamp() -> String {
    // Format: YYYY-MM-DD_HH-MM-SS
    Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Persist the records of one run as `records.json` plus a `meta.json`
/// describing it; returns the run directory.
pub fn save_run(base: &Path, pipeline: &str, expressions: &[String], records: &Records) -> anyhow::Result<PathBuf> {
    let dir = create_run_dir(base)?;
    write_artifact(&dir, "records.json", &serde_json::to_string_pretty(records)?)?;
    let meta = json!({
        "pipeline": pipeline,
        "expressions": expressions,
        "records": records.len(),
        "finished_at": Utc::now().to_rfc3339(),
        "stamp": timestamp(),
    });
    write_artifact(&dir, "meta.json", &meta.to_string())?;
    Ok(dir)
}
