// src/utils/logbook.rs
use anyhow::{Context, Result};
use serde_json::Value;
use std::{fs, io::Write, path::Path};

/// Append one `{"timestamp", "event", "data"}` line to a JSONL logbook,
/// creating parent directories on first use. The line and its newline go
/// out in a single append write so concurrent writers never interleave.
pub fn emit_event(log_path: &Path, event: &str, data: Value, ts: &str) -> Result<()> {
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create_dir_all({:?})", dir))?;
    }
    let line = serde_json::json!({
        "timestamp": ts,
        "event": event,
        "data": data
    });
    let mut buf = serde_json::to_string(&line)?;
    buf.push('\n');
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open logbook {:?}", log_path))?;
    f.write_all(buf.as_bytes())
        .with_context(|| format!("append to logbook {:?}", log_path))?;
    Ok(())
}
