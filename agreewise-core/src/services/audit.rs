//! services/audit.rs
//! Request audit logbook. Records outcomes and content hashes, never document text.
//!
//! - Writes JSONL to the configured path when `[audit] enabled = true`.
//! - Write failures are logged and swallowed; auditing never fails a request.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::AuditConfig;
use crate::utils::logbook::emit_event;

/// One handled request, as written to the logbook.
///
/// # Fields
/// - `request_id` — uuid v4 assigned by the handler.
/// - `route` — `"analyze"` or `"upload"`.
/// - `status` — status code returned to the caller.
/// - `risk_level` / `score` — present only when the scorer ran.
/// - `text_len` — characters scored (0 when rejected early).
/// - `content_hash` — blake3 of the uploaded bytes, uploads only.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord<'a> {
    pub request_id: &'a str,
    pub route: &'a str,
    pub client: &'a str,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    pub text_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct AuditLog {
    path: Option<PathBuf>,
    // Serializes appends from handler threads sharing this log.
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn from_config(cfg: &AuditConfig) -> Self {
        Self {
            path: cfg.enabled.then(|| cfg.path.clone()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn record_request(&self, record: &RequestRecord<'_>) {
        let Some(path) = &self.path else {
            return;
        };
        let data = serde_json::to_value(record).unwrap_or_else(|_| json!({}));
        let event = if record.status < 400 {
            "request_handled"
        } else {
            "request_rejected"
        };
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = emit_event(path, event, data, &Utc::now().to_rfc3339()) {
            tracing::warn!(error = %e, path = %path.display(), "audit logbook write failed");
        }
    }
}
