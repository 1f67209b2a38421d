use crate::util::parse_flag;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEBUG_PAYLOAD_ENV: &str = "ALWAYSCHAT_DEBUG_PAYLOAD";
const LOG_PATH_ENV: &str = "ALWAYSCHAT_LOG_PATH";
const DEFAULT_FILTER: &str = "warn";

/// Installs the global `tracing` subscriber.
///
/// Honors `RUST_LOG` for filtering. When `ALWAYSCHAT_LOG_PATH` is set, output
/// is appended to that file so it does not interleave with streamed replies.
pub fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match resolve_log_path() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open log file '{path}'"))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
        }
    }

    Ok(())
}

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(url = request_url, payload = %formatted_payload, "outgoing request payload");
}

pub fn emit_frame_parse_error(json_data: &str, parse_error: &serde_json::Error) {
    tracing::warn!(error = %parse_error, data = json_data, "skipping unparseable stream frame");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
