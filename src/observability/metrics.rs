//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_notifications_total` (counter): change events by scope, kind
//! - `config_write_tasks_total` (counter): write tasks by task, outcome
//! - `config_installs_total` (counter): snapshots installed, by changed
//! - `config_bootstrap_total` (counter): bootstrap attempts by role, result
//! - `config_snapshot_saves_total` (counter): local snapshot writes
//! - `config_snapshot_failures_total` (counter): failed local snapshot writes

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::datastore::Scope;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_notification(scope: Scope, kind: &'static str) {
    counter!("config_notifications_total", "scope" => scope.to_string(), "kind" => kind)
        .increment(1);
}

pub fn record_write_task(task: &'static str, outcome: &'static str) {
    counter!("config_write_tasks_total", "task" => task, "outcome" => outcome).increment(1);
}

pub fn record_config_installed(changed: bool) {
    let changed = if changed { "true" } else { "false" };
    counter!("config_installs_total", "changed" => changed).increment(1);
}

pub fn record_bootstrap(role: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("config_bootstrap_total", "role" => role, "result" => result).increment(1);
}

pub fn record_snapshot_saved() {
    counter!("config_snapshot_saves_total").increment(1);
}

pub fn record_snapshot_failure() {
    counter!("config_snapshot_failures_total").increment(1);
}
