//! mailroom-telemetry - 可观测性库

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 任务终态计数，标签 `outcome`
pub const MAIL_JOBS_TOTAL: &str = "mail_jobs_total";
/// 批次发送计数，标签 `status`
pub const MAIL_BATCHES_TOTAL: &str = "mail_batches_total";
/// 入队失败计数
pub const MAIL_ENQUEUE_FAILURES_TOTAL: &str = "mail_enqueue_failures_total";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid metrics address {0}")]
    InvalidAddress(String),

    #[error("Failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 启动 Prometheus 抓取端点并注册指标说明
///
/// 需要在 tokio runtime 内调用
pub fn init_metrics(addr: &str) -> Result<(), TelemetryError> {
    let socket: SocketAddr = addr
        .parse()
        .map_err(|_| TelemetryError::InvalidAddress(addr.to_string()))?;

    PrometheusBuilder::new()
        .with_http_listener(socket)
        .install()
        .map_err(|e| TelemetryError::Install(e.to_string()))?;

    describe_metrics();
    info!(%socket, "Prometheus exporter listening");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(MAIL_JOBS_TOTAL, "Send jobs by terminal outcome");
    metrics::describe_counter!(MAIL_BATCHES_TOTAL, "Recipient batches by provider result");
    metrics::describe_counter!(
        MAIL_ENQUEUE_FAILURES_TOTAL,
        "Send requests persisted but not accepted by the task broker"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_metrics_address() {
        let err = init_metrics("not-an-address").unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidAddress(_)));
    }
}
