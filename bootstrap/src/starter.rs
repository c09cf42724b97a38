//! 服务启动器

use std::future::Future;

use mailroom_config::AppConfig;
use mailroom_errors::AppResult;
use mailroom_telemetry::init_metrics;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::infrastructure::Infrastructure;
use crate::runtime::{init_runtime, shutdown_signal};

/// 运行后台服务
///
/// 1. 加载配置
/// 2. 初始化日志和 Prometheus 端点
/// 3. 创建基础设施（带重试）
/// 4. 调用 `service`，收到关闭信号时取消传入的 token
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     mailroom_bootstrap::run("config", |infra, shutdown| async move {
///         Worker::new(infra.redis_connection_manager()).run(shutdown).await
///     })
///     .await
/// }
/// ```
pub async fn run<F, Fut>(config_dir: &str, service: F) -> anyhow::Result<()>
where
    F: FnOnce(Infrastructure, CancellationToken) -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    let config = AppConfig::load(config_dir)?;
    init_runtime(&config);

    if let Some(addr) = &config.telemetry.metrics_addr {
        init_metrics(addr)?;
    }

    info!("Starting {} service", config.app_name);
    let infra = Infrastructure::from_config(config).await?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    service(infra, shutdown).await?;

    info!("Service stopped");
    Ok(())
}
