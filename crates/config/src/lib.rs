//! mailroom-config - 配置加载库
//!
//! 加载顺序：`default.toml` → `{APP_ENV}.toml` → `MAILROOM_` 前缀环境变量（`__` 分隔层级）

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 迁移脚本目录，设置后启动时自动执行
    #[serde(default)]
    pub migrations_dir: Option<String>,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Redis 配置（任务队列）
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

/// Kafka 配置（事件总线消费端）
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    pub topic: String,
    #[serde(default)]
    pub dlq_topic: Option<String>,
    #[serde(default = "default_kafka_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub security_protocol: Option<String>,
    #[serde(default)]
    pub sasl_mechanism: Option<String>,
    #[serde(default)]
    pub sasl_username: Option<String>,
    #[serde(default)]
    pub sasl_password: Option<Secret<String>>,
}

fn default_kafka_max_retries() -> u32 {
    3
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus 抓取地址，例如 `0.0.0.0:9100`
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SMTP 服务商配置
///
/// 账号和密码来自邮件账户本身，这里只描述服务器
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub starttls: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_provider_name")]
    pub provider_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_provider_name() -> String {
    "QuantumMailServer".to_string()
}

/// 发送调度配置
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_stream")]
    pub stream: String,
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_block_ms")]
    pub block_ms: usize,
    /// 超过该空闲时长的 pending 任务会被其他 worker 认领
    #[serde(default = "default_claim_idle_ms")]
    pub claim_idle_ms: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            stream: default_stream(),
            consumer_group: default_consumer_group(),
            worker_concurrency: default_worker_concurrency(),
            block_ms: default_block_ms(),
            claim_idle_ms: default_claim_idle_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_stream() -> String {
    "mail:jobs".to_string()
}

fn default_consumer_group() -> String {
    "mail-dispatch".to_string()
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_block_ms() -> usize {
    5000
}

fn default_claim_idle_ms() -> usize {
    300_000
}

/// 凭据加密配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultConfig {
    /// 服务端密钥；未设置时退化为仅由地址派生密钥（兼容旧数据）
    #[serde(default)]
    pub secret: Option<Secret<String>>,
}

/// 模板存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub remote_root: String,
    pub cache_root: String,
    #[serde(default = "default_max_template_bytes")]
    pub max_template_bytes: usize,
}

fn default_max_template_bytes() -> usize {
    5 * 1024 * 1024
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    pub storage: StorageConfig,
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());
        Self::from_figment(Self::figment(config_dir, &env))
    }

    /// 构建配置源
    pub fn figment(config_dir: &str, env: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("MAILROOM_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.batch_size == 0 {
            return Err(ConfigError::Invalid("dispatch.batch_size must be > 0".into()));
        }
        if self.dispatch.worker_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.worker_concurrency must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}
