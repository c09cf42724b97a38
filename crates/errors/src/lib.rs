//! mailroom-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PROBLEM_BASE: &str = "https://mailroom.dev/problems";

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    /// 任务队列不可用（记录已落库，需要补发）
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// 加解密失败
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// 模板渲染失败
    #[error("Template render error: {0}")]
    TemplateRender(String),

    /// 邮件服务商拒绝或网络错误
    #[error("Provider send error: {0}")]
    ProviderSend(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn broker_unavailable(msg: impl Into<String>) -> Self {
        Self::BrokerUnavailable(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn template_render(msg: impl Into<String>) -> Self {
        Self::TemplateRender(msg.into())
    }

    pub fn provider_send(msg: impl Into<String>) -> Self {
        Self::ProviderSend(msg.into())
    }

    /// 基础设施类错误，重试可能成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::BrokerUnavailable(_) | Self::ExternalService(_) | Self::Internal(_)
        )
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
            Self::Database(_) => 500,
            Self::ExternalService(_) => 502,
            Self::BrokerUnavailable(_) => 503,
            Self::Crypto(_) => 500,
            Self::TemplateRender(_) => 500,
            Self::ProviderSend(_) => 502,
        }
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: format!("{PROBLEM_BASE}/{}", self.problem_slug()),
            title: self.problem_title().to_string(),
            status: self.status_code(),
            detail: self.to_string(),
            instance: None,
        }
    }

    fn problem_slug(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not-found",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
            Self::Database(_) => "database",
            Self::ExternalService(_) => "external-service",
            Self::BrokerUnavailable(_) => "broker-unavailable",
            Self::Crypto(_) => "crypto",
            Self::TemplateRender(_) => "template-render",
            Self::ProviderSend(_) => "provider-send",
        }
    }

    fn problem_title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource Not Found",
            Self::Validation(_) => "Validation Error",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::Conflict(_) => "Conflict",
            Self::Internal(_) => "Internal Server Error",
            Self::Database(_) => "Database Error",
            Self::ExternalService(_) => "External Service Error",
            Self::BrokerUnavailable(_) => "Service Unavailable",
            Self::Crypto(_) => "Internal Server Error",
            Self::TemplateRender(_) => "Template Error",
            Self::ProviderSend(_) => "Provider Error",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid JSON payload: {err}"))
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_unavailable_maps_to_503() {
        let err = AppError::broker_unavailable("redis down");
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());

        let problem = err.to_problem_details();
        assert_eq!(problem.status, 503);
        assert!(problem.r#type.ends_with("/broker-unavailable"));
        assert!(problem.detail.contains("redis down"));
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!AppError::validation("bad").is_retryable());
        assert!(!AppError::not_found("gone").is_retryable());
        assert!(!AppError::conflict("dup").is_retryable());
        assert!(!AppError::template_render("syntax").is_retryable());
    }

    #[test]
    fn test_problem_details_skips_empty_instance() {
        let json = serde_json::to_value(AppError::crypto("bad token").to_problem_details()).unwrap();
        assert!(json.get("instance").is_none());
        assert_eq!(json["status"], 500);
    }
}
