//! 发送命令

use std::collections::BTreeMap;

use mailroom_common::UserId;
use mailroom_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::domain::entities::MailId;
use crate::template::domain::entities::TemplateId;
use crate::template::domain::repositories::TemplateFilter;

/// 发送单封邮件
#[derive(Debug, Clone, Deserialize)]
pub struct SendSingleMailCommand {
    pub sender: String,
    /// 缺省为账户的发件人名称
    #[serde(default)]
    pub name: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub text_body: Option<String>,
}

/// 按模板发送单封邮件
#[derive(Debug, Clone, Deserialize)]
pub struct SendSingleTemplateMailCommand {
    pub sender: String,
    #[serde(default)]
    pub name: Option<String>,
    pub recipient: String,
    pub subject: String,
    #[serde(flatten)]
    pub template: TemplateSelector,
    #[serde(default)]
    pub keywords: BTreeMap<String, Value>,
    #[serde(default)]
    pub text_body: Option<String>,
}

/// 群发邮件
#[derive(Debug, Clone, Deserialize)]
pub struct SendBulkMailCommand {
    pub sender: String,
    #[serde(default)]
    pub name: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub text_body: Option<String>,
}

/// 按模板群发邮件
#[derive(Debug, Clone, Deserialize)]
pub struct SendBulkTemplateMailCommand {
    pub sender: String,
    #[serde(default)]
    pub name: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
    #[serde(flatten)]
    pub template: TemplateSelector,
    #[serde(default)]
    pub keywords: BTreeMap<String, Value>,
    #[serde(default)]
    pub text_body: Option<String>,
}

/// 按 ID 或名称选择模板，同时提供时以 ID 为准
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateSelector {
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    #[serde(default)]
    pub template_name: Option<String>,
}

impl TemplateSelector {
    pub fn by_id(id: TemplateId) -> Self {
        Self {
            template_id: Some(id),
            template_name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            template_id: None,
            template_name: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.template_id.is_none() && self.template_name.is_none()
    }

    pub fn to_filter(&self, owner_id: UserId) -> AppResult<TemplateFilter> {
        match (&self.template_id, &self.template_name) {
            (Some(id), _) => Ok(TemplateFilter::by_id(owner_id, *id)),
            (None, Some(name)) => Ok(TemplateFilter::by_name(owner_id, name.clone())),
            (None, None) => Err(AppError::validation("template_id or template_name is required")),
        }
    }
}

/// 发送请求已受理
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMailResponse {
    pub id: MailId,
    pub is_success: bool,
}

/// 模板变量统一转为字符串，字符串原样保留，其余取 JSON 文本
pub fn stringify_keywords(keywords: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    keywords
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
