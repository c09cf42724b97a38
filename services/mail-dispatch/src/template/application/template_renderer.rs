//! 模板渲染
//!
//! 先查本地缓存，未命中时从远端存储拉取并写入缓存。
//! 每次渲染产出两份结果：真实正文和敏感值被星号替换的日志副本。

use std::collections::BTreeMap;
use std::sync::Arc;

use mailroom_adapter_email::TemplateEngine;
use mailroom_common::utils::mask;
use mailroom_errors::{AppError, AppResult};
use mailroom_ports::ObjectStorage;
use tracing::{debug, warn};

use crate::template::domain::entities::MailTemplate;
use crate::template::domain::repositories::{TemplateFilter, TemplateRepository};

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// 发送给收件人的正文
    pub message: String,
    /// 可写入日志的脱敏正文
    pub redacted_message: String,
}

pub struct TemplateRenderer {
    templates: Arc<dyn TemplateRepository>,
    remote: Arc<dyn ObjectStorage>,
    cache: Arc<dyn ObjectStorage>,
    engine: TemplateEngine,
}

impl TemplateRenderer {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        remote: Arc<dyn ObjectStorage>,
        cache: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            templates,
            remote,
            cache,
            engine: TemplateEngine::default(),
        }
    }

    /// 本地缓存中的对象 key
    pub fn cache_key(storage_reference: &str) -> String {
        format!("templates/{}", storage_reference)
    }

    /// 按条件查找模板
    pub async fn resolve(&self, filter: &TemplateFilter) -> AppResult<MailTemplate> {
        self.templates
            .find(filter)
            .await?
            .ok_or_else(|| AppError::not_found("Template not found"))
    }

    /// 渲染模板，只有模板声明为敏感且在 keywords 中出现的值会被脱敏
    pub async fn render(
        &self,
        template: &MailTemplate,
        keywords: &BTreeMap<String, String>,
    ) -> AppResult<RenderedMessage> {
        let source = self.load_source(template).await?;
        let message = self.engine.render(&source, keywords)?;

        let redacted: BTreeMap<String, String> = keywords
            .iter()
            .map(|(key, value)| {
                let value = if template.is_sensitive(key) {
                    mask(value)
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect();
        let redacted_message = self.engine.render(&source, &redacted)?;

        Ok(RenderedMessage {
            message,
            redacted_message,
        })
    }

    async fn load_source(&self, template: &MailTemplate) -> AppResult<String> {
        let reference = template.storage_reference.as_deref().ok_or_else(|| {
            AppError::template_render(format!("Template {} has no content", template.id))
        })?;

        let bytes = match self.cached(template).await {
            Some(bytes) => bytes,
            None => self.fetch_remote(template, reference).await?,
        };

        String::from_utf8(bytes)
            .map_err(|_| AppError::template_render(format!("Template {} is not valid UTF-8", template.id)))
    }

    async fn cached(&self, template: &MailTemplate) -> Option<Vec<u8>> {
        let cache_id = template.cache_id.as_deref()?;
        match self.cache.exists(cache_id).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(template_id = %template.id, error = %e, "Template cache unavailable");
                return None;
            }
        }

        match self.cache.open(cache_id).await {
            Ok(bytes) => {
                debug!(template_id = %template.id, "Template cache hit");
                Some(bytes)
            }
            Err(e) => {
                warn!(template_id = %template.id, error = %e, "Failed to read cached template");
                None
            }
        }
    }

    async fn fetch_remote(&self, template: &MailTemplate, reference: &str) -> AppResult<Vec<u8>> {
        let bytes = self.remote.open(reference).await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::template_render(format!(
                "Content of template {} is missing from storage",
                template.id
            )),
            other => other,
        })?;

        let cache_key = Self::cache_key(reference);
        if let Err(e) = self.cache.save(&cache_key, &bytes).await {
            warn!(template_id = %template.id, error = %e, "Failed to cache template");
            return Ok(bytes);
        }

        match self.templates.set_cache_id(&template.id, reference, &cache_key).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(template_id = %template.id, "Template changed during fetch, cache id not recorded");
            }
            Err(e) => {
                warn!(template_id = %template.id, error = %e, "Failed to record template cache id");
            }
        }

        debug!(template_id = %template.id, "Template fetched from remote storage");
        Ok(bytes)
    }
}
