//! 模板应用服务

use std::path::Path;
use std::sync::Arc;

use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::{AppError, AppResult};
use mailroom_ports::ObjectStorage;
use tracing::{info, warn};

use crate::template::application::commands::{AddTemplateCommand, TemplateFile, UpdateTemplateCommand};
use crate::template::domain::entities::{MailTemplate, Placeholder, TemplateId};
use crate::template::domain::repositories::{TemplateFilter, TemplateRepository};

/// 默认模板文件大小上限
pub const DEFAULT_MAX_TEMPLATE_BYTES: usize = 5 * 1024 * 1024;

pub struct TemplateService {
    templates: Arc<dyn TemplateRepository>,
    remote: Arc<dyn ObjectStorage>,
    cache: Arc<dyn ObjectStorage>,
    max_template_bytes: usize,
}

impl TemplateService {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        remote: Arc<dyn ObjectStorage>,
        cache: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            templates,
            remote,
            cache,
            max_template_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
        }
    }

    pub fn with_max_template_bytes(mut self, max_template_bytes: usize) -> Self {
        self.max_template_bytes = max_template_bytes;
        self
    }

    /// 新建模板，同一所有者下名称唯一
    pub async fn add(&self, owner_id: UserId, command: AddTemplateCommand) -> AppResult<MailTemplate> {
        let name = validate_name(&command.name)?;
        self.ensure_name_available(owner_id, &name).await?;

        let mut template = MailTemplate::new(owner_id, name);
        template.set_placeholders(command.placeholders)?;

        if let Some(file) = &command.file {
            let reference = self.upload(&template.id, file).await?;
            template.replace_content(reference);
        }

        self.templates.create(&template).await?;

        info!(template_id = %template.id, owner_id = %owner_id, "Template added");
        Ok(template)
    }

    /// 替换占位符定义
    pub async fn set_placeholders(
        &self,
        owner_id: UserId,
        id: TemplateId,
        placeholders: Vec<Placeholder>,
    ) -> AppResult<MailTemplate> {
        let mut template = self.get(owner_id, id).await?;
        template.set_placeholders(placeholders)?;
        self.templates.update_by_id(&template).await?;

        info!(template_id = %id, count = template.placeholders.len(), "Template placeholders updated");
        Ok(template)
    }

    /// 更新名称或内容，内容变更时清除本地缓存
    pub async fn update(
        &self,
        owner_id: UserId,
        id: TemplateId,
        command: UpdateTemplateCommand,
    ) -> AppResult<MailTemplate> {
        let mut template = self.get(owner_id, id).await?;

        if let Some(name) = command.name {
            let name = validate_name(&name)?;
            if name != template.name {
                self.ensure_name_available(owner_id, &name).await?;
                template.name = name;
            }
        }

        if let Some(file) = &command.file {
            let reference = self.upload(&template.id, file).await?;
            if let Some(cache_id) = &template.cache_id {
                if let Err(e) = self.cache.delete(cache_id).await {
                    warn!(template_id = %id, error = %e, "Failed to evict cached template");
                }
            }
            template.replace_content(reference);
        }

        template.touch();
        self.templates.update_by_id(&template).await?;

        info!(template_id = %id, "Template updated");
        Ok(template)
    }

    /// 查询模板，非本人模板视为不存在
    pub async fn get(&self, owner_id: UserId, id: TemplateId) -> AppResult<MailTemplate> {
        self.templates
            .find(&TemplateFilter::by_id(owner_id, id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Template {} not found", id)))
    }

    pub async fn list(&self, owner_id: UserId, pagination: Pagination) -> AppResult<PagedResult<MailTemplate>> {
        self.templates.index(&owner_id, &pagination).await
    }

    pub async fn delete(&self, owner_id: UserId, id: TemplateId) -> AppResult<()> {
        let template = self.get(owner_id, id).await?;
        self.templates.delete_by_id(&template.id, owner_id).await?;

        info!(template_id = %id, "Template deleted");
        Ok(())
    }

    async fn ensure_name_available(&self, owner_id: UserId, name: &str) -> AppResult<()> {
        if self.templates.find(&TemplateFilter::by_name(owner_id, name)).await?.is_some() {
            return Err(AppError::conflict(format!("Template with name {} already exists", name)));
        }
        Ok(())
    }

    async fn upload(&self, id: &TemplateId, file: &TemplateFile) -> AppResult<String> {
        let file_name = validate_file(file, self.max_template_bytes)?;
        let key = format!("{}/{}", id, file_name);
        self.remote.save(&key, &file.content).await?;
        Ok(key)
    }
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Template name must not be empty"));
    }
    Ok(name.to_string())
}

/// 只接受 html 文件，返回去掉目录部分的文件名
fn validate_file(file: &TemplateFile, max_bytes: usize) -> AppResult<String> {
    let file_name = Path::new(&file.file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::validation("Template file name is invalid"))?;

    let is_html = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if !is_html {
        return Err(AppError::validation("Only .html template files are accepted"));
    }

    if file.content.len() > max_bytes {
        return Err(AppError::validation(format!(
            "Template file exceeds {} bytes",
            max_bytes
        )));
    }

    Ok(file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: usize) -> TemplateFile {
        TemplateFile {
            file_name: name.to_string(),
            content: vec![b'a'; size],
        }
    }

    #[test]
    fn test_validate_file_accepts_html() {
        assert_eq!(validate_file(&file("welcome.html", 10), 100).unwrap(), "welcome.html");
        assert_eq!(validate_file(&file("WELCOME.HTML", 10), 100).unwrap(), "WELCOME.HTML");
    }

    #[test]
    fn test_validate_file_strips_directories() {
        assert_eq!(validate_file(&file("../../etc/welcome.html", 10), 100).unwrap(), "welcome.html");
    }

    #[test]
    fn test_validate_file_rejects_other_types() {
        assert!(matches!(validate_file(&file("welcome.txt", 10), 100), Err(AppError::Validation(_))));
        assert!(matches!(validate_file(&file("welcome", 10), 100), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_file_rejects_oversized() {
        assert!(validate_file(&file("big.html", 100), 100).is_ok());
        assert!(matches!(validate_file(&file("big.html", 101), 100), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  welcome ").unwrap(), "welcome");
        assert!(validate_name("   ").is_err());
    }
}
