//! 模板命令

use crate::template::domain::entities::Placeholder;

/// 上传的模板文件
#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// 新建模板
#[derive(Debug, Clone)]
pub struct AddTemplateCommand {
    pub name: String,
    pub file: Option<TemplateFile>,
    pub placeholders: Vec<Placeholder>,
}

/// 更新模板，未提供的字段保持不变
#[derive(Debug, Clone, Default)]
pub struct UpdateTemplateCommand {
    pub name: Option<String>,
    pub file: Option<TemplateFile>,
}
