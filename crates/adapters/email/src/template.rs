//! 邮件模板渲染
//!
//! 严格模式：模板中引用了未提供的变量即渲染失败

use std::collections::BTreeMap;
use std::error::Error as _;

use mailroom_errors::{AppError, AppResult};
use tera::{Context, Tera};

/// 模板引擎，输出中的变量值按 HTML 转义
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    /// 渲染一次性模板源码
    pub fn render(&self, source: &str, keywords: &BTreeMap<String, String>) -> AppResult<String> {
        let mut context = Context::new();
        for (key, value) in keywords {
            context.insert(key.as_str(), value);
        }

        Tera::one_off(source, &context, true)
            .map_err(|e| AppError::template_render(describe(&e)))
    }
}

/// tera 的顶层错误信息很笼统，拼上底层原因
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
