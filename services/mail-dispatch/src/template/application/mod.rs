pub mod commands;
pub mod template_renderer;
pub mod template_service;

pub use commands::{AddTemplateCommand, TemplateFile, UpdateTemplateCommand};
pub use template_renderer::{RenderedMessage, TemplateRenderer};
pub use template_service::TemplateService;
