use std::sync::LazyLock;

use mailroom_errors::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());

/// 模板占位符
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// 变量名，仅字母、数字和下划线
    pub key: String,
    pub description: Option<String>,
    /// 敏感值在日志副本中以等长星号替换
    #[serde(default)]
    pub is_sensitive: bool,
}

impl Placeholder {
    pub fn new(key: impl Into<String>, is_sensitive: bool) -> Self {
        Self {
            key: key.into(),
            description: None,
            is_sensitive,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if KEY_PATTERN.is_match(&self.key) {
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "Placeholder key '{}' may only contain letters, digits and underscores",
                self.key
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        for key in ["otp", "user_name", "code2", "名字"] {
            assert!(Placeholder::new(key, false).validate().is_ok(), "{key}");
        }
    }

    #[test]
    fn test_invalid_keys() {
        for key in ["", "user-name", "a b", "{{x}}"] {
            assert!(Placeholder::new(key, false).validate().is_err(), "{key}");
        }
    }

    #[test]
    fn test_is_sensitive_defaults_to_false() {
        let placeholder: Placeholder = serde_json::from_str(r#"{"key":"otp","description":null}"#).unwrap();
        assert!(!placeholder.is_sensitive);
    }
}
