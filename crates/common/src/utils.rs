//! 通用工具函数

/// 用 `*` 逐字符遮盖敏感值，长度不变
pub fn mask(value: &str) -> String {
    "*".repeat(value.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_char_count() {
        assert_eq!(mask("123456"), "******");
        assert_eq!(mask("héllo"), "*****");
        assert_eq!(mask(""), "");
    }
}
