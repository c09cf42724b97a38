//! 对象存储 trait 定义

use async_trait::async_trait;
use mailroom_errors::AppResult;

/// 对象存储 trait
///
/// 远端模板存储和本地缓存共用同一接口，key 为 `/` 分隔的相对路径
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// 保存对象，返回可访问的 URL
    async fn save(&self, key: &str, bytes: &[u8]) -> AppResult<String>;

    /// 读取对象全部内容，不存在时返回 NotFound
    async fn open(&self, key: &str) -> AppResult<Vec<u8>>;

    /// 检查对象是否存在
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// 删除对象，不存在时忽略
    async fn delete(&self, key: &str) -> AppResult<()>;
}
