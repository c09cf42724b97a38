//! mailroom-adapter-storage - 文件系统对象存储
//!
//! 同时用作模板远端存储和本地缓存

mod filesystem;

pub use filesystem::*;
