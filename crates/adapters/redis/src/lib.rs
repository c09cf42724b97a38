//! mailroom-adapter-redis - Redis 适配器
//!
//! 基于 Redis Stream 的任务队列

mod connection;
mod queue;
mod stream;

pub use connection::*;
pub use queue::*;
pub use stream::*;
