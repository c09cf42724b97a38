//! mailroom-ports - 抽象 trait 层
//!
//! 定义对象存储和任务队列的抽象接口

mod storage;
mod task_queue;

pub use storage::*;
pub use task_queue::*;
