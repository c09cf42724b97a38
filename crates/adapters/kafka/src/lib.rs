//! mailroom-adapter-kafka - Kafka 适配器
//!
//! 事件总线消费端：手动提交 offset，失败重试后写入 DLQ

mod consumer;

pub use consumer::*;
