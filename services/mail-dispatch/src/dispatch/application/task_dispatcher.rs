//! 任务投递

use std::sync::Arc;

use mailroom_errors::{AppError, AppResult};
use mailroom_ports::TaskQueue;
use mailroom_telemetry::MAIL_ENQUEUE_FAILURES_TOTAL;
use tracing::{error, info};

use crate::dispatch::domain::entities::SendMailJob;

pub struct TaskDispatcher {
    queue: Arc<dyn TaskQueue>,
    stream: String,
}

impl TaskDispatcher {
    pub fn new(queue: Arc<dyn TaskQueue>, stream: impl Into<String>) -> Self {
        Self {
            queue,
            stream: stream.into(),
        }
    }

    /// 投递发送任务，broker 不可用时返回 BrokerUnavailable
    pub async fn enqueue(&self, job: &SendMailJob) -> AppResult<String> {
        let payload = job.to_payload()?;

        match self.queue.enqueue(&self.stream, &payload).await {
            Ok(message_id) => {
                info!(
                    job_id = %job.job_id,
                    delivery_id = %job.mail_record.delivery_id,
                    message_id = %message_id,
                    "Send job enqueued"
                );
                Ok(message_id)
            }
            Err(e) => {
                metrics::counter!(MAIL_ENQUEUE_FAILURES_TOTAL).increment(1);
                error!(
                    job_id = %job.job_id,
                    delivery_id = %job.mail_record.delivery_id,
                    error = %e,
                    "Failed to enqueue send job"
                );
                Err(match e {
                    AppError::BrokerUnavailable(msg) => AppError::BrokerUnavailable(msg),
                    other => AppError::broker_unavailable(other.to_string()),
                })
            }
        }
    }
}
