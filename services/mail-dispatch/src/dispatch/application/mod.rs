pub mod commands;
pub mod dispatch_service;
pub mod listeners;
pub mod outbox;
pub mod reconciler;
pub mod send_engine;
pub mod task_dispatcher;

pub use commands::{
    SendBulkMailCommand, SendBulkTemplateMailCommand, SendMailResponse, SendSingleMailCommand,
    SendSingleTemplateMailCommand, TemplateSelector,
};
pub use dispatch_service::MailDispatchService;
pub use listeners::BulkMailEventListener;
pub use outbox::{DispatchOutbox, OutboxEntry, SendRequest};
pub use reconciler::DeliveryReconciler;
pub use send_engine::{BatchedSendEngine, SendOutcome};
pub use task_dispatcher::TaskDispatcher;
