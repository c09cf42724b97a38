pub mod postgres_delivery_repository;
pub mod postgres_mail_outbox_store;
pub mod postgres_mail_repository;

pub use postgres_delivery_repository::PostgresDeliveryRepository;
pub use postgres_mail_outbox_store::PostgresMailOutboxStore;
pub use postgres_mail_repository::PostgresMailRepository;
