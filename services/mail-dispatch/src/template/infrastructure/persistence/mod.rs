pub mod postgres_template_repository;

pub use postgres_template_repository::PostgresTemplateRepository;
