pub mod postgres_account_repository;

pub use postgres_account_repository::PostgresAccountRepository;
