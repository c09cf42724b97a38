mod support;

use std::sync::Arc;

use mail_dispatch::account::application::{AccountService, RegisterAccountCommand, UpdateAccountCommand};
use mail_dispatch::account::domain::services::CredentialVault;
use mailroom_common::{Pagination, UserId};
use mailroom_errors::AppError;
use secrecy::{ExposeSecret, Secret};
use support::InMemoryStore;

fn service() -> (AccountService, Arc<CredentialVault>) {
    let vault = Arc::new(CredentialVault::new(None));
    (AccountService::new(InMemoryStore::new(), vault.clone()), vault)
}

fn register(address: &str) -> RegisterAccountCommand {
    RegisterAccountCommand {
        address: address.to_string(),
        display_name: "Billing".to_string(),
        password: Secret::new("app-password".to_string()),
        is_default: false,
    }
}

#[tokio::test]
async fn test_register_stores_encrypted_password() {
    let (service, vault) = service();
    let owner = UserId::new();

    let account = service.register(owner, register("billing@example.com")).await.unwrap();

    assert_ne!(account.encrypted_password, "app-password");
    let password = vault.decrypt(&account.address, &account.encrypted_password).unwrap();
    assert_eq!(password.expose_secret(), "app-password");
}

#[tokio::test]
async fn test_register_duplicate_address_conflicts() {
    let (service, _) = service();

    service.register(UserId::new(), register("billing@example.com")).await.unwrap();
    let err = service
        .register(UserId::new(), register("Billing@Example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_register_rejects_invalid_address() {
    let (service, _) = service();
    let err = service.register(UserId::new(), register("billing")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_update_password_reencrypts() {
    let (service, vault) = service();
    let owner = UserId::new();
    let account = service.register(owner, register("billing@example.com")).await.unwrap();

    let updated = service
        .update(
            owner,
            account.id,
            UpdateAccountCommand {
                password: Some(Secret::new("rotated".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.display_name, "Billing");
    let password = vault.decrypt(&updated.address, &updated.encrypted_password).unwrap();
    assert_eq!(password.expose_secret(), "rotated");
}

#[tokio::test]
async fn test_other_owner_cannot_read_account() {
    let (service, _) = service();
    let account = service.register(UserId::new(), register("billing@example.com")).await.unwrap();

    let err = service.get(UserId::new(), account.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_hides_account_and_frees_address() {
    let (service, _) = service();
    let owner = UserId::new();
    let account = service.register(owner, register("billing@example.com")).await.unwrap();

    service.delete(owner, account.id).await.unwrap();

    assert!(matches!(service.get(owner, account.id).await, Err(AppError::NotFound(_))));
    assert_eq!(service.list(owner, Pagination::default()).await.unwrap().total, 0);
    assert!(service.register(owner, register("billing@example.com")).await.is_ok());
}
