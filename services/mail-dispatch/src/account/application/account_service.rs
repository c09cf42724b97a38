//! 账户应用服务

use std::sync::Arc;

use email_address::EmailAddress;
use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::{AppError, AppResult};
use tracing::info;

use crate::account::application::commands::{RegisterAccountCommand, UpdateAccountCommand};
use crate::account::domain::entities::{Account, AccountId};
use crate::account::domain::repositories::{AccountFilter, AccountRepository};
use crate::account::domain::services::CredentialVault;

pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    vault: Arc<CredentialVault>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountRepository>, vault: Arc<CredentialVault>) -> Self {
        Self { accounts, vault }
    }

    /// 登记账户，密码加密后保存
    pub async fn register(&self, owner_id: UserId, command: RegisterAccountCommand) -> AppResult<Account> {
        let address = command.address.trim().to_string();
        if !EmailAddress::is_valid(&address) {
            return Err(AppError::validation(format!("Invalid account address: {}", address)));
        }

        let display_name = command.display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::validation("Display name must not be empty"));
        }

        let existing = self
            .accounts
            .find(&AccountFilter {
                address: Some(address.clone()),
                ..Default::default()
            })
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict(format!("Account {} already registered", address)));
        }

        let encrypted = self.vault.encrypt(&address, &command.password)?;
        let account = Account::new(owner_id, address, display_name, encrypted, command.is_default);
        self.accounts.create(&account).await?;

        info!(account_id = %account.id, owner_id = %owner_id, "Account registered");
        Ok(account)
    }

    pub async fn update(
        &self,
        owner_id: UserId,
        id: AccountId,
        command: UpdateAccountCommand,
    ) -> AppResult<Account> {
        let mut account = self.get(owner_id, id).await?;

        if let Some(display_name) = command.display_name {
            let display_name = display_name.trim();
            if display_name.is_empty() {
                return Err(AppError::validation("Display name must not be empty"));
            }
            account.display_name = display_name.to_string();
        }
        if let Some(password) = command.password {
            account.encrypted_password = self.vault.encrypt(&account.address, &password)?;
        }
        if let Some(is_default) = command.is_default {
            account.is_default = is_default;
        }

        account.touch();
        self.accounts.update_by_id(&account).await?;

        info!(account_id = %account.id, "Account updated");
        Ok(account)
    }

    /// 查询账户，非本人账户视为不存在
    pub async fn get(&self, owner_id: UserId, id: AccountId) -> AppResult<Account> {
        self.accounts
            .find_by_id(&id)
            .await?
            .filter(|account| account.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("Account {} not found", id)))
    }

    pub async fn list(&self, owner_id: UserId, pagination: Pagination) -> AppResult<PagedResult<Account>> {
        self.accounts.index(&owner_id, &pagination).await
    }

    pub async fn delete(&self, owner_id: UserId, id: AccountId) -> AppResult<()> {
        let account = self.get(owner_id, id).await?;
        self.accounts.delete_by_id(&account.id, owner_id).await?;

        info!(account_id = %id, "Account deleted");
        Ok(())
    }
}
