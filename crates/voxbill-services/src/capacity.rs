//! Capacity manager service
//!
//! Admission control over shared concurrent-call counters. A User under
//! a Company has no pool of its own: it draws from the Company's shared
//! counters, so admission is always evaluated and mutated against the
//! capacity-holding entity, never the caller.
//!
//! The admission check and the increment are one conditional update in
//! the repository; there is no separate reservation state.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use voxbill_core::{
    models::{Account, AccountRole, ChannelInfo},
    traits::AccountRepository,
    AppError, AppResult,
};

/// Capacity manager
pub struct CapacityManager<A: AccountRepository> {
    account_repo: Arc<A>,
}

impl<A: AccountRepository> CapacityManager<A> {
    /// Create a new capacity manager
    pub fn new(account_repo: Arc<A>) -> Self {
        Self { account_repo }
    }

    /// Resolve the capacity-holding entity for a requesting account
    ///
    /// A User with a Company parent draws from the company pool;
    /// everyone else holds their own capacity.
    #[instrument(skip(self))]
    pub async fn resolve_holder(&self, account_id: i32) -> AppResult<Account> {
        let account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

        if account.role == AccountRole::User {
            if let Some(parent_id) = account.parent_id {
                if let Some(parent) = self.account_repo.find_by_id(parent_id).await? {
                    if parent.role == AccountRole::Company {
                        debug!(
                            "Account {} draws capacity from company {}",
                            account_id, parent.id
                        );
                        return Ok(parent);
                    }
                }
            }
        }

        Ok(account)
    }

    /// Read-only admission check against the holding entity
    #[instrument(skip(self))]
    pub async fn can_start_call(&self, account_id: i32) -> AppResult<bool> {
        let holder = self.resolve_holder(account_id).await?;
        Ok(holder.has_free_channel())
    }

    /// Admit a call and take a channel, atomically
    ///
    /// Returns false when the holder's pool is full; this is an expected
    /// refusal the call-handling layer branches on, not an error.
    #[instrument(skip(self))]
    pub async fn start_call(&self, account_id: i32) -> AppResult<bool> {
        let holder = self.resolve_holder(account_id).await?;
        let admitted = self.account_repo.try_start_call(holder.id).await?;

        if !admitted {
            debug!(
                "Call refused for account {}: pool {} at capacity ({})",
                account_id, holder.id, holder.max_concurrent_calls
            );
        }

        Ok(admitted)
    }

    /// Release a channel at call teardown
    ///
    /// A counter already at zero means a decrement without a matching
    /// increment: an operational anomaly, logged but never an error.
    #[instrument(skip(self))]
    pub async fn end_call(&self, account_id: i32) -> AppResult<()> {
        let holder = self.resolve_holder(account_id).await?;
        let decremented = self.account_repo.end_call(holder.id).await?;

        if !decremented {
            warn!(
                "Decrement on idle pool {} (caller {}): missing prior increment",
                holder.id, account_id
            );
        }

        Ok(())
    }

    /// Channel information for the requesting account's pool
    #[instrument(skip(self))]
    pub async fn channel_info(&self, account_id: i32) -> AppResult<ChannelInfo> {
        let account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

        let holder = self.resolve_holder(account_id).await?;
        let pooled = holder.id != account.id;

        Ok(ChannelInfo {
            holder_id: holder.id,
            holder_role: holder.role,
            max_channels: holder.max_concurrent_calls,
            active_channels: holder.active_calls,
            available_channels: holder.available_channels(),
            utilization_percent: holder.utilization_percent(),
            pooled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use voxbill_core::traits::Repository;

    /// In-memory account store with the same conditional-update
    /// semantics as the SQL repository.
    struct MockAccountRepository {
        accounts: Mutex<HashMap<i32, Account>>,
    }

    impl MockAccountRepository {
        fn with(accounts: Vec<Account>) -> Arc<Self> {
            Arc::new(Self {
                accounts: Mutex::new(accounts.into_iter().map(|a| (a.id, a)).collect()),
            })
        }

        fn active_calls(&self, id: i32) -> i32 {
            self.accounts.lock().unwrap()[&id].active_calls
        }
    }

    #[async_trait]
    impl Repository<Account, i32> for MockAccountRepository {
        async fn find_by_id(&self, id: i32) -> AppResult<Option<Account>> {
            Ok(self.accounts.lock().unwrap().get(&id).cloned())
        }

        async fn find_all(&self, _limit: i64, _offset: i64) -> AppResult<Vec<Account>> {
            Ok(vec![])
        }

        async fn count(&self) -> AppResult<i64> {
            Ok(0)
        }

        async fn create(&self, entity: &Account) -> AppResult<Account> {
            Ok(entity.clone())
        }

        async fn update(&self, entity: &Account) -> AppResult<Account> {
            Ok(entity.clone())
        }

        async fn delete(&self, _id: i32) -> AppResult<bool> {
            Ok(true)
        }
    }

    #[async_trait]
    impl AccountRepository for MockAccountRepository {
        async fn find_by_parent(&self, _parent_id: i32) -> AppResult<Vec<Account>> {
            Ok(vec![])
        }

        async fn find_ids_by_parent(&self, _parent_id: i32) -> AppResult<Vec<i32>> {
            Ok(vec![])
        }

        async fn find_by_ids(&self, _ids: &[i32]) -> AppResult<Vec<Account>> {
            Ok(vec![])
        }

        async fn try_start_call(&self, id: i32) -> AppResult<bool> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| AppError::AccountNotFound(id.to_string()))?;

            if account.active_calls < account.max_concurrent_calls {
                account.active_calls += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn end_call(&self, id: i32) -> AppResult<bool> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| AppError::AccountNotFound(id.to_string()))?;

            if account.active_calls > 0 {
                account.active_calls -= 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn update_parent(&self, _id: i32, _parent_id: Option<i32>) -> AppResult<Account> {
            Err(AppError::Internal("not used".to_string()))
        }
    }

    fn account(id: i32, role: AccountRole, parent_id: Option<i32>, max: i32) -> Account {
        Account {
            id,
            name: format!("acct-{}", id),
            role,
            parent_id,
            max_concurrent_calls: max,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_company_user_draws_from_company_pool() {
        let repo = MockAccountRepository::with(vec![
            account(10, AccountRole::Company, None, 5),
            account(11, AccountRole::User, Some(10), 0),
        ]);
        let manager = CapacityManager::new(repo.clone());

        assert!(manager.start_call(11).await.unwrap());
        assert_eq!(repo.active_calls(10), 1);
        assert_eq!(repo.active_calls(11), 0);
    }

    #[tokio::test]
    async fn test_standalone_user_holds_own_capacity() {
        let repo = MockAccountRepository::with(vec![account(20, AccountRole::User, None, 2)]);
        let manager = CapacityManager::new(repo.clone());

        assert!(manager.start_call(20).await.unwrap());
        assert_eq!(repo.active_calls(20), 1);
    }

    #[tokio::test]
    async fn test_user_under_reseller_holds_own_capacity() {
        // Parent exists but is not a company, so no pooling applies
        let repo = MockAccountRepository::with(vec![
            account(1, AccountRole::Reseller, None, 100),
            account(2, AccountRole::User, Some(1), 3),
        ]);
        let manager = CapacityManager::new(repo.clone());

        let holder = manager.resolve_holder(2).await.unwrap();
        assert_eq!(holder.id, 2);
    }

    #[tokio::test]
    async fn test_admission_refused_at_capacity() {
        let repo = MockAccountRepository::with(vec![account(30, AccountRole::Company, None, 1)]);
        let manager = CapacityManager::new(repo.clone());

        assert!(manager.start_call(30).await.unwrap());
        assert!(!manager.start_call(30).await.unwrap());
        assert_eq!(repo.active_calls(30), 1);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_never_overshoot() {
        let max = 5;
        let attempts = 12;
        let repo = MockAccountRepository::with(vec![
            account(40, AccountRole::Company, None, max),
            account(41, AccountRole::User, Some(40), 0),
        ]);
        let manager = Arc::new(CapacityManager::new(repo.clone()));

        let mut handles = Vec::new();
        for _ in 0..attempts {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.start_call(41).await }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, max);
        assert_eq!(repo.active_calls(40), max);
    }

    #[tokio::test]
    async fn test_end_call_clamps_at_zero() {
        let repo = MockAccountRepository::with(vec![account(50, AccountRole::User, None, 2)]);
        let manager = CapacityManager::new(repo.clone());

        // No prior increment: logged anomaly, not an error
        manager.end_call(50).await.unwrap();
        assert_eq!(repo.active_calls(50), 0);

        assert!(manager.start_call(50).await.unwrap());
        manager.end_call(50).await.unwrap();
        assert_eq!(repo.active_calls(50), 0);
    }

    #[tokio::test]
    async fn test_channel_info_reports_company_pool() {
        let mut company = account(60, AccountRole::Company, None, 8);
        company.active_calls = 2;

        let repo = MockAccountRepository::with(vec![
            company,
            account(61, AccountRole::User, Some(60), 0),
        ]);
        let manager = CapacityManager::new(repo);

        let info = manager.channel_info(61).await.unwrap();
        assert_eq!(info.holder_id, 60);
        assert_eq!(info.holder_role, AccountRole::Company);
        assert_eq!(info.max_channels, 8);
        assert_eq!(info.active_channels, 2);
        assert_eq!(info.available_channels, 6);
        assert_eq!(info.utilization_percent, dec!(25));
        assert!(info.pooled);
    }

    #[tokio::test]
    async fn test_channel_info_zero_max_has_zero_utilization() {
        let repo = MockAccountRepository::with(vec![account(70, AccountRole::User, None, 0)]);
        let manager = CapacityManager::new(repo);

        let info = manager.channel_info(70).await.unwrap();
        assert_eq!(info.utilization_percent, rust_decimal::Decimal::ZERO);
        assert!(!info.pooled);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let repo = MockAccountRepository::with(vec![]);
        let manager = CapacityManager::new(repo);

        let err = manager.can_start_call(99).await.unwrap_err();
        assert!(matches!(err, AppError::AccountNotFound(_)));
    }
}
