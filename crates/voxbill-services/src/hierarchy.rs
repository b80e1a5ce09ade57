//! Hierarchy directory service
//!
//! Owns the tenant tree (Reseller -> Company -> User): ancestry and
//! descendant queries, the cycle-prevention gate for reparenting, and
//! read-side rollups over descendant sets.
//!
//! Traversal uses an explicit work queue with a visited set and a depth
//! bound, so it terminates even against already-cyclic data. A visited
//! hit or an exhausted depth budget is logged as an integrity error
//! rather than failing the query.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, error, instrument, warn};
use voxbill_core::{
    models::{AccountRole, CompanyStats, ResellerStats},
    traits::{AccountRepository, CallRepository, WalletRepository},
    AppError, AppResult,
};

use crate::constants::{MAX_TRAVERSAL_DEPTH, ROOT_LOOKUP_MAX_HOPS};

/// Hierarchy directory
///
/// Leaf dependency for capacity, wallet, and billing: answers who owns
/// whom in the tenant tree.
pub struct HierarchyDirectory<A, C, W>
where
    A: AccountRepository,
    C: CallRepository,
    W: WalletRepository,
{
    account_repo: Arc<A>,
    call_repo: Arc<C>,
    wallet_repo: Arc<W>,
}

impl<A, C, W> HierarchyDirectory<A, C, W>
where
    A: AccountRepository,
    C: CallRepository,
    W: WalletRepository,
{
    /// Create a new hierarchy directory
    pub fn new(account_repo: Arc<A>, call_repo: Arc<C>, wallet_repo: Arc<W>) -> Self {
        Self {
            account_repo,
            call_repo,
            wallet_repo,
        }
    }

    /// Collect all accounts whose parent chain passes through `node_id`
    ///
    /// Never includes `node_id` itself. Returns `AccountNotFound` for an
    /// unknown node.
    #[instrument(skip(self))]
    pub async fn descendant_ids(&self, node_id: i32) -> AppResult<HashSet<i32>> {
        self.account_repo
            .find_by_id(node_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(node_id.to_string()))?;

        let mut descendants = HashSet::new();
        let mut visited = HashSet::from([node_id]);
        let mut queue = VecDeque::from([node_id]);
        let mut depth = 0;

        while !queue.is_empty() {
            if depth >= MAX_TRAVERSAL_DEPTH {
                error!(
                    "Descendant traversal for {} exceeded depth bound {}; tree is likely cyclic",
                    node_id, MAX_TRAVERSAL_DEPTH
                );
                break;
            }
            depth += 1;

            for _ in 0..queue.len() {
                let Some(current) = queue.pop_front() else {
                    break;
                };

                for child in self.account_repo.find_ids_by_parent(current).await? {
                    if visited.insert(child) {
                        descendants.insert(child);
                        queue.push_back(child);
                    } else {
                        error!(
                            "Hierarchy integrity: account {} reached twice under {}",
                            child, node_id
                        );
                    }
                }
            }
        }

        debug!("Account {} has {} descendants", node_id, descendants.len());
        Ok(descendants)
    }

    /// Decide whether `node_id` may be reparented under `proposed_parent_id`
    ///
    /// Rejects self-parenting and any parent already inside the node's
    /// subtree (which would create a cycle). This is the sole structural
    /// gate: every parent-assignment mutation must pass through it.
    #[instrument(skip(self))]
    pub async fn can_reparent(&self, node_id: i32, proposed_parent_id: i32) -> AppResult<bool> {
        if node_id == proposed_parent_id {
            debug!("Rejecting self-parenting of account {}", node_id);
            return Ok(false);
        }

        let descendants = self.descendant_ids(node_id).await?;
        if descendants.contains(&proposed_parent_id) {
            debug!(
                "Rejecting reparent of {} under its descendant {}",
                node_id, proposed_parent_id
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// Resolve the reseller at the root of an account's subtree
    ///
    /// The account's own id if it is a Reseller, its stored reseller
    /// reference if present, otherwise a bounded walk up the parent
    /// chain. None when the chain ends without a Reseller.
    #[instrument(skip(self))]
    pub async fn root_reseller_id(&self, node_id: i32) -> AppResult<Option<i32>> {
        let account = self
            .account_repo
            .find_by_id(node_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(node_id.to_string()))?;

        if account.role == AccountRole::Reseller {
            return Ok(Some(account.id));
        }

        if let Some(reseller_id) = account.reseller_id {
            return Ok(Some(reseller_id));
        }

        let mut current = account;
        for _ in 0..ROOT_LOOKUP_MAX_HOPS {
            let Some(parent_id) = current.parent_id else {
                return Ok(None);
            };

            let Some(parent) = self.account_repo.find_by_id(parent_id).await? else {
                warn!(
                    "Hierarchy integrity: account {} references missing parent {}",
                    current.id, parent_id
                );
                return Ok(None);
            };

            if parent.role == AccountRole::Reseller {
                return Ok(Some(parent.id));
            }

            current = parent;
        }

        warn!(
            "Reseller lookup for {} gave up after {} hops",
            node_id, ROOT_LOOKUP_MAX_HOPS
        );
        Ok(None)
    }

    /// Aggregate statistics over a reseller's subtree
    ///
    /// Pure read-side rollup; an empty subtree yields explicit zeros.
    #[instrument(skip(self))]
    pub async fn reseller_stats(&self, reseller_id: i32) -> AppResult<ResellerStats> {
        let descendants = self.descendant_ids(reseller_id).await?;
        let ids: Vec<i32> = descendants.iter().copied().collect();
        let accounts = self.account_repo.find_by_ids(&ids).await?;

        let mut stats = ResellerStats {
            reseller_id,
            ..Default::default()
        };

        for account in &accounts {
            match account.role {
                AccountRole::Company => stats.company_count += 1,
                AccountRole::User => stats.user_count += 1,
                AccountRole::Reseller => {}
            }
            stats.total_channels += i64::from(account.max_concurrent_calls);
            stats.active_channels += i64::from(account.active_calls);
        }

        let usage = self.call_repo.usage_today(&ids).await?;
        stats.calls_today = usage.calls;
        stats.minutes_today = usage.minutes;
        stats.cost_today = usage.cost;
        stats.balance_total = self.wallet_repo.balance_total(&ids).await?;

        Ok(stats)
    }

    /// Aggregate statistics for a company and its users
    #[instrument(skip(self))]
    pub async fn company_stats(&self, company_id: i32) -> AppResult<CompanyStats> {
        let company = self
            .account_repo
            .find_by_id(company_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(company_id.to_string()))?;

        let users = self.account_repo.find_by_parent(company_id).await?;
        let user_ids: Vec<i32> = users.iter().map(|u| u.id).collect();

        // Balance rolls up the company wallet together with its users
        let mut wallet_ids = user_ids.clone();
        wallet_ids.push(company_id);

        let usage = self.call_repo.usage_today(&user_ids).await?;

        Ok(CompanyStats {
            company_id,
            user_count: users.len() as i64,
            max_channels: company.max_concurrent_calls,
            active_channels: company.active_calls,
            calls_today: usage.calls,
            minutes_today: usage.minutes,
            cost_today: usage.cost,
            balance_total: self.wallet_repo.balance_total(&wallet_ids).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use voxbill_core::{
        models::{Account, CallRecord, Payment, Wallet},
        traits::{Repository, UsageTotals},
    };

    struct MockAccountRepository {
        accounts: Mutex<HashMap<i32, Account>>,
    }

    impl MockAccountRepository {
        fn with(accounts: Vec<Account>) -> Arc<Self> {
            Arc::new(Self {
                accounts: Mutex::new(accounts.into_iter().map(|a| (a.id, a)).collect()),
            })
        }
    }

    #[async_trait]
    impl Repository<Account, i32> for MockAccountRepository {
        async fn find_by_id(&self, id: i32) -> AppResult<Option<Account>> {
            Ok(self.accounts.lock().unwrap().get(&id).cloned())
        }

        async fn find_all(&self, _limit: i64, _offset: i64) -> AppResult<Vec<Account>> {
            Ok(self.accounts.lock().unwrap().values().cloned().collect())
        }

        async fn count(&self) -> AppResult<i64> {
            Ok(self.accounts.lock().unwrap().len() as i64)
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
        async fn find_by_parent(&self, parent_id: i32) -> AppResult<Vec<Account>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.parent_id == Some(parent_id))
                .cloned()
                .collect())
        }

        async fn find_ids_by_parent(&self, parent_id: i32) -> AppResult<Vec<i32>> {
            Ok(self
                .find_by_parent(parent_id)
                .await?
                .into_iter()
                .map(|a| a.id)
                .collect())
        }

        async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Account>> {
            let accounts = self.accounts.lock().unwrap();
            Ok(ids.iter().filter_map(|id| accounts.get(id).cloned()).collect())
        }

        async fn try_start_call(&self, _id: i32) -> AppResult<bool> {
            Ok(false)
        }

        async fn end_call(&self, _id: i32) -> AppResult<bool> {
            Ok(true)
        }

        async fn update_parent(&self, id: i32, parent_id: Option<i32>) -> AppResult<Account> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| AppError::AccountNotFound(id.to_string()))?;
            account.parent_id = parent_id;
            Ok(account.clone())
        }
    }

    struct MockCallRepository {
        totals: UsageTotals,
    }

    #[async_trait]
    impl Repository<CallRecord, i64> for MockCallRepository {
        async fn find_by_id(&self, _id: i64) -> AppResult<Option<CallRecord>> {
            Ok(None)
        }

        async fn find_all(&self, _limit: i64, _offset: i64) -> AppResult<Vec<CallRecord>> {
            Ok(vec![])
        }

        async fn count(&self) -> AppResult<i64> {
            Ok(0)
        }

        async fn create(&self, entity: &CallRecord) -> AppResult<CallRecord> {
            Ok(entity.clone())
        }

        async fn update(&self, entity: &CallRecord) -> AppResult<CallRecord> {
            Ok(entity.clone())
        }

        async fn delete(&self, _id: i64) -> AppResult<bool> {
            Ok(true)
        }
    }

    #[async_trait]
    impl CallRepository for MockCallRepository {
        async fn find_unbilled_answered(
            &self,
            _account_id: i32,
            _period_start: DateTime<Utc>,
            _period_end: DateTime<Utc>,
        ) -> AppResult<Vec<CallRecord>> {
            Ok(vec![])
        }

        async fn usage_today(&self, account_ids: &[i32]) -> AppResult<UsageTotals> {
            if account_ids.is_empty() {
                return Ok(UsageTotals::default());
            }
            Ok(UsageTotals {
                calls: self.totals.calls,
                minutes: self.totals.minutes,
                cost: self.totals.cost,
            })
        }

        async fn list_filtered(
            &self,
            _account_id: Option<i32>,
            _start_date: Option<DateTime<Utc>>,
            _end_date: Option<DateTime<Utc>>,
            _limit: i64,
            _offset: i64,
        ) -> AppResult<(Vec<CallRecord>, i64)> {
            Ok((vec![], 0))
        }
    }

    struct MockWalletRepository {
        balances: HashMap<i32, Decimal>,
    }

    #[async_trait]
    impl WalletRepository for MockWalletRepository {
        async fn get_or_create(&self, account_id: i32, currency: &str) -> AppResult<Wallet> {
            Ok(Wallet {
                account_id,
                currency: currency.to_string(),
                balance: self
                    .balances
                    .get(&account_id)
                    .copied()
                    .unwrap_or(Decimal::ZERO),
                ..Default::default()
            })
        }

        async fn credit(&self, _account_id: i32, amount: Decimal) -> AppResult<Decimal> {
            Ok(amount)
        }

        async fn try_debit(&self, _account_id: i32, _amount: Decimal) -> AppResult<bool> {
            Ok(false)
        }

        async fn balance_total(&self, account_ids: &[i32]) -> AppResult<Decimal> {
            Ok(account_ids
                .iter()
                .filter_map(|id| self.balances.get(id))
                .sum())
        }

        async fn list_payments(
            &self,
            _account_id: i32,
            _limit: i64,
            _offset: i64,
        ) -> AppResult<(Vec<Payment>, i64)> {
            Ok((vec![], 0))
        }
    }

    fn account(id: i32, role: AccountRole, parent_id: Option<i32>) -> Account {
        Account {
            id,
            name: format!("acct-{}", id),
            role,
            parent_id,
            ..Default::default()
        }
    }

    fn directory(
        accounts: Vec<Account>,
    ) -> HierarchyDirectory<MockAccountRepository, MockCallRepository, MockWalletRepository> {
        HierarchyDirectory::new(
            MockAccountRepository::with(accounts),
            Arc::new(MockCallRepository {
                totals: UsageTotals::default(),
            }),
            Arc::new(MockWalletRepository {
                balances: HashMap::new(),
            }),
        )
    }

    #[tokio::test]
    async fn test_descendants_exclude_self() {
        let dir = directory(vec![
            account(1, AccountRole::Reseller, None),
            account(2, AccountRole::Company, Some(1)),
            account(3, AccountRole::User, Some(2)),
            account(4, AccountRole::User, Some(2)),
        ]);

        let descendants = dir.descendant_ids(1).await.unwrap();
        assert_eq!(descendants, HashSet::from([2, 3, 4]));
        assert!(!descendants.contains(&1));
    }

    #[tokio::test]
    async fn test_descendants_of_leaf_is_empty() {
        let dir = directory(vec![
            account(1, AccountRole::Reseller, None),
            account(2, AccountRole::User, Some(1)),
        ]);

        let descendants = dir.descendant_ids(2).await.unwrap();
        assert!(descendants.is_empty());
    }

    #[tokio::test]
    async fn test_descendants_of_unknown_node() {
        let dir = directory(vec![]);
        let err = dir.descendant_ids(99).await.unwrap_err();
        assert!(matches!(err, AppError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_descendants_terminate_on_cyclic_data() {
        // 2 -> 3 -> 2: corrupted data the gate should have prevented
        let dir = directory(vec![
            account(1, AccountRole::Reseller, None),
            account(2, AccountRole::Company, Some(3)),
            account(3, AccountRole::Company, Some(2)),
        ]);

        let descendants = dir.descendant_ids(2).await.unwrap();
        assert_eq!(descendants, HashSet::from([3]));
    }

    #[tokio::test]
    async fn test_can_reparent_rejects_self() {
        let dir = directory(vec![account(1, AccountRole::Company, None)]);
        assert!(!dir.can_reparent(1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_reparent_rejects_descendant() {
        let dir = directory(vec![
            account(1, AccountRole::Reseller, None),
            account(2, AccountRole::Company, Some(1)),
            account(3, AccountRole::User, Some(2)),
        ]);

        // 3 is inside 1's subtree, so 1 may not move under it
        assert!(!dir.can_reparent(1, 3).await.unwrap());
        // Moving 3 under 1 directly is fine
        assert!(dir.can_reparent(3, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_root_reseller_walks_parents() {
        let dir = directory(vec![
            account(1, AccountRole::Reseller, None),
            account(2, AccountRole::Company, Some(1)),
            account(3, AccountRole::User, Some(2)),
        ]);

        assert_eq!(dir.root_reseller_id(3).await.unwrap(), Some(1));
        assert_eq!(dir.root_reseller_id(1).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_root_reseller_prefers_stored_reference() {
        let mut user = account(3, AccountRole::User, Some(2));
        user.reseller_id = Some(7);

        let dir = directory(vec![account(2, AccountRole::Company, None), user]);
        assert_eq!(dir.root_reseller_id(3).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_root_reseller_none_when_chain_ends() {
        let dir = directory(vec![
            account(2, AccountRole::Company, None),
            account(3, AccountRole::User, Some(2)),
        ]);

        assert_eq!(dir.root_reseller_id(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reseller_stats_rollup() {
        let mut company = account(2, AccountRole::Company, Some(1));
        company.max_concurrent_calls = 10;
        company.active_calls = 4;

        let dir = HierarchyDirectory::new(
            MockAccountRepository::with(vec![
                account(1, AccountRole::Reseller, None),
                company,
                account(3, AccountRole::User, Some(2)),
                account(4, AccountRole::User, Some(2)),
            ]),
            Arc::new(MockCallRepository {
                totals: UsageTotals {
                    calls: 12,
                    minutes: dec!(34.5),
                    cost: dec!(1.725),
                },
            }),
            Arc::new(MockWalletRepository {
                balances: HashMap::from([(2, dec!(50)), (3, dec!(10)), (4, dec!(5))]),
            }),
        );

        let stats = dir.reseller_stats(1).await.unwrap();
        assert_eq!(stats.company_count, 1);
        assert_eq!(stats.user_count, 2);
        assert_eq!(stats.total_channels, 10);
        assert_eq!(stats.active_channels, 4);
        assert_eq!(stats.calls_today, 12);
        assert_eq!(stats.balance_total, dec!(65));
    }

    #[tokio::test]
    async fn test_stats_for_empty_subtree_are_zero() {
        let dir = directory(vec![account(1, AccountRole::Reseller, None)]);

        let stats = dir.reseller_stats(1).await.unwrap();
        assert_eq!(stats.company_count, 0);
        assert_eq!(stats.user_count, 0);
        assert_eq!(stats.calls_today, 0);
        assert_eq!(stats.balance_total, Decimal::ZERO);
    }
}
