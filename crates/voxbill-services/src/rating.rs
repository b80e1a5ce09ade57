//! Rate engine service
//!
//! Converts wholesale cost entries into per-tenant sell prices using the
//! account's pricing plan. The markup arithmetic itself lives on
//! `PricingPlan`; this service resolves plans, joins the catalog, and
//! caches destination lookups.
//!
//! Accounts without an assigned plan fall back to the platform's
//! predefined 0%-markup plan, resolved here and passed through as a
//! value rather than held in any global state.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};
use voxbill_cache::{keys, RedisCache};
use voxbill_core::{
    models::{Account, ConfiguredRate, CostEntry, PricingPlan},
    traits::{CostRepository, PlanRepository},
    AppError, AppResult,
};

use crate::constants::COST_CACHE_TTL;

/// Rate engine
///
/// The cache is optional: without one every lookup goes to the
/// repository, and cache faults never fail a lookup.
pub struct RateEngine<C: CostRepository, P: PlanRepository> {
    cost_repo: Arc<C>,
    plan_repo: Arc<P>,
    cache: Option<Arc<RedisCache>>,
}

impl<C: CostRepository, P: PlanRepository> RateEngine<C, P> {
    /// Create a rate engine without caching
    pub fn new(cost_repo: Arc<C>, plan_repo: Arc<P>) -> Self {
        Self {
            cost_repo,
            plan_repo,
            cache: None,
        }
    }

    /// Create a rate engine with a Redis cache for destination lookups
    pub fn with_cache(cost_repo: Arc<C>, plan_repo: Arc<P>, cache: Arc<RedisCache>) -> Self {
        Self {
            cost_repo,
            plan_repo,
            cache: Some(cache),
        }
    }

    /// Try to get a cost entry from cache
    async fn get_from_cache(&self, destination: &str) -> Option<CostEntry> {
        let cache = self.cache.as_ref()?;
        let key = keys::cost_key(destination);

        match cache.get::<CostEntry>(&key).await {
            Ok(entry) => {
                if entry.is_some() {
                    debug!("Cost cache HIT for destination: {}", destination);
                }
                entry
            }
            Err(e) => {
                // Cache faults degrade to a repository lookup
                warn!("Cache error for destination {}: {}", destination, e);
                None
            }
        }
    }

    /// Store a cost entry in cache
    async fn store_in_cache(&self, destination: &str, entry: &CostEntry) {
        if let Some(cache) = self.cache.as_ref() {
            let key = keys::cost_key(destination);
            if let Err(e) = cache.set(&key, entry, COST_CACHE_TTL).await {
                warn!("Failed to cache cost entry for {}: {}", destination, e);
            }
        }
    }

    /// Find the cost entry for a dialed number via longest prefix match
    #[instrument(skip(self))]
    pub async fn find_destination(&self, destination: &str) -> AppResult<Option<CostEntry>> {
        debug!("Finding cost entry for destination: {}", destination);

        let normalized = CostEntry::normalize_destination(destination);

        if normalized.is_empty() {
            warn!("Empty destination after normalization: {}", destination);
            return Ok(None);
        }

        if let Some(entry) = self.get_from_cache(&normalized).await {
            return Ok(Some(entry));
        }

        debug!("Cost cache MISS for destination: {}", normalized);
        let entry = self.cost_repo.find_by_destination(&normalized).await?;

        if let Some(ref e) = entry {
            self.store_in_cache(&normalized, e).await;
        }

        Ok(entry)
    }

    /// Resolve the plan that prices an account's calls
    ///
    /// The account's assigned plan when present, otherwise the
    /// predefined 0%-markup default. None only when no default plan is
    /// seeded at all, which is an environment-setup error.
    #[instrument(skip(self, account))]
    pub async fn resolve_plan(&self, account: &Account) -> AppResult<Option<PricingPlan>> {
        if let Some(plan_id) = account.plan_id {
            if let Some(plan) = self.plan_repo.find_by_id(plan_id).await? {
                return Ok(Some(plan));
            }
            warn!(
                "Account {} references missing plan {}, falling back to default",
                account.id, plan_id
            );
        }

        let default = self.plan_repo.find_default().await?;
        if default.is_none() {
            warn!("No predefined 0%-markup default plan is seeded");
        }
        Ok(default)
    }

    /// The cost catalog joined with a plan's sell-side figures,
    /// ordered by destination name
    #[instrument(skip(self, plan))]
    pub async fn configured_rates(&self, plan: &PricingPlan) -> AppResult<Vec<ConfiguredRate>> {
        let entries = self.cost_repo.list_by_name().await?;

        Ok(entries
            .iter()
            .map(|entry| ConfiguredRate::from_entry(entry, plan))
            .collect())
    }

    /// The rates an account actually pays
    ///
    /// Empty only when no plan can be resolved at all.
    #[instrument(skip(self, account))]
    pub async fn user_rates(&self, account: &Account) -> AppResult<Vec<ConfiguredRate>> {
        match self.resolve_plan(account).await? {
            Some(plan) => self.configured_rates(&plan).await,
            None => Ok(Vec::new()),
        }
    }

    /// Price a single call for an account
    ///
    /// Duration is rounded up to the plan's billing increment before
    /// the per-minute sell price is applied.
    #[instrument(skip(self, account))]
    pub async fn price_call(
        &self,
        account: &Account,
        destination: &str,
        duration_secs: i32,
    ) -> AppResult<Option<Decimal>> {
        if duration_secs <= 0 {
            return Ok(Some(Decimal::ZERO));
        }

        let Some(entry) = self.find_destination(destination).await? else {
            return Ok(None);
        };

        let Some(plan) = self.resolve_plan(account).await? else {
            return Ok(None);
        };

        let increment = plan.billing_increment.max(1);
        let rounded_secs = ((duration_secs + increment - 1) / increment) * increment;
        let minutes = Decimal::from(rounded_secs) / Decimal::from(60);

        Ok(Some(plan.sell_price(entry.buy_price) * minutes))
    }

    /// Create a custom pricing plan
    ///
    /// Rejects duplicate names; custom plans are never predefined and
    /// start active.
    #[instrument(skip(self, plan))]
    pub async fn create_custom_plan(&self, mut plan: PricingPlan) -> AppResult<PricingPlan> {
        plan.validate().map_err(AppError::Validation)?;

        if self.plan_repo.find_by_name(&plan.name).await?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "Plan {} already exists",
                plan.name
            )));
        }

        plan.is_predefined = false;
        plan.is_active = true;

        self.plan_repo.create(&plan).await
    }
}
