pub mod commission_service;
pub mod fiscal_calendar;
pub mod production_service;
pub mod tier_service;
pub mod vault_service;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::LedgerConfig;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::services::commission_service::CommissionService;
use crate::services::fiscal_calendar::CycleContext;
use crate::services::production_service::ProductionService;
use crate::services::tier_service::TierService;
use crate::services::vault_service::VaultService;

/// Owns the database pool and the engine's service singletons; the single
/// entry point transport layers hold on to.
#[derive(Clone)]
pub struct LedgerState {
    config: LedgerConfig,
    db_pool: DbPool,
    production_service: Arc<ProductionService>,
    tier_service: Arc<TierService>,
    vault_service: Arc<VaultService>,
    commission_service: Arc<CommissionService>,
}

impl LedgerState {
    pub fn new(config: LedgerConfig) -> AppResult<Self> {
        let db_pool = DbPool::new(&config.db_path)?;

        let production_service = Arc::new(ProductionService::new(db_pool.clone()));
        let tier_service = Arc::new(TierService::new(db_pool.clone()));
        let vault_service = Arc::new(VaultService::with_redemption_limit(
            db_pool.clone(),
            config.redemption_limit,
        ));
        let commission_service = Arc::new(CommissionService::new(db_pool.clone()));

        Ok(Self {
            config,
            db_pool,
            production_service,
            tier_service,
            vault_service,
            commission_service,
        })
    }

    /// Build the request-scoped calendar context for one evaluation day.
    pub fn build_context(&self, today: NaiveDate) -> AppResult<CycleContext> {
        CycleContext::build(today, self.config.cutover_date)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn db_pool(&self) -> &DbPool {
        &self.db_pool
    }

    pub fn production(&self) -> Arc<ProductionService> {
        Arc::clone(&self.production_service)
    }

    pub fn tiers(&self) -> Arc<TierService> {
        Arc::clone(&self.tier_service)
    }

    pub fn vault(&self) -> Arc<VaultService> {
        Arc::clone(&self.vault_service)
    }

    pub fn commission(&self) -> Arc<CommissionService> {
        Arc::clone(&self.commission_service)
    }
}
