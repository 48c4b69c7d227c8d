use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::repositories::vault_repository::VaultRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::fiscal::FiscalPeriod;
use crate::models::production::DailyTotals;
use crate::models::tier::TierSchedule;
use crate::models::vault::{SurplusAudit, VaultAccount, VaultLogEntry, VaultLogKind};
use crate::services::tier_service::resolve_top_tier;

pub const MAX_REDEMPTIONS_PER_CYCLE: u32 = 5;
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Owns every worker's banked-points balance: credits audited surplus,
/// processes capped redemptions and rolls accounts onto a new cycle, all
/// against an append-only audit log.
///
/// Mutations on one account are serialized behind that worker's entry in the
/// lock registry; accounts of different workers never block each other. The
/// row update itself is version-checked, so a writer from another process
/// shows up as a bounded-retry `ConcurrencyConflict`.
pub struct VaultService {
    db: DbPool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    redemption_limit: u32,
}

impl VaultService {
    pub fn new(db: DbPool) -> Self {
        Self::with_redemption_limit(db, MAX_REDEMPTIONS_PER_CYCLE)
    }

    pub fn with_redemption_limit(db: DbPool, redemption_limit: u32) -> Self {
        Self {
            db,
            locks: Mutex::new(HashMap::new()),
            redemption_limit,
        }
    }

    /// Fetch-or-create: accounts appear lazily with zero balance and the
    /// current cycle key, and are never deleted.
    pub fn ensure_account(
        &self,
        worker_id: &str,
        period: &FiscalPeriod,
    ) -> AppResult<VaultAccount> {
        if worker_id.trim().is_empty() {
            return Err(AppError::validation("worker id must not be empty"));
        }

        let conn = self.db.get_connection()?;
        Self::ensure_account_on(&conn, worker_id, period)
    }

    /// Roll a stale account onto the current cycle: one RESET entry, balance
    /// and redemption counter zeroed, cycle reference updated. A second call
    /// with the reference already current is a no-op.
    pub fn check_and_roll_cycle(
        &self,
        worker_id: &str,
        period: &FiscalPeriod,
    ) -> AppResult<VaultAccount> {
        let lock = self.account_lock(worker_id);
        let _guard = lock.lock().unwrap_or_else(|poison| poison.into_inner());
        self.roll_cycle_locked(worker_id, period)
    }

    /// Opportunistic surplus scan over auditable daily totals. Every
    /// auditable day whose points exceed the top tier's threshold and that
    /// carries no CREDIT yet gets one credit of `points - threshold`.
    /// Re-running on the same data is a no-op.
    pub fn audit_surplus(
        &self,
        worker_id: &str,
        totals: &DailyTotals,
        schedule: &TierSchedule,
        period: &FiscalPeriod,
    ) -> AppResult<SurplusAudit> {
        let lock = self.account_lock(worker_id);
        let _guard = lock.lock().unwrap_or_else(|poison| poison.into_inner());

        // A stale account must roll before anything is credited against the
        // new cycle.
        let account = self.roll_cycle_locked(worker_id, period)?;

        let Some(top) = resolve_top_tier(schedule) else {
            return Ok(SurplusAudit {
                balance: account.balance,
                ..SurplusAudit::default()
            });
        };

        let days = totals.auditable_days(worker_id);

        for attempt in 0..MAX_CONFLICT_RETRIES {
            let mut conn = self.db.get_connection()?;
            let mut account = Self::ensure_account_on(&conn, worker_id, period)?;

            let credited: std::collections::HashSet<NaiveDate> =
                VaultRepository::credited_dates(&conn, worker_id)?
                    .into_iter()
                    .collect();

            let pending: Vec<(NaiveDate, i64)> = days
                .iter()
                .map(|(date, points)| (*date, *points))
                .filter(|(date, points)| !credited.contains(date) && *points > top.threshold)
                .map(|(date, points)| (date, points - top.threshold))
                .collect();

            if pending.is_empty() {
                return Ok(SurplusAudit {
                    balance: account.balance,
                    ..SurplusAudit::default()
                });
            }

            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let mut credited_points = 0;
            let mut credited_days = Vec::with_capacity(pending.len());
            for (date, surplus) in &pending {
                VaultRepository::append_log(
                    &tx,
                    worker_id,
                    VaultLogKind::Credit,
                    *surplus,
                    Some(*date),
                    &format!("surplus above {} ({}) on {}", top.label, top.threshold, date),
                    &now,
                )?;
                credited_points += surplus;
                credited_days.push(*date);
            }

            account.balance += credited_points;
            if VaultRepository::update_account_checked(&tx, &account, &now)? {
                tx.commit()?;
                info!(
                    target: "ledger::vault",
                    %worker_id,
                    credited_points,
                    days = credited_days.len(),
                    balance = account.balance,
                    "credited production surplus"
                );
                return Ok(SurplusAudit {
                    credited_days,
                    credited_points,
                    balance: account.balance,
                });
            }

            debug!(target: "ledger::vault", %worker_id, attempt, "surplus audit retry");
        }

        Err(AppError::concurrency_conflict(worker_id))
    }

    /// Withdraw banked points toward a day's target. Fails on non-positive
    /// amounts, insufficient balance, or once the per-cycle cap is reached.
    pub fn redeem(
        &self,
        worker_id: &str,
        amount: i64,
        applied_date: NaiveDate,
        period: &FiscalPeriod,
    ) -> AppResult<VaultAccount> {
        if amount <= 0 {
            return Err(AppError::validation("redemption amount must be positive"));
        }

        let lock = self.account_lock(worker_id);
        let _guard = lock.lock().unwrap_or_else(|poison| poison.into_inner());

        self.roll_cycle_locked(worker_id, period)?;

        for attempt in 0..MAX_CONFLICT_RETRIES {
            let mut conn = self.db.get_connection()?;
            let mut account = Self::ensure_account_on(&conn, worker_id, period)?;

            if amount > account.balance {
                return Err(AppError::insufficient_balance(amount, account.balance));
            }
            if account.redemptions_used >= self.redemption_limit {
                return Err(AppError::redemption_limit_exceeded(
                    account.redemptions_used,
                    self.redemption_limit,
                ));
            }

            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            VaultRepository::append_log(
                &tx,
                worker_id,
                VaultLogKind::Redemption,
                amount,
                Some(applied_date),
                &format!("redeemed {amount} points toward {applied_date}"),
                &now,
            )?;

            account.balance -= amount;
            account.redemptions_used += 1;
            if VaultRepository::update_account_checked(&tx, &account, &now)? {
                tx.commit()?;
                info!(
                    target: "ledger::vault",
                    %worker_id,
                    amount,
                    %applied_date,
                    balance = account.balance,
                    redemptions_used = account.redemptions_used,
                    "redeemed vault points"
                );
                account.version += 1;
                return Ok(account);
            }

            debug!(target: "ledger::vault", %worker_id, attempt, "redeem retry");
        }

        Err(AppError::concurrency_conflict(worker_id))
    }

    /// Read-only log listing for statements and receipts. Display concern
    /// only; never consulted for cycle detection.
    pub fn recent_activity(&self, worker_id: &str, limit: usize) -> AppResult<Vec<VaultLogEntry>> {
        let conn = self.db.get_connection()?;
        VaultRepository::list_log(&conn, worker_id, limit)
    }

    fn roll_cycle_locked(&self, worker_id: &str, period: &FiscalPeriod) -> AppResult<VaultAccount> {
        let cycle_key = period.cycle_key();

        for attempt in 0..MAX_CONFLICT_RETRIES {
            let mut conn = self.db.get_connection()?;
            let mut account = Self::ensure_account_on(&conn, worker_id, period)?;

            if !account.is_stale(&cycle_key) {
                return Ok(account);
            }

            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            VaultRepository::append_log(
                &tx,
                worker_id,
                VaultLogKind::Reset,
                0,
                None,
                &format!("cycle rolled to {}", period.competency),
                &now,
            )?;

            account.balance = 0;
            account.redemptions_used = 0;
            account.cycle_reference = cycle_key.clone();
            if VaultRepository::update_account_checked(&tx, &account, &now)? {
                tx.commit()?;
                info!(
                    target: "ledger::vault",
                    %worker_id,
                    cycle = %cycle_key,
                    "vault account rolled onto new cycle"
                );
                account.version += 1;
                return Ok(account);
            }

            debug!(target: "ledger::vault", %worker_id, attempt, "cycle roll retry");
        }

        Err(AppError::concurrency_conflict(worker_id))
    }

    fn ensure_account_on(
        conn: &Connection,
        worker_id: &str,
        period: &FiscalPeriod,
    ) -> AppResult<VaultAccount> {
        let now = Utc::now().to_rfc3339();
        VaultRepository::insert_account(conn, worker_id, &period.cycle_key(), &now)?;
        VaultRepository::find_account(conn, worker_id)?.ok_or_else(AppError::not_found)
    }

    fn account_lock(&self, worker_id: &str) -> Arc<Mutex<()>> {
        let mut registry = self
            .locks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        Arc::clone(
            registry
                .entry(worker_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
