use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::payment_repository::PaymentRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::fiscal::WeekBlock;
use crate::models::payment::{CycleStatement, PaymentRecord, PaymentStatus, WeeklyCommission};
use crate::models::production::DailyTotals;
use crate::models::tier::TierSchedule;
use crate::services::fiscal_calendar::CycleContext;
use crate::services::tier_service::resolve_tier;

/// Turns daily point totals and a tier schedule into weekly and cycle
/// commission sums, derives payment-due status and records payment
/// confirmations. Never moves money itself.
pub struct CommissionService {
    db: DbPool,
}

impl CommissionService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create the one PaymentRecord for `(worker, cycle)`. A second
    /// confirmation for the same pair is a conflict.
    pub fn confirm_payment(
        &self,
        worker_id: &str,
        cycle_name: &str,
        amount: f64,
        payer: &str,
    ) -> AppResult<PaymentRecord> {
        if amount < 0.0 {
            return Err(AppError::validation("payment amount must not be negative"));
        }

        let record = PaymentRecord {
            worker_id: worker_id.to_string(),
            cycle_name: cycle_name.to_string(),
            amount,
            receipt_id: Uuid::new_v4(),
            paid_at: Utc::now().to_rfc3339(),
            payer: payer.to_string(),
        };

        let conn = self.db.get_connection()?;
        PaymentRepository::insert(&conn, &record)?;
        info!(
            target: "ledger::payment",
            %worker_id,
            cycle = %cycle_name,
            amount,
            receipt = %record.receipt_id,
            "payment confirmed"
        );
        Ok(record)
    }

    pub fn find_payment(
        &self,
        worker_id: &str,
        cycle_name: &str,
    ) -> AppResult<Option<PaymentRecord>> {
        let conn = self.db.get_connection()?;
        PaymentRepository::find(&conn, worker_id, cycle_name)
    }

    pub fn payments_for_cycle(&self, cycle_name: &str) -> AppResult<Vec<PaymentRecord>> {
        let conn = self.db.get_connection()?;
        PaymentRepository::list_for_cycle(&conn, cycle_name)
    }

    /// Weekly breakdown, cycle total and payment status for one worker; the
    /// projection consumed by statements and receipts.
    pub fn cycle_statement(
        &self,
        ctx: &CycleContext,
        worker_id: &str,
        totals: &DailyTotals,
        schedule: &TierSchedule,
        due_date: NaiveDate,
    ) -> AppResult<CycleStatement> {
        let day_totals = totals.live_days(worker_id);

        let weekly_commissions = ctx
            .blocks
            .iter()
            .map(|block| WeeklyCommission {
                block_index: block.index,
                start: block.start,
                end: block.end,
                commission: weekly_commission(block, &day_totals, schedule),
            })
            .collect::<Vec<_>>();

        let total = cycle_commission(ctx, &day_totals, schedule);

        let paid = self
            .find_payment(worker_id, &ctx.period.competency)?
            .is_some();
        let status = payment_status(paid, due_date, ctx.period.end, ctx.today);

        Ok(CycleStatement {
            worker_id: worker_id.to_string(),
            cycle_name: ctx.period.competency.clone(),
            weekly_commissions,
            cycle_commission: total,
            status,
        })
    }
}

/// Commission earned by one day's points: the resolved tier's value, or 0
/// when no tier is met.
pub fn daily_commission(points: i64, schedule: &TierSchedule) -> f64 {
    resolve_tier(points, schedule)
        .map(|tier| tier.commission)
        .unwrap_or(0.0)
}

pub fn weekly_commission(
    block: &WeekBlock,
    day_totals: &BTreeMap<NaiveDate, i64>,
    schedule: &TierSchedule,
) -> f64 {
    block
        .days()
        .map(|day| daily_commission(day_totals.get(&day).copied().unwrap_or(0), schedule))
        .sum()
}

/// Sum over every week block of the period. Days before the cutover guard
/// are skipped even when totals exist for them (legacy-data guard).
pub fn cycle_commission(
    ctx: &CycleContext,
    day_totals: &BTreeMap<NaiveDate, i64>,
    schedule: &TierSchedule,
) -> f64 {
    ctx.blocks
        .iter()
        .flat_map(|block| block.days())
        .filter(|day| *day >= ctx.cutover_date)
        .map(|day| daily_commission(day_totals.get(&day).copied().unwrap_or(0), schedule))
        .sum()
}

/// Paid beats everything; an unpaid cycle past its due date is overdue; a
/// cycle still running is in progress; otherwise payment is due.
pub fn payment_status(
    paid: bool,
    due_date: NaiveDate,
    period_end: NaiveDate,
    today: NaiveDate,
) -> PaymentStatus {
    if paid {
        PaymentStatus::Paid
    } else if today > due_date {
        PaymentStatus::Overdue
    } else if today <= period_end {
        PaymentStatus::InProgress
    } else {
        PaymentStatus::Due
    }
}
