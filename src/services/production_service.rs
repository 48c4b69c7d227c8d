use chrono::NaiveDate;
use tracing::debug;

use crate::db::repositories::production_repository::ProductionRepository;
use crate::db::repositories::vault_repository::VaultRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::production::{DailyTotals, ProductionEvent, ProductionEventInput};
use crate::models::vault::VaultLogEntry;
use crate::services::fiscal_calendar::CycleContext;

/// Folds raw point-bearing production events into per-worker, per-day
/// totals. Events are produced upstream and read-only here; the service only
/// stores and aggregates them.
pub struct ProductionService {
    db: DbPool,
}

impl ProductionService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn record_event(&self, input: ProductionEventInput) -> AppResult<ProductionEvent> {
        if input.worker_id.trim().is_empty() {
            return Err(AppError::validation("worker id must not be empty"));
        }
        if input.quantity < 0 {
            return Err(AppError::validation("event quantity must not be negative"));
        }
        if matches!(input.points, Some(points) if points < 0) {
            return Err(AppError::validation("event points must not be negative"));
        }

        let conn = self.db.get_connection()?;
        ProductionRepository::insert_event(&conn, &input)?;

        Ok(ProductionEvent {
            worker_id: input.worker_id,
            date: input.date,
            points: input.points,
            quantity: input.quantity,
            source: input.source,
        })
    }

    pub fn events_for_worker(
        &self,
        worker_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<ProductionEvent>> {
        let conn = self.db.get_connection()?;
        ProductionRepository::list_for_worker_between(&conn, worker_id, start, end)
    }

    /// Build both daily-total views for the context's period: the live view
    /// folds every stored event plus redemptions applied on their day; the
    /// auditable view only admits fully elapsed in-period days past the
    /// cutover guard.
    pub fn aggregate_daily(&self, ctx: &CycleContext) -> AppResult<DailyTotals> {
        let conn = self.db.get_connection()?;
        let events = ProductionRepository::list_all(&conn)?;
        let redemptions =
            VaultRepository::redemptions_between(&conn, ctx.period.start, ctx.period.end)?;

        let totals = fold_daily(
            &events,
            &redemptions,
            ctx.period.start,
            ctx.today,
            ctx.cutover_date,
        );
        debug!(
            target: "ledger::production",
            live_days = totals.live.len(),
            auditable_days = totals.auditable.len(),
            "aggregated daily totals"
        );
        Ok(totals)
    }
}

/// Pure fold rule. Each event contributes its explicit point value, or its
/// quantity 1:1 when no value was recorded. Redemptions only ever boost the
/// live view; audited surplus must come from production alone.
pub fn fold_daily(
    events: &[ProductionEvent],
    redemptions: &[VaultLogEntry],
    period_start: NaiveDate,
    today: NaiveDate,
    cutover_date: NaiveDate,
) -> DailyTotals {
    let mut totals = DailyTotals::default();

    for event in events {
        let points = event.point_value();
        *totals
            .live
            .entry((event.worker_id.clone(), event.date))
            .or_insert(0) += points;

        let auditable =
            event.date < today && event.date >= period_start && event.date >= cutover_date;
        if auditable {
            *totals
                .auditable
                .entry((event.worker_id.clone(), event.date))
                .or_insert(0) += points;
        }
    }

    for entry in redemptions {
        if let Some(date) = entry.entry_date {
            *totals
                .live
                .entry((entry.worker_id.clone(), date))
                .or_insert(0) += entry.amount;
        }
    }

    totals
}
