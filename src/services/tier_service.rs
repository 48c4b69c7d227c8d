use chrono::NaiveDate;

use crate::db::repositories::tier_repository::TierRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::tier::{Tier, TierSchedule, TierScheduleInput, WorkerProfile};

/// Selects tier schedules and resolves daily point totals against them.
pub struct TierService {
    db: DbPool,
}

impl TierService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn define_schedule(&self, input: TierScheduleInput) -> AppResult<()> {
        if input.tiers.iter().any(|tier| tier.threshold < 0) {
            return Err(AppError::validation("tier thresholds must not be negative"));
        }

        let mut sorted = input;
        sorted.tiers.sort_by_key(|tier| tier.threshold);

        let mut conn = self.db.get_connection()?;
        TierRepository::upsert_schedule(&mut conn, &sorted)
    }

    /// The schedule version in force for a worker on `evaluation_date`: the
    /// latest version whose effective date is not in the future.
    pub fn active_schedule(
        &self,
        profile: &WorkerProfile,
        evaluation_date: NaiveDate,
    ) -> AppResult<TierSchedule> {
        let conn = self.db.get_connection()?;
        TierRepository::find_active(
            &conn,
            &profile.worker_type,
            &profile.worker_level,
            evaluation_date,
        )?
        .ok_or_else(AppError::not_found)
    }
}

/// Highest tier whose threshold the day's points satisfy, or None when even
/// the lowest threshold is missed (commission 0).
pub fn resolve_tier(points: i64, schedule: &TierSchedule) -> Option<&Tier> {
    schedule
        .tiers
        .iter()
        .rev()
        .find(|tier| tier.threshold <= points)
}

/// The tier with the maximum threshold; the surplus baseline for vault
/// crediting.
pub fn resolve_top_tier(schedule: &TierSchedule) -> Option<&Tier> {
    schedule.tiers.iter().max_by_key(|tier| tier.threshold)
}
