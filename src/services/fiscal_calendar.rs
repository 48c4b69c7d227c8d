use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{AppError, AppResult};
use crate::models::fiscal::{competency_label, FiscalPeriod, WeekBlock};

/// Request-scoped calendar context, built once per pass and handed down the
/// call chain so no service keeps hidden cross-request state.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub today: NaiveDate,
    pub period: FiscalPeriod,
    pub blocks: Vec<WeekBlock>,
    /// Program-start guard: days before this never enter auditable totals
    /// or cycle commissions.
    pub cutover_date: NaiveDate,
}

impl CycleContext {
    pub fn build(today: NaiveDate, cutover_date: NaiveDate) -> AppResult<Self> {
        let period = compute_period(today)?;
        let blocks = compute_week_blocks(period.start, period.end)?;
        Ok(Self {
            today,
            period,
            blocks,
            cutover_date,
        })
    }
}

/// The accounting period containing `reference`: day 21 of one month through
/// day 20 of the next. On or after the 21st the window opens in the current
/// month and the competency is the following month; before the 21st it opened
/// in the previous month.
pub fn compute_period(reference: NaiveDate) -> AppResult<FiscalPeriod> {
    let (start_year, start_month) = if reference.day() >= 21 {
        (reference.year(), reference.month())
    } else {
        previous_month(reference.year(), reference.month())
    };

    let (end_year, end_month) = next_month(start_year, start_month);

    let start = ymd(start_year, start_month, 21)?;
    let end = ymd(end_year, end_month, 20)?;

    Ok(FiscalPeriod {
        start,
        end,
        competency: competency_label(end),
    })
}

/// Partition `[start, end]` into Saturday-bounded blocks. Each block ends on
/// the first Saturday on or after its start (clamped to `end`); the next
/// block starts the following day. Every day lands in exactly one block.
pub fn compute_week_blocks(start: NaiveDate, end: NaiveDate) -> AppResult<Vec<WeekBlock>> {
    if start > end {
        return Err(AppError::validation(format!(
            "period start {start} is after end {end}"
        )));
    }

    let mut blocks = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let days_to_saturday =
            (Weekday::Sat.num_days_from_sunday() + 7 - cursor.weekday().num_days_from_sunday()) % 7;
        let saturday = cursor + Duration::days(i64::from(days_to_saturday));
        let block_end = saturday.min(end);
        blocks.push(WeekBlock {
            index: blocks.len(),
            start: cursor,
            end: block_end,
        });
        cursor = block_end + Duration::days(1);
    }

    Ok(blocks)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> AppResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::validation(format!("invalid date {year}-{month:02}-{day:02}")))
}
