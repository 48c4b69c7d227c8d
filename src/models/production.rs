use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A point-bearing production event supplied by the upstream recording
/// system. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionEvent {
    pub worker_id: String,
    pub date: NaiveDate,
    /// Explicit point value; when absent the quantity counts 1:1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(default)]
    pub quantity: i64,
    pub source: String,
}

impl ProductionEvent {
    pub fn point_value(&self) -> i64 {
        self.points.unwrap_or(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionEventInput {
    pub worker_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub quantity: i64,
    pub source: String,
}

/// Per-worker, per-day point totals in two views.
///
/// `live` folds every event (plus redemptions applied that day) and feeds
/// dashboards; `auditable` only holds fully elapsed days inside the period
/// and past the cutover guard, and is the sole input to surplus crediting.
#[derive(Debug, Clone, Default)]
pub struct DailyTotals {
    pub live: BTreeMap<(String, NaiveDate), i64>,
    pub auditable: BTreeMap<(String, NaiveDate), i64>,
}

impl DailyTotals {
    pub fn live_for(&self, worker_id: &str, date: NaiveDate) -> i64 {
        self.live
            .get(&(worker_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }

    pub fn auditable_for(&self, worker_id: &str, date: NaiveDate) -> i64 {
        self.auditable
            .get(&(worker_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }

    /// Auditable days for one worker, ascending by date.
    pub fn auditable_days(&self, worker_id: &str) -> BTreeMap<NaiveDate, i64> {
        self.auditable
            .iter()
            .filter(|((worker, _), _)| worker == worker_id)
            .map(|((_, date), points)| (*date, *points))
            .collect()
    }

    /// Live (dashboard) days for one worker, ascending by date.
    pub fn live_days(&self, worker_id: &str) -> BTreeMap<NaiveDate, i64> {
        self.live
            .iter()
            .filter(|((worker, _), _)| worker == worker_id)
            .map(|((_, date), points)| (*date, *points))
            .collect()
    }
}
