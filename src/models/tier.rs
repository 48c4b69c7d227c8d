use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub threshold: i64,
    pub commission: f64,
    pub label: String,
}

/// One versioned tier table for a `(worker_type, worker_level)` pair.
/// Tiers are kept sorted ascending by threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSchedule {
    pub worker_type: String,
    pub worker_level: String,
    pub effective_date: NaiveDate,
    pub tiers: Vec<Tier>,
}

impl TierSchedule {
    pub fn sorted(mut self) -> Self {
        self.tiers.sort_by_key(|tier| tier.threshold);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierScheduleInput {
    pub worker_type: String,
    pub worker_level: String,
    pub effective_date: NaiveDate,
    pub tiers: Vec<Tier>,
}

/// Identity attributes supplied by the upstream access system; selects the
/// schedule family a worker is evaluated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerProfile {
    pub worker_id: String,
    pub worker_type: String,
    pub worker_level: String,
}
