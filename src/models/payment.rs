use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof of payment for one worker and one cycle. Existence of a record is
/// the sole source of truth for "already paid".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub worker_id: String,
    pub cycle_name: String,
    pub amount: f64,
    pub receipt_id: Uuid,
    pub paid_at: String,
    pub payer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Overdue,
    InProgress,
    Due,
}

/// Weekly breakdown plus cycle total for one worker, consumed by the
/// reporting collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStatement {
    pub worker_id: String,
    pub cycle_name: String,
    pub weekly_commissions: Vec<WeeklyCommission>,
    pub cycle_commission: f64,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCommission {
    pub block_index: usize,
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
    pub commission: f64,
}
