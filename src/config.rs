use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::services::vault_service::MAX_REDEMPTIONS_PER_CYCLE;

/// Engine configuration. `cutover_date` is the program-start guard: days
/// before it never enter auditable totals or cycle commissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_cutover_date")]
    pub cutover_date: NaiveDate,
    #[serde(default = "default_redemption_limit")]
    pub redemption_limit: u32,
}

impl LedgerConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            cutover_date: default_cutover_date(),
            redemption_limit: default_redemption_limit(),
        }
    }

    pub fn with_cutover_date(mut self, cutover_date: NaiveDate) -> Self {
        self.cutover_date = cutover_date;
        self
    }
}

fn default_cutover_date() -> NaiveDate {
    // First day of the first tracked fiscal period.
    NaiveDate::from_ymd_opt(2025, 11, 21).unwrap_or_default()
}

fn default_redemption_limit() -> u32 {
    MAX_REDEMPTIONS_PER_CYCLE
}
