use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-worker banked-points account. Created lazily with zero balance, never
/// deleted; mutated only by the vault service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultAccount {
    pub worker_id: String,
    pub balance: i64,
    pub redemptions_used: u32,
    /// ISO start date of the cycle this account was last reset for.
    pub cycle_reference: String,
    pub version: i64,
    pub updated_at: String,
}

impl VaultAccount {
    pub fn is_stale(&self, current_cycle_key: &str) -> bool {
        self.cycle_reference != current_cycle_key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultLogKind {
    Credit,
    Redemption,
    Reset,
}

impl VaultLogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VaultLogKind::Credit => "CREDIT",
            VaultLogKind::Redemption => "REDEMPTION",
            VaultLogKind::Reset => "RESET",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CREDIT" => Some(VaultLogKind::Credit),
            "REDEMPTION" => Some(VaultLogKind::Redemption),
            "RESET" => Some(VaultLogKind::Reset),
            _ => None,
        }
    }
}

/// Append-only audit entry. The account balance must always equal the sum of
/// credits minus redemptions recorded since the latest reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultLogEntry {
    pub id: i64,
    pub worker_id: String,
    pub kind: VaultLogKind,
    pub amount: i64,
    /// Structured idempotency key: the calendar day a credit covers, or the
    /// day a redemption was applied toward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_date: Option<NaiveDate>,
    pub description: String,
    pub created_at: String,
}

/// Outcome of one opportunistic surplus scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurplusAudit {
    pub credited_days: Vec<NaiveDate>,
    pub credited_points: i64,
    pub balance: i64,
}
