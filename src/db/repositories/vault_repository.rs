use std::convert::TryFrom;

use chrono::NaiveDate;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::vault::{VaultAccount, VaultLogEntry, VaultLogKind};

#[derive(Debug, Clone)]
struct VaultAccountRow {
    worker_id: String,
    balance: i64,
    redemptions_used: i64,
    cycle_reference: String,
    version: i64,
    updated_at: String,
}

impl VaultAccountRow {
    fn into_account(self) -> VaultAccount {
        VaultAccount {
            worker_id: self.worker_id,
            balance: self.balance,
            redemptions_used: self.redemptions_used.max(0) as u32,
            cycle_reference: self.cycle_reference,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for VaultAccountRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            worker_id: row.get("worker_id")?,
            balance: row.get("balance")?,
            redemptions_used: row.get("redemptions_used")?,
            cycle_reference: row.get("cycle_reference")?,
            version: row.get("version")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
struct VaultLogRow {
    id: i64,
    worker_id: String,
    kind: String,
    amount: i64,
    entry_date: Option<String>,
    description: String,
    created_at: String,
}

impl VaultLogRow {
    fn into_entry(self) -> AppResult<VaultLogEntry> {
        let kind = VaultLogKind::parse(&self.kind)
            .ok_or_else(|| AppError::database(format!("unknown vault log kind: {}", self.kind)))?;
        let entry_date = self
            .entry_date
            .as_deref()
            .map(|raw| {
                raw.parse::<NaiveDate>()
                    .map_err(|err| AppError::database(format!("bad log entry date: {err}")))
            })
            .transpose()?;

        Ok(VaultLogEntry {
            id: self.id,
            worker_id: self.worker_id,
            kind,
            amount: self.amount,
            entry_date,
            description: self.description,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<&Row<'_>> for VaultLogRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            worker_id: row.get("worker_id")?,
            kind: row.get("kind")?,
            amount: row.get("amount")?,
            entry_date: row.get("entry_date")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct VaultRepository;

impl VaultRepository {
    pub fn find_account(conn: &Connection, worker_id: &str) -> AppResult<Option<VaultAccount>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT worker_id, balance, redemptions_used, cycle_reference, version, updated_at
                FROM vault_balance
                WHERE worker_id = :worker_id
            "#,
        )?;

        let row = stmt
            .query_row(named_params! {":worker_id": worker_id}, |row| {
                VaultAccountRow::try_from(row)
            })
            .optional()?;

        Ok(row.map(VaultAccountRow::into_account))
    }

    pub fn insert_account(
        conn: &Connection,
        worker_id: &str,
        cycle_reference: &str,
        now: &str,
    ) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT OR IGNORE INTO vault_balance (
                    worker_id, balance, redemptions_used, cycle_reference, version, updated_at
                ) VALUES (:worker_id, 0, 0, :cycle_reference, 0, :updated_at)
            "#,
            named_params! {
                ":worker_id": worker_id,
                ":cycle_reference": cycle_reference,
                ":updated_at": now,
            },
        )?;
        Ok(())
    }

    /// Version-checked account write. Returns false when another writer got
    /// there first; the caller re-reads and retries.
    pub fn update_account_checked(
        conn: &Connection,
        account: &VaultAccount,
        now: &str,
    ) -> AppResult<bool> {
        let changed = conn.execute(
            r#"
                UPDATE vault_balance
                SET balance = :balance,
                    redemptions_used = :redemptions_used,
                    cycle_reference = :cycle_reference,
                    version = version + 1,
                    updated_at = :updated_at
                WHERE worker_id = :worker_id AND version = :expected_version
            "#,
            named_params! {
                ":balance": account.balance,
                ":redemptions_used": account.redemptions_used as i64,
                ":cycle_reference": &account.cycle_reference,
                ":updated_at": now,
                ":worker_id": &account.worker_id,
                ":expected_version": account.version,
            },
        )?;

        Ok(changed == 1)
    }

    pub fn append_log(
        conn: &Connection,
        worker_id: &str,
        kind: VaultLogKind,
        amount: i64,
        entry_date: Option<NaiveDate>,
        description: &str,
        now: &str,
    ) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO vault_log (worker_id, kind, amount, entry_date, description, created_at)
                VALUES (:worker_id, :kind, :amount, :entry_date, :description, :created_at)
            "#,
            named_params! {
                ":worker_id": worker_id,
                ":kind": kind.as_str(),
                ":amount": amount,
                ":entry_date": entry_date.map(|date| date.to_string()),
                ":description": description,
                ":created_at": now,
            },
        )?;
        Ok(())
    }

    /// Every calendar day that already carries a surplus credit for this
    /// worker. The scan skips these; the unique index is the backstop.
    pub fn credited_dates(conn: &Connection, worker_id: &str) -> AppResult<Vec<NaiveDate>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT entry_date
                FROM vault_log
                WHERE worker_id = :worker_id AND kind = 'CREDIT' AND entry_date IS NOT NULL
            "#,
        )?;

        let dates = stmt
            .query_map(named_params! {":worker_id": worker_id}, |row| {
                row.get::<_, String>(0)
            })?
            .map(|raw| {
                raw.map_err(AppError::from).and_then(|raw| {
                    raw.parse::<NaiveDate>()
                        .map_err(|err| AppError::database(format!("bad credit date: {err}")))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(dates)
    }

    pub fn list_log(
        conn: &Connection,
        worker_id: &str,
        limit: usize,
    ) -> AppResult<Vec<VaultLogEntry>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, worker_id, kind, amount, entry_date, description, created_at
                FROM vault_log
                WHERE worker_id = :worker_id
                ORDER BY id DESC
                LIMIT :limit
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {":worker_id": worker_id, ":limit": limit as i64},
                |row| VaultLogRow::try_from(row),
            )?
            .map(|row| row.map_err(AppError::from).and_then(VaultLogRow::into_entry))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// Redemptions applied toward days inside a date range, across all
    /// workers. Feeds the live daily-total view only.
    pub fn redemptions_between(
        conn: &Connection,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<VaultLogEntry>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, worker_id, kind, amount, entry_date, description, created_at
                FROM vault_log
                WHERE kind = 'REDEMPTION'
                  AND entry_date IS NOT NULL
                  AND entry_date >= :start
                  AND entry_date <= :end
                ORDER BY id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {":start": start.to_string(), ":end": end.to_string()},
                |row| VaultLogRow::try_from(row),
            )?
            .map(|row| row.map_err(AppError::from).and_then(VaultLogRow::into_entry))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }
}
