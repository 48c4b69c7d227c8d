use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::payment::PaymentRecord;

#[derive(Debug, Clone)]
struct PaymentRow {
    worker_id: String,
    cycle_name: String,
    amount: f64,
    receipt_id: String,
    paid_at: String,
    payer: String,
}

impl PaymentRow {
    fn into_record(self) -> AppResult<PaymentRecord> {
        let receipt_id = Uuid::parse_str(&self.receipt_id)
            .map_err(|err| AppError::database(format!("bad receipt id: {err}")))?;

        Ok(PaymentRecord {
            worker_id: self.worker_id,
            cycle_name: self.cycle_name,
            amount: self.amount,
            receipt_id,
            paid_at: self.paid_at,
            payer: self.payer,
        })
    }
}

impl TryFrom<&Row<'_>> for PaymentRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            worker_id: row.get("worker_id")?,
            cycle_name: row.get("cycle_name")?,
            amount: row.get("amount")?,
            receipt_id: row.get("receipt_id")?,
            paid_at: row.get("paid_at")?,
            payer: row.get("payer")?,
        })
    }
}

pub struct PaymentRepository;

impl PaymentRepository {
    pub fn insert(conn: &Connection, record: &PaymentRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO payment_record (worker_id, cycle_name, amount, receipt_id, paid_at, payer)
                VALUES (:worker_id, :cycle_name, :amount, :receipt_id, :paid_at, :payer)
            "#,
            named_params! {
                ":worker_id": &record.worker_id,
                ":cycle_name": &record.cycle_name,
                ":amount": record.amount,
                ":receipt_id": record.receipt_id.to_string(),
                ":paid_at": &record.paid_at,
                ":payer": &record.payer,
            },
        )?;
        Ok(())
    }

    pub fn find(
        conn: &Connection,
        worker_id: &str,
        cycle_name: &str,
    ) -> AppResult<Option<PaymentRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT worker_id, cycle_name, amount, receipt_id, paid_at, payer
                FROM payment_record
                WHERE worker_id = :worker_id AND cycle_name = :cycle_name
            "#,
        )?;

        let row = stmt
            .query_row(
                named_params! {":worker_id": worker_id, ":cycle_name": cycle_name},
                |row| PaymentRow::try_from(row),
            )
            .optional()?;

        row.map(PaymentRow::into_record).transpose()
    }

    pub fn list_for_cycle(conn: &Connection, cycle_name: &str) -> AppResult<Vec<PaymentRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT worker_id, cycle_name, amount, receipt_id, paid_at, payer
                FROM payment_record
                WHERE cycle_name = :cycle_name
                ORDER BY worker_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(named_params! {":cycle_name": cycle_name}, |row| {
                PaymentRow::try_from(row)
            })?
            .map(|row| row.map_err(AppError::from).and_then(PaymentRow::into_record))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }
}
