use std::convert::TryFrom;

use chrono::NaiveDate;
use rusqlite::{named_params, Connection, Row};

use crate::error::{AppError, AppResult};
use crate::models::production::{ProductionEvent, ProductionEventInput};

#[derive(Debug, Clone)]
struct ProductionEventRow {
    worker_id: String,
    event_date: String,
    points: Option<i64>,
    quantity: i64,
    source: String,
}

impl ProductionEventRow {
    fn into_event(self) -> AppResult<ProductionEvent> {
        let date = self
            .event_date
            .parse::<NaiveDate>()
            .map_err(|err| AppError::database(format!("bad event date: {err}")))?;

        Ok(ProductionEvent {
            worker_id: self.worker_id,
            date,
            points: self.points,
            quantity: self.quantity,
            source: self.source,
        })
    }
}

impl TryFrom<&Row<'_>> for ProductionEventRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            worker_id: row.get("worker_id")?,
            event_date: row.get("event_date")?,
            points: row.get("points")?,
            quantity: row.get("quantity")?,
            source: row.get("source")?,
        })
    }
}

pub struct ProductionRepository;

impl ProductionRepository {
    pub fn insert_event(conn: &Connection, input: &ProductionEventInput) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO production_event (worker_id, event_date, points, quantity, source, created_at)
                VALUES (:worker_id, :event_date, :points, :quantity, :source, :created_at)
            "#,
            named_params! {
                ":worker_id": &input.worker_id,
                ":event_date": input.date.to_string(),
                ":points": input.points,
                ":quantity": input.quantity,
                ":source": &input.source,
                ":created_at": chrono::Utc::now().to_rfc3339(),
            },
        )?;
        Ok(())
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<ProductionEvent>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT worker_id, event_date, points, quantity, source
                FROM production_event
                ORDER BY event_date ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| ProductionEventRow::try_from(row))?
            .map(|row| {
                row.map_err(AppError::from)
                    .and_then(ProductionEventRow::into_event)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn list_for_worker_between(
        conn: &Connection,
        worker_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<ProductionEvent>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT worker_id, event_date, points, quantity, source
                FROM production_event
                WHERE worker_id = :worker_id
                  AND event_date >= :start
                  AND event_date <= :end
                ORDER BY event_date ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":worker_id": worker_id,
                    ":start": start.to_string(),
                    ":end": end.to_string(),
                },
                |row| ProductionEventRow::try_from(row),
            )?
            .map(|row| {
                row.map_err(AppError::from)
                    .and_then(ProductionEventRow::into_event)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }
}
