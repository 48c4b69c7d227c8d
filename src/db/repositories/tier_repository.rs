use chrono::NaiveDate;
use rusqlite::{named_params, Connection, OptionalExtension};

use crate::error::{AppError, AppResult};
use crate::models::tier::{Tier, TierSchedule, TierScheduleInput};

pub struct TierRepository;

impl TierRepository {
    /// Store one schedule version. Re-submitting the same
    /// `(type, level, effective_date)` replaces its tier rows.
    pub fn upsert_schedule(conn: &mut Connection, input: &TierScheduleInput) -> AppResult<()> {
        if input.tiers.is_empty() {
            return Err(AppError::validation("tier schedule must contain at least one tier"));
        }

        let tx = conn.transaction()?;

        tx.execute(
            r#"
                INSERT INTO tier_schedule (worker_type, worker_level, effective_date, created_at)
                VALUES (:worker_type, :worker_level, :effective_date, :created_at)
                ON CONFLICT(worker_type, worker_level, effective_date) DO NOTHING
            "#,
            named_params! {
                ":worker_type": &input.worker_type,
                ":worker_level": &input.worker_level,
                ":effective_date": input.effective_date.to_string(),
                ":created_at": chrono::Utc::now().to_rfc3339(),
            },
        )?;

        let schedule_id: i64 = tx.query_row(
            r#"
                SELECT id FROM tier_schedule
                WHERE worker_type = :worker_type
                  AND worker_level = :worker_level
                  AND effective_date = :effective_date
            "#,
            named_params! {
                ":worker_type": &input.worker_type,
                ":worker_level": &input.worker_level,
                ":effective_date": input.effective_date.to_string(),
            },
            |row| row.get(0),
        )?;

        tx.execute(
            "DELETE FROM tier WHERE schedule_id = :schedule_id",
            named_params! {":schedule_id": schedule_id},
        )?;

        for tier in &input.tiers {
            tx.execute(
                r#"
                    INSERT INTO tier (schedule_id, threshold, commission, label)
                    VALUES (:schedule_id, :threshold, :commission, :label)
                "#,
                named_params! {
                    ":schedule_id": schedule_id,
                    ":threshold": tier.threshold,
                    ":commission": tier.commission,
                    ":label": &tier.label,
                },
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// The active version for an evaluation date: the latest effective date
    /// at or before it. Exactly one version is active for any date.
    pub fn find_active(
        conn: &Connection,
        worker_type: &str,
        worker_level: &str,
        evaluation_date: NaiveDate,
    ) -> AppResult<Option<TierSchedule>> {
        let header = conn
            .query_row(
                r#"
                    SELECT id, effective_date
                    FROM tier_schedule
                    WHERE worker_type = :worker_type
                      AND worker_level = :worker_level
                      AND effective_date <= :evaluation_date
                    ORDER BY effective_date DESC
                    LIMIT 1
                "#,
                named_params! {
                    ":worker_type": worker_type,
                    ":worker_level": worker_level,
                    ":evaluation_date": evaluation_date.to_string(),
                },
                |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                },
            )
            .optional()?;

        let Some((schedule_id, effective_raw)) = header else {
            return Ok(None);
        };

        let effective_date = effective_raw
            .parse::<NaiveDate>()
            .map_err(|err| AppError::database(format!("bad effective date: {err}")))?;

        let mut stmt = conn.prepare(
            r#"
                SELECT threshold, commission, label
                FROM tier
                WHERE schedule_id = :schedule_id
                ORDER BY threshold ASC
            "#,
        )?;

        let tiers = stmt
            .query_map(named_params! {":schedule_id": schedule_id}, |row| {
                Ok(Tier {
                    threshold: row.get(0)?,
                    commission: row.get(1)?,
                    label: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(TierSchedule {
            worker_type: worker_type.to_string(),
            worker_level: worker_level.to_string(),
            effective_date,
            tiers,
        }))
    }
}
