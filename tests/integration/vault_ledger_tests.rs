use std::sync::Arc;
use std::thread;

use chrono::{NaiveDate, Utc};
use piecework_ledger::db::repositories::vault_repository::VaultRepository;
use piecework_ledger::db::DbPool;
use piecework_ledger::error::AppError;
use piecework_ledger::models::production::DailyTotals;
use piecework_ledger::models::tier::{Tier, TierSchedule};
use piecework_ledger::models::vault::VaultLogKind;
use piecework_ledger::services::fiscal_calendar::compute_period;
use piecework_ledger::services::vault_service::VaultService;
use tempfile::tempdir;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn test_service() -> (VaultService, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("vault.sqlite")).expect("db pool");
    (VaultService::new(pool), dir)
}

fn schedule() -> TierSchedule {
    TierSchedule {
        worker_type: "assembler".to_string(),
        worker_level: "senior".to_string(),
        effective_date: date(2026, 1, 1),
        tiers: vec![
            Tier {
                threshold: 60,
                commission: 10.0,
                label: "bronze".to_string(),
            },
            Tier {
                threshold: 120,
                commission: 30.0,
                label: "gold".to_string(),
            },
        ],
    }
}

fn totals_for(worker: &str, days: &[(NaiveDate, i64)]) -> DailyTotals {
    let mut totals = DailyTotals::default();
    for (day, points) in days {
        totals.live.insert((worker.to_string(), *day), *points);
        totals
            .auditable
            .insert((worker.to_string(), *day), *points);
    }
    totals
}

#[test]
fn accounts_are_created_lazily_with_zero_balance() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");

    let account = service.ensure_account("w1", &period).expect("account");
    assert_eq!(account.balance, 0);
    assert_eq!(account.redemptions_used, 0);
    assert_eq!(account.cycle_reference, period.cycle_key());
}

#[test]
fn surplus_above_the_top_tier_is_credited_once_per_day() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();

    // A week of daily points with one 130-point day against a 120 top tier.
    let week: Vec<(NaiveDate, i64)> = (0..7)
        .map(|offset| {
            let day = date(2026, 1, 21) + chrono::Duration::days(offset);
            (day, if offset == 2 { 130 } else { 0 })
        })
        .collect();
    let totals = totals_for("w1", &week);

    let audit = service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("audit");
    assert_eq!(audit.credited_days, vec![date(2026, 1, 23)]);
    assert_eq!(audit.credited_points, 10);
    assert_eq!(audit.balance, 10);

    let log = service.recent_activity("w1", 100).expect("log");
    let credits: Vec<_> = log
        .iter()
        .filter(|entry| entry.kind == VaultLogKind::Credit)
        .collect();
    assert_eq!(credits.len(), 1);
    assert_eq!(credits[0].amount, 10);
    assert_eq!(credits[0].entry_date, Some(date(2026, 1, 23)));
}

#[test]
fn surplus_audit_is_idempotent() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();
    let totals = totals_for(
        "w1",
        &[(date(2026, 1, 23), 130), (date(2026, 1, 24), 150)],
    );

    let first = service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("first audit");
    assert_eq!(first.credited_points, 40);
    assert_eq!(first.balance, 40);

    let second = service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("second audit");
    assert!(second.credited_days.is_empty());
    assert_eq!(second.balance, 40);

    let log = service.recent_activity("w1", 100).expect("log");
    let credit_count = log
        .iter()
        .filter(|entry| entry.kind == VaultLogKind::Credit)
        .count();
    assert_eq!(credit_count, 2);
}

#[test]
fn points_at_or_below_the_top_tier_never_credit() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();
    let totals = totals_for(
        "w1",
        &[(date(2026, 1, 23), 120), (date(2026, 1, 24), 95)],
    );

    let audit = service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("audit");
    assert!(audit.credited_days.is_empty());
    assert_eq!(audit.balance, 0);
}

#[test]
fn redeem_decrements_balance_and_counts_toward_the_cap() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();

    // Bank 14 points of surplus, then burn four single-point redemptions so
    // the account sits at balance 10 with 4 of 5 redemptions used.
    let totals = totals_for("w1", &[(date(2026, 1, 23), 134)]);
    service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("audit");

    for _ in 0..4 {
        service
            .redeem("w1", 1, date(2026, 2, 9), &period)
            .expect("redeem");
    }

    let account = service
        .redeem("w1", 10, date(2026, 2, 9), &period)
        .expect("fifth redemption");
    assert_eq!(account.balance, 0);
    assert_eq!(account.redemptions_used, 5);

    let err = service
        .redeem("w1", 1, date(2026, 2, 9), &period)
        .expect_err("sixth redemption");
    assert!(matches!(
        err,
        AppError::RedemptionLimitExceeded { used: 5, limit: 5 }
    ));
}

#[test]
fn redeem_never_drives_the_balance_negative() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();
    let totals = totals_for("w1", &[(date(2026, 1, 23), 130)]);
    service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("audit");

    let err = service
        .redeem("w1", 11, date(2026, 2, 9), &period)
        .expect_err("over-redemption");
    assert!(matches!(
        err,
        AppError::InsufficientBalance {
            requested: 11,
            available: 10
        }
    ));

    let account = service.ensure_account("w1", &period).expect("account");
    assert_eq!(account.balance, 10);
    assert_eq!(account.redemptions_used, 0);
}

#[test]
fn non_positive_redemption_amounts_are_rejected() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");

    let err = service
        .redeem("w1", 0, date(2026, 2, 9), &period)
        .expect_err("zero amount");
    assert!(matches!(err, AppError::Validation { .. }));

    let err = service
        .redeem("w1", -5, date(2026, 2, 9), &period)
        .expect_err("negative amount");
    assert!(matches!(err, AppError::Validation { .. }));
}

#[test]
fn cycle_turnover_resets_the_account_exactly_once() {
    let (service, _dir) = test_service();

    // January cycle: bank some surplus and use a redemption.
    let january = compute_period(date(2026, 1, 10)).expect("january period");
    assert_eq!(january.competency, "January 2026");
    let schedule = schedule();
    let totals = totals_for("w1", &[(date(2025, 12, 23), 150)]);
    service
        .audit_surplus("w1", &totals, &schedule, &january)
        .expect("audit");
    service
        .redeem("w1", 5, date(2026, 1, 9), &january)
        .expect("redeem");

    // February cycle begins: the stored January reference is stale.
    let february = compute_period(date(2026, 2, 10)).expect("february period");
    assert_eq!(february.competency, "February 2026");

    let rolled = service
        .check_and_roll_cycle("w1", &february)
        .expect("first roll");
    assert_eq!(rolled.balance, 0);
    assert_eq!(rolled.redemptions_used, 0);
    assert_eq!(rolled.cycle_reference, february.cycle_key());

    let again = service
        .check_and_roll_cycle("w1", &february)
        .expect("second roll");
    assert_eq!(again.balance, 0);

    let log = service.recent_activity("w1", 100).expect("log");
    let resets: Vec<_> = log
        .iter()
        .filter(|entry| entry.kind == VaultLogKind::Reset)
        .collect();
    assert_eq!(resets.len(), 1);
    assert!(resets[0].description.contains("February 2026"));
}

#[test]
fn balance_always_matches_the_log_since_the_last_reset() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();
    let totals = totals_for(
        "w1",
        &[(date(2026, 1, 23), 150), (date(2026, 1, 27), 140)],
    );
    service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("audit");
    service
        .redeem("w1", 12, date(2026, 2, 9), &period)
        .expect("redeem");

    let account = service.ensure_account("w1", &period).expect("account");
    let log = service.recent_activity("w1", 100).expect("log");
    let ledger_sum: i64 = log
        .iter()
        .map(|entry| match entry.kind {
            VaultLogKind::Credit => entry.amount,
            VaultLogKind::Redemption => -entry.amount,
            VaultLogKind::Reset => 0,
        })
        .sum();
    assert_eq!(account.balance, ledger_sum);
    assert_eq!(account.balance, 30 + 20 - 12);
}

#[test]
fn concurrent_redemptions_serialize_behind_the_account_lock() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("vault.sqlite")).expect("db pool");
    // Lift the per-cycle cap so every thread's redemptions count.
    let service = Arc::new(VaultService::with_redemption_limit(pool, 100));
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();

    // Seed a 40-point balance: one 160-point day against the 120 top tier.
    let totals = totals_for("w1", &[(date(2026, 1, 23), 160)]);
    service
        .audit_surplus("w1", &totals, &schedule, &period)
        .expect("audit");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        let period = period.clone();
        handles.push(thread::spawn(move || {
            let mut succeeded = 0_i64;
            for _ in 0..4 {
                if service.redeem("w1", 1, date(2026, 2, 9), &period).is_ok() {
                    succeeded += 1;
                }
            }
            succeeded
        }));
    }

    let succeeded: i64 = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .sum();
    assert_eq!(succeeded, 32);

    let account = service.ensure_account("w1", &period).expect("account");
    assert_eq!(account.balance, 40 - succeeded);
    assert_eq!(account.redemptions_used, 32);

    let log = service.recent_activity("w1", 200).expect("log");
    let ledger_sum: i64 = log
        .iter()
        .map(|entry| match entry.kind {
            VaultLogKind::Credit => entry.amount,
            VaultLogKind::Redemption => -entry.amount,
            VaultLogKind::Reset => 0,
        })
        .sum();
    assert_eq!(account.balance, ledger_sum);
}

#[test]
fn interleaved_audits_and_redemptions_never_corrupt_the_balance() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("vault.sqlite")).expect("db pool");
    let service = Arc::new(VaultService::with_redemption_limit(pool, 100));
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();
    let totals = totals_for(
        "w1",
        &[(date(2026, 1, 23), 150), (date(2026, 1, 27), 140)],
    );

    // One thread re-runs the opportunistic scan while another redeems;
    // both queue on the same account lock. Redemptions racing ahead of the
    // first credit simply fail on balance and are not retried here.
    let auditor = {
        let service = Arc::clone(&service);
        let period = period.clone();
        let schedule = schedule.clone();
        let totals = totals.clone();
        thread::spawn(move || {
            for _ in 0..10 {
                service
                    .audit_surplus("w1", &totals, &schedule, &period)
                    .expect("audit");
            }
        })
    };
    let redeemer = {
        let service = Arc::clone(&service);
        let period = period.clone();
        thread::spawn(move || {
            let mut succeeded = 0_i64;
            for _ in 0..20 {
                if service.redeem("w1", 1, date(2026, 2, 9), &period).is_ok() {
                    succeeded += 1;
                }
            }
            succeeded
        })
    };

    auditor.join().expect("auditor thread");
    let succeeded = redeemer.join().expect("redeemer thread");

    let account = service.ensure_account("w1", &period).expect("account");
    assert!(account.balance >= 0);
    assert_eq!(account.balance, 50 - succeeded);

    let log = service.recent_activity("w1", 200).expect("log");
    let credits = log
        .iter()
        .filter(|entry| entry.kind == VaultLogKind::Credit)
        .count();
    assert_eq!(credits, 2, "each surplus day credits exactly once");
    let ledger_sum: i64 = log
        .iter()
        .map(|entry| match entry.kind {
            VaultLogKind::Credit => entry.amount,
            VaultLogKind::Redemption => -entry.amount,
            VaultLogKind::Reset => 0,
        })
        .sum();
    assert_eq!(account.balance, ledger_sum);
}

#[test]
fn stale_version_writes_are_rejected() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("vault.sqlite")).expect("db pool");
    let conn = pool.get_connection().expect("connection");
    let now = Utc::now().to_rfc3339();

    VaultRepository::insert_account(&conn, "w1", "2026-01-21", &now).expect("insert");
    let account = VaultRepository::find_account(&conn, "w1")
        .expect("find")
        .expect("account");
    assert_eq!(account.version, 0);

    // First writer wins and bumps the version.
    let mut first = account.clone();
    first.balance = 5;
    assert!(VaultRepository::update_account_checked(&conn, &first, &now).expect("first write"));

    // A writer still holding the old version must be turned away.
    let mut stale = account;
    stale.balance = 99;
    assert!(!VaultRepository::update_account_checked(&conn, &stale, &now).expect("stale write"));

    let current = VaultRepository::find_account(&conn, "w1")
        .expect("find")
        .expect("account");
    assert_eq!(current.balance, 5);
    assert_eq!(current.version, 1);
}

#[test]
fn accounts_of_different_workers_are_independent() {
    let (service, _dir) = test_service();
    let period = compute_period(date(2026, 2, 10)).expect("period");
    let schedule = schedule();

    service
        .audit_surplus(
            "w1",
            &totals_for("w1", &[(date(2026, 1, 23), 130)]),
            &schedule,
            &period,
        )
        .expect("audit w1");
    service
        .audit_surplus(
            "w2",
            &totals_for("w2", &[(date(2026, 1, 23), 145)]),
            &schedule,
            &period,
        )
        .expect("audit w2");

    let one = service.ensure_account("w1", &period).expect("w1");
    let two = service.ensure_account("w2", &period).expect("w2");
    assert_eq!(one.balance, 10);
    assert_eq!(two.balance, 25);
}
