// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;

use paperdepot::auth::{self, Caller};
use paperdepot::errors::CoreError;
use paperdepot::models::{Frequency, Role};
use paperdepot::prices::PriceSource;
use paperdepot::scheduler::{self, RunStatus};
use paperdepot::{db, depots, plans, prices, projector};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

struct FixedPrices(HashMap<i64, Decimal>);

impl PriceSource for FixedPrices {
    fn price_at(
        &self,
        _conn: &Connection,
        asset_id: i64,
        _on: NaiveDate,
    ) -> Result<Option<Decimal>, CoreError> {
        Ok(self.0.get(&asset_id).copied())
    }
}

fn setup(cash_start: &str, budget: &str) -> (Connection, Caller, i64, i64) {
    let mut conn = db::open_in_memory().unwrap();
    auth::ensure_user(&conn, "alice", "Alice").unwrap();
    auth::ensure_user(&conn, "teach", "Ms. Keller").unwrap();
    auth::grant_role(&mut conn, &Caller::system(), "teach", Role::Teacher).unwrap();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let depot = depots::create_depot(&mut conn, &alice, "D", dec(cash_start), &[]).unwrap();
    let teach = Caller::resolve(&conn, "teach").unwrap();
    plans::change_budget(&mut conn, &teach, depot.id, dec(budget)).unwrap();
    let asset = prices::add_asset(&conn, "ABC", "ABC Corp", "EUR").unwrap();
    (conn, alice, depot.id, asset.id)
}

fn tx_count(conn: &Connection, depot_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE depot_id=?1",
        rusqlite::params![depot_id],
        |r| r.get(0),
    )
    .unwrap()
}

#[test]
fn remaining_budget_subtracts_normalized_plan_worths() {
    let (mut conn, alice, depot_id, asset_id) = setup("1000", "250");
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("100"),
        Frequency::Monthly,
        today,
    )
    .unwrap();

    let view = plans::budget_overview(&conn, &alice, depot_id).unwrap();
    assert_eq!(view.monthly_budget, dec("250"));
    assert_eq!(view.committed, dec("100"));
    assert_eq!(view.remaining, dec("150"));
}

#[test]
fn due_plan_executes_and_advances_one_period() {
    let (mut conn, alice, depot_id, asset_id) = setup("1000", "250");
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let plan = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("100"),
        Frequency::Monthly,
        today,
    )
    .unwrap();

    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let now = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap();
    let summary = scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(summary.executed, 1);
    assert_eq!(summary.skipped, 0);

    let proj = projector::project(&conn, depot_id).unwrap();
    assert_eq!(proj.cash, dec("900"));
    assert_eq!(proj.quantity_of(asset_id), dec("2"));

    let advanced = plans::get_plan(&conn, plan.id).unwrap();
    assert_eq!(
        advanced.next_due,
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
    );

    let runs = scheduler::runs_for_plan(&conn, plan.id).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].1, "executed");
}

#[test]
fn over_budget_plan_set_skips_and_still_advances() {
    let (mut conn, alice, depot_id, asset_id) = setup("1000", "250");
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let first = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("100"),
        Frequency::Monthly,
        today,
    )
    .unwrap();
    let second = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("200"),
        Frequency::Monthly,
        today,
    )
    .unwrap();
    assert_eq!(
        plans::remaining_budget(&conn, depot_id).unwrap(),
        dec("-50")
    );

    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let now = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap();
    let summary = scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(summary.executed, 0);
    assert_eq!(summary.skipped, 2);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.status == RunStatus::Skipped));

    // nothing hit the ledger, but the skips are durable and visible
    assert_eq!(tx_count(&conn, depot_id), 0);
    for plan_id in [first.id, second.id] {
        let runs = scheduler::runs_for_plan(&conn, plan_id).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].1, "skipped");
        assert!(runs[0].2.as_deref().unwrap_or("").contains("budget"));
        // and the occurrence still advanced — no re-attempt storm
        let plan = plans::get_plan(&conn, plan_id).unwrap();
        assert_eq!(plan.next_due, NaiveDate::from_ymd_opt(2026, 9, 1).unwrap());
    }
}

#[test]
fn rerunning_a_tick_materializes_each_occurrence_once() {
    let (mut conn, alice, depot_id, asset_id) = setup("1000", "250");
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let plan = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("100"),
        Frequency::Monthly,
        today,
    )
    .unwrap();

    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let now = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap();
    scheduler::run_tick(&mut conn, &source, now).unwrap();
    // second tick the same day: occurrence already advanced, nothing due
    let second = scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(second.executed + second.skipped, 0);
    assert_eq!(tx_count(&conn, depot_id), 1);

    // simulate a crash after the insert but before the advance: rewind
    // next_due to the already-materialized occurrence and re-run
    conn.execute(
        "UPDATE savings_plans SET next_due=?1 WHERE id=?2",
        rusqlite::params![today.to_string(), plan.id],
    )
    .unwrap();
    scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(tx_count(&conn, depot_id), 1, "occurrence must not double-execute");
    assert_eq!(scheduler::runs_for_plan(&conn, plan.id).unwrap().len(), 1);
}

#[test]
fn one_plans_failure_does_not_abort_the_tick() {
    let (mut conn, alice, depot_id, asset_id) = setup("1000", "500");
    let unquoted = prices::add_asset(&conn, "XYZ", "XYZ Corp", "EUR").unwrap();
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let broken = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        unquoted.id,
        dec("100"),
        Frequency::Monthly,
        today,
    )
    .unwrap();
    let healthy = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("100"),
        Frequency::Monthly,
        today,
    )
    .unwrap();

    // only ABC has a quote
    let source = FixedPrices(HashMap::from([(asset_id, dec("25"))]));
    let now = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap();
    let summary = scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(summary.executed, 1);
    assert_eq!(summary.skipped, 1);

    let broken_runs = scheduler::runs_for_plan(&conn, broken.id).unwrap();
    assert!(broken_runs[0].2.as_deref().unwrap_or("").contains("price"));
    let healthy_runs = scheduler::runs_for_plan(&conn, healthy.id).unwrap();
    assert_eq!(healthy_runs[0].1, "executed");
}

#[test]
fn insufficient_cash_skips_the_occurrence() {
    let (mut conn, alice, depot_id, asset_id) = setup("10", "250");
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let plan = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("100"),
        Frequency::Monthly,
        today,
    )
    .unwrap();

    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let now = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap();
    let summary = scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(tx_count(&conn, depot_id), 0);
    let runs = scheduler::runs_for_plan(&conn, plan.id).unwrap();
    assert!(runs[0].2.as_deref().unwrap_or("").contains("cash"));
}

#[test]
fn deleting_a_plan_stops_occurrences_but_keeps_history() {
    let (mut conn, alice, depot_id, asset_id) = setup("1000", "250");
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let plan = plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("100"),
        Frequency::Weekly,
        today,
    )
    .unwrap();

    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let now = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap();
    scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(tx_count(&conn, depot_id), 1);

    plans::delete_plans(&mut conn, &alice, &[plan.id]).unwrap();

    // the materialized transaction survives, detached from the plan
    let (count, plan_ref): (i64, Option<i64>) = conn
        .query_row(
            "SELECT COUNT(*), MAX(plan_id) FROM transactions WHERE depot_id=?1",
            rusqlite::params![depot_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(plan_ref, None);

    // a week later, nothing is due any more
    let later = Utc.with_ymd_and_hms(2026, 8, 8, 6, 0, 0).unwrap();
    let summary = scheduler::run_tick(&mut conn, &source, later).unwrap();
    assert_eq!(summary.executed + summary.skipped, 0);
    assert_eq!(tx_count(&conn, depot_id), 1);
}

#[test]
fn weekly_plans_fit_budget_via_the_weekly_factor() {
    let (mut conn, alice, depot_id, asset_id) = setup("1000", "250");
    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    // 57.50 weekly → 249.8375 per month, just inside a 250 budget
    plans::create_plan(
        &mut conn,
        &alice,
        depot_id,
        asset_id,
        dec("57.50"),
        Frequency::Weekly,
        today,
    )
    .unwrap();
    assert!(plans::remaining_budget(&conn, depot_id).unwrap() > Decimal::ZERO);

    let source = FixedPrices(HashMap::from([(asset_id, dec("10"))]));
    let now = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).unwrap();
    let summary = scheduler::run_tick(&mut conn, &source, now).unwrap();
    assert_eq!(summary.executed, 1);
    assert_eq!(
        projector::project(&conn, depot_id).unwrap().quantity_of(asset_id),
        dec("5.75")
    );
}
