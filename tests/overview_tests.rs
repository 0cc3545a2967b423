// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;

use paperdepot::auth::{self, Caller};
use paperdepot::errors::CoreError;
use paperdepot::models::{Frequency, Role, TxKind};
use paperdepot::{db, depots, ledger, overview, plans, prices, projector};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn setup() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    auth::ensure_user(&conn, "alice", "Alice").unwrap();
    auth::ensure_user(&conn, "bob", "Bob").unwrap();
    auth::ensure_user(&conn, "teach", "Ms. Keller").unwrap();
    auth::grant_role(&mut conn, &Caller::system(), "teach", Role::Teacher).unwrap();
    conn
}

#[test]
fn students_see_only_their_own_depots() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let bob = Caller::resolve(&conn, "bob").unwrap();
    depots::create_depot(&mut conn, &alice, "Alice's", dec("100"), &[]).unwrap();
    depots::create_depot(&mut conn, &bob, "Bob's", dec("200"), &[]).unwrap();

    let alice_rows = overview::depot_overview(&conn, &alice).unwrap();
    assert_eq!(alice_rows.len(), 1);
    assert_eq!(alice_rows[0].name, "Alice's");
    assert_eq!(alice_rows[0].members, vec!["Alice".to_string()]);

    let teach = Caller::resolve(&conn, "teach").unwrap();
    assert_eq!(overview::depot_overview(&conn, &teach).unwrap().len(), 2);
}

#[test]
fn overview_counts_reflect_ledger_state_at_query_time() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let depot = depots::create_depot(&mut conn, &alice, "D", dec("1000"), &[]).unwrap();
    let asset = prices::add_asset(&conn, "ABC", "ABC Corp", "EUR").unwrap();
    let t = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
    ledger::record_trade(
        &mut conn,
        &alice,
        depot.id,
        asset.id,
        TxKind::Buy,
        dec("4"),
        dec("25"),
        t,
    )
    .unwrap();
    plans::create_plan(
        &mut conn,
        &alice,
        depot.id,
        asset.id,
        dec("50"),
        Frequency::Monthly,
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
    )
    .unwrap();
    let teach = Caller::resolve(&conn, "teach").unwrap();
    plans::change_budget(&mut conn, &teach, depot.id, dec("250")).unwrap();

    let rows = overview::depot_overview(&conn, &alice).unwrap();
    let row = &rows[0];
    assert_eq!(row.cash, dec("900"));
    assert_eq!(row.cash_start, dec("1000"));
    assert_eq!(row.position_count, 1);
    assert_eq!(row.transaction_count, 1);
    assert_eq!(row.plan_count, 1);
    assert_eq!(row.monthly_budget, dec("250"));

    // one more trade is visible on the very next query
    ledger::record_trade(
        &mut conn,
        &alice,
        depot.id,
        asset.id,
        TxKind::Buy,
        dec("1"),
        dec("25"),
        t + chrono::Duration::hours(1),
    )
    .unwrap();
    assert_eq!(
        overview::depot_overview(&conn, &alice).unwrap()[0].transaction_count,
        2
    );
}

#[test]
fn admin_overview_counts_per_user() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let depot = depots::create_depot(&mut conn, &alice, "D", dec("1000"), &[]).unwrap();
    let asset = prices::add_asset(&conn, "ABC", "ABC Corp", "EUR").unwrap();
    let t = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
    ledger::record_trade(
        &mut conn,
        &alice,
        depot.id,
        asset.id,
        TxKind::Buy,
        dec("4"),
        dec("25"),
        t,
    )
    .unwrap();

    let teach = Caller::resolve(&conn, "teach").unwrap();
    let rows = overview::admin_overview(&conn, &teach).unwrap();
    let alice_row = rows.iter().find(|r| r.user_id == "alice").unwrap();
    assert_eq!(alice_row.depot_count, 1);
    assert_eq!(alice_row.position_count, 1);
    assert_eq!(alice_row.transaction_count, 1);
    let bob_row = rows.iter().find(|r| r.user_id == "bob").unwrap();
    assert_eq!(bob_row.depot_count, 0);
}

#[test]
fn deleting_a_depot_cascades_to_everything_it_owns() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let depot = depots::create_depot(&mut conn, &alice, "D", dec("1000"), &[]).unwrap();
    let asset = prices::add_asset(&conn, "ABC", "ABC Corp", "EUR").unwrap();
    let t = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
    ledger::record_trade(
        &mut conn,
        &alice,
        depot.id,
        asset.id,
        TxKind::Buy,
        dec("4"),
        dec("25"),
        t,
    )
    .unwrap();
    plans::create_plan(
        &mut conn,
        &alice,
        depot.id,
        asset.id,
        dec("50"),
        Frequency::Monthly,
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
    )
    .unwrap();
    let teach = Caller::resolve(&conn, "teach").unwrap();
    plans::change_budget(&mut conn, &teach, depot.id, dec("250")).unwrap();
    conn.execute(
        "INSERT INTO depot_value_points(depot_id, as_of, cash, market_value)
         VALUES (?1,'2026-08-01','900','100')",
        rusqlite::params![depot.id],
    )
    .unwrap();

    depots::delete_depot(&mut conn, &alice, depot.id).unwrap();

    for table in [
        "transactions",
        "savings_plans",
        "budgets",
        "depot_value_points",
        "depot_members",
    ] {
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE depot_id=?1", table),
                rusqlite::params![depot.id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 0, "{} must be empty after cascade", table);
    }
    assert!(matches!(
        depots::get(&conn, depot.id),
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        projector::project(&conn, depot.id),
        Err(CoreError::NotFound(_))
    ));
    assert!(overview::depot_overview(&conn, &alice).unwrap().is_empty());
}
