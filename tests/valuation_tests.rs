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
use paperdepot::models::TxKind;
use paperdepot::prices::{PriceSource, StoredPrices};
use paperdepot::{db, depots, ledger, prices, valuation};

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

fn setup() -> (Connection, Caller, i64, i64) {
    let mut conn = db::open_in_memory().unwrap();
    auth::ensure_user(&conn, "alice", "Alice").unwrap();
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
        dec("10"),
        dec("40"),
        t,
    )
    .unwrap();
    (conn, alice, depot.id, asset.id)
}

fn seed_point(conn: &Connection, depot_id: i64, as_of: &str, cash: &str, market: &str) {
    conn.execute(
        "INSERT INTO depot_value_points(depot_id, as_of, cash, market_value)
         VALUES (?1,?2,?3,?4)",
        rusqlite::params![depot_id, as_of, cash, market],
    )
    .unwrap();
}

#[test]
fn a_single_snapshot_today_reports_older_deltas_as_unavailable() {
    let (conn, alice, depot_id, asset_id) = setup();
    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let today = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();

    valuation::take_snapshot(&conn, &source, depot_id, today).unwrap();
    let deltas = valuation::aggregate_deltas(&conn, &alice, &source, depot_id, today).unwrap();

    // 600 cash + 10 x 50 market
    assert_eq!(deltas.total, dec("1100"));
    assert_eq!(deltas.cash, dec("600"));
    assert_eq!(deltas.diff_1d, None, "no snapshot a day back");
    assert_eq!(deltas.diff_1m, None);
    assert_eq!(deltas.diff_1y, None, "unavailable, never zero");
}

#[test]
fn deltas_compare_against_the_nearest_snapshot_at_or_before_each_horizon() {
    let (conn, alice, depot_id, asset_id) = setup();
    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let today = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();

    seed_point(&conn, depot_id, "2026-08-04", "600", "450"); // 1d horizon
    seed_point(&conn, depot_id, "2026-06-20", "600", "380"); // nearest ≤ 1m horizon
    // nothing a year back

    let deltas = valuation::aggregate_deltas(&conn, &alice, &source, depot_id, today).unwrap();
    assert_eq!(deltas.total, dec("1100"));
    assert_eq!(deltas.diff_1d, Some(dec("50")));
    assert_eq!(deltas.diff_1m, Some(dec("120")));
    assert_eq!(deltas.diff_1y, None);
}

#[test]
fn snapshotting_twice_a_day_keeps_one_point() {
    let (conn, _alice, depot_id, asset_id) = setup();
    let today = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();

    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    valuation::take_snapshot(&conn, &source, depot_id, today).unwrap();
    let source = FixedPrices(HashMap::from([(asset_id, dec("55"))]));
    let point = valuation::take_snapshot(&conn, &source, depot_id, today).unwrap();
    assert_eq!(point.market_value, dec("550"));

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM depot_value_points WHERE depot_id=?1",
            rusqlite::params![depot_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 1, "same-day snapshot must upsert");
}

#[test]
fn value_series_is_ordered_and_range_bounded() {
    let (conn, alice, depot_id, _asset_id) = setup();
    seed_point(&conn, depot_id, "2026-08-03", "600", "400");
    seed_point(&conn, depot_id, "2026-08-01", "600", "390");
    seed_point(&conn, depot_id, "2026-08-02", "600", "410");
    seed_point(&conn, depot_id, "2026-07-01", "600", "300");

    let series = valuation::value_series(
        &conn,
        &alice,
        depot_id,
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
    )
    .unwrap();
    assert_eq!(series.len(), 3);
    assert!(series.windows(2).all(|w| w[0].as_of < w[1].as_of));
    assert_eq!(series[0].total(), dec("990"));

    // inverted ranges are rejected as input errors
    assert!(matches!(
        valuation::value_series(
            &conn,
            &alice,
            depot_id,
            NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        ),
        Err(CoreError::InvalidInput(_))
    ));
}

#[test]
fn valuing_an_unquoted_holding_fails_loudly() {
    let (conn, alice, depot_id, _asset_id) = setup();
    let today = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
    // StoredPrices has no rows at all here
    assert!(matches!(
        valuation::aggregate_deltas(&conn, &alice, &StoredPrices, depot_id, today),
        Err(CoreError::PriceUnavailable(_))
    ));
}

#[test]
fn snapshot_all_skips_unpriceable_depots_and_continues() {
    let (mut conn, alice, depot_id, asset_id) = setup();
    // second depot holds an asset nobody can price
    let depot2 = depots::create_depot(&mut conn, &alice, "D2", dec("500"), &[]).unwrap();
    let unquoted = prices::add_asset(&conn, "XYZ", "XYZ Corp", "EUR").unwrap();
    let t = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();
    ledger::record_trade(
        &mut conn,
        &alice,
        depot2.id,
        unquoted.id,
        TxKind::Buy,
        dec("1"),
        dec("100"),
        t,
    )
    .unwrap();

    let source = FixedPrices(HashMap::from([(asset_id, dec("50"))]));
    let today = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
    let snapped = valuation::snapshot_all(&conn, &source, today).unwrap();
    assert_eq!(snapped, 1);

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM depot_value_points WHERE depot_id=?1",
            rusqlite::params![depot_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn series_is_ownership_gated() {
    let (conn, _alice, depot_id, _asset_id) = setup();
    auth::ensure_user(&conn, "bob", "Bob").unwrap();
    let bob = Caller::resolve(&conn, "bob").unwrap();
    assert!(matches!(
        valuation::value_series(
            &conn,
            &bob,
            depot_id,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
        ),
        Err(CoreError::NotFound(_))
    ));
}
