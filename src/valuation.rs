// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Depot valuation over time. Value points are taken at most once per day
//! per depot (re-snapshotting a day upserts); the current value is always
//! computed fresh from the projection plus the price collaborator.

use chrono::{Duration, Months, NaiveDate};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::auth::{self, Caller};
use crate::errors::CoreError;
use crate::models::{DepotValuePoint, ValueDeltas};
use crate::prices::PriceSource;
use crate::projector;

/// Cash and market value of a depot right now. Errors with
/// `PriceUnavailable` when a held asset has no quote at all.
pub fn current_value(
    conn: &Connection,
    prices: &dyn PriceSource,
    depot_id: i64,
    today: NaiveDate,
) -> Result<(Decimal, Decimal), CoreError> {
    let proj = projector::project(conn, depot_id)?;
    let mut market = Decimal::ZERO;
    for p in &proj.positions {
        let price = prices
            .price_at(conn, p.asset_id, today)?
            .ok_or_else(|| CoreError::PriceUnavailable(p.ticker.clone()))?;
        market += p.quantity * price;
    }
    Ok((proj.cash, market))
}

/// Record (or refresh) today's value point for one depot.
pub fn take_snapshot(
    conn: &Connection,
    prices: &dyn PriceSource,
    depot_id: i64,
    today: NaiveDate,
) -> Result<DepotValuePoint, CoreError> {
    let (cash, market_value) = current_value(conn, prices, depot_id, today)?;
    conn.execute(
        "INSERT INTO depot_value_points(depot_id, as_of, cash, market_value)
         VALUES (?1,?2,?3,?4)
         ON CONFLICT(depot_id, as_of) DO UPDATE SET
             cash=excluded.cash,
             market_value=excluded.market_value",
        params![
            depot_id,
            today.to_string(),
            cash.to_string(),
            market_value.to_string()
        ],
    )?;
    Ok(DepotValuePoint {
        depot_id,
        as_of: today,
        cash,
        market_value,
    })
}

/// Snapshot every depot. A depot whose holdings cannot be priced is
/// logged and skipped; the pass continues. Returns the number snapped.
pub fn snapshot_all(
    conn: &Connection,
    prices: &dyn PriceSource,
    today: NaiveDate,
) -> Result<usize, CoreError> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare_cached("SELECT id FROM depots ORDER BY id")?;
        let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        ids
    };
    let mut snapped = 0;
    for depot_id in ids {
        match take_snapshot(conn, prices, depot_id, today) {
            Ok(_) => snapped += 1,
            Err(CoreError::PriceUnavailable(ticker)) => {
                tracing::warn!(depot_id, ticker, "skipping value point, no quote for holding");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(snapped)
}

/// Stored value points for a depot within a date range, oldest first.
pub fn value_series(
    conn: &Connection,
    caller: &Caller,
    depot_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DepotValuePoint>, CoreError> {
    if from > to {
        return Err(CoreError::InvalidInput(format!(
            "range start {} is after end {}",
            from, to
        )));
    }
    auth::require_member(conn, caller, depot_id)?;
    let mut stmt = conn.prepare_cached(
        "SELECT as_of, cash, market_value FROM depot_value_points
         WHERE depot_id=?1 AND as_of>=?2 AND as_of<=?3
         ORDER BY as_of",
    )?;
    let rows = stmt.query_map(
        params![depot_id, from.to_string(), to.to_string()],
        |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        },
    )?;
    let mut points = Vec::new();
    for row in rows {
        let (as_of, cash, market_value) = row?;
        points.push(DepotValuePoint {
            depot_id,
            as_of: parse_day(&as_of)?,
            cash: parse_amount(&cash)?,
            market_value: parse_amount(&market_value)?,
        });
    }
    Ok(points)
}

/// Current total plus deltas against the snapshots nearest one day, one
/// month and one year back. A horizon with no snapshot at or before it
/// yields None — unavailable, not zero.
pub fn aggregate_deltas(
    conn: &Connection,
    caller: &Caller,
    prices: &dyn PriceSource,
    depot_id: i64,
    today: NaiveDate,
) -> Result<ValueDeltas, CoreError> {
    auth::require_member(conn, caller, depot_id)?;
    let (cash, market) = current_value(conn, prices, depot_id, today)?;
    let total = cash + market;

    let diff_1d = diff_against(conn, depot_id, total, today - Duration::days(1))?;
    let diff_1m = diff_against(conn, depot_id, total, today - Months::new(1))?;
    let diff_1y = diff_against(conn, depot_id, total, today - Months::new(12))?;

    Ok(ValueDeltas {
        total,
        cash,
        diff_1d,
        diff_1m,
        diff_1y,
    })
}

fn diff_against(
    conn: &Connection,
    depot_id: i64,
    total: Decimal,
    horizon: NaiveDate,
) -> Result<Option<Decimal>, CoreError> {
    use rusqlite::OptionalExtension;
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT cash, market_value FROM depot_value_points
             WHERE depot_id=?1 AND as_of<=?2
             ORDER BY as_of DESC LIMIT 1",
            params![depot_id, horizon.to_string()],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    match row {
        None => Ok(None),
        Some((cash, market_value)) => {
            let then = parse_amount(&cash)? + parse_amount(&market_value)?;
            Ok(Some(total - then))
        }
    }
}

fn parse_amount(s: &str) -> Result<Decimal, CoreError> {
    Decimal::from_str_exact(s)
        .map_err(|_| CoreError::InvalidInput(format!("invalid stored amount '{}'", s)))
}

fn parse_day(s: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidInput(format!("invalid date '{}'", s)))
}
