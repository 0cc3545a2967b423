// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Position & cash projector: a pure replay of the transaction history.
//! Rows are applied in `(tstamp, id)` order — the ledger-assigned id breaks
//! timestamp ties, so replaying the same history always yields the same
//! projection.

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::auth::{self, Caller};
use crate::errors::CoreError;
use crate::models::{Position, Projection};

struct Holding {
    quantity: Decimal,
    cost: Decimal,
}

pub fn project(conn: &Connection, depot_id: i64) -> Result<Projection, CoreError> {
    replay(conn, depot_id, None)
}

/// Projection truncated at the end of `as_of` (inclusive). Used to value
/// a depot as of a past day.
pub fn project_at(
    conn: &Connection,
    depot_id: i64,
    as_of: NaiveDate,
) -> Result<Projection, CoreError> {
    replay(conn, depot_id, Some(as_of))
}

/// Ownership-gated projection, the `getPositions` query surface.
pub fn positions(
    conn: &Connection,
    caller: &Caller,
    depot_id: i64,
) -> Result<Projection, CoreError> {
    auth::require_member(conn, caller, depot_id)?;
    project(conn, depot_id)
}

fn replay(
    conn: &Connection,
    depot_id: i64,
    cutoff: Option<NaiveDate>,
) -> Result<Projection, CoreError> {
    let cash_start: Option<String> = conn
        .query_row(
            "SELECT cash_start FROM depots WHERE id=?1",
            params![depot_id],
            |r| r.get(0),
        )
        .optional()?;
    let cash_start = cash_start.ok_or(CoreError::NotFound("depot"))?;
    let mut cash = parse_stored(&cash_start)?;

    let mut stmt = conn.prepare_cached(
        "SELECT asset_id, kind, quantity, unit_price, cash_delta
         FROM transactions
         WHERE depot_id=?1 AND (?2 IS NULL OR substr(tstamp,1,10) <= ?2)
         ORDER BY tstamp, id",
    )?;
    let cutoff_s = cutoff.map(|d| d.to_string());
    let mut rows = stmt.query(params![depot_id, cutoff_s])?;

    let mut holdings: HashMap<i64, Holding> = HashMap::new();
    while let Some(r) = rows.next()? {
        let asset_id: Option<i64> = r.get(0)?;
        let kind: String = r.get(1)?;
        let quantity = parse_stored(&r.get::<_, String>(2)?)?;
        let unit_price = parse_stored(&r.get::<_, String>(3)?)?;
        let cash_delta = parse_stored(&r.get::<_, String>(4)?)?;

        cash += cash_delta;

        let Some(asset_id) = asset_id else { continue };
        let h = holdings.entry(asset_id).or_insert(Holding {
            quantity: Decimal::ZERO,
            cost: Decimal::ZERO,
        });
        match kind.as_str() {
            "buy" => {
                h.quantity += quantity;
                h.cost += quantity * unit_price;
            }
            "sell" => {
                let avg = if h.quantity.is_zero() {
                    Decimal::ZERO
                } else {
                    h.cost / h.quantity
                };
                h.quantity -= quantity;
                h.cost -= avg * quantity;
            }
            _ => {}
        }
    }

    let mut positions = Vec::new();
    for (asset_id, h) in holdings {
        if h.quantity.is_zero() {
            continue;
        }
        let ticker: String = conn
            .query_row(
                "SELECT ticker FROM assets WHERE id=?1",
                params![asset_id],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or_default();
        positions.push(Position {
            asset_id,
            ticker,
            quantity: h.quantity,
            cost_basis: h.cost,
        });
    }
    positions.sort_by(|a, b| a.ticker.cmp(&b.ticker));

    Ok(Projection { cash, positions })
}

fn parse_stored(s: &str) -> Result<Decimal, CoreError> {
    Decimal::from_str_exact(s)
        .map_err(|_| CoreError::InvalidInput(format!("invalid stored amount '{}'", s)))
}
