// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Asset registry and the price-lookup collaborator seam. Valuation and
//! the scheduler only ever see the [`PriceSource`] trait; the default
//! implementation reads the quotes a fetch run has stored.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::errors::CoreError;
use crate::models::Asset;

pub trait PriceSource {
    /// Latest known price for the asset at or before `on`.
    fn price_at(
        &self,
        conn: &Connection,
        asset_id: i64,
        on: NaiveDate,
    ) -> Result<Option<Decimal>, CoreError>;
}

/// Price source backed by the `asset_prices` table.
pub struct StoredPrices;

impl PriceSource for StoredPrices {
    fn price_at(
        &self,
        conn: &Connection,
        asset_id: i64,
        on: NaiveDate,
    ) -> Result<Option<Decimal>, CoreError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT price FROM asset_prices
                 WHERE asset_id=?1 AND as_of<=?2
                 ORDER BY as_of DESC, id DESC LIMIT 1",
                params![asset_id, on.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            None => Ok(None),
            Some(s) => Decimal::from_str_exact(&s)
                .map(Some)
                .map_err(|_| CoreError::InvalidInput(format!("invalid stored price '{}'", s))),
        }
    }
}

pub fn add_asset(
    conn: &Connection,
    ticker: &str,
    name: &str,
    currency: &str,
) -> Result<Asset, CoreError> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(CoreError::InvalidInput("ticker must not be empty".into()));
    }
    conn.execute(
        "INSERT INTO assets(ticker, name, currency) VALUES (?1,?2,?3)",
        params![ticker, name.trim(), currency.trim().to_uppercase()],
    )?;
    Ok(Asset {
        id: conn.last_insert_rowid(),
        ticker,
        name: name.trim().to_string(),
        currency: currency.trim().to_uppercase(),
    })
}

pub fn list_assets(conn: &Connection) -> Result<Vec<Asset>, CoreError> {
    let mut stmt =
        conn.prepare_cached("SELECT id, ticker, name, currency FROM assets ORDER BY ticker")?;
    let rows = stmt.query_map([], |r| {
        Ok(Asset {
            id: r.get(0)?,
            ticker: r.get(1)?,
            name: r.get(2)?,
            currency: r.get(3)?,
        })
    })?;
    let mut assets = Vec::new();
    for row in rows {
        assets.push(row?);
    }
    Ok(assets)
}

pub fn asset_by_ticker(conn: &Connection, ticker: &str) -> Result<Asset, CoreError> {
    let upper = ticker.trim().to_uppercase();
    conn.query_row(
        "SELECT id, ticker, name, currency FROM assets WHERE ticker=?1",
        params![upper],
        |r| {
            Ok(Asset {
                id: r.get(0)?,
                ticker: r.get(1)?,
                name: r.get(2)?,
                currency: r.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or(CoreError::NotFound("asset"))
}

pub fn asset_exists(conn: &Connection, asset_id: i64) -> Result<bool, CoreError> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM assets WHERE id=?1", params![asset_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Upsert one quote, keyed by day. Re-fetching a day overwrites it.
pub fn upsert_price(
    conn: &Connection,
    asset_id: i64,
    as_of: NaiveDate,
    price: Decimal,
    source: &str,
) -> Result<(), CoreError> {
    if price <= Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "price must be positive, got {}",
            price
        )));
    }
    conn.execute(
        "INSERT INTO asset_prices(asset_id, as_of, price, source) VALUES (?1,?2,?3,?4)
         ON CONFLICT(asset_id, as_of) DO UPDATE SET
             price=excluded.price,
             source=excluded.source",
        params![asset_id, as_of.to_string(), price.to_string(), source],
    )?;
    Ok(())
}
