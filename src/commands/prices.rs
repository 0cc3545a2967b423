// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::utils::{http_client, maybe_print_json, pretty_table};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("fetch", _)) => fetch_quotes(conn),
        Some(("list", sub)) => list_quotes(conn, sub),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct YahooResponse {
    quoteResponse: QuoteResponse,
}
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct QuoteResponse {
    result: Vec<YahooQuote>,
}
#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    symbol: Option<String>,
    #[serde(rename = "currency")]
    _currency: Option<String>,
}

fn fetch_quotes(conn: &mut Connection) -> Result<()> {
    let mut stmt = conn.prepare_cached("SELECT id, ticker FROM assets ORDER BY ticker")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;

    let mut assets = Vec::new();
    for row in rows {
        assets.push(row?);
    }

    drop(stmt);

    if assets.is_empty() {
        println!("No assets to fetch");
        return Ok(());
    }

    let symbols = assets
        .iter()
        .map(|(_, ticker)| ticker.as_str())
        .collect::<Vec<_>>();
    let url = format!(
        "https://query1.finance.yahoo.com/v7/finance/quote?symbols={}",
        symbols.join(",")
    );
    let client = http_client()?;
    let resp = client.get(url).send()?.error_for_status()?;
    let yr: YahooResponse = resp.json()?;

    let mut id_by_ticker: HashMap<&str, i64> = HashMap::with_capacity(assets.len());
    for (id, ticker) in &assets {
        id_by_ticker.insert(ticker.as_str(), *id);
    }

    let mut updates = Vec::with_capacity(yr.quoteResponse.result.len());
    for q in yr.quoteResponse.result {
        if let (Some(sym), Some(px)) = (q.symbol, q.regular_market_price) {
            if let Some(&asset_id) = id_by_ticker.get(sym.as_str()) {
                if let Some(px_decimal) = Decimal::from_f64_retain(px) {
                    updates.push((asset_id, px_decimal));
                }
            }
        }
    }

    let today = Utc::now().date_naive();
    if updates.is_empty() {
        println!("No Yahoo quotes updated for {}", today);
        return Ok(());
    }

    let total_updates = updates.len();

    let tx = conn.transaction()?;
    for (asset_id, price) in updates {
        crate::prices::upsert_price(&tx, asset_id, today, price, "yahoo")?;
    }
    tx.commit()?;

    println!("Fetched {} quotes for {}", total_updates, today);
    Ok(())
}

fn list_quotes(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT a.ticker, p.as_of, p.price, a.currency, p.source
         FROM asset_prices p JOIN assets a ON p.asset_id=a.id
         ORDER BY p.as_of DESC, a.ticker LIMIT 50",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (tic, as_of, px, ccy, src) = row?;
        data.push(vec![tic, as_of, px, ccy, src]);
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        println!(
            "{}",
            pretty_table(&["Ticker", "As Of", "Price", "CCY", "Source"], data)
        );
    }
    Ok(())
}
