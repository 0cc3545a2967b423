// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::caller_from;
use crate::models::TxKind;
use crate::prices::{self, PriceSource, StoredPrices};
use crate::utils::{fmt_money, maybe_print_json, parse_date, parse_decimal, pretty_table};
use crate::{ledger, utils};
use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("buy", sub)) => trade(conn, sub, TxKind::Buy)?,
        Some(("sell", sub)) => trade(conn, sub, TxKind::Sell)?,
        Some(("cash", sub)) => cash(conn, sub)?,
        Some(("reward", sub)) => reward(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn trade(conn: &mut Connection, sub: &clap::ArgMatches, kind: TxKind) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let ticker = sub.get_one::<String>("ticker").unwrap();
    let qty = parse_decimal(sub.get_one::<String>("qty").unwrap().trim())?.abs();
    let asset = prices::asset_by_ticker(conn, ticker)?;
    let now = Utc::now();

    let price = match sub.get_one::<String>("price") {
        Some(raw) => parse_decimal(raw.trim())?,
        None => StoredPrices
            .price_at(conn, asset.id, now.date_naive())?
            .ok_or_else(|| {
                anyhow!(
                    "No stored quote for {}; pass --price or run `price fetch`",
                    asset.ticker
                )
            })?,
    };

    let tx = ledger::record_trade(conn, &caller, depot_id, asset.id, kind, qty, price, now)?;
    println!(
        "Recorded {} {} x {} @ {} (cash {})",
        tx.kind.as_str(),
        tx.quantity,
        asset.ticker,
        tx.unit_price,
        fmt_money(&tx.cash_delta)
    );
    Ok(())
}

fn cash(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    let tx = ledger::adjust_cash(conn, &caller, depot_id, amount, Utc::now())?;
    println!("Adjusted cash of depot {} by {}", depot_id, fmt_money(&tx.cash_delta));
    Ok(())
}

fn reward(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    let tx = ledger::grant_reward(conn, &caller, depot_id, amount, Utc::now())?;
    println!("Granted reward of {} to depot {}", fmt_money(&tx.cash_delta), depot_id);
    Ok(())
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub tstamp: String,
    pub kind: String,
    pub asset: String,
    pub quantity: String,
    pub unit_price: String,
    pub cash_delta: String,
    pub plan: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let from = sub
        .get_one::<String>("from")
        .map(|s| parse_date(s.trim()))
        .transpose()?;
    let to = sub
        .get_one::<String>("to")
        .map(|s| parse_date(s.trim()))
        .transpose()?;

    let txs = ledger::list_by_depot(conn, &caller, depot_id, from, to)?;
    let mut data = Vec::with_capacity(txs.len());
    for t in txs {
        let asset = match t.asset_id {
            Some(id) => conn.query_row(
                "SELECT ticker FROM assets WHERE id=?1",
                rusqlite::params![id],
                |r| r.get::<_, String>(0),
            )?,
            None => String::new(),
        };
        data.push(TransactionRow {
            id: t.id,
            tstamp: utils::fmt_tstamp(&t.tstamp),
            kind: t.kind.as_str().to_string(),
            asset,
            quantity: t.quantity.to_string(),
            unit_price: t.unit_price.to_string(),
            cash_delta: t.cash_delta.to_string(),
            plan: t
                .plan_id
                .map(|id| format!("#{}", id))
                .unwrap_or_default(),
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .into_iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.tstamp,
                    r.kind,
                    r.asset,
                    r.quantity,
                    r.unit_price,
                    r.cash_delta,
                    r.plan,
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Time", "Kind", "Asset", "Qty", "Price", "Cash", "Plan"],
                rows,
            )
        );
    }
    Ok(())
}
