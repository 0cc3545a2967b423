// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::caller_from;
use crate::{ledger, utils};
use anyhow::Result;
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        _ => Ok(()),
    }
}

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();

    let txs = ledger::list_by_depot(conn, &caller, depot_id, None, None)?;
    let mut rows = Vec::with_capacity(txs.len());
    for t in txs {
        let ticker: String = match t.asset_id {
            Some(id) => conn.query_row(
                "SELECT ticker FROM assets WHERE id=?1",
                rusqlite::params![id],
                |r| r.get(0),
            )?,
            None => String::new(),
        };
        rows.push((
            t.id.to_string(),
            utils::fmt_tstamp(&t.tstamp),
            t.kind.as_str().to_string(),
            ticker,
            t.quantity.to_string(),
            t.unit_price.to_string(),
            t.cash_delta.to_string(),
            t.plan_id.map(|p| p.to_string()).unwrap_or_default(),
            t.period_start.map(|d| d.to_string()).unwrap_or_default(),
        ));
    }

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "id",
                "tstamp",
                "kind",
                "ticker",
                "quantity",
                "unit_price",
                "cash_delta",
                "plan_id",
                "period_start",
            ])?;
            for (id, ts, kind, tic, qty, px, cash, plan, period) in rows {
                wtr.write_record([id, ts, kind, tic, qty, px, cash, plan, period])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let mut items = Vec::new();
            for (id, ts, kind, tic, qty, px, cash, plan, period) in rows {
                items.push(json!({
                    "id": id, "tstamp": ts, "kind": kind, "ticker": tic,
                    "quantity": qty, "unit_price": px, "cash_delta": cash,
                    "plan_id": plan, "period_start": period
                }));
            }
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        _ => {
            eprintln!("Unknown format: {} (use csv|json)", fmt);
            return Ok(());
        }
    }
    println!("Exported depot {} transactions to {}", depot_id, out);
    Ok(())
}
