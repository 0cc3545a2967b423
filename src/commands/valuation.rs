// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::caller_from;
use crate::prices::StoredPrices;
use crate::utils::{fmt_money, maybe_print_json, parse_date, pretty_table};
use crate::{projector, valuation};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("snapshot", sub)) => snapshot(conn, sub)?,
        Some(("series", sub)) => series(conn, sub)?,
        Some(("deltas", sub)) => deltas(conn, sub)?,
        Some(("positions", sub)) => positions(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn snapshot(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let today = Utc::now().date_naive();
    match sub.get_one::<i64>("depot") {
        Some(&depot_id) => {
            let point = valuation::take_snapshot(conn, &StoredPrices, depot_id, today)?;
            println!(
                "Depot {} valued at {} ({} cash + {} market) on {}",
                depot_id,
                fmt_money(&point.total()),
                fmt_money(&point.cash),
                fmt_money(&point.market_value),
                point.as_of
            );
        }
        None => {
            let snapped = valuation::snapshot_all(conn, &StoredPrices, today)?;
            println!("Recorded value points for {} depot(s) on {}", snapped, today);
        }
    }
    Ok(())
}

fn series(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let from = parse_date(sub.get_one::<String>("from").unwrap().trim())?;
    let to = parse_date(sub.get_one::<String>("to").unwrap().trim())?;
    let points = valuation::value_series(conn, &caller, depot_id, from, to)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &points)? {
        let rows = points
            .into_iter()
            .map(|p| {
                vec![
                    p.as_of.to_string(),
                    fmt_money(&p.cash),
                    fmt_money(&p.market_value),
                    fmt_money(&p.total()),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Cash", "Market", "Total"], rows)
        );
    }
    Ok(())
}

fn deltas(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let deltas = valuation::aggregate_deltas(
        conn,
        &caller,
        &StoredPrices,
        depot_id,
        Utc::now().date_naive(),
    )?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &deltas)? {
        let unavailable = "n/a".to_string();
        let fmt_diff =
            |d: &Option<rust_decimal::Decimal>| d.as_ref().map(fmt_money).unwrap_or_else(|| unavailable.clone());
        println!(
            "{}",
            pretty_table(
                &["Total", "Cash", "1d", "1m", "1y"],
                vec![vec![
                    fmt_money(&deltas.total),
                    fmt_money(&deltas.cash),
                    fmt_diff(&deltas.diff_1d),
                    fmt_diff(&deltas.diff_1m),
                    fmt_diff(&deltas.diff_1y),
                ]],
            )
        );
    }
    Ok(())
}

fn positions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let proj = projector::positions(conn, &caller, depot_id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &proj)? {
        let rows = proj
            .positions
            .iter()
            .map(|p| {
                vec![
                    p.ticker.clone(),
                    format!("{:.4}", p.quantity),
                    fmt_money(&p.cost_basis),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Ticker", "Qty", "Cost Basis"], rows));
        println!("Cash: {}", fmt_money(&proj.cash));
    }
    Ok(())
}
