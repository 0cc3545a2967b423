// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::caller_from;
use crate::overview;
use crate::utils::{fmt_money, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("depots", sub)) => depots(conn, sub)?,
        Some(("admin", sub)) => admin(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn depots(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let rows = overview::depot_overview(conn, &caller)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        let data = rows
            .into_iter()
            .map(|r| {
                vec![
                    r.depot_id.to_string(),
                    r.name,
                    fmt_money(&r.cash),
                    fmt_money(&r.cash_start),
                    r.position_count.to_string(),
                    r.transaction_count.to_string(),
                    r.plan_count.to_string(),
                    fmt_money(&r.monthly_budget),
                    r.members.join(", "),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "Id", "Name", "Cash", "Start", "Positions", "Txs", "Plans", "Budget",
                    "Members",
                ],
                data,
            )
        );
    }
    Ok(())
}

fn admin(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let rows = overview::admin_overview(conn, &caller)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        let data = rows
            .into_iter()
            .map(|r| {
                let roles = r
                    .roles
                    .iter()
                    .map(|g| format!("{} ({})", g.role.as_str(), g.granted_at))
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![
                    r.user_id,
                    r.name,
                    r.depot_count.to_string(),
                    r.position_count.to_string(),
                    r.transaction_count.to_string(),
                    roles,
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["User", "Name", "Depots", "Positions", "Txs", "Roles"],
                data,
            )
        );
    }
    Ok(())
}
