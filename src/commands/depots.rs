// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::caller_from;
use crate::depots;
use crate::utils::{fmt_money, maybe_print_json, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("create", sub)) => create(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => rm(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn create(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let name = sub.get_one::<String>("name").unwrap();
    let cash = parse_decimal(sub.get_one::<String>("cash").unwrap().trim())?;
    let members: Vec<String> = sub
        .get_many::<String>("member")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let depot = depots::create_depot(conn, &caller, name, cash, &members)?;
    println!(
        "Created depot '{}' (id {}, starting cash {})",
        depot.name,
        depot.id,
        fmt_money(&depot.cash_start)
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depots = depots::list(conn, &caller)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &depots)? {
        let rows = depots
            .into_iter()
            .map(|d| {
                vec![
                    d.id.to_string(),
                    d.name,
                    fmt_money(&d.cash_start),
                    d.created_at,
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Id", "Name", "Starting Cash", "Created"], rows)
        );
    }
    Ok(())
}

fn rm(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let id = *sub.get_one::<i64>("id").unwrap();
    depots::delete_depot(conn, &caller, id)?;
    println!("Removed depot {} and everything in it", id);
    Ok(())
}
