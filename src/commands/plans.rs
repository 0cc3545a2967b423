// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::caller_from;
use crate::models::Frequency;
use crate::utils::{fmt_money, maybe_print_json, parse_decimal, pretty_table};
use crate::{plans, prices, scheduler};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("set", sub)) => set(conn, sub)?,
        Some(("rm", sub)) => rm(conn, sub)?,
        Some(("budget", sub)) => budget(conn, sub)?,
        Some(("overview", sub)) => overview(conn, sub)?,
        Some(("runs", sub)) => runs(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let asset = prices::asset_by_ticker(conn, sub.get_one::<String>("ticker").unwrap())?;
    let worth = parse_decimal(sub.get_one::<String>("worth").unwrap().trim())?;
    let frequency: Frequency = sub.get_one::<String>("frequency").unwrap().trim().parse()?;
    let plan = plans::create_plan(
        conn,
        &caller,
        depot_id,
        asset.id,
        worth,
        frequency,
        Utc::now().date_naive(),
    )?;
    println!(
        "Added plan {}: {} {} of {} (first due {})",
        plan.id,
        plan.frequency.as_str(),
        fmt_money(&plan.worth),
        asset.ticker,
        plan.next_due
    );
    Ok(())
}

fn set(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let plan_id = *sub.get_one::<i64>("id").unwrap();
    let asset_id = sub
        .get_one::<String>("ticker")
        .map(|t| prices::asset_by_ticker(conn, t).map(|a| a.id))
        .transpose()?;
    let worth = sub
        .get_one::<String>("worth")
        .map(|w| parse_decimal(w.trim()))
        .transpose()?;
    let frequency = sub
        .get_one::<String>("frequency")
        .map(|f| f.trim().parse::<Frequency>())
        .transpose()?;
    let plan = plans::update_plan(conn, &caller, plan_id, asset_id, worth, frequency)?;
    println!(
        "Updated plan {}: {} {} (next due {})",
        plan.id,
        plan.frequency.as_str(),
        fmt_money(&plan.worth),
        plan.next_due
    );
    Ok(())
}

fn rm(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let ids: Vec<i64> = sub.get_many::<i64>("ids").unwrap().copied().collect();
    let deleted = plans::delete_plans(conn, &caller, &ids)?;
    println!("Removed {} plan(s); their transaction history stays", deleted);
    Ok(())
}

fn budget(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
    plans::change_budget(conn, &caller, depot_id, amount)?;
    println!("Monthly budget of depot {} set to {}", depot_id, fmt_money(&amount));
    Ok(())
}

fn overview(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let depot_id = *sub.get_one::<i64>("depot").unwrap();
    let view = plans::budget_overview(conn, &caller, depot_id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &view)? {
        let rows = view
            .plans
            .iter()
            .map(|p| {
                vec![
                    p.plan.id.to_string(),
                    p.ticker.clone(),
                    p.plan.frequency.as_str().to_string(),
                    fmt_money(&p.plan.worth),
                    fmt_money(&p.monthly_worth),
                    p.plan.next_due.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Asset", "Frequency", "Worth", "Monthly", "Next Due"],
                rows,
            )
        );
        println!(
            "Budget {} | committed {} | remaining {}",
            fmt_money(&view.monthly_budget),
            fmt_money(&view.committed),
            fmt_money(&view.remaining)
        );
    }
    Ok(())
}

fn runs(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let caller = caller_from(conn, sub)?;
    let plan_id = *sub.get_one::<i64>("id").unwrap();
    let plan = plans::get_plan(conn, plan_id)?;
    crate::auth::require_member(conn, &caller, plan.depot_id)?;
    let runs = scheduler::runs_for_plan(conn, plan_id)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &runs)? {
        let rows = runs
            .into_iter()
            .map(|(period, status, reason, run_at)| {
                vec![period, status, reason.unwrap_or_default(), run_at]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Period", "Status", "Reason", "Run At"], rows)
        );
    }
    Ok(())
}
