// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::prices::StoredPrices;
use crate::utils::pretty_table;
use crate::{scheduler, valuation};
use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let interval = *m.get_one::<u64>("interval").unwrap();
    if m.get_flag("watch") {
        scheduler::run_loop(
            conn,
            &StoredPrices,
            std::time::Duration::from_secs(interval),
        )?;
        return Ok(());
    }

    let now = Utc::now();
    let summary = scheduler::run_tick(conn, &StoredPrices, now)?;
    valuation::snapshot_all(conn, &StoredPrices, now.date_naive())?;
    if summary.outcomes.is_empty() {
        println!("No savings-plan occurrences due");
        return Ok(());
    }
    let rows = summary
        .outcomes
        .iter()
        .map(|o| {
            vec![
                o.plan_id.to_string(),
                o.depot_id.to_string(),
                o.period_start.to_string(),
                o.status.as_str().to_string(),
                o.reason.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Plan", "Depot", "Period", "Status", "Reason"], rows)
    );
    println!("{} executed, {} skipped", summary.executed, summary.skipped);
    Ok(())
}
