// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::prices;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let ticker = sub.get_one::<String>("ticker").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            let currency = sub.get_one::<String>("currency").unwrap();
            let asset = prices::add_asset(conn, ticker, name, currency)?;
            println!("Added asset {} ({}) {}", asset.ticker, asset.name, asset.currency);
        }
        Some(("list", sub)) => {
            let assets = prices::list_assets(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &assets)? {
                let rows = assets
                    .into_iter()
                    .map(|a| vec![a.id.to_string(), a.ticker, a.name, a.currency])
                    .collect();
                println!("{}", pretty_table(&["Id", "Ticker", "Name", "CCY"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
