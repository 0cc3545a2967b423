// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod assets;
pub mod depots;
pub mod doctor;
pub mod exporter;
pub mod overview;
pub mod plans;
pub mod prices;
pub mod roles;
pub mod scheduler;
pub mod transactions;
pub mod users;
pub mod valuation;

use anyhow::Result;
use rusqlite::Connection;

use crate::auth::Caller;

/// Resolve the caller identity from the global `--as` flag. Commands that
/// run without one act as an anonymous student with no roles.
pub(crate) fn caller_from(conn: &Connection, m: &clap::ArgMatches) -> Result<Caller> {
    let user = m
        .get_one::<String>("as")
        .map(String::as_str)
        .unwrap_or("anonymous");
    Ok(Caller::resolve(conn, user)?)
}
