// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::caller_from;
use crate::auth;
use crate::models::Role;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("grant", sub)) => {
            let caller = caller_from(conn, sub)?;
            let user = sub.get_one::<String>("user").unwrap();
            let role: Role = sub.get_one::<String>("role").unwrap().trim().parse()?;
            auth::grant_role(conn, &caller, user, role)?;
            println!("Granted {} to '{}'", role.as_str(), user);
        }
        Some(("revoke", sub)) => {
            let caller = caller_from(conn, sub)?;
            let user = sub.get_one::<String>("user").unwrap();
            let role: Role = sub.get_one::<String>("role").unwrap().trim().parse()?;
            auth::revoke_role(conn, &caller, user, role)?;
            println!("Revoked {} from '{}'", role.as_str(), user);
        }
        _ => {}
    }
    Ok(())
}
