// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::auth;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            auth::ensure_user(conn, id, name)?;
            println!("Registered user '{}' ({})", id.trim(), name);
        }
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Serialize)]
struct UserRow {
    id: String,
    name: String,
    elevated: bool,
    roles: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let mut stmt = conn.prepare("SELECT id, name, elevated FROM users ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, bool>(2)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (id, name, elevated) = row?;
        let roles = auth::roles_of(conn, &id)?
            .into_iter()
            .map(|g| g.role.as_str().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        data.push(UserRow {
            id,
            name,
            elevated,
            roles,
        });
    }
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .into_iter()
            .map(|u| vec![u.id, u.name, u.elevated.to_string(), u.roles])
            .collect();
        println!("{}", pretty_table(&["Id", "Name", "Elevated", "Roles"], rows));
    }
    Ok(())
}
