// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;

use crate::auth::{self, Caller};
use crate::errors::CoreError;
use crate::models::Depot;

/// Create a depot. The creating caller always becomes a member; further
/// members may be attached up front (shared depots).
pub fn create_depot(
    conn: &mut Connection,
    caller: &Caller,
    name: &str,
    cash_start: Decimal,
    members: &[String],
) -> Result<Depot, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::InvalidInput("depot name must not be empty".into()));
    }
    if cash_start < Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "starting cash must not be negative, got {}",
            cash_start
        )));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO depots(name, cash_start) VALUES (?1, ?2)",
        params![name, cash_start.to_string()],
    )?;
    let depot_id = tx.last_insert_rowid();

    let mut wanted: Vec<&str> = members.iter().map(|s| s.as_str()).collect();
    if !caller.is_system() && !wanted.contains(&caller.user_id.as_str()) {
        wanted.push(caller.user_id.as_str());
    }
    for user_id in wanted {
        let known: Option<String> = tx
            .query_row("SELECT id FROM users WHERE id=?1", params![user_id], |r| {
                r.get(0)
            })
            .optional()?;
        if known.is_none() {
            return Err(CoreError::NotFound("user"));
        }
        tx.execute(
            "INSERT OR IGNORE INTO depot_members(depot_id, user_id) VALUES (?1, ?2)",
            params![depot_id, user_id],
        )?;
    }

    let created_at: String = tx.query_row(
        "SELECT created_at FROM depots WHERE id=?1",
        params![depot_id],
        |r| r.get(0),
    )?;
    tx.commit()?;

    Ok(Depot {
        id: depot_id,
        name: name.to_string(),
        cash_start,
        created_at,
    })
}

pub fn get(conn: &Connection, depot_id: i64) -> Result<Depot, CoreError> {
    conn.query_row(
        "SELECT id, name, cash_start, created_at FROM depots WHERE id=?1",
        params![depot_id],
        depot_from_row,
    )
    .optional()?
    .ok_or(CoreError::NotFound("depot"))
}

/// Depots visible to the caller: all for elevated callers, own otherwise.
pub fn list(conn: &Connection, caller: &Caller) -> Result<Vec<Depot>, CoreError> {
    let mut out = Vec::new();
    if caller.is_elevated() {
        let mut stmt = conn
            .prepare_cached("SELECT id, name, cash_start, created_at FROM depots ORDER BY id")?;
        let rows = stmt.query_map([], depot_from_row)?;
        for row in rows {
            out.push(row?);
        }
    } else {
        let mut stmt = conn.prepare_cached(
            "SELECT d.id, d.name, d.cash_start, d.created_at
             FROM depots d JOIN depot_members m ON m.depot_id = d.id
             WHERE m.user_id=?1 ORDER BY d.id",
        )?;
        let rows = stmt.query_map(params![caller.user_id], depot_from_row)?;
        for row in rows {
            out.push(row?);
        }
    }
    Ok(out)
}

/// Delete a depot. Positions, transactions, plans, budgets, runs and value
/// points go with it (FK cascade).
pub fn delete_depot(conn: &mut Connection, caller: &Caller, depot_id: i64) -> Result<(), CoreError> {
    auth::require_member(conn, caller, depot_id)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM depots WHERE id=?1", params![depot_id])?;
    tx.commit()?;
    Ok(())
}

/// Member display names, for the depot overview.
pub fn member_names(conn: &Connection, depot_id: i64) -> Result<Vec<String>, CoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT u.name FROM depot_members m JOIN users u ON u.id = m.user_id
         WHERE m.depot_id=?1 ORDER BY u.name",
    )?;
    let rows = stmt.query_map(params![depot_id], |r| r.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

fn depot_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Depot> {
    let cash_start: String = r.get(2)?;
    let cash_start = Decimal::from_str_exact(&cash_start).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Depot {
        id: r.get(0)?,
        name: r.get(1)?,
        cash_start,
        created_at: r.get(3)?,
    })
}
