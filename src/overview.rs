// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Read-side aggregator: per-depot and per-user summaries composed from
//! the live tables at query time. The gate runs before any cross-user row
//! is touched.

use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::auth::{self, Caller};
use crate::errors::CoreError;
use crate::models::{Role, RoleGrant};
use crate::{depots, plans, projector};

#[derive(Debug, Clone, Serialize)]
pub struct DepotOverviewRow {
    pub depot_id: i64,
    pub name: String,
    pub cash: Decimal,
    pub cash_start: Decimal,
    pub position_count: usize,
    pub transaction_count: i64,
    pub plan_count: i64,
    pub members: Vec<String>,
    pub monthly_budget: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserOverviewRow {
    pub user_id: String,
    pub name: String,
    pub depot_count: i64,
    pub position_count: usize,
    pub transaction_count: i64,
    pub roles: Vec<RoleGrant>,
}

/// Per-depot summaries. Non-elevated callers only ever see their own
/// depots' rows.
pub fn depot_overview(
    conn: &Connection,
    caller: &Caller,
) -> Result<Vec<DepotOverviewRow>, CoreError> {
    let mut rows = Vec::new();
    for depot in depots::list(conn, caller)? {
        let proj = projector::project(conn, depot.id)?;
        let transaction_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE depot_id=?1",
            params![depot.id],
            |r| r.get(0),
        )?;
        let plan_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM savings_plans WHERE depot_id=?1",
            params![depot.id],
            |r| r.get(0),
        )?;
        rows.push(DepotOverviewRow {
            depot_id: depot.id,
            name: depot.name,
            cash: proj.cash,
            cash_start: depot.cash_start,
            position_count: proj.positions.len(),
            transaction_count,
            plan_count,
            members: depots::member_names(conn, depot.id)?,
            monthly_budget: plans::monthly_budget(conn, depot.id)?,
        });
    }
    Ok(rows)
}

/// Per-user summaries across all tenants. Teacher/admin only; denial is
/// `Unauthorized` no matter what exists.
pub fn admin_overview(
    conn: &Connection,
    caller: &Caller,
) -> Result<Vec<UserOverviewRow>, CoreError> {
    auth::require_role(caller, &[Role::Admin, Role::Teacher])?;

    let users: Vec<(String, String)> = {
        let mut stmt = conn.prepare_cached("SELECT id, name FROM users ORDER BY name")?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out
    };

    let mut rows = Vec::new();
    for (user_id, name) in users {
        let depot_ids: Vec<i64> = {
            let mut stmt = conn
                .prepare_cached("SELECT depot_id FROM depot_members WHERE user_id=?1 ORDER BY depot_id")?;
            let ids = stmt.query_map(params![user_id], |r| r.get::<_, i64>(0))?;
            let mut out = Vec::new();
            for id in ids {
                out.push(id?);
            }
            out
        };
        let mut position_count = 0;
        let mut transaction_count: i64 = 0;
        for &depot_id in &depot_ids {
            position_count += projector::project(conn, depot_id)?.positions.len();
            transaction_count += conn.query_row(
                "SELECT COUNT(*) FROM transactions WHERE depot_id=?1",
                params![depot_id],
                |r| r.get::<_, i64>(0),
            )?;
        }
        rows.push(UserOverviewRow {
            roles: auth::roles_of(conn, &user_id)?,
            depot_count: depot_ids.len() as i64,
            position_count,
            transaction_count,
            user_id,
            name,
        });
    }
    Ok(rows)
}
