// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Authorization gate. Caller identity is explicit everywhere — the role
//! set is resolved once per request and checked as a pure function, so the
//! rules are testable without the storage engine's own security features.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::errors::CoreError;
use crate::models::{Role, RoleGrant};

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    roles: Vec<Role>,
    system: bool,
}

impl Caller {
    /// Resolve a caller's role set with a single query. Unknown users
    /// resolve to the plain student role set (no rows, no roles).
    pub fn resolve(conn: &Connection, user_id: &str) -> Result<Caller, CoreError> {
        let mut stmt =
            conn.prepare_cached("SELECT role FROM role_assignments WHERE user_id=?1")?;
        let rows = stmt.query_map(params![user_id], |r| r.get::<_, String>(0))?;
        let mut roles = Vec::new();
        for row in rows {
            roles.push(row?.parse::<Role>()?);
        }
        Ok(Caller {
            user_id: user_id.to_string(),
            roles,
            system: false,
        })
    }

    /// The bootstrap/scheduler principal. Passes every gate.
    pub fn system() -> Caller {
        Caller {
            user_id: "system".to_string(),
            roles: Vec::new(),
            system: true,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.system || self.roles.contains(&role)
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    /// Holds any role at all (teacher or admin), or is the system principal.
    pub fn is_elevated(&self) -> bool {
        self.system || !self.roles.is_empty()
    }
}

/// Role gate for privileged operations. Denial is always `Unauthorized`,
/// never `NotFound`, regardless of whether any target exists.
pub fn require_role(caller: &Caller, required: &[Role]) -> Result<(), CoreError> {
    if caller.system || required.iter().any(|r| caller.roles.contains(r)) {
        return Ok(());
    }
    Err(CoreError::Unauthorized(format!(
        "user '{}' lacks a required role",
        caller.user_id
    )))
}

/// Ownership gate for depot-scoped operations. Members and elevated
/// callers pass; for anyone else a foreign depot is indistinguishable from
/// a missing one.
pub fn require_member(conn: &Connection, caller: &Caller, depot_id: i64) -> Result<(), CoreError> {
    if caller.is_elevated() {
        let exists: Option<i64> = conn
            .query_row("SELECT id FROM depots WHERE id=?1", params![depot_id], |r| {
                r.get(0)
            })
            .optional()?;
        return exists.map(|_| ()).ok_or(CoreError::NotFound("depot"));
    }
    let member: Option<i64> = conn
        .query_row(
            "SELECT d.id FROM depots d
             JOIN depot_members m ON m.depot_id = d.id
             WHERE d.id=?1 AND m.user_id=?2",
            params![depot_id, caller.user_id],
            |r| r.get(0),
        )
        .optional()?;
    member.map(|_| ()).ok_or(CoreError::NotFound("depot"))
}

/// Register or refresh a user row mirrored from the external auth
/// directory.
pub fn ensure_user(conn: &Connection, id: &str, name: &str) -> Result<(), CoreError> {
    if id.trim().is_empty() {
        return Err(CoreError::InvalidInput("user id must not be empty".into()));
    }
    conn.execute(
        "INSERT INTO users(id, name) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET name=excluded.name",
        params![id.trim(), name],
    )?;
    Ok(())
}

/// Grant a role. Admin/teacher only. Also raises the coarse `elevated`
/// flag on the mirrored auth record, in the same transaction.
pub fn grant_role(
    conn: &mut Connection,
    caller: &Caller,
    user_id: &str,
    role: Role,
) -> Result<(), CoreError> {
    require_role(caller, &[Role::Admin, Role::Teacher])?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let known: Option<String> = tx
        .query_row("SELECT id FROM users WHERE id=?1", params![user_id], |r| {
            r.get(0)
        })
        .optional()?;
    if known.is_none() {
        return Err(CoreError::NotFound("user"));
    }
    tx.execute(
        "INSERT OR IGNORE INTO role_assignments(user_id, role) VALUES (?1, ?2)",
        params![user_id, role.as_str()],
    )?;
    tx.execute(
        "UPDATE users SET elevated=1 WHERE id=?1",
        params![user_id],
    )?;
    tx.commit()?;
    Ok(())
}

/// Revoke a role. Admin/teacher only. Drops `elevated` when no role
/// assignment remains.
pub fn revoke_role(
    conn: &mut Connection,
    caller: &Caller,
    user_id: &str,
    role: Role,
) -> Result<(), CoreError> {
    require_role(caller, &[Role::Admin, Role::Teacher])?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "DELETE FROM role_assignments WHERE user_id=?1 AND role=?2",
        params![user_id, role.as_str()],
    )?;
    tx.execute(
        "UPDATE users SET elevated = EXISTS(
             SELECT 1 FROM role_assignments WHERE user_id=?1
         ) WHERE id=?1",
        params![user_id],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn roles_of(conn: &Connection, user_id: &str) -> Result<Vec<RoleGrant>, CoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT role, granted_at FROM role_assignments WHERE user_id=?1 ORDER BY role",
    )?;
    let rows = stmt.query_map(params![user_id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut grants = Vec::new();
    for row in rows {
        let (role, granted_at) = row?;
        grants.push(RoleGrant {
            role: role.parse()?,
            granted_at,
        });
    }
    Ok(grants)
}
