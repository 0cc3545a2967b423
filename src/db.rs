// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Paperdepot", "paperdepot"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("paperdepot.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    // WAL keeps readers on a consistent snapshot while one writer commits.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

/// In-memory database with the full schema. Used by tests and one-shot
/// ephemeral runs.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("Open in-memory DB")?;
    init_schema(&mut conn)?;
    Ok(conn)
}

fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    -- Mirror of the external auth directory. `elevated` is the coarse flag
    -- the role API keeps in sync with role_assignments.
    CREATE TABLE IF NOT EXISTS users(
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        elevated INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS role_assignments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role TEXT NOT NULL CHECK(role IN ('admin','teacher')),
        granted_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user_id, role)
    );

    CREATE TABLE IF NOT EXISTS depots(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        cash_start TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS depot_members(
        depot_id INTEGER NOT NULL REFERENCES depots(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        UNIQUE(depot_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS assets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticker TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        currency TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS asset_prices(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
        as_of TEXT NOT NULL,
        price TEXT NOT NULL,
        source TEXT NOT NULL,
        UNIQUE(asset_id, as_of)
    );

    CREATE TABLE IF NOT EXISTS savings_plans(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        depot_id INTEGER NOT NULL REFERENCES depots(id) ON DELETE CASCADE,
        asset_id INTEGER NOT NULL REFERENCES assets(id),
        worth TEXT NOT NULL,
        frequency TEXT NOT NULL
            CHECK(frequency IN ('weekly','biweekly','monthly','quarterly','yearly')),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        next_due TEXT NOT NULL
    );

    -- Append-only. Rows are never updated or deleted except through depot
    -- cascade; UNIQUE(plan_id, period_start) is the per-occurrence
    -- idempotence key for scheduler-materialized buys.
    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        depot_id INTEGER NOT NULL REFERENCES depots(id) ON DELETE CASCADE,
        asset_id INTEGER REFERENCES assets(id),
        kind TEXT NOT NULL CHECK(kind IN ('buy','sell','reward','cash')),
        quantity TEXT NOT NULL DEFAULT '0',
        unit_price TEXT NOT NULL DEFAULT '0',
        cash_delta TEXT NOT NULL,
        tstamp TEXT NOT NULL,
        plan_id INTEGER REFERENCES savings_plans(id) ON DELETE SET NULL,
        period_start TEXT,
        UNIQUE(plan_id, period_start)
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_depot_tstamp
        ON transactions(depot_id, tstamp);

    CREATE TABLE IF NOT EXISTS budgets(
        depot_id INTEGER PRIMARY KEY REFERENCES depots(id) ON DELETE CASCADE,
        monthly_budget TEXT NOT NULL,
        last_changed TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Durable per-occurrence attempt record; skipped occurrences stay
    -- visible and next_due only advances alongside a row here.
    CREATE TABLE IF NOT EXISTS plan_runs(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plan_id INTEGER NOT NULL REFERENCES savings_plans(id) ON DELETE CASCADE,
        depot_id INTEGER NOT NULL REFERENCES depots(id) ON DELETE CASCADE,
        period_start TEXT NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('executed','skipped')),
        reason TEXT,
        run_at TEXT NOT NULL,
        UNIQUE(plan_id, period_start)
    );

    CREATE TABLE IF NOT EXISTS depot_value_points(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        depot_id INTEGER NOT NULL REFERENCES depots(id) ON DELETE CASCADE,
        as_of TEXT NOT NULL,
        cash TEXT NOT NULL,
        market_value TEXT NOT NULL,
        UNIQUE(depot_id, as_of)
    );
    CREATE INDEX IF NOT EXISTS idx_value_points_depot_as_of
        ON depot_value_points(depot_id, as_of);
    "#,
    )?;
    Ok(())
}
