// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Savings-plan definitions and the monthly budget they draw from. Plan
//! definitions are mutable and deletable; the transactions they have
//! already materialized are not.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;

use crate::auth::{self, Caller};
use crate::errors::CoreError;
use crate::models::{Frequency, Role, SavingsPlan};

pub fn create_plan(
    conn: &mut Connection,
    caller: &Caller,
    depot_id: i64,
    asset_id: i64,
    worth: Decimal,
    frequency: Frequency,
    today: NaiveDate,
) -> Result<SavingsPlan, CoreError> {
    if worth <= Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "plan worth must be positive, got {}",
            worth
        )));
    }
    auth::require_member(conn, caller, depot_id)?;
    if !crate::prices::asset_exists(conn, asset_id)? {
        return Err(CoreError::NotFound("asset"));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // first occurrence is due immediately; the next tick picks it up
    tx.execute(
        "INSERT INTO savings_plans(depot_id, asset_id, worth, frequency, next_due)
         VALUES (?1,?2,?3,?4,?5)",
        params![
            depot_id,
            asset_id,
            worth.to_string(),
            frequency.as_str(),
            today.to_string()
        ],
    )?;
    let id = tx.last_insert_rowid();
    let created_at: String = tx.query_row(
        "SELECT created_at FROM savings_plans WHERE id=?1",
        params![id],
        |r| r.get(0),
    )?;
    tx.commit()?;

    Ok(SavingsPlan {
        id,
        depot_id,
        asset_id,
        worth,
        frequency,
        created_at,
        next_due: today,
    })
}

/// Update a plan's asset, worth and/or frequency. Owner or teacher/admin.
/// The next occurrence date is left untouched.
pub fn update_plan(
    conn: &mut Connection,
    caller: &Caller,
    plan_id: i64,
    asset_id: Option<i64>,
    worth: Option<Decimal>,
    frequency: Option<Frequency>,
) -> Result<SavingsPlan, CoreError> {
    let plan = get_plan(conn, plan_id)?;
    auth::require_member(conn, caller, plan.depot_id)?;
    if let Some(w) = worth {
        if w <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(format!(
                "plan worth must be positive, got {}",
                w
            )));
        }
    }
    if let Some(a) = asset_id {
        if !crate::prices::asset_exists(conn, a)? {
            return Err(CoreError::NotFound("asset"));
        }
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "UPDATE savings_plans SET
             asset_id = COALESCE(?1, asset_id),
             worth    = COALESCE(?2, worth),
             frequency = COALESCE(?3, frequency)
         WHERE id=?4",
        params![
            asset_id,
            worth.map(|w| w.to_string()),
            frequency.map(|f| f.as_str()),
            plan_id
        ],
    )?;
    tx.commit()?;
    get_plan(conn, plan_id)
}

/// Delete plan definitions; future occurrences simply stop. All-or-nothing
/// across the given ids. Historical transactions stay (their plan link is
/// nulled by the schema).
pub fn delete_plans(conn: &mut Connection, caller: &Caller, ids: &[i64]) -> Result<usize, CoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut deleted = 0;
    for &id in ids {
        let depot_id: Option<i64> = tx
            .query_row(
                "SELECT depot_id FROM savings_plans WHERE id=?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        let depot_id = depot_id.ok_or(CoreError::NotFound("savings plan"))?;
        auth::require_member(&tx, caller, depot_id)?;
        deleted += tx.execute("DELETE FROM savings_plans WHERE id=?1", params![id])?;
    }
    tx.commit()?;
    Ok(deleted)
}

pub fn get_plan(conn: &Connection, plan_id: i64) -> Result<SavingsPlan, CoreError> {
    let row = conn
        .query_row(
            "SELECT id, depot_id, asset_id, worth, frequency, created_at, next_due
             FROM savings_plans WHERE id=?1",
            params![plan_id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;
    let (id, depot_id, asset_id, worth, frequency, created_at, next_due) =
        row.ok_or(CoreError::NotFound("savings plan"))?;
    Ok(SavingsPlan {
        id,
        depot_id,
        asset_id,
        worth: parse_amount(&worth)?,
        frequency: frequency.parse()?,
        created_at,
        next_due: parse_day(&next_due)?,
    })
}

pub fn list_by_depot(
    conn: &Connection,
    caller: &Caller,
    depot_id: i64,
) -> Result<Vec<SavingsPlan>, CoreError> {
    auth::require_member(conn, caller, depot_id)?;
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM savings_plans WHERE depot_id=?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![depot_id], |r| r.get::<_, i64>(0))?;
    let mut plans = Vec::new();
    for row in rows {
        plans.push(get_plan(conn, row?)?);
    }
    Ok(plans)
}

/// Set a depot's monthly budget. Teacher/admin only.
pub fn change_budget(
    conn: &mut Connection,
    caller: &Caller,
    depot_id: i64,
    amount: Decimal,
) -> Result<(), CoreError> {
    auth::require_role(caller, &[Role::Admin, Role::Teacher])?;
    if amount < Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "monthly budget must not be negative, got {}",
            amount
        )));
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let exists: Option<i64> = tx
        .query_row("SELECT id FROM depots WHERE id=?1", params![depot_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(CoreError::NotFound("depot"));
    }
    tx.execute(
        "INSERT INTO budgets(depot_id, monthly_budget) VALUES (?1,?2)
         ON CONFLICT(depot_id) DO UPDATE SET
             monthly_budget=excluded.monthly_budget,
             last_changed=datetime('now')",
        params![depot_id, amount.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

/// A depot with no budget row has budget zero.
pub fn monthly_budget(conn: &Connection, depot_id: i64) -> Result<Decimal, CoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT monthly_budget FROM budgets WHERE depot_id=?1",
            params![depot_id],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => parse_amount(&s),
        None => Ok(Decimal::ZERO),
    }
}

/// Sum of all active plans' worths normalized to per-month equivalents.
pub fn committed_monthly(conn: &Connection, depot_id: i64) -> Result<Decimal, CoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT worth, frequency FROM savings_plans WHERE depot_id=?1",
    )?;
    let rows = stmt.query_map(params![depot_id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut total = Decimal::ZERO;
    for row in rows {
        let (worth, frequency) = row?;
        let freq: Frequency = frequency.parse()?;
        total += freq.monthly_equivalent(parse_amount(&worth)?);
    }
    Ok(total)
}

pub fn remaining_budget(conn: &Connection, depot_id: i64) -> Result<Decimal, CoreError> {
    Ok(monthly_budget(conn, depot_id)? - committed_monthly(conn, depot_id)?)
}

/// Budget gate used by the scheduler: errors when the active plan set
/// overdraws the monthly budget.
pub fn require_within_budget(conn: &Connection, depot_id: i64) -> Result<(), CoreError> {
    let remaining = remaining_budget(conn, depot_id)?;
    if remaining < Decimal::ZERO {
        return Err(CoreError::BudgetExceeded {
            overrun: -remaining,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PlanBudgetRow {
    pub plan: SavingsPlan,
    pub ticker: String,
    pub monthly_worth: Decimal,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BudgetOverview {
    pub monthly_budget: Decimal,
    pub committed: Decimal,
    pub remaining: Decimal,
    pub plans: Vec<PlanBudgetRow>,
}

pub fn budget_overview(
    conn: &Connection,
    caller: &Caller,
    depot_id: i64,
) -> Result<BudgetOverview, CoreError> {
    auth::require_member(conn, caller, depot_id)?;
    let monthly_budget = monthly_budget(conn, depot_id)?;
    let mut plans = Vec::new();
    let mut committed = Decimal::ZERO;
    for plan in list_by_depot(conn, caller, depot_id)? {
        let ticker: String = conn.query_row(
            "SELECT ticker FROM assets WHERE id=?1",
            params![plan.asset_id],
            |r| r.get(0),
        )?;
        let monthly_worth = plan.frequency.monthly_equivalent(plan.worth);
        committed += monthly_worth;
        plans.push(PlanBudgetRow {
            plan,
            ticker,
            monthly_worth,
        });
    }
    Ok(BudgetOverview {
        monthly_budget,
        committed,
        remaining: monthly_budget - committed,
        plans,
    })
}

fn parse_amount(s: &str) -> Result<Decimal, CoreError> {
    Decimal::from_str_exact(s)
        .map_err(|_| CoreError::InvalidInput(format!("invalid stored amount '{}'", s)))
}

fn parse_day(s: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidInput(format!("invalid date '{}'", s)))
}
