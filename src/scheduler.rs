// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Savings-plan scheduler. Each tick materializes due occurrences into
//! ledger buys. Re-entrancy rests on the `(plan_id, period_start)`
//! uniqueness of both the transaction and the attempt record, not on any
//! tick-level lock: a tick interrupted mid-run leaves the remaining due
//! occurrences exactly where the next tick finds them.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::CoreError;
use crate::prices::PriceSource;
use crate::utils::fmt_tstamp;
use crate::{ledger, plans, valuation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Executed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Executed => "executed",
            RunStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub plan_id: i64,
    pub depot_id: i64,
    pub period_start: chrono::NaiveDate,
    pub status: RunStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct TickSummary {
    pub executed: usize,
    pub skipped: usize,
    pub outcomes: Vec<TickOutcome>,
}

/// One scheduler pass over every due plan. One plan's failure never aborts
/// the rest of the tick.
pub fn run_tick(
    conn: &mut Connection,
    prices: &dyn PriceSource,
    now: DateTime<Utc>,
) -> Result<TickSummary, CoreError> {
    let today = now.date_naive();
    let due: Vec<i64> = {
        let mut stmt = conn.prepare_cached(
            "SELECT id FROM savings_plans WHERE next_due<=?1 ORDER BY depot_id, id",
        )?;
        let rows = stmt.query_map(params![today.to_string()], |r| r.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        ids
    };

    let mut summary = TickSummary::default();
    for plan_id in due {
        match execute_due_plan(conn, prices, plan_id, now) {
            Ok(Some(outcome)) => {
                match outcome.status {
                    RunStatus::Executed => summary.executed += 1,
                    RunStatus::Skipped => {
                        tracing::info!(
                            plan_id = outcome.plan_id,
                            depot_id = outcome.depot_id,
                            reason = outcome.reason.as_deref().unwrap_or(""),
                            "savings plan occurrence skipped"
                        );
                        summary.skipped += 1;
                    }
                }
                summary.outcomes.push(outcome);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(plan_id, error = %e, "savings plan execution failed, continuing tick");
            }
        }
    }
    Ok(summary)
}

/// Execute (or skip) one plan's due occurrence in its own write
/// transaction. Returns None when the plan vanished or was advanced by a
/// concurrent tick in the meantime.
fn execute_due_plan(
    conn: &mut Connection,
    prices: &dyn PriceSource,
    plan_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<TickOutcome>, CoreError> {
    let today = now.date_naive();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let plan = match plans::get_plan(&tx, plan_id) {
        Ok(p) => p,
        Err(CoreError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    if plan.next_due > today {
        return Ok(None);
    }
    let period_start = plan.next_due;

    let (status, reason) = match plans::require_within_budget(&tx, plan.depot_id) {
        Err(CoreError::BudgetExceeded { overrun }) => (
            RunStatus::Skipped,
            Some(format!("budget exceeded by {}", overrun)),
        ),
        Err(e) => return Err(e),
        Ok(()) => match prices.price_at(&tx, plan.asset_id, today)? {
            None => (RunStatus::Skipped, Some("no price available".to_string())),
            Some(price) if price <= Decimal::ZERO => {
                (RunStatus::Skipped, Some("no price available".to_string()))
            }
            Some(price) => {
                let quantity = (plan.worth / price).round_dp(8);
                match ledger::append_plan_buy(&tx, &plan, quantity, price, period_start, now) {
                    Ok(_inserted) => (RunStatus::Executed, None),
                    Err(CoreError::InsufficientCash { available, .. }) => (
                        RunStatus::Skipped,
                        Some(format!("insufficient cash ({} available)", available)),
                    ),
                    Err(e) => return Err(e),
                }
            }
        },
    };

    // Durable attempt record; a re-run keeps the first record.
    tx.execute(
        "INSERT OR IGNORE INTO plan_runs(plan_id, depot_id, period_start, status, reason, run_at)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            plan.id,
            plan.depot_id,
            period_start.to_string(),
            status.as_str(),
            reason,
            fmt_tstamp(&now)
        ],
    )?;
    // The occurrence advances whether executed or skipped — a skipped
    // occurrence is reported, not retried within its period.
    let next = plan.frequency.advance(period_start);
    tx.execute(
        "UPDATE savings_plans SET next_due=?1 WHERE id=?2",
        params![next.to_string(), plan.id],
    )?;
    tx.commit()?;

    Ok(Some(TickOutcome {
        plan_id: plan.id,
        depot_id: plan.depot_id,
        period_start,
        status,
        reason,
    }))
}

/// Attempt history for a plan, newest first.
pub fn runs_for_plan(
    conn: &Connection,
    plan_id: i64,
) -> Result<Vec<(String, String, Option<String>, String)>, CoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT period_start, status, reason, run_at FROM plan_runs
         WHERE plan_id=?1 ORDER BY period_start DESC",
    )?;
    let rows = stmt.query_map(params![plan_id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, Option<String>>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Fixed-interval background loop: tick, refresh the daily value points,
/// sleep. Kill and restart at any point; nothing is lost.
pub fn run_loop(
    conn: &mut Connection,
    prices: &dyn PriceSource,
    interval: std::time::Duration,
) -> Result<(), CoreError> {
    loop {
        let now = Utc::now();
        match run_tick(conn, prices, now) {
            Ok(summary) => tracing::info!(
                executed = summary.executed,
                skipped = summary.skipped,
                "scheduler tick complete"
            ),
            Err(e) => tracing::warn!(error = %e, "scheduler tick failed, retrying next interval"),
        }
        match valuation::snapshot_all(conn, prices, now.date_naive()) {
            Ok(count) => tracing::debug!(depots = count, "value points refreshed"),
            Err(e) => tracing::warn!(error = %e, "value snapshot pass failed"),
        }
        std::thread::sleep(interval);
    }
}
