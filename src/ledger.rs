// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Transaction ledger: the append-only source of truth. All writes go
//! through one immediate SQLite transaction so the check-then-act on cash
//! and positions is atomic against concurrent writers, and an aborted call
//! leaves no partial entry.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;

use crate::auth::{self, Caller};
use crate::errors::CoreError;
use crate::models::{Role, SavingsPlan, Transaction, TxKind};
use crate::utils::{fmt_tstamp, parse_tstamp};
use crate::{prices, projector};

/// Record a buy or sell for a depot the caller owns (or oversees).
pub fn record_trade(
    conn: &mut Connection,
    caller: &Caller,
    depot_id: i64,
    asset_id: i64,
    kind: TxKind,
    quantity: Decimal,
    unit_price: Decimal,
    tstamp: DateTime<Utc>,
) -> Result<Transaction, CoreError> {
    if !matches!(kind, TxKind::Buy | TxKind::Sell) {
        return Err(CoreError::InvalidInput(
            "trade kind must be buy or sell".into(),
        ));
    }
    if quantity <= Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!(
            "unit price must not be negative, got {}",
            unit_price
        )));
    }
    auth::require_member(conn, caller, depot_id)?;
    if !prices::asset_exists(conn, asset_id)? {
        return Err(CoreError::NotFound("asset"));
    }

    let gross = quantity * unit_price;
    let cash_delta = match kind {
        TxKind::Buy => -gross,
        TxKind::Sell => gross,
        _ => unreachable!(),
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let id = append(
        &tx,
        depot_id,
        Some(asset_id),
        kind,
        quantity,
        unit_price,
        cash_delta,
        tstamp,
    )?;
    tx.commit()?;

    Ok(Transaction {
        id,
        depot_id,
        asset_id: Some(asset_id),
        kind,
        quantity,
        unit_price,
        cash_delta,
        tstamp,
        plan_id: None,
        period_start: None,
    })
}

/// Teacher-granted reward: an override-kind cash event, exempt from the
/// cash floor (it may push the balance anywhere).
pub fn grant_reward(
    conn: &mut Connection,
    caller: &Caller,
    depot_id: i64,
    amount: Decimal,
    tstamp: DateTime<Utc>,
) -> Result<Transaction, CoreError> {
    auth::require_role(caller, &[Role::Admin, Role::Teacher])?;
    if amount.is_zero() {
        return Err(CoreError::InvalidInput("reward must not be zero".into()));
    }
    let exists: Option<i64> = conn
        .query_row("SELECT id FROM depots WHERE id=?1", params![depot_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(CoreError::NotFound("depot"));
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let id = append(
        &tx,
        depot_id,
        None,
        TxKind::Reward,
        Decimal::ZERO,
        Decimal::ZERO,
        amount,
        tstamp,
    )?;
    tx.commit()?;
    Ok(Transaction {
        id,
        depot_id,
        asset_id: None,
        kind: TxKind::Reward,
        quantity: Decimal::ZERO,
        unit_price: Decimal::ZERO,
        cash_delta: amount,
        tstamp,
        plan_id: None,
        period_start: None,
    })
}

/// Member-initiated cash adjustment, subject to the cash floor.
pub fn adjust_cash(
    conn: &mut Connection,
    caller: &Caller,
    depot_id: i64,
    amount: Decimal,
    tstamp: DateTime<Utc>,
) -> Result<Transaction, CoreError> {
    auth::require_member(conn, caller, depot_id)?;
    if amount.is_zero() {
        return Err(CoreError::InvalidInput(
            "cash adjustment must not be zero".into(),
        ));
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let id = append(
        &tx,
        depot_id,
        None,
        TxKind::Cash,
        Decimal::ZERO,
        Decimal::ZERO,
        amount,
        tstamp,
    )?;
    tx.commit()?;
    Ok(Transaction {
        id,
        depot_id,
        asset_id: None,
        kind: TxKind::Cash,
        quantity: Decimal::ZERO,
        unit_price: Decimal::ZERO,
        cash_delta: amount,
        tstamp,
        plan_id: None,
        period_start: None,
    })
}

/// Materialize one savings-plan occurrence as a buy. Runs inside the
/// scheduler's per-plan transaction; `(plan_id, period_start)` uniqueness
/// makes re-runs no-ops. Returns whether a row was actually inserted.
pub(crate) fn append_plan_buy(
    tx: &rusqlite::Transaction<'_>,
    plan: &SavingsPlan,
    quantity: Decimal,
    unit_price: Decimal,
    period_start: NaiveDate,
    tstamp: DateTime<Utc>,
) -> Result<bool, CoreError> {
    let cash_delta = -(quantity * unit_price);
    check_cash_floor(tx, plan.depot_id, cash_delta)?;
    let inserted = tx.execute(
        "INSERT INTO transactions(depot_id, asset_id, kind, quantity, unit_price,
                                  cash_delta, tstamp, plan_id, period_start)
         VALUES (?1,?2,'buy',?3,?4,?5,?6,?7,?8)
         ON CONFLICT(plan_id, period_start) DO NOTHING",
        params![
            plan.depot_id,
            plan.asset_id,
            quantity.to_string(),
            unit_price.to_string(),
            cash_delta.to_string(),
            fmt_tstamp(&tstamp),
            plan.id,
            period_start.to_string()
        ],
    )?;
    Ok(inserted == 1)
}

/// Validated append. Callers hold the write transaction; the projection
/// read and the insert are therefore atomic.
#[allow(clippy::too_many_arguments)]
fn append(
    tx: &rusqlite::Transaction<'_>,
    depot_id: i64,
    asset_id: Option<i64>,
    kind: TxKind,
    quantity: Decimal,
    unit_price: Decimal,
    cash_delta: Decimal,
    tstamp: DateTime<Utc>,
) -> Result<i64, CoreError> {
    if kind != TxKind::Reward {
        check_cash_floor(tx, depot_id, cash_delta)?;
    }
    if kind == TxKind::Sell {
        let held = projector::project(tx, depot_id)?.quantity_of(asset_id.unwrap_or(0));
        if quantity > held {
            return Err(CoreError::InsufficientPosition {
                requested: quantity,
                held,
            });
        }
    }
    tx.execute(
        "INSERT INTO transactions(depot_id, asset_id, kind, quantity, unit_price,
                                  cash_delta, tstamp)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            depot_id,
            asset_id,
            kind.as_str(),
            quantity.to_string(),
            unit_price.to_string(),
            cash_delta.to_string(),
            fmt_tstamp(&tstamp)
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

fn check_cash_floor(
    conn: &Connection,
    depot_id: i64,
    cash_delta: Decimal,
) -> Result<(), CoreError> {
    let available = projector::project(conn, depot_id)?.cash;
    if available + cash_delta < Decimal::ZERO {
        return Err(CoreError::InsufficientCash {
            delta: cash_delta,
            available,
        });
    }
    Ok(())
}

/// Ordered transaction history for a depot, optionally bounded by dates.
pub fn list_by_depot(
    conn: &Connection,
    caller: &Caller,
    depot_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<Transaction>, CoreError> {
    auth::require_member(conn, caller, depot_id)?;
    let mut stmt = conn.prepare_cached(
        "SELECT id, depot_id, asset_id, kind, quantity, unit_price, cash_delta,
                tstamp, plan_id, period_start
         FROM transactions
         WHERE depot_id=?1
           AND (?2 IS NULL OR substr(tstamp,1,10) >= ?2)
           AND (?3 IS NULL OR substr(tstamp,1,10) <= ?3)
         ORDER BY tstamp, id",
    )?;
    let from_s = from.map(|d| d.to_string());
    let to_s = to.map(|d| d.to_string());
    let mut rows = stmt.query(params![depot_id, from_s, to_s])?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        out.push(tx_from_row(r)?);
    }
    Ok(out)
}

fn tx_from_row(r: &rusqlite::Row<'_>) -> Result<Transaction, CoreError> {
    let kind: String = r.get(3)?;
    let quantity: String = r.get(4)?;
    let unit_price: String = r.get(5)?;
    let cash_delta: String = r.get(6)?;
    let tstamp: String = r.get(7)?;
    let period_start: Option<String> = r.get(9)?;
    Ok(Transaction {
        id: r.get(0)?,
        depot_id: r.get(1)?,
        asset_id: r.get(2)?,
        kind: kind.parse()?,
        quantity: parse_amount(&quantity)?,
        unit_price: parse_amount(&unit_price)?,
        cash_delta: parse_amount(&cash_delta)?,
        tstamp: parse_tstamp(&tstamp)
            .map_err(|e| CoreError::InvalidInput(e.to_string()))?,
        plan_id: r.get(8)?,
        period_start: match period_start {
            Some(s) => Some(
                chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|_| CoreError::InvalidInput(format!("invalid period '{}'", s)))?,
            ),
            None => None,
        },
    })
}

fn parse_amount(s: &str) -> Result<Decimal, CoreError> {
    Decimal::from_str_exact(s)
        .map_err(|_| CoreError::InvalidInput(format!("invalid stored amount '{}'", s)))
}
