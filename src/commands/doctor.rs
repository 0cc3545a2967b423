// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::prices::{PriceSource, StoredPrices};
use crate::projector;
use crate::utils::pretty_table;
use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();
    let today = Utc::now().date_naive();

    let depot_ids: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM depots ORDER BY id")?;
        let ids = stmt.query_map([], |r| r.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for id in ids {
            out.push(id?);
        }
        out
    };

    for depot_id in &depot_ids {
        // 1) Negative cash means the floor was bypassed without an override
        let proj = projector::project(conn, *depot_id)?;
        let has_override: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE depot_id=?1 AND kind='reward')",
            rusqlite::params![depot_id],
            |r| r.get(0),
        )?;
        if proj.cash < Decimal::ZERO && !has_override {
            rows.push(vec![
                "negative_cash".into(),
                format!("depot {} at {}", depot_id, proj.cash),
            ]);
        }

        // 2) Held assets with no quote cannot be valued
        for p in &proj.positions {
            if StoredPrices.price_at(conn, p.asset_id, today)?.is_none() {
                rows.push(vec![
                    "missing_quote".into(),
                    format!("depot {} holds {}", depot_id, p.ticker),
                ]);
            }
        }

        // 3) Depots nobody owns are unreachable by students
        let member_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM depot_members WHERE depot_id=?1",
            rusqlite::params![depot_id],
            |r| r.get(0),
        )?;
        if member_count == 0 {
            rows.push(vec!["orphan_depot".into(), format!("depot {}", depot_id)]);
        }
    }

    // 4) Long-overdue plans mean the scheduler is not running
    let stale = (today - Duration::days(7)).to_string();
    let mut stmt =
        conn.prepare("SELECT id, depot_id, next_due FROM savings_plans WHERE next_due<?1")?;
    let mut cur = stmt.query([&stale])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let depot_id: i64 = r.get(1)?;
        let next_due: String = r.get(2)?;
        rows.push(vec![
            "overdue_plan".into(),
            format!("plan {} (depot {}) due {}", id, depot_id, next_due),
        ]);
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
