// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;

use paperdepot::auth::{self, Caller};
use paperdepot::errors::CoreError;
use paperdepot::models::Role;
use paperdepot::{db, depots, ledger, overview, plans};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn setup() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    auth::ensure_user(&conn, "alice", "Alice").unwrap();
    auth::ensure_user(&conn, "bob", "Bob").unwrap();
    auth::ensure_user(&conn, "teach", "Ms. Keller").unwrap();
    auth::grant_role(&mut conn, &Caller::system(), "teach", Role::Teacher).unwrap();
    conn
}

#[test]
fn students_cannot_grant_rewards_even_on_missing_depots() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let t = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();

    // existing depot
    let depot = depots::create_depot(&mut conn, &alice, "D", dec("100"), &[]).unwrap();
    assert!(matches!(
        ledger::grant_reward(&mut conn, &alice, depot.id, dec("10"), t),
        Err(CoreError::Unauthorized(_))
    ));
    // missing depot: still Unauthorized, never NotFound
    assert!(matches!(
        ledger::grant_reward(&mut conn, &alice, 9999, dec("10"), t),
        Err(CoreError::Unauthorized(_))
    ));
}

#[test]
fn admin_overview_is_role_gated() {
    let conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    assert!(matches!(
        overview::admin_overview(&conn, &alice),
        Err(CoreError::Unauthorized(_))
    ));

    let teach = Caller::resolve(&conn, "teach").unwrap();
    let rows = overview::admin_overview(&conn, &teach).unwrap();
    assert_eq!(rows.len(), 3);
    let teach_row = rows.iter().find(|r| r.user_id == "teach").unwrap();
    assert_eq!(teach_row.roles.len(), 1);
    assert_eq!(teach_row.roles[0].role, Role::Teacher);
    assert!(!teach_row.roles[0].granted_at.is_empty());
}

#[test]
fn role_grants_flip_the_elevated_flag() {
    let mut conn = setup();
    let teach = Caller::resolve(&conn, "teach").unwrap();

    let elevated = |conn: &Connection| -> bool {
        conn.query_row("SELECT elevated FROM users WHERE id='bob'", [], |r| {
            r.get(0)
        })
        .unwrap()
    };
    assert!(!elevated(&conn));

    auth::grant_role(&mut conn, &teach, "bob", Role::Teacher).unwrap();
    assert!(elevated(&conn));
    assert!(Caller::resolve(&conn, "bob").unwrap().is_elevated());

    auth::revoke_role(&mut conn, &teach, "bob", Role::Teacher).unwrap();
    assert!(!elevated(&conn));
    assert!(!Caller::resolve(&conn, "bob").unwrap().is_elevated());
}

#[test]
fn students_cannot_grant_or_revoke_roles() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    assert!(matches!(
        auth::grant_role(&mut conn, &alice, "bob", Role::Teacher),
        Err(CoreError::Unauthorized(_))
    ));
    assert!(matches!(
        auth::revoke_role(&mut conn, &alice, "teach", Role::Teacher),
        Err(CoreError::Unauthorized(_))
    ));
}

#[test]
fn granting_to_an_unknown_user_is_not_found() {
    let mut conn = setup();
    let teach = Caller::resolve(&conn, "teach").unwrap();
    assert!(matches!(
        auth::grant_role(&mut conn, &teach, "nobody", Role::Teacher),
        Err(CoreError::NotFound(_))
    ));
}

#[test]
fn budget_changes_are_role_gated_then_existence_checked() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let depot = depots::create_depot(&mut conn, &alice, "D", dec("100"), &[]).unwrap();

    assert!(matches!(
        plans::change_budget(&mut conn, &alice, depot.id, dec("250")),
        Err(CoreError::Unauthorized(_))
    ));

    let teach = Caller::resolve(&conn, "teach").unwrap();
    plans::change_budget(&mut conn, &teach, depot.id, dec("250")).unwrap();
    assert_eq!(plans::monthly_budget(&conn, depot.id).unwrap(), dec("250"));

    // re-setting upserts the single budget row
    plans::change_budget(&mut conn, &teach, depot.id, dec("300")).unwrap();
    assert_eq!(plans::monthly_budget(&conn, depot.id).unwrap(), dec("300"));
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM budgets WHERE depot_id=?1",
            rusqlite::params![depot.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);

    assert!(matches!(
        plans::change_budget(&mut conn, &teach, 9999, dec("250")),
        Err(CoreError::NotFound(_))
    ));
}

#[test]
fn members_and_elevated_callers_see_a_depot_others_get_not_found() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let depot = depots::create_depot(&mut conn, &alice, "D", dec("100"), &[]).unwrap();

    assert!(auth::require_member(&conn, &alice, depot.id).is_ok());

    let teach = Caller::resolve(&conn, "teach").unwrap();
    assert!(auth::require_member(&conn, &teach, depot.id).is_ok());

    let bob = Caller::resolve(&conn, "bob").unwrap();
    assert!(matches!(
        auth::require_member(&conn, &bob, depot.id),
        Err(CoreError::NotFound(_))
    ));
}

#[test]
fn shared_depots_admit_every_member() {
    let mut conn = setup();
    let alice = Caller::resolve(&conn, "alice").unwrap();
    let depot = depots::create_depot(
        &mut conn,
        &alice,
        "Shared",
        dec("100"),
        &["bob".to_string()],
    )
    .unwrap();

    let bob = Caller::resolve(&conn, "bob").unwrap();
    assert!(auth::require_member(&conn, &bob, depot.id).is_ok());
    assert_eq!(
        depots::member_names(&conn, depot.id).unwrap(),
        vec!["Alice".to_string(), "Bob".to_string()]
    );
}
