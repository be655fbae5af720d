// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketpal::commands::movements::create_movement;
use pocketpal::commands::profile::{OnboardingPlan, onboard};
use pocketpal::commands::snapshots::{
    self, AutoSnapshotOutcome, generate_auto, register_balance, snapshot_rows,
};
use pocketpal::db;
use pocketpal::models::{NewMovement, SnapshotKind};
use pocketpal::queries::load_snapshots;
use pocketpal::session::Session;
use pocketpal::utils::{id_for_account, id_for_category};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

const OWNER: &str = "ana";

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let plan = OnboardingPlan {
        accounts: vec![
            "Checking:current:1000".parse().unwrap(),
            "Cash:wallet:50".parse().unwrap(),
        ],
        ..OnboardingPlan::default()
    };
    onboard(&conn, OWNER, &plan).unwrap();
    for (date, amount, cat) in [
        ("2025-04-03", "-45.50", "Food"),
        ("2025-04-28", "2500", "Salary"),
        ("2025-05-02", "-12", "Transport"),
    ] {
        create_movement(
            &conn,
            OWNER,
            &NewMovement {
                date: d(date),
                concept: "m".into(),
                amount: dec(amount),
                account_id: id_for_account(&conn, OWNER, "Checking").unwrap(),
                category_id: id_for_category(&conn, OWNER, cat).unwrap(),
                subcategory_id: None,
                notes: None,
                recurring: false,
                template_id: None,
            },
        )
        .unwrap();
    }
    conn
}

#[test]
fn auto_snapshot_records_previous_month_end_balances() {
    let conn = setup();
    let outcome = generate_auto(&conn, OWNER, d("2025-05-10")).unwrap();
    assert_eq!(
        outcome,
        AutoSnapshotOutcome::Generated {
            month: "2025-04".into(),
            inserted: 2,
            updated: 0
        }
    );

    let snaps = load_snapshots(&conn, OWNER, Some("2025-04")).unwrap();
    let checking = id_for_account(&conn, OWNER, "Checking").unwrap();
    let row = snaps.iter().find(|s| s.account_id == checking).unwrap();
    assert_eq!(row.calculated_balance, Some(dec("3454.50")));
    assert_eq!(row.registered_balance, None);
    assert_eq!(row.kind, SnapshotKind::Auto);

    let again = generate_auto(&conn, OWNER, d("2025-05-20")).unwrap();
    assert_eq!(
        again,
        AutoSnapshotOutcome::AlreadyGenerated {
            month: "2025-04".into()
        }
    );
}

#[test]
fn registered_balance_is_never_overwritten() {
    let conn = setup();
    let checking = id_for_account(&conn, OWNER, "Checking").unwrap();
    let cash = id_for_account(&conn, OWNER, "Cash").unwrap();
    register_balance(&conn, OWNER, "2025-04", checking, dec("3400"), Some("bank app")).unwrap();
    register_balance(&conn, OWNER, "2025-04", cash, dec("42"), None).unwrap();

    let first = generate_auto(&conn, OWNER, d("2025-05-01")).unwrap();
    assert_eq!(
        first,
        AutoSnapshotOutcome::Generated {
            month: "2025-04".into(),
            inserted: 0,
            updated: 2
        }
    );
    let before = load_snapshots(&conn, OWNER, Some("2025-04")).unwrap();

    // Only manual rows exist, so a second run recomputes; values must not move.
    generate_auto(&conn, OWNER, d("2025-05-01")).unwrap();
    let after = load_snapshots(&conn, OWNER, Some("2025-04")).unwrap();

    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(a.calculated_balance, b.calculated_balance);
        assert_eq!(a.registered_balance, b.registered_balance);
        assert_eq!(a.kind, SnapshotKind::Manual);
    }
    let checking_row = after.iter().find(|s| s.account_id == checking).unwrap();
    assert_eq!(checking_row.registered_balance, Some(dec("3400")));
    assert_eq!(checking_row.calculated_balance, Some(dec("3454.50")));
    assert_eq!(checking_row.notes.as_deref(), Some("bank app"));
}

#[test]
fn registering_on_an_auto_row_keeps_calculated_balance() {
    let conn = setup();
    generate_auto(&conn, OWNER, d("2025-05-10")).unwrap();
    let checking = id_for_account(&conn, OWNER, "Checking").unwrap();
    register_balance(&conn, OWNER, "2025-04", checking, dec("3450"), None).unwrap();

    let rows = snapshot_rows(&conn, OWNER, Some("2025-04")).unwrap();
    let row = rows.iter().find(|r| r.account == "Checking").unwrap();
    assert_eq!(row.registered, Some(dec("3450")));
    assert_eq!(row.calculated, Some(dec("3454.50")));
    assert_eq!(row.difference, Some(dec("-4.50")));
    assert_eq!(row.kind, "auto");
}

#[test]
fn inactive_accounts_are_not_snapshotted() {
    let conn = setup();
    conn.execute("UPDATE accounts SET active=0 WHERE name='Cash'", [])
        .unwrap();
    let outcome = generate_auto(&conn, OWNER, d("2025-05-10")).unwrap();
    assert!(matches!(
        outcome,
        AutoSnapshotOutcome::Generated { inserted: 1, .. }
    ));
}

#[test]
fn user_without_accounts_gets_nothing() {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let outcome = generate_auto(&conn, "nobody", d("2025-01-15")).unwrap();
    assert_eq!(
        outcome,
        AutoSnapshotOutcome::NoAccounts {
            month: "2024-12".into()
        }
    );
}

#[test]
fn session_runs_generator_only_once() {
    let conn = setup();
    let mut session = Session::new(OWNER, d("2025-05-10"));
    assert!(session.run_auto_snapshot(&conn).is_some());
    assert!(session.auto_snapshot_ran());
    conn.execute("DELETE FROM snapshots", []).unwrap();
    assert!(session.run_auto_snapshot(&conn).is_none());
    assert!(load_snapshots(&conn, OWNER, None).unwrap().is_empty());
}

#[test]
fn set_through_cli_creates_manual_row() {
    let conn = setup();
    let session = Session::new(OWNER, d("2025-05-10"));
    let matches = pocketpal::cli::build_cli().get_matches_from([
        "pocketpal",
        "snapshot",
        "set",
        "--month",
        "2025-03",
        "--account",
        "Cash",
        "--balance",
        "61.20",
    ]);
    let Some(("snapshot", snap_m)) = matches.subcommand() else {
        panic!("no snapshot subcommand");
    };
    snapshots::handle(&conn, &session, snap_m).unwrap();
    let rows = load_snapshots(&conn, OWNER, Some("2025-03")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, SnapshotKind::Manual);
    assert_eq!(rows[0].registered_balance, Some(dec("61.20")));
    assert_eq!(rows[0].calculated_balance, None);
    assert_eq!(rows[0].exchange_rate, Some(Decimal::ONE));
}
