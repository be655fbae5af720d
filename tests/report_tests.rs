// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketpal::aggregate::{Flow, Period};
use pocketpal::commands::accounts::update_account;
use pocketpal::commands::doctor::diagnose;
use pocketpal::commands::movements::create_movement;
use pocketpal::commands::profile::{OnboardingPlan, onboard};
use pocketpal::commands::reports::{self, dashboard, exploration};
use pocketpal::db;
use pocketpal::models::{AccountKind, NewMovement};
use pocketpal::session::Session;
use pocketpal::utils::{id_for_account, id_for_category};
use pocketpal::validation::AccountForm;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

const OWNER: &str = "ana";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn record(conn: &Connection, date: NaiveDate, account: &str, category: &str, amount: i64) {
    create_movement(
        conn,
        OWNER,
        &NewMovement {
            date,
            concept: category.into(),
            amount: Decimal::new(amount, 0),
            account_id: id_for_account(conn, OWNER, account).unwrap(),
            category_id: id_for_category(conn, OWNER, category).unwrap(),
            subcategory_id: None,
            notes: None,
            recurring: false,
            template_id: None,
        },
    )
    .unwrap();
}

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    onboard(
        &conn,
        OWNER,
        &OnboardingPlan {
            accounts: vec![
                "Checking:current:1000".parse().unwrap(),
                "Cash:wallet:50".parse().unwrap(),
            ],
            ..OnboardingPlan::default()
        },
    )
    .unwrap();
    let cash = id_for_account(&conn, OWNER, "Cash").unwrap();
    update_account(
        &conn,
        OWNER,
        cash,
        &AccountForm {
            name: "Cash".into(),
            kind: AccountKind::Wallet,
            initial_balance: Decimal::new(50, 0),
            monthly_topup: Some(Decimal::new(100, 0)),
            topup_day: Some(1),
            ..AccountForm::default()
        },
    )
    .unwrap();
    record(&conn, d(2025, 3, 10), "Checking", "Salary", 2000);
    record(&conn, d(2025, 4, 5), "Checking", "Housing", -300);
    record(&conn, d(2025, 4, 6), "Cash", "Food", -20);
    record(&conn, d(2025, 4, 10), "Checking", "Salary", 1000);
    conn
}

#[test]
fn dashboard_figures() {
    let conn = setup();
    let dash = dashboard(&conn, OWNER, d(2025, 4, 15)).unwrap();
    assert_eq!(dash.month, "2025-04");
    assert_eq!(dash.net_worth, Decimal::new(3730, 0));
    assert_eq!(dash.previous_net_worth, Decimal::new(3050, 0));
    assert_eq!(dash.variation, Decimal::new(680, 0));
    assert_eq!(dash.variation_pct, Some(Decimal::new(223, 1)));
    assert_eq!(dash.totals.income, Decimal::new(1000, 0));
    assert_eq!(dash.totals.expenses, Decimal::new(320, 0));
    assert_eq!(dash.savings_rate, Some(Decimal::new(68, 0)));

    let months: Vec<&str> = dash.history.iter().map(|h| h.month.as_str()).collect();
    assert_eq!(
        months,
        vec!["2024-11", "2024-12", "2025-01", "2025-02", "2025-03", "2025-04"]
    );
    assert_eq!(dash.history[3].net_worth, Decimal::new(1050, 0));
    assert_eq!(dash.history[5].net_worth, dash.net_worth);

    assert_eq!(dash.wallets.len(), 1);
    assert_eq!(dash.wallets[0].spent, Decimal::new(20, 0));
    assert_eq!(dash.wallets[0].remaining, Decimal::new(80, 0));
    assert_eq!(dash.by_kind.len(), 2);
}

#[test]
fn savings_rate_absent_without_income() {
    let conn = setup();
    let dash = dashboard(&conn, OWNER, d(2025, 6, 1)).unwrap();
    assert_eq!(dash.totals.income, Decimal::ZERO);
    assert_eq!(dash.savings_rate, None);
    assert_eq!(dash.variation, Decimal::ZERO);
}

#[test]
fn exploration_filters_by_flow_and_period() {
    let conn = setup();
    let ex = exploration(
        &conn,
        OWNER,
        Period::Quarter {
            year: 2025,
            quarter: 2,
        },
        Flow::Expenses,
        None,
    )
    .unwrap();
    assert_eq!(ex.totals.expenses, Decimal::new(320, 0));
    assert_eq!(ex.totals.income, Decimal::ZERO);
    assert_eq!(ex.distribution[0].name, "Housing");
    assert_eq!(ex.distribution[0].total, Decimal::new(300, 0));
    assert_eq!(ex.evolution.len(), 3);
    assert_eq!(ex.evolution[0].total, Decimal::new(-320, 0));
}

#[test]
fn distribution_runs_through_cli() {
    let conn = setup();
    let session = Session::new(OWNER, d(2025, 4, 15));
    let matches = pocketpal::cli::build_cli().get_matches_from([
        "pocketpal",
        "report",
        "distribution",
        "--json",
    ]);
    let Some(("report", rep_m)) = matches.subcommand() else {
        panic!("no report subcommand");
    };
    reports::handle(&conn, &session, rep_m).unwrap();
}

#[test]
fn doctor_flags_broken_rows() {
    let conn = setup();
    assert!(diagnose(&conn, OWNER).unwrap().is_empty());

    let checking = id_for_account(&conn, OWNER, "Checking").unwrap();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    conn.execute(
        "INSERT INTO movements(owner, date, concept, amount, account_id, category_id, month)
         VALUES (?1, '2025-04-30', 'Late', '0', ?2, ?3, '2025-05')",
        params![OWNER, checking, food],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO wallet_configs(owner, account_id, monthly_topup) VALUES (?1, ?2, '10')",
        params![OWNER, checking],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO recurring_templates(owner, concept, amount, account_id, category_id, is_transfer)
         VALUES (?1, 'Broken', '-5', ?2, ?3, 1)",
        params![OWNER, checking, food],
    )
    .unwrap();

    let codes: Vec<&str> = diagnose(&conn, OWNER)
        .unwrap()
        .into_iter()
        .map(|i| i.code)
        .collect();
    assert!(codes.contains(&"movement_month_mismatch"));
    assert!(codes.contains(&"movement_zero_amount"));
    assert!(codes.contains(&"wallet_config_on_non_wallet"));
    assert!(codes.contains(&"transfer_without_destination"));
}
