// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketpal::commands::exporter::{self, generate_csv, write_backup};
use pocketpal::commands::movements::create_movement;
use pocketpal::commands::profile::{OnboardingPlan, onboard};
use pocketpal::models::NewMovement;
use pocketpal::session::Session;
use pocketpal::utils::{id_for_account, id_for_category};
use pocketpal::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::json;
use std::io::Read;
use tempfile::tempdir;

const OWNER: &str = "ana";

fn base_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    onboard(
        &conn,
        OWNER,
        &OnboardingPlan {
            accounts: vec!["Checking:current:1000".parse().unwrap()],
            ..OnboardingPlan::default()
        },
    )
    .unwrap();
    create_movement(
        &conn,
        OWNER,
        &NewMovement {
            date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            concept: "Rent, \"home\"".into(),
            amount: Decimal::new(-80000, 2),
            account_id: id_for_account(&conn, OWNER, "Checking").unwrap(),
            category_id: id_for_category(&conn, OWNER, "Housing").unwrap(),
            subcategory_id: None,
            notes: Some("line one\nline two".into()),
            recurring: false,
            template_id: None,
        },
    )
    .unwrap();
    conn
}

fn session() -> Session {
    Session::new(OWNER, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap())
}

#[test]
fn csv_quotes_only_when_needed() {
    let out = generate_csv(
        &["Concept", "Amount"],
        &[vec!["Rent, \"home\"", "-800"], vec!["Coffee", "-2.5"]],
    )
    .unwrap();
    assert_eq!(
        out,
        "Concept,Amount\n\"Rent, \"\"home\"\"\",-800\nCoffee,-2.5"
    );
}

#[test]
fn csv_quotes_newlines_and_carriage_returns() {
    let out = generate_csv(&["A", "B"], &[vec!["a\nb", ""], vec!["a\rb", "plain"]]).unwrap();
    assert_eq!(out, "A,B\n\"a\nb\",\n\"a\rb\",plain");
}

#[test]
fn csv_with_no_rows_is_just_the_header() {
    let rows: Vec<Vec<String>> = Vec::new();
    assert_eq!(generate_csv(&["A", "B"], &rows).unwrap(), "A,B");
}

#[test]
fn movements_csv_has_fixed_columns() {
    let conn = base_conn();
    let csv = exporter::movements_csv(&conn, OWNER, Some("2025-01")).unwrap();
    let mut lines = csv.splitn(2, '\n');
    assert_eq!(
        lines.next().unwrap(),
        "Date,Concept,Amount,Account,Category,Subcategory,Notes,Recurring"
    );
    assert_eq!(
        lines.next().unwrap(),
        "2025-01-02,\"Rent, \"\"home\"\"\",-800.00,Checking,Housing,,\"line one\nline two\",No"
    );
    assert!(!csv.ends_with('\n'));
}

#[test]
fn export_movements_writes_pretty_json() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.json");
    let out_str = out_path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from([
        "pocketpal",
        "export",
        "movements",
        "--format",
        "json",
        "--out",
        &out_str,
    ]);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(&conn, &session(), export_m).unwrap();
    } else {
        panic!("no export subcommand");
    }

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(
        parsed,
        json!([
            {
                "date": "2025-01-02",
                "concept": "Rent, \"home\"",
                "amount": "-800.00",
                "account": "Checking",
                "category": "Housing",
                "subcategory": null,
                "notes": "line one\nline two",
                "recurring": false
            }
        ])
    );
}

#[test]
fn export_movements_rejects_unknown_format() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.unknown");
    let out_str = out_path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from([
        "pocketpal",
        "export",
        "movements",
        "--format",
        "xml",
        "--out",
        &out_str,
    ]);
    if let Some(("export", export_m)) = matches.subcommand() {
        assert!(exporter::handle(&conn, &session(), export_m).is_err());
    } else {
        panic!("no export subcommand");
    }
    assert!(!out_path.exists());
}

#[test]
fn backup_zip_holds_one_csv_per_table() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let path = dir.path().join("backup.zip");
    let names = write_backup(&conn, OWNER, &path).unwrap();
    assert_eq!(
        names,
        vec!["movements.csv", "accounts.csv", "categories.csv", "recurring.csv"]
    );

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(archive.len(), 4);
    let mut accounts = String::new();
    archive
        .by_name("accounts.csv")
        .unwrap()
        .read_to_string(&mut accounts)
        .unwrap();
    assert_eq!(
        accounts,
        "Name,Kind,Currency,Initial Balance,Color,Active\nChecking,current,EUR,1000,#3B82F6,Yes"
    );

    let mut recurring = String::new();
    archive
        .by_name("recurring.csv")
        .unwrap()
        .read_to_string(&mut recurring)
        .unwrap();
    assert_eq!(
        recurring,
        "Concept,Amount,Day of Month,Account,Category,Notes,Active"
    );
}
