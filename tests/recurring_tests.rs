// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketpal::commands::movements::create_movement;
use pocketpal::commands::profile::{OnboardingPlan, onboard};
use pocketpal::commands::recurring::{
    self, BannerState, RecurringBanner, create_template, merge_generated, scheduled_date,
};
use pocketpal::errors::PocketError;
use pocketpal::models::{Movement, NewMovement};
use pocketpal::queries::{MovementFilter, load_movements, load_templates};
use pocketpal::session::Session;
use pocketpal::utils::{id_for_account, id_for_category};
use pocketpal::validation::TemplateForm;
use pocketpal::{cli, db};
use rusqlite::{Connection, params};
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
            "Savings:investment:0".parse().unwrap(),
        ],
        ..OnboardingPlan::default()
    };
    onboard(&conn, OWNER, &plan).unwrap();
    conn
}

fn template(conn: &Connection, concept: &str, amount: &str, day: u32, category: &str) -> TemplateForm {
    TemplateForm {
        concept: concept.into(),
        amount: dec(amount),
        day_of_month: day,
        account_id: id_for_account(conn, OWNER, "Checking").unwrap(),
        category_id: id_for_category(conn, OWNER, category).unwrap(),
        subcategory_id: None,
        notes: None,
        is_transfer: false,
        destination_account_id: None,
    }
}

fn seed_templates(conn: &Connection) -> (i64, i64) {
    let rent = create_template(conn, OWNER, &template(conn, "Rent", "-800", 1, "Housing")).unwrap();
    let tv = create_template(
        conn,
        OWNER,
        &template(conn, "Streaming", "-12.99", 31, "Subscriptions"),
    )
    .unwrap();
    let gym = create_template(conn, OWNER, &template(conn, "Gym", "-35", 5, "Health")).unwrap();
    conn.execute(
        "UPDATE recurring_templates SET active=0 WHERE id=?1",
        params![gym],
    )
    .unwrap();
    (rent, tv)
}

#[test]
fn day_past_month_end_is_clamped() {
    assert_eq!(scheduled_date("2025-04", 31).unwrap(), d("2025-04-30"));
    assert_eq!(scheduled_date("2025-02", 30).unwrap(), d("2025-02-28"));
    assert_eq!(scheduled_date("2024-02", 31).unwrap(), d("2024-02-29"));
    assert_eq!(scheduled_date("2025-01", 15).unwrap(), d("2025-01-15"));
}

#[test]
fn confirm_creates_one_movement_per_active_template() {
    let mut conn = setup();
    let (rent, tv) = seed_templates(&conn);

    let mut banner = RecurringBanner::new("2025-04");
    assert_eq!(banner.evaluate(&conn, OWNER).unwrap(), BannerState::Offered);
    let created = banner.confirm(&mut conn, OWNER).unwrap();

    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|m| m.recurring && m.month == "2025-04"));
    assert_eq!(created[0].template_id, Some(rent));
    assert_eq!(created[0].date, d("2025-04-01"));
    assert_eq!(created[1].template_id, Some(tv));
    assert_eq!(created[1].date, d("2025-04-30"));
    assert_eq!(created[1].amount, dec("-12.99"));
    assert_eq!(banner.state(), BannerState::Suppressed);

    let stored = load_movements(&conn, OWNER, &MovementFilter::month("2025-04")).unwrap();
    assert_eq!(stored.len(), 2);
}

#[test]
fn banner_is_suppressed_once_month_has_recurring_movement() {
    let mut conn = setup();
    seed_templates(&conn);
    let mut first = RecurringBanner::new("2025-04");
    first.evaluate(&conn, OWNER).unwrap();
    first.confirm(&mut conn, OWNER).unwrap();

    let mut again = RecurringBanner::new("2025-04");
    assert_eq!(again.evaluate(&conn, OWNER).unwrap(), BannerState::Suppressed);
    // Other months are unaffected.
    let mut may = RecurringBanner::new("2025-05");
    assert_eq!(may.evaluate(&conn, OWNER).unwrap(), BannerState::Offered);
}

#[test]
fn a_single_manual_recurring_movement_suppresses_the_banner() {
    let conn = setup();
    seed_templates(&conn);
    create_movement(
        &conn,
        OWNER,
        &NewMovement {
            date: d("2025-06-02"),
            concept: "Rent paid early".into(),
            amount: dec("-800"),
            account_id: id_for_account(&conn, OWNER, "Checking").unwrap(),
            category_id: id_for_category(&conn, OWNER, "Housing").unwrap(),
            subcategory_id: None,
            notes: None,
            recurring: true,
            template_id: None,
        },
    )
    .unwrap();
    let mut banner = RecurringBanner::new("2025-06");
    assert_eq!(banner.evaluate(&conn, OWNER).unwrap(), BannerState::Suppressed);
}

#[test]
fn declining_suppresses_for_the_session() {
    let conn = setup();
    seed_templates(&conn);
    let mut session = Session::new(OWNER, d("2025-07-10"));
    let month = session.current_month();

    assert_eq!(
        session.banner(&month).evaluate(&conn, OWNER).unwrap(),
        BannerState::Offered
    );
    session.banner(&month).decline();
    assert_eq!(
        session.banner(&month).evaluate(&conn, OWNER).unwrap(),
        BannerState::Suppressed
    );
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM movements", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn no_active_templates_means_no_offer() {
    let mut conn = setup();
    let mut banner = RecurringBanner::new("2025-04");
    assert_eq!(banner.evaluate(&conn, OWNER).unwrap(), BannerState::Suppressed);
    let err = banner.confirm(&mut conn, OWNER).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PocketError>(),
        Some(PocketError::BannerNotOffered { .. })
    ));
}

#[test]
fn transfer_template_needs_distinct_destination() {
    let conn = setup();
    let mut form = template(&conn, "Move to savings", "-200", 2, "Index fund");
    form.is_transfer = true;
    form.destination_account_id = Some(form.account_id);
    let err = create_template(&conn, OWNER, &form).unwrap_err();
    match err.downcast_ref::<PocketError>() {
        Some(PocketError::Validation(v)) => assert!(v.has("destination_account")),
        other => panic!("unexpected {:?}", other),
    }

    form.destination_account_id = Some(id_for_account(&conn, OWNER, "Savings").unwrap());
    create_template(&conn, OWNER, &form).unwrap();
    let stored = load_templates(&conn, OWNER, true).unwrap();
    assert!(stored[0].is_transfer);
}

#[test]
fn generate_through_cli_then_nothing_left() {
    let mut conn = setup();
    seed_templates(&conn);
    let mut session = Session::new(OWNER, d("2025-04-20"));

    let matches = cli::build_cli().get_matches_from(["pocketpal", "recurring", "generate"]);
    let Some(("recurring", rec_m)) = matches.subcommand() else {
        panic!("no recurring subcommand");
    };
    recurring::handle(&mut conn, &mut session, rec_m).unwrap();
    assert_eq!(session.banner("2025-04").state(), BannerState::Suppressed);

    // A second run in the same session does not duplicate anything.
    recurring::handle(&mut conn, &mut session, rec_m).unwrap();
    let stored = load_movements(&conn, OWNER, &MovementFilter::month("2025-04")).unwrap();
    assert_eq!(stored.len(), 2);
}

#[test]
fn add_template_through_cli() {
    let mut conn = setup();
    let mut session = Session::new(OWNER, d("2025-04-20"));
    let matches = cli::build_cli().get_matches_from([
        "pocketpal",
        "recurring",
        "add",
        "--concept",
        "Phone",
        "--amount",
        "-19.90",
        "--day",
        "12",
        "--account",
        "Checking",
        "--category",
        "Subscriptions",
    ]);
    let Some(("recurring", rec_m)) = matches.subcommand() else {
        panic!("no recurring subcommand");
    };
    recurring::handle(&mut conn, &mut session, rec_m).unwrap();
    let stored = load_templates(&conn, OWNER, false).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].day_of_month, 12);
    assert_eq!(stored[0].amount, dec("-19.90"));
    assert!(stored[0].active);
}

#[test]
fn failed_generation_commits_nothing_and_keeps_the_offer() {
    let mut conn = setup();
    let (_, tv) = seed_templates(&conn);
    conn.execute_batch(&format!(
        "CREATE TRIGGER reject_streaming BEFORE INSERT ON movements
         WHEN NEW.template_id = {tv}
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;"
    ))
    .unwrap();

    let mut banner = RecurringBanner::new("2025-04");
    assert_eq!(banner.evaluate(&conn, OWNER).unwrap(), BannerState::Offered);
    assert!(banner.confirm(&mut conn, OWNER).is_err());
    assert_eq!(banner.state(), BannerState::Offered);
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM movements", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);

    // The offer stands, so confirming again retries the whole batch.
    conn.execute_batch("DROP TRIGGER reject_streaming;").unwrap();
    let created = banner.confirm(&mut conn, OWNER).unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(banner.state(), BannerState::Suppressed);
}

fn listed(id: i64, date: &str) -> Movement {
    Movement {
        id,
        owner: OWNER.into(),
        date: d(date),
        concept: format!("m{id}"),
        amount: dec("-1"),
        account_id: 1,
        category_id: 1,
        subcategory_id: None,
        notes: None,
        recurring: false,
        template_id: None,
        month: "2025-04".into(),
    }
}

#[test]
fn merged_listing_is_sorted_by_date() {
    let mut list = vec![listed(1, "2025-04-20"), listed(2, "2025-04-03")];
    let created = vec![listed(3, "2025-04-30"), listed(4, "2025-04-01"), listed(5, "2025-04-03")];
    merge_generated(&mut list, created);
    let order: Vec<i64> = list.iter().map(|m| m.id).collect();
    // Equal dates keep their relative order.
    assert_eq!(order, vec![4, 2, 5, 1, 3]);
}
