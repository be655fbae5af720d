// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketpal::commands::categories::{
    self, DEFAULT_COLOR, category_tree, create_category, delete_category, update_category,
};
use pocketpal::commands::doctor::diagnose;
use pocketpal::commands::movements::create_movement;
use pocketpal::commands::profile::{OnboardingPlan, onboard};
use pocketpal::commands::recurring::create_template;
use pocketpal::errors::PocketError;
use pocketpal::models::{CategoryKind, NewMovement};
use pocketpal::queries::load_category;
use pocketpal::session::Session;
use pocketpal::utils::{id_for_account, id_for_category};
use pocketpal::validation::{CategoryForm, TemplateForm};
use pocketpal::{cli, db};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

const OWNER: &str = "ana";

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let plan = OnboardingPlan {
        accounts: vec!["Checking:current:0".parse().unwrap()],
        ..OnboardingPlan::default()
    };
    onboard(&conn, OWNER, &plan).unwrap();
    conn
}

fn form(name: &str, kind: CategoryKind, parent: Option<i64>) -> CategoryForm {
    CategoryForm {
        name: name.into(),
        kind,
        parent_id: parent,
        icon: None,
        color: DEFAULT_COLOR.into(),
    }
}

fn add_movement(conn: &Connection, category: i64, subcategory: Option<i64>) {
    create_movement(
        conn,
        OWNER,
        &NewMovement {
            date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            concept: "Ticket".into(),
            amount: Decimal::new(-250, 2),
            account_id: id_for_account(conn, OWNER, "Checking").unwrap(),
            category_id: category,
            subcategory_id: subcategory,
            notes: None,
            recurring: false,
            template_id: None,
        },
    )
    .unwrap();
}

fn pocket_err(err: &anyhow::Error) -> &PocketError {
    err.downcast_ref::<PocketError>()
        .unwrap_or_else(|| panic!("not a domain error: {err:#}"))
}

#[test]
fn subcategory_takes_parent_kind() {
    let conn = setup();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    let id = create_category(&conn, OWNER, &form("Restaurants", CategoryKind::Income, Some(food)))
        .unwrap();
    let stored = load_category(&conn, OWNER, id).unwrap().unwrap();
    assert_eq!(stored.kind, CategoryKind::Expense);
    assert_eq!(stored.parent_id, Some(food));
}

#[test]
fn nesting_is_limited_to_two_levels() {
    let conn = setup();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    let sub = create_category(&conn, OWNER, &form("Restaurants", CategoryKind::Expense, Some(food)))
        .unwrap();
    let err = create_category(&conn, OWNER, &form("Sushi", CategoryKind::Expense, Some(sub)))
        .unwrap_err();
    match pocket_err(&err) {
        PocketError::Validation(v) => assert!(v.has("parent")),
        other => panic!("unexpected {:?}", other),
    }

    // A parent with children cannot be moved under another category.
    let housing = id_for_category(&conn, OWNER, "Housing").unwrap();
    let err = update_category(&conn, OWNER, food, &form("Food", CategoryKind::Expense, Some(housing)))
        .unwrap_err();
    assert!(matches!(pocket_err(&err), PocketError::Validation(_)));
}

#[test]
fn delete_blocked_by_movements() {
    let conn = setup();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    add_movement(&conn, food, None);
    let err = delete_category(&conn, OWNER, food).unwrap_err();
    assert!(matches!(
        pocket_err(&err),
        PocketError::CategoryHasMovements { count: 1, .. }
    ));
    assert!(load_category(&conn, OWNER, food).unwrap().is_some());
}

#[test]
fn delete_blocked_when_used_as_subcategory() {
    let conn = setup();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    let sub = create_category(&conn, OWNER, &form("Bakery", CategoryKind::Expense, Some(food)))
        .unwrap();
    add_movement(&conn, food, Some(sub));
    let err = delete_category(&conn, OWNER, sub).unwrap_err();
    assert!(matches!(
        pocket_err(&err),
        PocketError::CategoryHasMovements { .. }
    ));
}

#[test]
fn delete_blocked_by_children() {
    let conn = setup();
    let leisure = id_for_category(&conn, OWNER, "Leisure").unwrap();
    create_category(&conn, OWNER, &form("Cinema", CategoryKind::Expense, Some(leisure))).unwrap();
    let err = delete_category(&conn, OWNER, leisure).unwrap_err();
    assert!(matches!(
        pocket_err(&err),
        PocketError::CategoryHasChildren { .. }
    ));
}

#[test]
fn delete_blocked_by_recurring_templates() {
    let conn = setup();
    let subs = id_for_category(&conn, OWNER, "Subscriptions").unwrap();
    create_template(
        &conn,
        OWNER,
        &TemplateForm {
            concept: "Music".into(),
            amount: Decimal::new(-999, 2),
            day_of_month: 3,
            account_id: id_for_account(&conn, OWNER, "Checking").unwrap(),
            category_id: subs,
            subcategory_id: None,
            notes: None,
            is_transfer: false,
            destination_account_id: None,
        },
    )
    .unwrap();
    let err = delete_category(&conn, OWNER, subs).unwrap_err();
    assert!(matches!(
        pocket_err(&err),
        PocketError::CategoryHasTemplates { count: 1, .. }
    ));
}

#[test]
fn unused_category_is_deleted_through_cli() {
    let conn = setup();
    let session = Session::new(OWNER, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    let matches =
        cli::build_cli().get_matches_from(["pocketpal", "category", "rm", "--name", "Health"]);
    let Some(("category", cat_m)) = matches.subcommand() else {
        panic!("no category subcommand");
    };
    categories::handle(&conn, &session, cat_m).unwrap();
    assert!(id_for_category(&conn, OWNER, "Health").is_err());
}

#[test]
fn tree_lists_children_under_parents() {
    let conn = setup();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    create_category(&conn, OWNER, &form("Bakery", CategoryKind::Expense, Some(food))).unwrap();
    let rows = category_tree(&conn, OWNER, Some(CategoryKind::Expense)).unwrap();
    let food_pos = rows.iter().position(|r| r.name == "Food").unwrap();
    assert_eq!(rows[food_pos + 1].name, "Bakery");
    assert_eq!(rows[food_pos + 1].parent.as_deref(), Some("Food"));
    assert!(rows.iter().all(|r| r.kind == CategoryKind::Expense));
}

#[test]
fn duplicate_names_are_rejected() {
    let conn = setup();
    assert!(create_category(&conn, OWNER, &form("Food", CategoryKind::Expense, None)).is_err());
}

#[test]
fn referenced_category_keeps_its_place_in_the_tree() {
    let conn = setup();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    let leisure = id_for_category(&conn, OWNER, "Leisure").unwrap();
    let transport = id_for_category(&conn, OWNER, "Transport").unwrap();
    let bakery = create_category(&conn, OWNER, &form("Bakery", CategoryKind::Expense, Some(food)))
        .unwrap();
    add_movement(&conn, food, Some(bakery));
    add_movement(&conn, transport, None);

    // Moving a used subcategory under another parent.
    let err = update_category(
        &conn,
        OWNER,
        bakery,
        &form("Bakery", CategoryKind::Expense, Some(leisure)),
    )
    .unwrap_err();
    assert!(matches!(
        pocket_err(&err),
        PocketError::CategoryInUse { count: 1, .. }
    ));

    // Demoting a used top-level category.
    let err = update_category(
        &conn,
        OWNER,
        transport,
        &form("Transport", CategoryKind::Expense, Some(leisure)),
    )
    .unwrap_err();
    assert!(matches!(pocket_err(&err), PocketError::CategoryInUse { .. }));

    // Changing the kind of a used category.
    let err = update_category(
        &conn,
        OWNER,
        transport,
        &form("Transport", CategoryKind::Income, None),
    )
    .unwrap_err();
    assert!(matches!(pocket_err(&err), PocketError::CategoryInUse { .. }));

    // Cosmetic edits still go through.
    let mut renamed = form("Bakery & pastry", CategoryKind::Expense, Some(food));
    renamed.color = "#F59E0B".into();
    update_category(&conn, OWNER, bakery, &renamed).unwrap();
    let stored = load_category(&conn, OWNER, bakery).unwrap().unwrap();
    assert_eq!(stored.parent_id, Some(food));
    assert_eq!(stored.name, "Bakery & pastry");
    assert!(diagnose(&conn, OWNER).unwrap().is_empty());
}

#[test]
fn unused_category_can_be_reparented() {
    let conn = setup();
    let leisure = id_for_category(&conn, OWNER, "Leisure").unwrap();
    let health = id_for_category(&conn, OWNER, "Health").unwrap();
    update_category(
        &conn,
        OWNER,
        health,
        &form("Health", CategoryKind::Expense, Some(leisure)),
    )
    .unwrap();
    let stored = load_category(&conn, OWNER, health).unwrap().unwrap();
    assert_eq!(stored.parent_id, Some(leisure));
}

#[test]
fn doctor_flags_movements_with_broken_classification() {
    let conn = setup();
    let food = id_for_category(&conn, OWNER, "Food").unwrap();
    let leisure = id_for_category(&conn, OWNER, "Leisure").unwrap();
    let bakery = create_category(&conn, OWNER, &form("Bakery", CategoryKind::Expense, Some(food)))
        .unwrap();
    add_movement(&conn, food, Some(bakery));
    add_movement(&conn, leisure, None);
    // Rows written around the guards, as an older store might hold them.
    conn.execute(
        "UPDATE categories SET parent_id=?1 WHERE id=?2",
        params![leisure, bakery],
    )
    .unwrap();
    conn.execute(
        "UPDATE categories SET parent_id=?1 WHERE id=?2",
        params![food, leisure],
    )
    .unwrap();

    let codes: Vec<&str> = diagnose(&conn, OWNER)
        .unwrap()
        .into_iter()
        .map(|i| i.code)
        .collect();
    assert!(codes.contains(&"movement_subcategory_mismatch"));
    assert!(codes.contains(&"movement_category_not_top_level"));
}
