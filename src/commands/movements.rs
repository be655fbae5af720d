// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::aggregate::totals;
use crate::commands::recurring::BannerState;
use crate::errors::PocketError;
use crate::models::{Movement, NewMovement};
use crate::queries::{CatalogIndex, MovementFilter, load_movement, load_movements, load_profile};
use crate::session::Session;
use crate::utils::{
    fmt_money, id_for_account, id_for_category, maybe_print_json, month_of, parse_date,
    parse_decimal, parse_month, pretty_table, yes_no,
};
use crate::validation::validate_movement;
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use serde::Serialize;

pub fn handle(conn: &Connection, session: &mut Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, session, sub)?,
        Some(("list", sub)) => list(conn, session, sub)?,
        Some(("edit", sub)) => edit(conn, session, sub)?,
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let n = conn.execute(
                "DELETE FROM movements WHERE owner=?1 AND id=?2",
                params![session.user_id, id],
            )?;
            if n == 0 {
                return Err(PocketError::NotFound {
                    what: "Movement",
                    key: id.to_string(),
                }
                .into());
            }
            println!("Removed movement {}", id);
        }
        _ => {}
    }
    Ok(())
}

/// Writes one movement. The month bucket is always derived from the date.
pub fn insert_movement(conn: &Connection, owner: &str, m: &NewMovement) -> Result<Movement> {
    conn.execute(
        "INSERT INTO movements(owner, date, concept, amount, account_id, category_id,
                               subcategory_id, notes, recurring, template_id, month)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            owner,
            m.date.to_string(),
            m.concept.trim(),
            m.amount.to_string(),
            m.account_id,
            m.category_id,
            m.subcategory_id,
            m.notes,
            m.recurring,
            m.template_id,
            month_of(m.date),
        ],
    )?;
    let id = conn.last_insert_rowid();
    load_movement(conn, owner, id)?.ok_or_else(|| anyhow!("Movement {} vanished after insert", id))
}

/// Validates and records a movement.
pub fn create_movement(conn: &Connection, owner: &str, m: &NewMovement) -> Result<Movement> {
    let index = CatalogIndex::load(conn, owner)?;
    validate_movement(m, &index)?;
    insert_movement(conn, owner, m).context("Could not create the movement")
}

/// Full-row update; `recurring` and the template back-reference are kept.
pub fn update_movement(
    conn: &Connection,
    owner: &str,
    id: i64,
    m: &NewMovement,
) -> Result<Movement> {
    let index = CatalogIndex::load(conn, owner)?;
    validate_movement(m, &index)?;
    conn.execute(
        "UPDATE movements SET date=?1, concept=?2, amount=?3, account_id=?4, category_id=?5,
                subcategory_id=?6, notes=?7, month=?8, updated_at=datetime('now')
         WHERE owner=?9 AND id=?10",
        params![
            m.date.to_string(),
            m.concept.trim(),
            m.amount.to_string(),
            m.account_id,
            m.category_id,
            m.subcategory_id,
            m.notes,
            month_of(m.date),
            owner,
            id
        ],
    )
    .context("Could not update the movement")?;
    load_movement(conn, owner, id)?.ok_or_else(|| {
        PocketError::NotFound {
            what: "Movement",
            key: id.to_string(),
        }
        .into()
    })
}

fn default_account(conn: &Connection, owner: &str) -> Result<i64> {
    load_profile(conn, owner)?
        .and_then(|p| p.default_account_id)
        .ok_or_else(|| anyhow!("No --account given and no default account set"))
}

fn add(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let owner = &session.user_id;
    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => session.today,
    };
    let account_id = match sub.get_one::<String>("account") {
        Some(name) => id_for_account(conn, owner, name)?,
        None => default_account(conn, owner)?,
    };
    let category_id = id_for_category(conn, owner, sub.get_one::<String>("category").unwrap())?;
    let subcategory_id = sub
        .get_one::<String>("subcategory")
        .map(|s| id_for_category(conn, owner, s))
        .transpose()?;
    let new = NewMovement {
        date,
        concept: sub.get_one::<String>("concept").unwrap().trim().to_string(),
        amount: parse_decimal(sub.get_one::<String>("amount").unwrap())?,
        account_id,
        category_id,
        subcategory_id,
        notes: sub.get_one::<String>("notes").map(|s| s.trim().to_string()),
        recurring: false,
        template_id: None,
    };
    let created = create_movement(conn, owner, &new)?;
    println!(
        "Recorded {} on {} '{}'",
        created.amount, created.date, created.concept
    );
    Ok(())
}

fn edit(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let owner = &session.user_id;
    let id = *sub.get_one::<i64>("id").unwrap();
    let cur = load_movement(conn, owner, id)?.ok_or_else(|| PocketError::NotFound {
        what: "Movement",
        key: id.to_string(),
    })?;
    let mut new = NewMovement {
        date: cur.date,
        concept: cur.concept.clone(),
        amount: cur.amount,
        account_id: cur.account_id,
        category_id: cur.category_id,
        subcategory_id: cur.subcategory_id,
        notes: cur.notes.clone(),
        recurring: cur.recurring,
        template_id: cur.template_id,
    };
    if let Some(d) = sub.get_one::<String>("date") {
        new.date = parse_date(d)?;
    }
    if let Some(c) = sub.get_one::<String>("concept") {
        new.concept = c.trim().to_string();
    }
    if let Some(a) = sub.get_one::<String>("amount") {
        new.amount = parse_decimal(a)?;
    }
    if let Some(a) = sub.get_one::<String>("account") {
        new.account_id = id_for_account(conn, owner, a)?;
    }
    if let Some(c) = sub.get_one::<String>("category") {
        new.category_id = id_for_category(conn, owner, c)?;
        new.subcategory_id = None;
    }
    if let Some(s) = sub.get_one::<String>("subcategory") {
        new.subcategory_id = Some(id_for_category(conn, owner, s)?);
    }
    if sub.get_flag("clear_subcategory") {
        new.subcategory_id = None;
    }
    if let Some(n) = sub.get_one::<String>("notes") {
        new.notes = Some(n.trim().to_string()).filter(|s| !s.is_empty());
    }
    let updated = update_movement(conn, owner, id, &new)?;
    println!("Updated movement {} ({} {})", id, updated.date, updated.amount);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct MovementRow {
    pub id: i64,
    pub date: String,
    pub concept: String,
    pub amount: String,
    pub account: String,
    pub category: String,
    pub subcategory: String,
    pub notes: String,
    pub recurring: bool,
}

pub fn query_rows(
    conn: &Connection,
    owner: &str,
    month: &str,
    sub: &clap::ArgMatches,
) -> Result<Vec<MovementRow>> {
    let mut sql = String::from(
        "SELECT m.id, m.date, m.concept, m.amount, a.name, c.name, s.name, m.notes, m.recurring
         FROM movements m
         JOIN accounts a ON m.account_id=a.id
         JOIN categories c ON m.category_id=c.id
         LEFT JOIN categories s ON m.subcategory_id=s.id
         WHERE m.owner=? AND m.month=?",
    );
    let mut params_vec: Vec<String> = vec![owner.to_string(), month.to_string()];

    if let Some(acct) = sub.get_one::<String>("account") {
        sql.push_str(" AND a.name=?");
        params_vec.push(acct.trim().into());
    }
    if let Some(cat) = sub.get_one::<String>("category") {
        sql.push_str(" AND (c.name=? OR s.name=?)");
        params_vec.push(cat.trim().into());
        params_vec.push(cat.trim().into());
    }
    sql.push_str(" ORDER BY m.date, m.id");
    if let Some(limit) = sub.get_one::<usize>("limit") {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params_vec.iter()))?;
    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let subcategory: Option<String> = r.get(6)?;
        let notes: Option<String> = r.get(7)?;
        data.push(MovementRow {
            id: r.get(0)?,
            date: r.get(1)?,
            concept: r.get(2)?,
            amount: r.get(3)?,
            account: r.get(4)?,
            category: r.get(5)?,
            subcategory: subcategory.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
            recurring: r.get(8)?,
        });
    }
    Ok(data)
}

fn list(conn: &Connection, session: &mut Session, sub: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.clone();
    let month = match sub.get_one::<String>("month") {
        Some(m) => parse_month(m)?,
        None => session.current_month(),
    };
    let data = query_rows(conn, &owner, &month, sub)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        return Ok(());
    }

    if month == session.current_month()
        && session.banner(&month).evaluate(conn, &owner)? == BannerState::Offered
    {
        println!(
            "Recurring expenses for {} have not been generated yet. Run `pocketpal recurring generate --month {}`.",
            month, month
        );
    }

    let rows: Vec<Vec<String>> = data
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.date.clone(),
                r.concept.clone(),
                r.amount.clone(),
                r.account.clone(),
                r.category.clone(),
                r.subcategory.clone(),
                yes_no(r.recurring).to_string(),
                r.notes.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "ID",
                "Date",
                "Concept",
                "Amount",
                "Account",
                "Category",
                "Subcategory",
                "Recurring",
                "Notes"
            ],
            rows,
        )
    );

    let currency = load_profile(conn, &owner)?
        .map(|p| p.primary_currency)
        .unwrap_or_else(|| "EUR".into());
    let t = totals(&load_movements(conn, &owner, &MovementFilter::month(&month))?);
    println!(
        "Income {}  Expenses {}  Balance {}",
        fmt_money(&t.income, &currency),
        fmt_money(&t.expenses, &currency),
        fmt_money(&t.balance, &currency)
    );
    Ok(())
}
