// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Recurring templates and their monthly materialization.
//!
//! For each target month a [`RecurringBanner`] decides whether generation is
//! on offer: it is suppressed as soon as the month holds any recurring
//! movement, or when the user has no active template. Confirming an offer
//! inserts one movement per active template in a single transaction.

use crate::commands::movements::insert_movement;
use crate::errors::PocketError;
use crate::models::{Movement, NewMovement, RecurringTemplate};
use crate::queries::{CatalogIndex, MovementFilter, load_movements, load_template, load_templates};
use crate::session::Session;
use crate::utils::{
    days_in_month, id_for_account, id_for_category, maybe_print_json, month_start,
    parse_decimal, parse_month, pretty_table, yes_no,
};
use crate::validation::{TemplateForm, validate_template};
use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerState {
    Idle,
    Offered,
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct RecurringBanner {
    month: String,
    state: BannerState,
}

impl RecurringBanner {
    pub fn new(month: &str) -> Self {
        Self {
            month: month.to_string(),
            state: BannerState::Idle,
        }
    }

    pub fn month(&self) -> &str {
        &self.month
    }

    pub fn state(&self) -> BannerState {
        self.state
    }

    /// Decides whether generation is on offer. A suppressed banner stays
    /// suppressed for the rest of the session.
    pub fn evaluate(&mut self, conn: &Connection, owner: &str) -> Result<BannerState> {
        if self.state == BannerState::Suppressed {
            return Ok(self.state);
        }
        self.state = if month_has_recurring(conn, owner, &self.month)? {
            BannerState::Suppressed
        } else if has_active_template(conn, owner)? {
            BannerState::Offered
        } else {
            BannerState::Suppressed
        };
        debug!(month = %self.month, state = ?self.state, "recurring banner evaluated");
        Ok(self.state)
    }

    pub fn decline(&mut self) {
        if self.state == BannerState::Offered {
            self.state = BannerState::Suppressed;
        }
    }

    /// Materializes every active template into the banner's month. On a
    /// failed insert nothing is committed and the offer stands.
    pub fn confirm(&mut self, conn: &mut Connection, owner: &str) -> Result<Vec<Movement>> {
        if self.state != BannerState::Offered {
            return Err(PocketError::BannerNotOffered {
                month: self.month.clone(),
            }
            .into());
        }
        let templates = load_templates(conn, owner, true)?;
        if templates.is_empty() {
            self.state = BannerState::Suppressed;
            return Ok(Vec::new());
        }
        let batch = build_movements(&templates, &self.month)?;
        let created = insert_batch(conn, owner, &batch)
            .with_context(|| format!("Could not generate recurring expenses for {}", self.month))?;
        self.state = BannerState::Suppressed;
        info!(month = %self.month, count = created.len(), "recurring expenses generated");
        Ok(created)
    }
}

pub fn month_has_recurring(conn: &Connection, owner: &str, month: &str) -> Result<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM movements WHERE owner=?1 AND month=?2 AND recurring=1 LIMIT 1",
            params![owner, month],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

fn has_active_template(conn: &Connection, owner: &str) -> Result<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM recurring_templates WHERE owner=?1 AND active=1 LIMIT 1",
            params![owner],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Date of a template inside `month`. Days past the end of a short month are
/// clamped to its last day (31 in April is April 30th).
pub fn scheduled_date(month: &str, day_of_month: u32) -> Result<NaiveDate> {
    let first = month_start(month)?;
    let last = days_in_month(first.year(), first.month());
    let day = day_of_month.clamp(1, last);
    first
        .with_day(day)
        .ok_or_else(|| anyhow!("Invalid day {} for {}", day, month))
}

pub fn build_movements(templates: &[RecurringTemplate], month: &str) -> Result<Vec<NewMovement>> {
    templates
        .iter()
        .map(|t| {
            Ok(NewMovement {
                date: scheduled_date(month, t.day_of_month)?,
                concept: t.concept.clone(),
                amount: t.amount,
                account_id: t.account_id,
                category_id: t.category_id,
                subcategory_id: t.subcategory_id,
                notes: t.notes.clone(),
                recurring: true,
                template_id: Some(t.id),
            })
        })
        .collect()
}

/// All-or-nothing insert; returns the created rows sorted by date.
pub fn insert_batch(
    conn: &mut Connection,
    owner: &str,
    batch: &[NewMovement],
) -> Result<Vec<Movement>> {
    let tx = conn.transaction()?;
    let mut created = Vec::with_capacity(batch.len());
    for m in batch {
        created.push(insert_movement(&tx, owner, m)?);
    }
    tx.commit()?;
    created.sort_by_key(|m| m.date);
    Ok(created)
}

/// Merges freshly generated rows into an in-memory list, keeping it sorted
/// by date ascending.
pub fn merge_generated(list: &mut Vec<Movement>, created: Vec<Movement>) {
    list.extend(created);
    list.sort_by_key(|m| m.date);
}

pub fn handle(conn: &mut Connection, session: &mut Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, session, sub)?,
        Some(("list", sub)) => list(conn, session, sub)?,
        Some(("edit", sub)) => edit(conn, session, sub)?,
        Some(("toggle", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let t = find(conn, &session.user_id, id)?;
            conn.execute(
                "UPDATE recurring_templates SET active=?1 WHERE owner=?2 AND id=?3",
                params![!t.active, session.user_id, id],
            )?;
            println!(
                "Template '{}' is now {}",
                t.concept,
                if t.active { "inactive" } else { "active" }
            );
        }
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let t = find(conn, &session.user_id, id)?;
            conn.execute(
                "DELETE FROM recurring_templates WHERE owner=?1 AND id=?2",
                params![session.user_id, id],
            )?;
            println!("Removed template '{}'", t.concept);
        }
        Some(("status", sub)) => {
            let month = target_month(session, sub)?;
            let owner = session.user_id.clone();
            match session.banner(&month).evaluate(conn, &owner)? {
                BannerState::Offered => println!(
                    "Recurring expenses for {} can be generated ({} active templates).",
                    month,
                    load_templates(conn, &owner, true)?.len()
                ),
                _ => println!("Nothing to generate for {}.", month),
            }
        }
        Some(("skip", sub)) => {
            let month = target_month(session, sub)?;
            let owner = session.user_id.clone();
            let banner = session.banner(&month);
            banner.evaluate(conn, &owner)?;
            banner.decline();
            println!("Skipped recurring generation for {} in this session.", month);
        }
        Some(("generate", sub)) => generate(conn, session, sub)?,
        _ => {}
    }
    Ok(())
}

fn target_month(session: &Session, sub: &clap::ArgMatches) -> Result<String> {
    match sub.get_one::<String>("month") {
        Some(m) => parse_month(m),
        None => Ok(session.current_month()),
    }
}

fn find(conn: &Connection, owner: &str, id: i64) -> Result<RecurringTemplate> {
    load_template(conn, owner, id)?.ok_or_else(|| {
        PocketError::NotFound {
            what: "Recurring template",
            key: id.to_string(),
        }
        .into()
    })
}

fn generate(conn: &mut Connection, session: &mut Session, sub: &clap::ArgMatches) -> Result<()> {
    let month = target_month(session, sub)?;
    let owner = session.user_id.clone();
    let mut listing = load_movements(conn, &owner, &MovementFilter::month(&month))?;
    let banner = session.banner(&month);
    if banner.evaluate(conn, &owner)? != BannerState::Offered {
        println!("Nothing to generate for {}.", month);
        return Ok(());
    }
    let created = banner.confirm(conn, &owner)?;
    let generated = created.len();
    merge_generated(&mut listing, created);

    let index = CatalogIndex::load(conn, &owner)?;
    let rows: Vec<Vec<String>> = listing
        .iter()
        .map(|m| {
            vec![
                m.date.to_string(),
                m.concept.clone(),
                m.amount.to_string(),
                index.account_name(m.account_id).to_string(),
                index.category_name(Some(m.category_id)).to_string(),
                yes_no(m.recurring).to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Date", "Concept", "Amount", "Account", "Category", "Recurring"],
            rows
        )
    );
    println!(
        "Generated {} recurring movements for {} ({} movements in the month)",
        generated,
        month,
        listing.len()
    );
    Ok(())
}

fn form_from_args(
    conn: &Connection,
    owner: &str,
    sub: &clap::ArgMatches,
    base: Option<&RecurringTemplate>,
) -> Result<TemplateForm> {
    let text = |key: &str| sub.get_one::<String>(key).map(|s| s.trim().to_string());
    let concept = text("concept")
        .or_else(|| base.map(|b| b.concept.clone()))
        .unwrap_or_default();
    let amount = match text("amount") {
        Some(a) => parse_decimal(&a)?,
        None => base.map(|b| b.amount).unwrap_or_default(),
    };
    let day_of_month = sub
        .get_one::<u32>("day")
        .copied()
        .or(base.map(|b| b.day_of_month))
        .unwrap_or(1);
    let account_id = match text("account") {
        Some(a) => id_for_account(conn, owner, &a)?,
        None => base
            .map(|b| b.account_id)
            .ok_or_else(|| anyhow!("--account is required"))?,
    };
    let category_changed = text("category").is_some();
    let category_id = match text("category") {
        Some(c) => id_for_category(conn, owner, &c)?,
        None => base
            .map(|b| b.category_id)
            .ok_or_else(|| anyhow!("--category is required"))?,
    };
    let subcategory_id = match text("subcategory") {
        Some(s) => Some(id_for_category(conn, owner, &s)?),
        None if category_changed => None,
        None => base.and_then(|b| b.subcategory_id),
    };
    let notes = match text("notes") {
        Some(n) => Some(n).filter(|s| !s.is_empty()),
        None => base.and_then(|b| b.notes.clone()),
    };
    let (is_transfer, destination_account_id) = match text("transfer_to") {
        Some(d) => (true, Some(id_for_account(conn, owner, &d)?)),
        None if sub.get_flag("no_transfer") => (false, None),
        None => (
            base.map(|b| b.is_transfer).unwrap_or(false),
            base.and_then(|b| b.destination_account_id),
        ),
    };
    Ok(TemplateForm {
        concept,
        amount,
        day_of_month,
        account_id,
        category_id,
        subcategory_id,
        notes,
        is_transfer,
        destination_account_id,
    })
}

pub fn create_template(conn: &Connection, owner: &str, form: &TemplateForm) -> Result<i64> {
    let index = CatalogIndex::load(conn, owner)?;
    validate_template(form, &index)?;
    conn.execute(
        "INSERT INTO recurring_templates(owner, concept, amount, day_of_month, account_id,
                category_id, subcategory_id, notes, active, is_transfer, destination_account_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10)",
        params![
            owner,
            form.concept.trim(),
            form.amount.to_string(),
            form.day_of_month,
            form.account_id,
            form.category_id,
            form.subcategory_id,
            form.notes,
            form.is_transfer,
            if form.is_transfer {
                form.destination_account_id
            } else {
                None
            },
        ],
    )
    .context("Could not save the recurring template")?;
    Ok(conn.last_insert_rowid())
}

pub fn update_template(conn: &Connection, owner: &str, id: i64, form: &TemplateForm) -> Result<()> {
    let index = CatalogIndex::load(conn, owner)?;
    validate_template(form, &index)?;
    conn.execute(
        "UPDATE recurring_templates SET concept=?1, amount=?2, day_of_month=?3, account_id=?4,
                category_id=?5, subcategory_id=?6, notes=?7, is_transfer=?8,
                destination_account_id=?9
         WHERE owner=?10 AND id=?11",
        params![
            form.concept.trim(),
            form.amount.to_string(),
            form.day_of_month,
            form.account_id,
            form.category_id,
            form.subcategory_id,
            form.notes,
            form.is_transfer,
            if form.is_transfer {
                form.destination_account_id
            } else {
                None
            },
            owner,
            id
        ],
    )
    .context("Could not update the recurring template")?;
    Ok(())
}

fn add(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let form = form_from_args(conn, &session.user_id, sub, None)?;
    let id = create_template(conn, &session.user_id, &form)?;
    println!(
        "Added recurring template {} '{}' ({} on day {})",
        id, form.concept, form.amount, form.day_of_month
    );
    Ok(())
}

fn edit(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("id").unwrap();
    let cur = find(conn, &session.user_id, id)?;
    let form = form_from_args(conn, &session.user_id, sub, Some(&cur))?;
    update_template(conn, &session.user_id, id, &form)?;
    println!("Updated recurring template {} '{}'", id, form.concept);
    Ok(())
}

fn list(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let templates = load_templates(conn, &session.user_id, false)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &templates)? {
        return Ok(());
    }
    let index = CatalogIndex::load(conn, &session.user_id)?;
    let rows: Vec<Vec<String>> = templates
        .iter()
        .map(|t| {
            let target = t
                .destination_account_id
                .map(|d| format!(" -> {}", index.account_name(d)))
                .unwrap_or_default();
            vec![
                t.id.to_string(),
                t.concept.clone(),
                t.amount.to_string(),
                t.day_of_month.to_string(),
                format!("{}{}", index.account_name(t.account_id), target),
                index.category_name(Some(t.category_id)).to_string(),
                index.category_name(t.subcategory_id).to_string(),
                yes_no(t.active).to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "ID",
                "Concept",
                "Amount",
                "Day",
                "Account",
                "Category",
                "Subcategory",
                "Active"
            ],
            rows
        )
    );
    Ok(())
}
