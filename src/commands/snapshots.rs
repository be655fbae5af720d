// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::balance::balance_before;
use crate::errors::PocketError;
use crate::models::SnapshotKind;
use crate::queries::{CatalogIndex, MovementFilter, load_accounts, load_movements, load_snapshots};
use crate::session::Session;
use crate::utils::{
    id_for_account, maybe_print_json, parse_decimal, parse_month, previous_month,
    pretty_table,
};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSnapshotOutcome {
    /// An automatic snapshot already exists for the month.
    AlreadyGenerated { month: String },
    NoAccounts { month: String },
    Generated {
        month: String,
        inserted: usize,
        updated: usize,
    },
}

/// Computes every active account's balance at the end of the month before
/// `today` and records it as that month's calculated balance.
///
/// Existing rows for the month (manual or automatic) only get their
/// calculated balance refreshed; a registered balance entered by the user is
/// never written here.
pub fn generate_auto(conn: &Connection, owner: &str, today: NaiveDate) -> Result<AutoSnapshotOutcome> {
    let month = previous_month(today);
    let boundary = today.with_day(1).unwrap_or(today);

    let existing_auto: Option<i64> = conn
        .query_row(
            "SELECT id FROM snapshots WHERE owner=?1 AND month=?2 AND kind='auto' LIMIT 1",
            params![owner, month],
            |r| r.get(0),
        )
        .optional()?;
    if existing_auto.is_some() {
        debug!(%month, "auto snapshots already present");
        return Ok(AutoSnapshotOutcome::AlreadyGenerated { month });
    }

    let accounts = load_accounts(conn, owner, true)?;
    if accounts.is_empty() {
        return Ok(AutoSnapshotOutcome::NoAccounts { month });
    }

    let (mut inserted, mut updated) = (0, 0);
    for account in &accounts {
        let movements = load_movements(
            conn,
            owner,
            &MovementFilter {
                account_id: Some(account.id),
                before: Some(boundary),
                ..MovementFilter::default()
            },
        )?;
        let calculated = balance_before(account.initial_balance, &movements, boundary);

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM snapshots WHERE owner=?1 AND month=?2 AND account_id=?3",
                params![owner, month, account.id],
                |r| r.get(0),
            )
            .optional()?;
        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE snapshots SET calculated_balance=?1, updated_at=datetime('now')
                     WHERE id=?2",
                    params![calculated.to_string(), id],
                )?;
                updated += 1;
            }
            None => {
                conn.execute(
                    "INSERT INTO snapshots(owner, month, account_id, registered_balance,
                                           calculated_balance, kind)
                     VALUES (?1, ?2, ?3, NULL, ?4, 'auto')",
                    params![owner, month, account.id, calculated.to_string()],
                )
                .with_context(|| format!("Could not record snapshot for '{}'", account.name))?;
                inserted += 1;
            }
        }
    }
    Ok(AutoSnapshotOutcome::Generated {
        month,
        inserted,
        updated,
    })
}

/// Records the balance the user actually observed for an account in a month.
/// Only the registered field is touched on an existing row.
pub fn register_balance(
    conn: &Connection,
    owner: &str,
    month: &str,
    account_id: i64,
    registered: Decimal,
    notes: Option<&str>,
) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM snapshots WHERE owner=?1 AND month=?2 AND account_id=?3",
            params![owner, month, account_id],
            |r| r.get(0),
        )
        .optional()?;
    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE snapshots SET registered_balance=?1, notes=COALESCE(?2, notes),
                        updated_at=datetime('now')
                 WHERE id=?3",
                params![registered.to_string(), notes, id],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO snapshots(owner, month, account_id, registered_balance,
                                       calculated_balance, exchange_rate, kind, notes)
                 VALUES (?1, ?2, ?3, ?4, NULL, '1', ?5, ?6)",
                params![
                    owner,
                    month,
                    account_id,
                    registered.to_string(),
                    SnapshotKind::Manual.as_str(),
                    notes
                ],
            )?;
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SnapshotRow {
    pub month: String,
    pub account: String,
    pub registered: Option<Decimal>,
    pub calculated: Option<Decimal>,
    pub difference: Option<Decimal>,
    pub kind: String,
}

pub fn snapshot_rows(conn: &Connection, owner: &str, month: Option<&str>) -> Result<Vec<SnapshotRow>> {
    let index = CatalogIndex::load(conn, owner)?;
    Ok(load_snapshots(conn, owner, month)?
        .into_iter()
        .map(|s| SnapshotRow {
            month: s.month,
            account: index.account_name(s.account_id).to_string(),
            difference: s.registered_balance.zip(s.calculated_balance).map(|(r, c)| r - c),
            registered: s.registered_balance,
            calculated: s.calculated_balance,
            kind: s.kind.to_string(),
        })
        .collect())
}

pub fn handle(conn: &Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.clone();
    match m.subcommand() {
        Some(("auto", _)) => {
            let outcome = generate_auto(conn, &owner, session.today)?;
            match outcome {
                AutoSnapshotOutcome::AlreadyGenerated { month } => {
                    println!("Snapshots for {} were already generated", month)
                }
                AutoSnapshotOutcome::NoAccounts { month } => {
                    println!("No active accounts to snapshot for {}", month)
                }
                AutoSnapshotOutcome::Generated {
                    month,
                    inserted,
                    updated,
                } => println!(
                    "Snapshots for {}: {} created, {} refreshed",
                    month, inserted, updated
                ),
            }
        }
        Some(("set", sub)) => {
            let month = parse_month(sub.get_one::<String>("month").unwrap())?;
            let account = sub.get_one::<String>("account").unwrap();
            let account_id = id_for_account(conn, &owner, account)?;
            let registered = parse_decimal(sub.get_one::<String>("balance").unwrap())?;
            let notes = sub.get_one::<String>("notes").map(|s| s.trim());
            register_balance(conn, &owner, &month, account_id, registered, notes)?;
            println!("Registered {} for '{}' in {}", registered, account.trim(), month);
        }
        Some(("list", sub)) => {
            let month = sub
                .get_one::<String>("month")
                .map(|m| parse_month(m.as_str()))
                .transpose()?;
            let data = snapshot_rows(conn, &owner, month.as_deref())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let fmt = |d: Option<Decimal>| d.map(|v| format!("{:.2}", v)).unwrap_or_default();
                let rows = data
                    .iter()
                    .map(|r| {
                        vec![
                            r.month.clone(),
                            r.account.clone(),
                            fmt(r.registered),
                            fmt(r.calculated),
                            fmt(r.difference),
                            r.kind.clone(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["Month", "Account", "Registered", "Calculated", "Difference", "Kind"],
                        rows
                    )
                );
            }
        }
        Some(("rm", sub)) => {
            let month = parse_month(sub.get_one::<String>("month").unwrap())?;
            let account = sub.get_one::<String>("account").unwrap();
            let account_id = id_for_account(conn, &owner, account)?;
            let n = conn.execute(
                "DELETE FROM snapshots WHERE owner=?1 AND month=?2 AND account_id=?3",
                params![owner, month, account_id],
            )?;
            if n == 0 {
                return Err(PocketError::NotFound {
                    what: "Snapshot",
                    key: format!("{} {}", month, account.trim()),
                }
                .into());
            }
            println!("Removed snapshot for '{}' in {}", account.trim(), month);
        }
        _ => {}
    }
    Ok(())
}
