// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::balance::account_balances;
use crate::errors::PocketError;
use crate::models::{Account, AccountKind};
use crate::queries::{
    MovementFilter, load_account, load_accounts, load_movements, load_profile,
    load_wallet_configs,
};
use crate::session::Session;
use crate::utils::{id_for_account, maybe_print_json, parse_decimal, pretty_table, yes_no};
use crate::validation::{AccountForm, validate_account};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.as_str();
    match m.subcommand() {
        Some(("add", sub)) => {
            let form = form_from_args(conn, owner, sub, None)?;
            let id = create_account(conn, owner, &form)?;
            println!(
                "Added account '{}' ({}, {}) #{}",
                form.name.trim(),
                form.kind,
                form.currency,
                id
            );
        }
        Some(("list", sub)) => list(conn, owner, sub)?,
        Some(("edit", sub)) => {
            let id = id_for_account(conn, owner, sub.get_one::<String>("name").unwrap())?;
            let cur = find(conn, owner, id)?;
            let form = form_from_args(conn, owner, sub, Some(&cur))?;
            update_account(conn, owner, id, &form)?;
            println!("Updated account '{}'", form.name.trim());
        }
        Some(("toggle", sub)) => {
            let id = id_for_account(conn, owner, sub.get_one::<String>("name").unwrap())?;
            let cur = find(conn, owner, id)?;
            conn.execute(
                "UPDATE accounts SET active=?1 WHERE owner=?2 AND id=?3",
                params![!cur.active, owner, id],
            )?;
            println!(
                "Account '{}' is now {}",
                cur.name,
                if cur.active { "inactive" } else { "active" }
            );
        }
        Some(("default", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let id = id_for_account(conn, owner, name)?;
            set_default_account(conn, owner, id)?;
            println!("Default account set to '{}'", name.trim());
        }
        Some(("move", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let id = id_for_account(conn, owner, name)?;
            let up = sub.get_flag("up");
            if move_account(conn, owner, id, up)? {
                println!("Moved '{}' {}", name.trim(), if up { "up" } else { "down" });
            } else {
                println!("'{}' is already at the edge", name.trim());
            }
        }
        Some(("rm", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let id = id_for_account(conn, owner, name)?;
            let removed = delete_account(conn, owner, id, sub.get_flag("cascade"))?;
            println!(
                "Removed account '{}' ({} movements deleted)",
                name.trim(),
                removed
            );
        }
        _ => {}
    }
    Ok(())
}

fn find(conn: &Connection, owner: &str, id: i64) -> Result<Account> {
    load_account(conn, owner, id)?.ok_or_else(|| {
        PocketError::NotFound {
            what: "Account",
            key: id.to_string(),
        }
        .into()
    })
}

fn form_from_args(
    conn: &Connection,
    owner: &str,
    sub: &clap::ArgMatches,
    base: Option<&Account>,
) -> Result<AccountForm> {
    let text = |key: &str| sub.get_one::<String>(key).map(|s| s.trim().to_string());
    let mut form = match base {
        Some(a) => AccountForm {
            name: a.name.clone(),
            kind: a.kind,
            currency: a.currency.clone(),
            initial_balance: a.initial_balance,
            color: a.color.clone(),
            monthly_topup: None,
            topup_day: None,
        },
        None => {
            let currency = load_profile(conn, owner)?
                .map(|p| p.primary_currency)
                .unwrap_or_else(|| "EUR".into());
            AccountForm {
                currency,
                ..AccountForm::default()
            }
        }
    };
    if let Some(a) = base {
        if let Some(w) = load_wallet_configs(conn, owner)?
            .into_iter()
            .find(|w| w.account_id == a.id)
        {
            form.monthly_topup = Some(w.monthly_topup);
            form.topup_day = Some(w.topup_day);
        }
    }
    let name_key = if base.is_some() { "rename" } else { "name" };
    if let Some(n) = text(name_key) {
        form.name = n;
    }
    if let Some(k) = text("kind") {
        form.kind = k.parse::<AccountKind>()?;
    }
    if let Some(c) = text("currency") {
        form.currency = c.to_uppercase();
    }
    if let Some(b) = text("initial") {
        form.initial_balance = parse_decimal(&b)?;
    }
    if let Some(c) = text("color") {
        form.color = c;
    }
    if let Some(t) = text("topup") {
        form.monthly_topup = Some(parse_decimal(&t)?);
    }
    if let Some(d) = sub.get_one::<u32>("topup_day") {
        form.topup_day = Some(*d);
    }
    let dropped = base.is_some() && sub.get_flag("no_topup");
    if (dropped || form.kind != AccountKind::Wallet) && text("topup").is_none() {
        form.monthly_topup = None;
        form.topup_day = None;
    }
    Ok(form)
}

/// Creates an account at the end of the display order, plus its wallet
/// configuration when it is a wallet with a top-up.
pub fn create_account(conn: &Connection, owner: &str, form: &AccountForm) -> Result<i64> {
    validate_account(form)?;
    let position: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE owner=?1",
        params![owner],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO accounts(owner, name, kind, currency, initial_balance, color, active, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
        params![
            owner,
            form.name.trim(),
            form.kind.as_str(),
            form.currency,
            form.initial_balance.to_string(),
            form.color,
            position
        ],
    )
    .with_context(|| format!("Could not create account '{}'", form.name.trim()))?;
    let id = conn.last_insert_rowid();
    sync_wallet_config(conn, owner, id, form)?;
    Ok(id)
}

/// Full-row update. The wallet configuration is written afterwards as a
/// separate statement.
pub fn update_account(conn: &Connection, owner: &str, id: i64, form: &AccountForm) -> Result<()> {
    validate_account(form)?;
    conn.execute(
        "UPDATE accounts SET name=?1, kind=?2, currency=?3, initial_balance=?4, color=?5
         WHERE owner=?6 AND id=?7",
        params![
            form.name.trim(),
            form.kind.as_str(),
            form.currency,
            form.initial_balance.to_string(),
            form.color,
            owner,
            id
        ],
    )
    .with_context(|| format!("Could not update account '{}'", form.name.trim()))?;
    sync_wallet_config(conn, owner, id, form)
}

fn sync_wallet_config(conn: &Connection, owner: &str, account_id: i64, form: &AccountForm) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM wallet_configs WHERE owner=?1 AND account_id=?2",
            params![owner, account_id],
            |r| r.get(0),
        )
        .optional()?;
    match (form.kind, form.monthly_topup, existing) {
        (AccountKind::Wallet, Some(topup), Some(cfg)) => {
            conn.execute(
                "UPDATE wallet_configs SET monthly_topup=?1, topup_day=?2 WHERE id=?3",
                params![topup.to_string(), form.topup_day.unwrap_or(1), cfg],
            )?;
        }
        (AccountKind::Wallet, Some(topup), None) => {
            conn.execute(
                "INSERT INTO wallet_configs(owner, account_id, monthly_topup, topup_day, active)
                 VALUES (?1, ?2, ?3, ?4, 1)",
                params![owner, account_id, topup.to_string(), form.topup_day.unwrap_or(1)],
            )?;
        }
        (_, None, Some(cfg)) | (AccountKind::Current | AccountKind::Investment, _, Some(cfg)) => {
            conn.execute("DELETE FROM wallet_configs WHERE id=?1", params![cfg])?;
        }
        _ => {}
    }
    Ok(())
}

pub fn set_default_account(conn: &Connection, owner: &str, account_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles(id, default_account_id) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET default_account_id=excluded.default_account_id,
                                       updated_at=datetime('now')",
        params![owner, account_id],
    )
    .context("Could not set the default account")?;
    Ok(())
}

/// Swaps an account with its neighbour in the display order. Returns false
/// when it is already first (moving up) or last (moving down).
pub fn move_account(conn: &Connection, owner: &str, id: i64, up: bool) -> Result<bool> {
    let accounts = load_accounts(conn, owner, false)?;
    let Some(idx) = accounts.iter().position(|a| a.id == id) else {
        return Err(anyhow!("Account {} not found", id));
    };
    let target = if up { idx.checked_sub(1) } else { Some(idx + 1) };
    let Some(target) = target.filter(|t| *t < accounts.len()) else {
        return Ok(false);
    };
    // Renumber everything so legacy duplicate positions cannot stall the swap.
    let mut order: Vec<i64> = accounts.iter().map(|a| a.id).collect();
    order.swap(idx, target);
    for (pos, account_id) in order.iter().enumerate() {
        conn.execute(
            "UPDATE accounts SET position=?1 WHERE owner=?2 AND id=?3",
            params![pos as i64, owner, account_id],
        )?;
    }
    Ok(true)
}

/// Deletes an account. Without `cascade` the delete is refused while any
/// movement references the account; with it, movements, templates (as source
/// or destination), wallet configuration and snapshots go in the same
/// transaction. Returns the number of movements removed.
pub fn delete_account(conn: &mut Connection, owner: &str, id: i64, cascade: bool) -> Result<usize> {
    let account = find(conn, owner, id)?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM movements WHERE owner=?1 AND account_id=?2",
        params![owner, id],
        |r| r.get(0),
    )?;
    if count > 0 && !cascade {
        return Err(PocketError::AccountHasMovements {
            name: account.name,
            count,
        }
        .into());
    }
    let tx = conn.transaction()?;
    let removed = tx.execute(
        "DELETE FROM movements WHERE owner=?1 AND account_id=?2",
        params![owner, id],
    )?;
    tx.execute(
        "DELETE FROM recurring_templates WHERE owner=?1 AND (account_id=?2 OR destination_account_id=?2)",
        params![owner, id],
    )?;
    tx.execute(
        "DELETE FROM wallet_configs WHERE owner=?1 AND account_id=?2",
        params![owner, id],
    )?;
    tx.execute(
        "DELETE FROM snapshots WHERE owner=?1 AND account_id=?2",
        params![owner, id],
    )?;
    tx.execute(
        "UPDATE profiles SET default_account_id=NULL WHERE id=?1 AND default_account_id=?2",
        params![owner, id],
    )?;
    tx.execute(
        "DELETE FROM accounts WHERE owner=?1 AND id=?2",
        params![owner, id],
    )?;
    tx.commit()?;
    info!(account = %account.name, movements = removed, "account deleted");
    Ok(removed)
}

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub currency: String,
    pub initial_balance: Decimal,
    pub balance: Decimal,
    pub active: bool,
    pub is_default: bool,
    pub monthly_topup: Option<Decimal>,
}

/// Accounts in display order with their current balance.
pub fn account_rows(conn: &Connection, owner: &str, include_inactive: bool) -> Result<Vec<AccountRow>> {
    let accounts = load_accounts(conn, owner, !include_inactive)?;
    let movements = load_movements(conn, owner, &MovementFilter::default())?;
    let balances = account_balances(&accounts, &movements, None);
    let default_id = load_profile(conn, owner)?.and_then(|p| p.default_account_id);
    let wallets = load_wallet_configs(conn, owner)?;
    Ok(accounts
        .into_iter()
        .map(|a| AccountRow {
            balance: balances.get(&a.id).copied().unwrap_or(a.initial_balance),
            is_default: default_id == Some(a.id),
            monthly_topup: wallets
                .iter()
                .find(|w| w.account_id == a.id)
                .map(|w| w.monthly_topup),
            id: a.id,
            name: a.name,
            kind: a.kind,
            currency: a.currency,
            initial_balance: a.initial_balance,
            active: a.active,
        })
        .collect())
}

fn list(conn: &Connection, owner: &str, sub: &clap::ArgMatches) -> Result<()> {
    let data = account_rows(conn, owner, sub.get_flag("all"))?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        return Ok(());
    }
    let rows = data
        .iter()
        .map(|a| {
            vec![
                a.name.clone(),
                a.kind.to_string(),
                a.currency.clone(),
                format!("{:.2}", a.initial_balance),
                format!("{:.2}", a.balance),
                yes_no(a.active).to_string(),
                if a.is_default { "*".into() } else { String::new() },
                a.monthly_topup
                    .map(|t| format!("{:.2}", t))
                    .unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Name", "Kind", "CCY", "Initial", "Balance", "Active", "Default", "Top-up"],
            rows
        )
    );
    Ok(())
}
