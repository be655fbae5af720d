// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Typed loaders over the store, plus the id-keyed lookup that replaces
//! scanning separately fetched collections for every joined row.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::models::{
    Account, Category, Movement, NetWorthSnapshot, Profile, RecurringTemplate, WalletConfig,
};

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn dec_col(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.parse::<Decimal>().map_err(|e| conversion_err(idx, e))
}

fn opt_dec_col(r: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let s: Option<String> = r.get(idx)?;
    s.map(|v| v.parse::<Decimal>().map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn enum_col<T>(r: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = r.get(idx)?;
    s.parse::<T>().map_err(|e| conversion_err(idx, e))
}

const ACCOUNT_COLS: &str =
    "id, owner, name, kind, currency, initial_balance, color, active, position";

fn account_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        owner: r.get(1)?,
        name: r.get(2)?,
        kind: enum_col(r, 3)?,
        currency: r.get(4)?,
        initial_balance: dec_col(r, 5)?,
        color: r.get(6)?,
        active: r.get(7)?,
        position: r.get(8)?,
    })
}

pub fn load_accounts(conn: &Connection, owner: &str, active_only: bool) -> Result<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE owner=?1 {} ORDER BY position, id",
        ACCOUNT_COLS,
        if active_only { "AND active=1" } else { "" }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner], account_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_account(conn: &Connection, owner: &str, id: i64) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM accounts WHERE owner=?1 AND id=?2", ACCOUNT_COLS);
    Ok(conn
        .query_row(&sql, params![owner, id], account_row)
        .optional()?)
}

const CATEGORY_COLS: &str = "id, owner, name, kind, parent_id, color, icon, position";

fn category_row(r: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: r.get(0)?,
        owner: r.get(1)?,
        name: r.get(2)?,
        kind: enum_col(r, 3)?,
        parent_id: r.get(4)?,
        color: r.get(5)?,
        icon: r.get(6)?,
        position: r.get(7)?,
    })
}

pub fn load_categories(conn: &Connection, owner: &str) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE owner=?1 ORDER BY position, name",
        CATEGORY_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner], category_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_category(conn: &Connection, owner: &str, id: i64) -> Result<Option<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE owner=?1 AND id=?2",
        CATEGORY_COLS
    );
    Ok(conn
        .query_row(&sql, params![owner, id], category_row)
        .optional()?)
}

const MOVEMENT_COLS: &str = "id, owner, date, concept, amount, account_id, category_id, \
     subcategory_id, notes, recurring, template_id, month";

fn movement_row(r: &Row<'_>) -> rusqlite::Result<Movement> {
    Ok(Movement {
        id: r.get(0)?,
        owner: r.get(1)?,
        date: r.get::<_, NaiveDate>(2)?,
        concept: r.get(3)?,
        amount: dec_col(r, 4)?,
        account_id: r.get(5)?,
        category_id: r.get(6)?,
        subcategory_id: r.get(7)?,
        notes: r.get(8)?,
        recurring: r.get(9)?,
        template_id: r.get(10)?,
        month: r.get(11)?,
    })
}

/// Row filter for [`load_movements`]. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub month: Option<String>,
    pub account_id: Option<i64>,
    /// Matches the movement's category or its subcategory.
    pub category_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Strictly before this date.
    pub before: Option<NaiveDate>,
    pub recurring_only: bool,
}

impl MovementFilter {
    pub fn month(month: &str) -> Self {
        Self {
            month: Some(month.to_string()),
            ..Self::default()
        }
    }
}

/// Movements of `owner` matching `filter`, date ascending.
pub fn load_movements(
    conn: &Connection,
    owner: &str,
    filter: &MovementFilter,
) -> Result<Vec<Movement>> {
    let mut sql = format!("SELECT {} FROM movements WHERE owner=?", MOVEMENT_COLS);
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(owner.to_string())];

    if let Some(month) = &filter.month {
        sql.push_str(" AND month=?");
        args.push(Box::new(month.clone()));
    }
    if let Some(id) = filter.account_id {
        sql.push_str(" AND account_id=?");
        args.push(Box::new(id));
    }
    if let Some(id) = filter.category_id {
        sql.push_str(" AND (category_id=? OR subcategory_id=?)");
        args.push(Box::new(id));
        args.push(Box::new(id));
    }
    if let Some(d) = filter.from {
        sql.push_str(" AND date>=?");
        args.push(Box::new(d.to_string()));
    }
    if let Some(d) = filter.to {
        sql.push_str(" AND date<=?");
        args.push(Box::new(d.to_string()));
    }
    if let Some(d) = filter.before {
        sql.push_str(" AND date<?");
        args.push(Box::new(d.to_string()));
    }
    if filter.recurring_only {
        sql.push_str(" AND recurring=1");
    }
    sql.push_str(" ORDER BY date, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), movement_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_movement(conn: &Connection, owner: &str, id: i64) -> Result<Option<Movement>> {
    let sql = format!("SELECT {} FROM movements WHERE owner=?1 AND id=?2", MOVEMENT_COLS);
    Ok(conn
        .query_row(&sql, params![owner, id], movement_row)
        .optional()?)
}

const TEMPLATE_COLS: &str = "id, owner, concept, amount, day_of_month, account_id, category_id, \
     subcategory_id, notes, active, is_transfer, destination_account_id";

fn template_row(r: &Row<'_>) -> rusqlite::Result<RecurringTemplate> {
    Ok(RecurringTemplate {
        id: r.get(0)?,
        owner: r.get(1)?,
        concept: r.get(2)?,
        amount: dec_col(r, 3)?,
        day_of_month: r.get(4)?,
        account_id: r.get(5)?,
        category_id: r.get(6)?,
        subcategory_id: r.get(7)?,
        notes: r.get(8)?,
        active: r.get(9)?,
        is_transfer: r.get(10)?,
        destination_account_id: r.get(11)?,
    })
}

pub fn load_templates(
    conn: &Connection,
    owner: &str,
    active_only: bool,
) -> Result<Vec<RecurringTemplate>> {
    let sql = format!(
        "SELECT {} FROM recurring_templates WHERE owner=?1 {} ORDER BY day_of_month, id",
        TEMPLATE_COLS,
        if active_only { "AND active=1" } else { "" }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner], template_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn load_template(
    conn: &Connection,
    owner: &str,
    id: i64,
) -> Result<Option<RecurringTemplate>> {
    let sql = format!(
        "SELECT {} FROM recurring_templates WHERE owner=?1 AND id=?2",
        TEMPLATE_COLS
    );
    Ok(conn
        .query_row(&sql, params![owner, id], template_row)
        .optional()?)
}

fn wallet_row(r: &Row<'_>) -> rusqlite::Result<WalletConfig> {
    Ok(WalletConfig {
        id: r.get(0)?,
        owner: r.get(1)?,
        account_id: r.get(2)?,
        monthly_topup: dec_col(r, 3)?,
        topup_day: r.get(4)?,
        active: r.get(5)?,
    })
}

pub fn load_wallet_configs(conn: &Connection, owner: &str) -> Result<Vec<WalletConfig>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner, account_id, monthly_topup, topup_day, active
         FROM wallet_configs WHERE owner=?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![owner], wallet_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn snapshot_row(r: &Row<'_>) -> rusqlite::Result<NetWorthSnapshot> {
    Ok(NetWorthSnapshot {
        id: r.get(0)?,
        owner: r.get(1)?,
        month: r.get(2)?,
        account_id: r.get(3)?,
        registered_balance: opt_dec_col(r, 4)?,
        calculated_balance: opt_dec_col(r, 5)?,
        exchange_rate: opt_dec_col(r, 6)?,
        kind: enum_col(r, 7)?,
        notes: r.get(8)?,
    })
}

pub fn load_snapshots(
    conn: &Connection,
    owner: &str,
    month: Option<&str>,
) -> Result<Vec<NetWorthSnapshot>> {
    let base = "SELECT id, owner, month, account_id, registered_balance, calculated_balance, \
                exchange_rate, kind, notes FROM snapshots WHERE owner=?1";
    let rows = if let Some(m) = month {
        let mut stmt = conn.prepare(&format!("{} AND month=?2 ORDER BY month, account_id", base))?;
        let it = stmt.query_map(params![owner, m], snapshot_row)?;
        it.collect::<rusqlite::Result<Vec<_>>>()?
    } else {
        let mut stmt = conn.prepare(&format!("{} ORDER BY month, account_id", base))?;
        let it = stmt.query_map(params![owner], snapshot_row)?;
        it.collect::<rusqlite::Result<Vec<_>>>()?
    };
    Ok(rows)
}

pub fn load_profile(conn: &Connection, owner: &str) -> Result<Option<Profile>> {
    let row = conn
        .query_row(
            "SELECT id, display_name, avatar_url, primary_currency, default_account_id,
                    preferences, onboarding_completed
             FROM profiles WHERE id=?1",
            params![owner],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, Option<i64>>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, bool>(6)?,
                ))
            },
        )
        .optional()?;
    let Some((id, display_name, avatar_url, primary_currency, default_account_id, prefs, done)) =
        row
    else {
        return Ok(None);
    };
    let preferences = serde_json::from_str(&prefs).unwrap_or(serde_json::Value::Null);
    Ok(Some(Profile {
        id,
        display_name,
        avatar_url,
        primary_currency,
        default_account_id,
        preferences,
        onboarding_completed: done,
    }))
}

/// Accounts and categories keyed by id, built once per fetch cycle.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    pub accounts: HashMap<i64, Account>,
    pub categories: HashMap<i64, Category>,
}

impl CatalogIndex {
    pub fn new(accounts: Vec<Account>, categories: Vec<Category>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn load(conn: &Connection, owner: &str) -> Result<Self> {
        Ok(Self::new(
            load_accounts(conn, owner, false)?,
            load_categories(conn, owner)?,
        ))
    }

    pub fn account(&self, id: i64) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn account_name(&self, id: i64) -> &str {
        self.account(id).map(|a| a.name.as_str()).unwrap_or("")
    }

    pub fn category_name(&self, id: Option<i64>) -> &str {
        id.and_then(|id| self.category(id))
            .map(|c| c.name.as_str())
            .unwrap_or("")
    }

    pub fn children_of(&self, parent: i64) -> Vec<&Category> {
        let mut out: Vec<&Category> = self
            .categories
            .values()
            .filter(|c| c.parent_id == Some(parent))
            .collect();
        out.sort_by(|a, b| a.position.cmp(&b.position).then(a.name.cmp(&b.name)));
        out
    }
}
