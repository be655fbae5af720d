// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The user's profile, first-run onboarding and the stored current user.

use crate::commands::accounts::{create_account, set_default_account};
use crate::commands::categories::{DEFAULT_COLOR, create_category};
use crate::errors::PocketError;
use crate::models::{AccountKind, CategoryKind, FieldUpdate, Profile, ProfileUpdate};
use crate::queries::{load_categories, load_profile};
use crate::session::{CURRENT_USER_KEY, Session};
use crate::utils::{id_for_account, maybe_print_json, parse_decimal, set_setting, yes_no};
use crate::validation::{AccountForm, CategoryForm, validate_currency, validate_display_name};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::info;

pub const DEFAULT_CATEGORIES: &[(&str, CategoryKind)] = &[
    ("Salary", CategoryKind::Income),
    ("Freelance", CategoryKind::Income),
    ("Other income", CategoryKind::Income),
    ("Food", CategoryKind::Expense),
    ("Housing", CategoryKind::Expense),
    ("Transport", CategoryKind::Expense),
    ("Leisure", CategoryKind::Expense),
    ("Health", CategoryKind::Expense),
    ("Subscriptions", CategoryKind::Expense),
    ("Other expenses", CategoryKind::Expense),
    ("Index fund", CategoryKind::Investment),
];

fn ensure_profile(conn: &Connection, owner: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO profiles(id) VALUES (?1)",
        params![owner],
    )
    .context("Could not create the profile")?;
    Ok(())
}

fn reload(conn: &Connection, owner: &str) -> Result<Profile> {
    load_profile(conn, owner)?.ok_or_else(|| {
        PocketError::NotFound {
            what: "Profile",
            key: owner.to_string(),
        }
        .into()
    })
}

fn normalize(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Applies a partial update to the caller's own profile and returns the
/// stored row. Fields left as [`FieldUpdate::Keep`] are untouched; the row
/// is created first if the user has none yet.
pub fn update_own_profile(conn: &Connection, owner: &str, update: &ProfileUpdate) -> Result<Profile> {
    let display_name = match &update.display_name {
        FieldUpdate::Set(v) => FieldUpdate::Set(normalize(v.clone())),
        FieldUpdate::Keep => FieldUpdate::Keep,
    };
    let avatar_url = match &update.avatar_url {
        FieldUpdate::Set(v) => FieldUpdate::Set(normalize(v.clone())),
        FieldUpdate::Keep => FieldUpdate::Keep,
    };
    if let FieldUpdate::Set(name) = &display_name {
        validate_display_name(name.as_deref())?;
    }

    ensure_profile(conn, owner)?;
    let current = reload(conn, owner)?;
    let display_name = display_name.apply(current.display_name);
    let avatar_url = avatar_url.apply(current.avatar_url);
    conn.execute(
        "UPDATE profiles SET display_name=?1, avatar_url=?2, updated_at=datetime('now')
         WHERE id=?3",
        params![display_name, avatar_url, owner],
    )
    .context("Could not update the profile")?;
    reload(conn, owner)
}

pub fn set_primary_currency(conn: &Connection, owner: &str, currency: &str) -> Result<()> {
    let currency = currency.trim().to_uppercase();
    validate_currency(&currency)?;
    ensure_profile(conn, owner)?;
    conn.execute(
        "UPDATE profiles SET primary_currency=?1, updated_at=datetime('now') WHERE id=?2",
        params![currency, owner],
    )?;
    Ok(())
}

/// Sets (or with `None` removes) one key of the preferences object. Values
/// that parse as JSON are stored as such, anything else as a string.
pub fn set_preference(conn: &Connection, owner: &str, key: &str, value: Option<&str>) -> Result<Value> {
    ensure_profile(conn, owner)?;
    let profile = reload(conn, owner)?;
    let mut prefs = match profile.preferences {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    match value {
        Some(v) => {
            let parsed = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.to_string()));
            prefs.insert(key.to_string(), parsed);
        }
        None => {
            prefs.remove(key);
        }
    }
    let prefs = Value::Object(prefs);
    conn.execute(
        "UPDATE profiles SET preferences=?1, updated_at=datetime('now') WHERE id=?2",
        params![serde_json::to_string(&prefs)?, owner],
    )?;
    Ok(prefs)
}

/// `NAME[:KIND[:INITIAL]]`, e.g. `Checking:current:1500`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSeed {
    pub name: String,
    pub kind: AccountKind,
    pub initial_balance: Decimal,
}

impl FromStr for AccountSeed {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(anyhow!("Account '{}' needs a name (NAME:KIND:INITIAL)", s));
        }
        let kind = match parts.next().map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => k.parse()?,
            None => AccountKind::Current,
        };
        let initial_balance = match parts.next().map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => parse_decimal(b)?,
            None => Decimal::ZERO,
        };
        Ok(Self {
            name: name.to_string(),
            kind,
            initial_balance,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct OnboardingPlan {
    pub display_name: Option<String>,
    pub currency: Option<String>,
    pub accounts: Vec<AccountSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingSummary {
    pub accounts_created: usize,
    pub categories_created: usize,
    pub default_account_id: Option<i64>,
}

/// First-run setup. Accounts that already exist by name are reused, the
/// default categories are only seeded into an empty catalog, and the first
/// listed account becomes the default unless one is already set.
pub fn onboard(conn: &Connection, owner: &str, plan: &OnboardingPlan) -> Result<OnboardingSummary> {
    ensure_profile(conn, owner)?;
    if plan.display_name.is_some() {
        update_own_profile(
            conn,
            owner,
            &ProfileUpdate {
                display_name: FieldUpdate::Set(plan.display_name.clone()),
                ..ProfileUpdate::default()
            },
        )?;
    }
    if let Some(ccy) = &plan.currency {
        set_primary_currency(conn, owner, ccy)?;
    }
    let profile = reload(conn, owner)?;

    let has_accounts: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE owner=?1)",
        params![owner],
        |r| r.get(0),
    )?;
    if plan.accounts.is_empty() && !has_accounts {
        return Err(anyhow!(
            "Onboarding needs at least one --account NAME:KIND:INITIAL"
        ));
    }

    let mut accounts_created = 0;
    let mut first_account = None;
    for seed in &plan.accounts {
        let id = match id_for_account(conn, owner, &seed.name) {
            Ok(id) => id,
            Err(e)
                if !matches!(
                    e.downcast_ref::<PocketError>(),
                    Some(PocketError::NotFound { .. })
                ) =>
            {
                return Err(e);
            }
            Err(_) => {
                let form = AccountForm {
                    name: seed.name.clone(),
                    kind: seed.kind,
                    currency: profile.primary_currency.clone(),
                    initial_balance: seed.initial_balance,
                    ..AccountForm::default()
                };
                accounts_created += 1;
                create_account(conn, owner, &form)?
            }
        };
        first_account.get_or_insert(id);
    }
    let mut default_account_id = profile.default_account_id;
    if default_account_id.is_none() {
        if let Some(id) = first_account {
            set_default_account(conn, owner, id)?;
            default_account_id = Some(id);
        }
    }

    let mut categories_created = 0;
    if load_categories(conn, owner)?.is_empty() {
        for (name, kind) in DEFAULT_CATEGORIES {
            create_category(
                conn,
                owner,
                &CategoryForm {
                    name: (*name).to_string(),
                    kind: *kind,
                    parent_id: None,
                    icon: None,
                    color: DEFAULT_COLOR.to_string(),
                },
            )?;
            categories_created += 1;
        }
    }

    conn.execute(
        "UPDATE profiles SET onboarding_completed=1, updated_at=datetime('now') WHERE id=?1",
        params![owner],
    )?;
    info!(user = owner, accounts_created, categories_created, "onboarding completed");
    Ok(OnboardingSummary {
        accounts_created,
        categories_created,
        default_account_id,
    })
}

pub fn handle_onboard(conn: &Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let accounts = m
        .get_many::<String>("account")
        .map(|vals| vals.map(|v| v.parse::<AccountSeed>()).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    let plan = OnboardingPlan {
        display_name: m.get_one::<String>("name").cloned(),
        currency: m.get_one::<String>("currency").cloned(),
        accounts,
    };
    let summary = onboard(conn, &session.user_id, &plan)?;
    println!(
        "Welcome! {} accounts and {} categories created for '{}'.",
        summary.accounts_created, summary.categories_created, session.user_id
    );
    Ok(())
}

pub fn handle(conn: &Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.as_str();
    match m.subcommand() {
        Some(("show", sub)) => {
            ensure_profile(conn, owner)?;
            let profile = reload(conn, owner)?;
            if maybe_print_json(sub.get_flag("json"), false, &profile)? {
                return Ok(());
            }
            let default_account = match profile.default_account_id {
                Some(id) => conn
                    .query_row(
                        "SELECT name FROM accounts WHERE owner=?1 AND id=?2",
                        params![owner, id],
                        |r| r.get::<_, String>(0),
                    )
                    .optional()?
                    .unwrap_or_default(),
                None => String::new(),
            };
            println!("User:        {}", profile.id);
            println!("Name:        {}", profile.display_name.unwrap_or_default());
            println!("Avatar:      {}", profile.avatar_url.unwrap_or_default());
            println!("Currency:    {}", profile.primary_currency);
            println!("Default:     {}", default_account);
            println!("Onboarded:   {}", yes_no(profile.onboarding_completed));
            println!("Preferences: {}", profile.preferences);
        }
        Some(("set", sub)) => {
            let field = |value: &str, clear: &str| match sub.get_one::<String>(value) {
                Some(v) => FieldUpdate::Set(Some(v.clone())),
                None if sub.get_flag(clear) => FieldUpdate::Set(None),
                None => FieldUpdate::Keep,
            };
            let update = ProfileUpdate {
                display_name: field("name", "clear_name"),
                avatar_url: field("avatar", "clear_avatar"),
            };
            if update.display_name.is_set() || update.avatar_url.is_set() {
                update_own_profile(conn, owner, &update)?;
            }
            if let Some(ccy) = sub.get_one::<String>("currency") {
                set_primary_currency(conn, owner, ccy)?;
            }
            if let Some(name) = sub.get_one::<String>("default_account") {
                let id = id_for_account(conn, owner, name)?;
                set_default_account(conn, owner, id)?;
            }
            if let Some(prefs) = sub.get_many::<String>("pref") {
                for kv in prefs {
                    let (k, v) = kv
                        .split_once('=')
                        .ok_or_else(|| anyhow!("Preference '{}' must look like KEY=VALUE", kv))?;
                    set_preference(conn, owner, k.trim(), Some(v.trim()))?;
                }
            }
            if let Some(keys) = sub.get_many::<String>("unset_pref") {
                for k in keys {
                    set_preference(conn, owner, k.trim(), None)?;
                }
            }
            println!("Profile updated");
        }
        _ => {}
    }
    Ok(())
}

pub fn handle_config(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("set-user", sub)) = m.subcommand() {
        let user = sub.get_one::<String>("name").unwrap().trim();
        if user.is_empty() {
            return Err(anyhow!("User id cannot be empty"));
        }
        set_setting(conn, CURRENT_USER_KEY, user)?;
        println!("Current user set to '{}'", user);
    }
    Ok(())
}
