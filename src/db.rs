// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "PocketPal", "pocketpal"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("pocketpal.sqlite"))
}

/// Opens the database at `path` (or the platform default) and makes sure the
/// schema exists.
pub fn open_or_init(path: Option<&Path>) -> Result<Connection> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => db_path()?,
    };
    debug!(path = %path.display(), "opening store");
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('current','investment','wallet')),
        currency TEXT NOT NULL DEFAULT 'EUR',
        initial_balance TEXT NOT NULL DEFAULT '0',
        color TEXT NOT NULL DEFAULT '#3B82F6',
        active INTEGER NOT NULL DEFAULT 1,
        position INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(owner, name)
    );

    CREATE TABLE IF NOT EXISTS profiles(
        id TEXT PRIMARY KEY,
        display_name TEXT,
        avatar_url TEXT,
        primary_currency TEXT NOT NULL DEFAULT 'EUR',
        default_account_id INTEGER,
        preferences TEXT NOT NULL DEFAULT '{}',
        onboarding_completed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(default_account_id) REFERENCES accounts(id) ON DELETE SET NULL
    );

    -- one level of nesting: a row with parent_id may not be a parent itself
    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('income','expense','investment')),
        parent_id INTEGER,
        color TEXT NOT NULL DEFAULT '#6B7280',
        icon TEXT,
        position INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(owner, name),
        FOREIGN KEY(parent_id) REFERENCES categories(id)
    );

    CREATE TABLE IF NOT EXISTS recurring_templates(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        concept TEXT NOT NULL,
        amount TEXT NOT NULL,
        day_of_month INTEGER NOT NULL DEFAULT 1 CHECK(day_of_month BETWEEN 1 AND 31),
        account_id INTEGER NOT NULL,
        category_id INTEGER NOT NULL,
        subcategory_id INTEGER,
        notes TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        is_transfer INTEGER NOT NULL DEFAULT 0,
        destination_account_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE,
        FOREIGN KEY(destination_account_id) REFERENCES accounts(id) ON DELETE CASCADE,
        FOREIGN KEY(category_id) REFERENCES categories(id),
        FOREIGN KEY(subcategory_id) REFERENCES categories(id)
    );

    CREATE TABLE IF NOT EXISTS movements(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        date TEXT NOT NULL,
        concept TEXT NOT NULL,
        amount TEXT NOT NULL,
        account_id INTEGER NOT NULL,
        category_id INTEGER NOT NULL,
        subcategory_id INTEGER,
        notes TEXT,
        recurring INTEGER NOT NULL DEFAULT 0,
        template_id INTEGER,
        month TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE,
        FOREIGN KEY(category_id) REFERENCES categories(id),
        FOREIGN KEY(subcategory_id) REFERENCES categories(id),
        FOREIGN KEY(template_id) REFERENCES recurring_templates(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_movements_owner_month ON movements(owner, month);
    CREATE INDEX IF NOT EXISTS idx_movements_account_date ON movements(account_id, date);

    CREATE TABLE IF NOT EXISTS wallet_configs(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        account_id INTEGER NOT NULL UNIQUE,
        monthly_topup TEXT NOT NULL,
        topup_day INTEGER NOT NULL DEFAULT 1 CHECK(topup_day BETWEEN 1 AND 31),
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS snapshots(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        month TEXT NOT NULL,
        account_id INTEGER NOT NULL,
        registered_balance TEXT,
        calculated_balance TEXT,
        exchange_rate TEXT,
        kind TEXT NOT NULL CHECK(kind IN ('manual','auto')),
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(owner, month, account_id),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE
    );
    "#,
    )?;
    Ok(())
}
