// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::queries::{
    CatalogIndex, MovementFilter, load_accounts, load_categories, load_movements, load_templates,
};
use crate::session::Session;
use crate::utils::{parse_month, yes_no};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const MOVEMENT_HEADERS: [&str; 8] = [
    "Date",
    "Concept",
    "Amount",
    "Account",
    "Category",
    "Subcategory",
    "Notes",
    "Recurring",
];
pub const ACCOUNT_HEADERS: [&str; 6] = [
    "Name",
    "Kind",
    "Currency",
    "Initial Balance",
    "Color",
    "Active",
];
pub const CATEGORY_HEADERS: [&str; 4] = ["Name", "Kind", "Parent Category", "Color"];
pub const RECURRING_HEADERS: [&str; 7] = [
    "Concept",
    "Amount",
    "Day of Month",
    "Account",
    "Category",
    "Notes",
    "Active",
];

/// Header plus rows, `\n` separated with no trailing newline. Fields holding
/// a comma, quote, `\n` or `\r` are quoted with inner quotes doubled.
pub fn generate_csv<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row.iter().map(|f| f.as_ref()))?;
    }
    let bytes = wtr.into_inner().map_err(|e| anyhow!("CSV flush failed: {}", e))?;
    let mut out = String::from_utf8(bytes)?;
    if out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

pub fn movement_rows(conn: &Connection, owner: &str, month: Option<&str>) -> Result<Vec<Vec<String>>> {
    let filter = MovementFilter {
        month: month.map(str::to_string),
        ..MovementFilter::default()
    };
    let index = CatalogIndex::load(conn, owner)?;
    Ok(load_movements(conn, owner, &filter)?
        .into_iter()
        .map(|m| {
            vec![
                m.date.to_string(),
                m.concept,
                m.amount.to_string(),
                index.account_name(m.account_id).to_string(),
                index.category_name(Some(m.category_id)).to_string(),
                index.category_name(m.subcategory_id).to_string(),
                m.notes.unwrap_or_default(),
                yes_no(m.recurring).to_string(),
            ]
        })
        .collect())
}

pub fn movements_csv(conn: &Connection, owner: &str, month: Option<&str>) -> Result<String> {
    generate_csv(&MOVEMENT_HEADERS, &movement_rows(conn, owner, month)?)
}

pub fn accounts_csv(conn: &Connection, owner: &str) -> Result<String> {
    let rows: Vec<Vec<String>> = load_accounts(conn, owner, false)?
        .into_iter()
        .map(|a| {
            vec![
                a.name,
                a.kind.to_string(),
                a.currency,
                a.initial_balance.to_string(),
                a.color,
                yes_no(a.active).to_string(),
            ]
        })
        .collect();
    generate_csv(&ACCOUNT_HEADERS, &rows)
}

pub fn categories_csv(conn: &Connection, owner: &str) -> Result<String> {
    let categories = load_categories(conn, owner)?;
    let index = CatalogIndex::new(Vec::new(), categories.clone());
    let rows: Vec<Vec<String>> = categories
        .into_iter()
        .map(|c| {
            let parent = index.category_name(c.parent_id).to_string();
            vec![c.name, c.kind.to_string(), parent, c.color]
        })
        .collect();
    generate_csv(&CATEGORY_HEADERS, &rows)
}

pub fn recurring_csv(conn: &Connection, owner: &str) -> Result<String> {
    let index = CatalogIndex::load(conn, owner)?;
    let rows: Vec<Vec<String>> = load_templates(conn, owner, false)?
        .into_iter()
        .map(|t| {
            vec![
                t.concept,
                t.amount.to_string(),
                t.day_of_month.to_string(),
                index.account_name(t.account_id).to_string(),
                index.category_name(Some(t.category_id)).to_string(),
                t.notes.unwrap_or_default(),
                yes_no(t.active).to_string(),
            ]
        })
        .collect();
    generate_csv(&RECURRING_HEADERS, &rows)
}

/// Writes a Deflated archive with one CSV per table. Returns the entry names.
pub fn write_backup(conn: &Connection, owner: &str, path: &Path) -> Result<Vec<&'static str>> {
    let entries = [
        ("movements.csv", movements_csv(conn, owner, None)?),
        ("accounts.csv", accounts_csv(conn, owner)?),
        ("categories.csv", categories_csv(conn, owner)?),
        ("recurring.csv", recurring_csv(conn, owner)?),
    ];
    let file = File::create(path)
        .with_context(|| format!("Could not create backup file {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in &entries {
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    info!(path = %path.display(), "backup written");
    Ok(entries.iter().map(|(name, _)| *name).collect())
}

fn emit(content: &str, out: Option<&String>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Could not write {}", path))?;
            println!("Exported to {}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

pub fn handle(conn: &Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.as_str();
    match m.subcommand() {
        Some(("movements", sub)) => export_movements(conn, owner, sub),
        Some(("accounts", sub)) => emit(&accounts_csv(conn, owner)?, sub.get_one::<String>("out")),
        Some(("categories", sub)) => {
            emit(&categories_csv(conn, owner)?, sub.get_one::<String>("out"))
        }
        Some(("recurring", sub)) => {
            emit(&recurring_csv(conn, owner)?, sub.get_one::<String>("out"))
        }
        Some(("backup", sub)) => {
            let out = sub.get_one::<String>("out").unwrap();
            let names = write_backup(conn, owner, Path::new(out))?;
            println!("Backup written to {} ({})", out, names.join(", "));
            Ok(())
        }
        _ => Ok(()),
    }
}

fn export_movements(conn: &Connection, owner: &str, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out");
    let month = sub
        .get_one::<String>("month")
        .map(|m| parse_month(m))
        .transpose()?;

    match fmt.as_str() {
        "csv" => emit(&movements_csv(conn, owner, month.as_deref())?, out),
        "json" => {
            let items: Vec<_> = movement_rows(conn, owner, month.as_deref())?
                .into_iter()
                .map(|r| {
                    let field = |i: usize| r[i].clone();
                    json!({
                        "date": field(0),
                        "concept": field(1),
                        "amount": field(2),
                        "account": field(3),
                        "category": field(4),
                        "subcategory": Some(field(5)).filter(|s| !s.is_empty()),
                        "notes": Some(field(6)).filter(|s| !s.is_empty()),
                        "recurring": field(7) == "Yes",
                    })
                })
                .collect();
            emit(&serde_json::to_string_pretty(&items)?, out)
        }
        other => Err(anyhow!("Unknown format: {} (use csv|json)", other)),
    }
}
