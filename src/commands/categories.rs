// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::PocketError;
use crate::models::{Category, CategoryKind};
use crate::queries::{CatalogIndex, load_categories, load_category};
use crate::session::Session;
use crate::utils::{id_for_category, maybe_print_json, pretty_table};
use crate::validation::{CategoryForm, validate_category};
use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;

pub const DEFAULT_COLOR: &str = "#6B7280";

pub fn handle(conn: &Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.as_str();
    match m.subcommand() {
        Some(("add", sub)) => {
            let parent_id = sub
                .get_one::<String>("parent")
                .map(|p| id_for_category(conn, owner, p))
                .transpose()?;
            let kind = match sub.get_one::<String>("kind") {
                Some(k) => k.parse::<CategoryKind>()?,
                None if parent_id.is_some() => CategoryKind::Expense,
                None => anyhow::bail!("--kind is required for a top-level category"),
            };
            let form = CategoryForm {
                name: sub.get_one::<String>("name").unwrap().trim().to_string(),
                kind,
                parent_id,
                icon: sub.get_one::<String>("icon").cloned(),
                color: sub
                    .get_one::<String>("color")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_COLOR.into()),
            };
            let id = create_category(conn, owner, &form)?;
            println!("Added category '{}' #{}", form.name, id);
        }
        Some(("list", sub)) => list(conn, owner, sub)?,
        Some(("edit", sub)) => {
            let id = id_for_category(conn, owner, sub.get_one::<String>("name").unwrap())?;
            let cur = find(conn, owner, id)?;
            let mut form = CategoryForm {
                name: cur.name.clone(),
                kind: cur.kind,
                parent_id: cur.parent_id,
                icon: cur.icon.clone(),
                color: cur.color.clone(),
            };
            if let Some(n) = sub.get_one::<String>("rename") {
                form.name = n.trim().to_string();
            }
            if let Some(k) = sub.get_one::<String>("kind") {
                form.kind = k.parse()?;
            }
            if let Some(p) = sub.get_one::<String>("parent") {
                form.parent_id = Some(id_for_category(conn, owner, p)?);
            }
            if sub.get_flag("no_parent") {
                form.parent_id = None;
            }
            if let Some(i) = sub.get_one::<String>("icon") {
                form.icon = Some(i.clone()).filter(|s| !s.trim().is_empty());
            }
            if let Some(c) = sub.get_one::<String>("color") {
                form.color = c.clone();
            }
            update_category(conn, owner, id, &form)?;
            println!("Updated category '{}'", form.name);
        }
        Some(("rm", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let id = id_for_category(conn, owner, name)?;
            delete_category(conn, owner, id)?;
            println!("Removed category '{}'", name.trim());
        }
        _ => {}
    }
    Ok(())
}

fn find(conn: &Connection, owner: &str, id: i64) -> Result<Category> {
    load_category(conn, owner, id)?.ok_or_else(|| {
        PocketError::NotFound {
            what: "Category",
            key: id.to_string(),
        }
        .into()
    })
}

/// Creates a category at the end of its siblings. A subcategory takes its
/// parent's kind regardless of the kind on the form.
pub fn create_category(conn: &Connection, owner: &str, form: &CategoryForm) -> Result<i64> {
    let index = CatalogIndex::load(conn, owner)?;
    validate_category(form, &index, None)?;
    let kind = form
        .parent_id
        .and_then(|p| index.category(p))
        .map(|p| p.kind)
        .unwrap_or(form.kind);
    let position: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE owner=?1 AND parent_id IS ?2",
        params![owner, form.parent_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO categories(owner, name, kind, parent_id, color, icon, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            owner,
            form.name.trim(),
            kind.as_str(),
            form.parent_id,
            form.color,
            form.icon,
            position
        ],
    )
    .with_context(|| format!("Could not create category '{}'", form.name.trim()))?;
    Ok(conn.last_insert_rowid())
}

/// Updates a category. Its parent and kind may only change while no movement
/// or template references it, so existing classifications stay valid.
pub fn update_category(conn: &Connection, owner: &str, id: i64, form: &CategoryForm) -> Result<()> {
    let index = CatalogIndex::load(conn, owner)?;
    validate_category(form, &index, Some(id))?;
    let cur = find(conn, owner, id)?;
    let kind = form
        .parent_id
        .and_then(|p| index.category(p))
        .map(|p| p.kind)
        .unwrap_or(form.kind);
    if cur.parent_id != form.parent_id || cur.kind != kind {
        let count = references(conn, owner, id)?;
        if count > 0 {
            return Err(PocketError::CategoryInUse {
                name: cur.name,
                count,
            }
            .into());
        }
    }
    conn.execute(
        "UPDATE categories SET name=?1, kind=?2, parent_id=?3, color=?4, icon=?5
         WHERE owner=?6 AND id=?7",
        params![
            form.name.trim(),
            kind.as_str(),
            form.parent_id,
            form.color,
            form.icon,
            owner,
            id
        ],
    )
    .with_context(|| format!("Could not update category '{}'", form.name.trim()))?;
    // Children follow their parent's kind.
    conn.execute(
        "UPDATE categories SET kind=?1 WHERE owner=?2 AND parent_id=?3",
        params![kind.as_str(), owner, id],
    )?;
    Ok(())
}

/// Movements and recurring templates filed under `id`, as category or
/// subcategory.
fn references(conn: &Connection, owner: &str, id: i64) -> Result<i64> {
    let n = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM movements
                 WHERE owner=?1 AND (category_id=?2 OR subcategory_id=?2))
              + (SELECT COUNT(*) FROM recurring_templates
                 WHERE owner=?1 AND (category_id=?2 OR subcategory_id=?2))",
        params![owner, id],
        |r| r.get(0),
    )?;
    Ok(n)
}

/// Deletes a category that nothing references. Movements (as category or
/// subcategory), child categories and recurring templates all block it.
pub fn delete_category(conn: &Connection, owner: &str, id: i64) -> Result<()> {
    let cat = find(conn, owner, id)?;
    let movements: i64 = conn.query_row(
        "SELECT COUNT(*) FROM movements
         WHERE owner=?1 AND (category_id=?2 OR subcategory_id=?2)",
        params![owner, id],
        |r| r.get(0),
    )?;
    if movements > 0 {
        return Err(PocketError::CategoryHasMovements {
            name: cat.name,
            count: movements,
        }
        .into());
    }
    let children: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE owner=?1 AND parent_id=?2",
        params![owner, id],
        |r| r.get(0),
    )?;
    if children > 0 {
        return Err(PocketError::CategoryHasChildren { name: cat.name }.into());
    }
    let templates: i64 = conn.query_row(
        "SELECT COUNT(*) FROM recurring_templates
         WHERE owner=?1 AND (category_id=?2 OR subcategory_id=?2)",
        params![owner, id],
        |r| r.get(0),
    )?;
    if templates > 0 {
        return Err(PocketError::CategoryHasTemplates {
            name: cat.name,
            count: templates,
        }
        .into());
    }
    conn.execute(
        "DELETE FROM categories WHERE owner=?1 AND id=?2",
        params![owner, id],
    )?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CategoryRow {
    pub name: String,
    pub kind: CategoryKind,
    pub parent: Option<String>,
    pub color: String,
    pub icon: Option<String>,
}

/// Parents followed by their children, in display order.
pub fn category_tree(conn: &Connection, owner: &str, kind: Option<CategoryKind>) -> Result<Vec<CategoryRow>> {
    let all = load_categories(conn, owner)?;
    let mut rows = Vec::new();
    for parent in all
        .iter()
        .filter(|c| c.parent_id.is_none() && kind.is_none_or(|k| c.kind == k))
    {
        rows.push(CategoryRow {
            name: parent.name.clone(),
            kind: parent.kind,
            parent: None,
            color: parent.color.clone(),
            icon: parent.icon.clone(),
        });
        for child in all.iter().filter(|c| c.parent_id == Some(parent.id)) {
            rows.push(CategoryRow {
                name: child.name.clone(),
                kind: child.kind,
                parent: Some(parent.name.clone()),
                color: child.color.clone(),
                icon: child.icon.clone(),
            });
        }
    }
    Ok(rows)
}

fn list(conn: &Connection, owner: &str, sub: &clap::ArgMatches) -> Result<()> {
    let kind = sub
        .get_one::<String>("kind")
        .map(|k| k.parse::<CategoryKind>())
        .transpose()?;
    let data = category_tree(conn, owner, kind)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        return Ok(());
    }
    let rows = data
        .iter()
        .map(|c| {
            let name = match c.parent {
                Some(_) => format!("  └ {}", c.name),
                None => c.name.clone(),
            };
            vec![
                name,
                c.kind.to_string(),
                c.color.clone(),
                c.icon.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Category", "Kind", "Color", "Icon"], rows));
    Ok(())
}
