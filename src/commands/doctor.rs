// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::queries::{MovementFilter, load_movements};
use crate::session::Session;
use crate::utils::{month_of, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub code: &'static str,
    pub detail: String,
}

fn collect(
    conn: &Connection,
    owner: &str,
    code: &'static str,
    sql: &str,
    out: &mut Vec<Issue>,
) -> Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![owner])?;
    while let Some(r) = rows.next()? {
        out.push(Issue {
            code,
            detail: r.get(0)?,
        });
    }
    Ok(())
}

/// Scans the user's data for rows that break the ledger's invariants.
pub fn diagnose(conn: &Connection, owner: &str) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    // 1) Movement-level checks
    for m in load_movements(conn, owner, &MovementFilter::default())? {
        if m.month != month_of(m.date) {
            issues.push(Issue {
                code: "movement_month_mismatch",
                detail: format!("#{} dated {} filed under {}", m.id, m.date, m.month),
            });
        }
        if m.amount.is_zero() {
            issues.push(Issue {
                code: "movement_zero_amount",
                detail: format!("#{} '{}' on {}", m.id, m.concept, m.date),
            });
        }
    }

    collect(
        conn,
        owner,
        "movement_category_not_top_level",
        "SELECT '#' || m.id || ' filed under subcategory ' || c.name FROM movements m
         JOIN categories c ON m.category_id=c.id
         WHERE m.owner=?1 AND c.parent_id IS NOT NULL",
        &mut issues,
    )?;
    collect(
        conn,
        owner,
        "movement_subcategory_mismatch",
        "SELECT '#' || m.id || ' ' || s.name || ' is not under ' || c.name FROM movements m
         JOIN categories s ON m.subcategory_id=s.id
         JOIN categories c ON m.category_id=c.id
         WHERE m.owner=?1 AND (s.parent_id IS NULL OR s.parent_id != m.category_id)",
        &mut issues,
    )?;

    // 2) Category tree
    collect(
        conn,
        owner,
        "category_too_deep",
        "SELECT c.name || ' under ' || p.name FROM categories c
         JOIN categories p ON c.parent_id=p.id
         WHERE c.owner=?1 AND p.parent_id IS NOT NULL",
        &mut issues,
    )?;
    collect(
        conn,
        owner,
        "subcategory_kind_mismatch",
        "SELECT c.name || ' is ' || c.kind || ', parent ' || p.name || ' is ' || p.kind
         FROM categories c JOIN categories p ON c.parent_id=p.id
         WHERE c.owner=?1 AND c.kind != p.kind",
        &mut issues,
    )?;

    // 3) Wallets and templates
    collect(
        conn,
        owner,
        "wallet_config_on_non_wallet",
        "SELECT a.name || ' (' || a.kind || ')' FROM wallet_configs w
         JOIN accounts a ON w.account_id=a.id
         WHERE w.owner=?1 AND a.kind != 'wallet'",
        &mut issues,
    )?;
    collect(
        conn,
        owner,
        "transfer_without_destination",
        "SELECT '#' || id || ' ' || concept FROM recurring_templates
         WHERE owner=?1 AND is_transfer=1
           AND (destination_account_id IS NULL OR destination_account_id=account_id)",
        &mut issues,
    )?;

    // 4) Snapshots
    collect(
        conn,
        owner,
        "duplicate_snapshot",
        "SELECT month || ' account #' || account_id || ' x' || COUNT(*) FROM snapshots
         WHERE owner=?1 GROUP BY month, account_id HAVING COUNT(*) > 1",
        &mut issues,
    )?;

    Ok(issues)
}

pub fn handle(conn: &Connection, session: &Session) -> Result<()> {
    let issues = diagnose(conn, &session.user_id)?;
    if issues.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.code.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
