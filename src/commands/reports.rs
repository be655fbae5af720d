// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::aggregate::{
    Bucket, Flow, Period, Totals, by_category, by_subcategory, evolution, explore_distribution,
    filter_by_flow, totals,
};
use crate::balance::account_balances;
use crate::models::{AccountKind, Movement};
use crate::queries::{
    CatalogIndex, MovementFilter, load_accounts, load_movements, load_profile, load_wallet_configs,
};
use crate::session::Session;
use crate::utils::{
    fmt_money, id_for_category, maybe_print_json, month_end, month_of, parse_month, pretty_table,
    shift_month,
};
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

pub const HISTORY_MONTHS: i32 = 6;

pub fn handle(conn: &Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("dashboard", sub)) => print_dashboard(conn, session, sub)?,
        Some(("distribution", sub)) => distribution(conn, session, sub)?,
        Some(("explore", sub)) => explore(conn, session, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct HistoryPoint {
    pub month: String,
    pub net_worth: Decimal,
}

#[derive(Debug, Serialize)]
pub struct KindGroup {
    pub kind: AccountKind,
    pub accounts: usize,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WalletSpend {
    pub account: String,
    pub spent: Decimal,
    pub topup: Decimal,
    pub remaining: Decimal,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub month: String,
    pub currency: String,
    pub net_worth: Decimal,
    pub previous_net_worth: Decimal,
    pub variation: Decimal,
    pub variation_pct: Option<Decimal>,
    pub totals: Totals,
    pub savings_rate: Option<Decimal>,
    pub history: Vec<HistoryPoint>,
    pub by_kind: Vec<KindGroup>,
    pub wallets: Vec<WalletSpend>,
}

fn net_worth(balances: &std::collections::HashMap<i64, Decimal>) -> Decimal {
    balances.values().copied().sum()
}

/// Home-screen figures for the month containing `today`. Net worth only
/// counts active accounts.
pub fn dashboard(conn: &Connection, owner: &str, today: NaiveDate) -> Result<Dashboard> {
    let month = month_of(today);
    let currency = load_profile(conn, owner)?
        .map(|p| p.primary_currency)
        .unwrap_or_else(|| "EUR".into());
    let accounts = load_accounts(conn, owner, true)?;
    let all = load_movements(conn, owner, &MovementFilter::default())?;

    let current = account_balances(&accounts, &all, None);
    let net = net_worth(&current);
    let month_start = today.with_day(1).unwrap_or(today);
    let previous = net_worth(&account_balances(&accounts, &all, Some(month_start)));
    let variation = net - previous;
    let variation_pct = (!previous.is_zero())
        .then(|| (variation / previous.abs() * Decimal::ONE_HUNDRED).round_dp(1));

    let this_month: Vec<Movement> = all.iter().filter(|m| m.month == month).cloned().collect();
    let t = totals(&this_month);
    let savings_rate = (t.income > Decimal::ZERO)
        .then(|| (t.balance / t.income * Decimal::ONE_HUNDRED).round_dp(1));

    let mut history = Vec::new();
    for back in (0..HISTORY_MONTHS).rev() {
        let m = shift_month(today, back);
        let boundary = month_end(&m)? + Duration::days(1);
        history.push(HistoryPoint {
            net_worth: net_worth(&account_balances(&accounts, &all, Some(boundary))),
            month: m,
        });
    }

    let by_kind = AccountKind::ALL
        .iter()
        .filter_map(|kind| {
            let members: Vec<_> = accounts.iter().filter(|a| a.kind == *kind).collect();
            (!members.is_empty()).then(|| KindGroup {
                kind: *kind,
                accounts: members.len(),
                balance: members
                    .iter()
                    .map(|a| current.get(&a.id).copied().unwrap_or_default())
                    .sum(),
            })
        })
        .collect();

    let index = CatalogIndex::new(accounts.clone(), Vec::new());
    let wallets = load_wallet_configs(conn, owner)?
        .into_iter()
        .filter(|w| w.active && index.account(w.account_id).is_some())
        .map(|w| {
            let spent: Decimal = this_month
                .iter()
                .filter(|m| m.account_id == w.account_id && m.amount < Decimal::ZERO)
                .map(|m| m.amount.abs())
                .sum();
            WalletSpend {
                account: index.account_name(w.account_id).to_string(),
                spent,
                topup: w.monthly_topup,
                remaining: w.monthly_topup - spent,
            }
        })
        .collect();

    Ok(Dashboard {
        month,
        currency,
        net_worth: net,
        previous_net_worth: previous,
        variation,
        variation_pct,
        totals: t,
        savings_rate,
        history,
        by_kind,
        wallets,
    })
}

fn print_dashboard(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let d = dashboard(conn, &session.user_id, session.today)?;
    if maybe_print_json(sub.get_flag("json"), false, &d)? {
        return Ok(());
    }
    let ccy = d.currency.as_str();
    println!("Net worth   {}", fmt_money(&d.net_worth, ccy));
    println!(
        "Variation   {} ({}) since {}",
        fmt_money(&d.variation, ccy),
        d.variation_pct
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "n/a".into()),
        shift_month(session.today, 1)
    );
    println!(
        "{}  income {}  expenses {}  balance {}  savings {}",
        d.month,
        fmt_money(&d.totals.income, ccy),
        fmt_money(&d.totals.expenses, ccy),
        fmt_money(&d.totals.balance, ccy),
        d.savings_rate
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "n/a".into())
    );

    let rows = d
        .history
        .iter()
        .map(|h| vec![h.month.clone(), format!("{:.2}", h.net_worth)])
        .collect();
    println!("{}", pretty_table(&["Month", "Net worth"], rows));

    let rows = d
        .by_kind
        .iter()
        .map(|g| {
            vec![
                g.kind.to_string(),
                g.accounts.to_string(),
                format!("{:.2}", g.balance),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Kind", "Accounts", "Balance"], rows));

    if !d.wallets.is_empty() {
        let rows = d
            .wallets
            .iter()
            .map(|w| {
                vec![
                    w.account.clone(),
                    format!("{:.2}", w.spent),
                    format!("{:.2}", w.topup),
                    format!("{:.2}", w.remaining),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Wallet", "Spent", "Top-up", "Remaining"], rows)
        );
    }
    Ok(())
}

fn share(total: Decimal, of: Decimal) -> String {
    if of.is_zero() {
        return "-".into();
    }
    format!("{:.1}%", (total.abs() / of * Decimal::ONE_HUNDRED).round_dp(1))
}

fn print_buckets(buckets: &[Bucket], label: &str) {
    let sum: Decimal = buckets.iter().map(|b| b.total.abs()).sum();
    let rows = buckets
        .iter()
        .map(|b| vec![b.name.clone(), format!("{:.2}", b.total), share(b.total, sum)])
        .collect();
    println!("{}", pretty_table(&[label, "Total", "Share"], rows));
}

fn distribution(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.as_str();
    let month = match sub.get_one::<String>("month") {
        Some(m) => parse_month(m)?,
        None => session.current_month(),
    };
    let index = CatalogIndex::load(conn, owner)?;
    let mut movements = load_movements(conn, owner, &MovementFilter::month(&month))?;
    let (buckets, label) = match sub.get_one::<String>("category") {
        Some(name) => {
            let id = id_for_category(conn, owner, name)?;
            movements.retain(|m| m.category_id == id);
            (by_subcategory(&movements, &index), "Subcategory")
        }
        None => (by_category(&movements, &index), "Category"),
    };
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &buckets)? {
        return Ok(());
    }
    print_buckets(&buckets, label);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct Exploration {
    pub period: Period,
    pub flow: Flow,
    pub totals: Totals,
    pub distribution: Vec<Bucket>,
    pub evolution: Vec<Bucket>,
}

/// Period analysis: movements in the period's range, narrowed by flow and
/// optionally by category, reduced into a distribution and a time series.
pub fn exploration(
    conn: &Connection,
    owner: &str,
    period: Period,
    flow: Flow,
    category: Option<i64>,
) -> Result<Exploration> {
    let (from, to) = period.range()?;
    let index = CatalogIndex::load(conn, owner)?;
    let fetched = load_movements(
        conn,
        owner,
        &MovementFilter {
            from: Some(from),
            to: Some(to),
            category_id: category,
            ..MovementFilter::default()
        },
    )?;
    let mut movements = filter_by_flow(fetched, flow);
    if let Some(id) = category {
        movements.retain(|m| m.category_id == id);
    }
    Ok(Exploration {
        period,
        flow,
        totals: totals(&movements),
        distribution: explore_distribution(&movements, &index, category),
        evolution: evolution(&movements, period),
    })
}

fn explore(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let owner = session.user_id.as_str();
    let year = sub
        .get_one::<i32>("year")
        .copied()
        .unwrap_or(session.today.year());
    let month = sub
        .get_one::<u32>("month_of_year")
        .copied()
        .or(Some(session.today.month()));
    let quarter = sub
        .get_one::<u32>("quarter")
        .copied()
        .or(Some((session.today.month() - 1) / 3 + 1));
    let period = Period::parse(sub.get_one::<String>("period").unwrap(), year, month, quarter)?;
    let flow: Flow = sub.get_one::<String>("flow").unwrap().parse()?;
    let category = sub
        .get_one::<String>("category")
        .map(|c| id_for_category(conn, owner, c))
        .transpose()?;

    let ex = exploration(conn, owner, period, flow, category)?;
    if maybe_print_json(sub.get_flag("json"), false, &ex)? {
        return Ok(());
    }
    println!(
        "Income {:.2}  Expenses {:.2}  Balance {:.2}",
        ex.totals.income, ex.totals.expenses, ex.totals.balance
    );
    print_buckets(
        &ex.distribution,
        if category.is_some() { "Subcategory" } else { "Category" },
    );
    let rows = ex
        .evolution
        .iter()
        .map(|b| vec![b.name.clone(), b.key.clone(), format!("{:.2}", b.total)])
        .collect();
    println!("{}", pretty_table(&["Bucket", "From", "Total"], rows));
    Ok(())
}
