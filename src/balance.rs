// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::models::{Account, Movement};

/// Current balance of an account: its stored initial balance plus every
/// movement amount. Balances are always derived, never stored.
pub fn balance<'a, I>(initial: Decimal, movements: I) -> Decimal
where
    I: IntoIterator<Item = &'a Movement>,
{
    movements
        .into_iter()
        .fold(initial, |acc, m| acc + m.amount)
}

/// Balance as of `boundary`: only movements dated strictly before it count.
pub fn balance_before<'a, I>(initial: Decimal, movements: I, boundary: NaiveDate) -> Decimal
where
    I: IntoIterator<Item = &'a Movement>,
{
    balance(
        initial,
        movements.into_iter().filter(|m| m.date < boundary),
    )
}

/// Per-account balances in a single pass over `movements`. Movements of
/// accounts not in `accounts` are ignored.
pub fn account_balances(
    accounts: &[Account],
    movements: &[Movement],
    boundary: Option<NaiveDate>,
) -> HashMap<i64, Decimal> {
    let mut out: HashMap<i64, Decimal> = accounts
        .iter()
        .map(|a| (a.id, a.initial_balance))
        .collect();
    for m in movements {
        if boundary.is_some_and(|b| m.date >= b) {
            continue;
        }
        if let Some(bal) = out.get_mut(&m.account_id) {
            *bal += m.amount;
        }
    }
    out
}
