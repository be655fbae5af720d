// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Reductions over an already fetched and filtered movement list. Nothing
//! here touches the store; every view is recomputed from scratch.

use anyhow::{Result, anyhow};
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::Movement;
use crate::queries::CatalogIndex;
use crate::utils::days_in_month;

pub const NONE_KEY: &str = "none";
pub const NONE_LABEL: &str = "No subcategory";
pub const OTHER_KEY: &str = "other";
pub const OTHER_LABEL: &str = "Other";
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
}

pub fn totals(movements: &[Movement]) -> Totals {
    let income: Decimal = movements
        .iter()
        .filter(|m| m.amount > Decimal::ZERO)
        .map(|m| m.amount)
        .sum();
    let expenses: Decimal = movements
        .iter()
        .filter(|m| m.amount < Decimal::ZERO)
        .map(|m| m.amount.abs())
        .sum();
    Totals {
        income,
        expenses,
        balance: income - expenses,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub key: String,
    pub name: String,
    pub total: Decimal,
}

/// Insertion-ordered `key -> running total` accumulator.
#[derive(Default)]
struct Accumulator {
    order: Vec<Bucket>,
    slots: HashMap<String, usize>,
}

impl Accumulator {
    fn add(&mut self, key: String, name: &str, amount: Decimal) {
        match self.slots.get(&key) {
            Some(&i) => self.order[i].total += amount,
            None => {
                self.slots.insert(key.clone(), self.order.len());
                self.order.push(Bucket {
                    key,
                    name: name.to_string(),
                    total: amount,
                });
            }
        }
    }

    fn sorted_by_abs(self) -> Vec<Bucket> {
        let mut out = self.order;
        out.sort_by(|a, b| b.total.abs().cmp(&a.total.abs()));
        out
    }
}

/// Signed totals per top-level category. Movements filed under an unknown
/// category or directly under a subcategory are left out.
pub fn by_category(movements: &[Movement], index: &CatalogIndex) -> Vec<Bucket> {
    let mut acc = Accumulator::default();
    for m in movements {
        let Some(cat) = index.category(m.category_id) else {
            continue;
        };
        if cat.is_subcategory() {
            continue;
        }
        acc.add(cat.id.to_string(), &cat.name, m.amount);
    }
    acc.sorted_by_abs()
}

/// Signed totals per subcategory, with a `none` bucket for movements that
/// have no subcategory.
pub fn by_subcategory(movements: &[Movement], index: &CatalogIndex) -> Vec<Bucket> {
    let mut acc = Accumulator::default();
    for m in movements {
        match m.subcategory_id {
            Some(sub_id) => {
                let Some(sub) = index.category(sub_id) else {
                    continue;
                };
                acc.add(sub.id.to_string(), &sub.name, m.amount);
            }
            None => acc.add(NONE_KEY.to_string(), NONE_LABEL, m.amount),
        }
    }
    acc.sorted_by_abs()
}

fn top_with_other(mut sorted: Vec<Bucket>) -> Vec<Bucket> {
    if sorted.len() <= TOP_N {
        return sorted;
    }
    let rest = sorted.split_off(TOP_N);
    let other: Decimal = rest.iter().map(|b| b.total).sum();
    if other > Decimal::ZERO {
        sorted.push(Bucket {
            key: OTHER_KEY.to_string(),
            name: OTHER_LABEL.to_string(),
            total: other,
        });
    }
    sorted
}

/// Absolute-value distribution: per category, or per subcategory of the
/// filtered category. Only the five largest buckets survive; the long tail
/// is folded into "Other".
pub fn explore_distribution(
    movements: &[Movement],
    index: &CatalogIndex,
    category_filter: Option<i64>,
) -> Vec<Bucket> {
    let mut acc = Accumulator::default();
    for m in movements {
        let amount = m.amount.abs();
        if category_filter.is_none() {
            let Some(cat) = index.category(m.category_id) else {
                continue;
            };
            acc.add(cat.id.to_string(), &cat.name, amount);
        } else {
            match m.subcategory_id.and_then(|id| index.category(id)) {
                Some(sub) => acc.add(sub.id.to_string(), &sub.name, amount),
                None => acc.add(NONE_KEY.to_string(), NONE_LABEL, amount),
            }
        }
    }
    top_with_other(acc.sorted_by_abs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Flow {
    Expenses,
    Income,
    All,
}

impl std::str::FromStr for Flow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "expenses" => Ok(Flow::Expenses),
            "income" => Ok(Flow::Income),
            "all" => Ok(Flow::All),
            other => Err(anyhow!("Unknown flow '{}' (use expenses|income|all)", other)),
        }
    }
}

pub fn filter_by_flow(movements: Vec<Movement>, flow: Flow) -> Vec<Movement> {
    match flow {
        Flow::All => movements,
        Flow::Expenses => movements
            .into_iter()
            .filter(|m| m.amount < Decimal::ZERO)
            .collect(),
        Flow::Income => movements
            .into_iter()
            .filter(|m| m.amount > Decimal::ZERO)
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Period {
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year(i32),
}

impl Period {
    pub fn parse(kind: &str, year: i32, month: Option<u32>, quarter: Option<u32>) -> Result<Self> {
        let p = match kind.trim().to_lowercase().as_str() {
            "month" => Period::Month {
                year,
                month: month.ok_or_else(|| anyhow!("--month-of-year is required"))?,
            },
            "quarter" => Period::Quarter {
                year,
                quarter: quarter.ok_or_else(|| anyhow!("--quarter is required"))?,
            },
            "year" => Period::Year(year),
            other => return Err(anyhow!("Unknown period '{}' (use month|quarter|year)", other)),
        };
        p.range()?;
        Ok(p)
    }

    /// First and last day, both inclusive.
    pub fn range(&self) -> Result<(NaiveDate, NaiveDate)> {
        let (year, first_month, months) = match *self {
            Period::Month { year, month } => (year, month, 1),
            Period::Quarter { year, quarter } => {
                if !(1..=4).contains(&quarter) {
                    return Err(anyhow!("Quarter must be between 1 and 4"));
                }
                (year, (quarter - 1) * 3 + 1, 3)
            }
            Period::Year(year) => (year, 1, 12),
        };
        let last_month = first_month + months - 1;
        let start = NaiveDate::from_ymd_opt(year, first_month, 1)
            .ok_or_else(|| anyhow!("Invalid period {:?}", self))?;
        let end = NaiveDate::from_ymd_opt(year, last_month, days_in_month(year, last_month))
            .ok_or_else(|| anyhow!("Invalid period {:?}", self))?;
        Ok((start, end))
    }
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b").to_string())
        .unwrap_or_default()
}

fn month_bucket(movements: &[Movement], year: i32, month: u32) -> Bucket {
    let total = movements
        .iter()
        .filter(|m| m.date.year() == year && m.date.month() == month)
        .map(|m| m.amount)
        .sum();
    let name = month_label(year, month);
    Bucket {
        key: format!("{}-{:02}", year, month),
        name,
        total,
    }
}

/// Time buckets for the evolution chart: months for a year or quarter,
/// Monday-based weeks (at most five) for a month.
pub fn evolution(movements: &[Movement], period: Period) -> Vec<Bucket> {
    if movements.is_empty() {
        return Vec::new();
    }
    match period {
        Period::Year(year) => (1..=12).map(|m| month_bucket(movements, year, m)).collect(),
        Period::Quarter { year, quarter } => {
            let first = (quarter - 1) * 3 + 1;
            (first..first + 3)
                .map(|m| month_bucket(movements, year, m))
                .collect()
        }
        Period::Month { year, month } => {
            let Some(month_start) = NaiveDate::from_ymd_opt(year, month, 1) else {
                return Vec::new();
            };
            let back = month_start.weekday().num_days_from_monday() as i64;
            let mut week_start = month_start - Duration::days(back);
            let mut weeks = Vec::new();
            let mut n = 1;
            while n == 1 || (week_start.year() == year && week_start.month() == month) {
                let week_end = week_start + Duration::days(7);
                let total = movements
                    .iter()
                    .filter(|m| m.date >= week_start && m.date < week_end)
                    .map(|m| m.amount)
                    .sum();
                weeks.push(Bucket {
                    key: week_start.to_string(),
                    name: format!("W{}", n),
                    total,
                });
                week_start = week_end;
                n += 1;
                if n > 5 {
                    break;
                }
            }
            weeks
        }
    }
}
