// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Current,
    Investment,
    Wallet,
}

impl AccountKind {
    pub const ALL: [AccountKind; 3] = [
        AccountKind::Current,
        AccountKind::Investment,
        AccountKind::Wallet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Current => "current",
            AccountKind::Investment => "investment",
            AccountKind::Wallet => "wallet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
    Investment,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
            CategoryKind::Investment => "investment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Manual,
    Auto,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Manual => "manual",
            SnapshotKind::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown {} '{}'", self.what, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for AccountKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current" => Ok(AccountKind::Current),
            "investment" => Ok(AccountKind::Investment),
            "wallet" => Ok(AccountKind::Wallet),
            other => Err(UnknownVariant {
                what: "account kind",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for CategoryKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            "investment" => Ok(CategoryKind::Investment),
            other => Err(UnknownVariant {
                what: "category kind",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for SnapshotKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(SnapshotKind::Manual),
            "auto" => Ok(SnapshotKind::Auto),
            other => Err(UnknownVariant {
                what: "snapshot kind",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub kind: AccountKind,
    pub currency: String,
    pub initial_balance: Decimal,
    pub color: String,
    pub active: bool,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub kind: CategoryKind,
    pub parent_id: Option<i64>,
    pub color: String,
    pub icon: Option<String>,
    pub position: i64,
}

impl Category {
    pub fn is_subcategory(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub owner: String,
    pub date: NaiveDate,
    pub concept: String,
    pub amount: Decimal,
    pub account_id: i64,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub notes: Option<String>,
    pub recurring: bool,
    pub template_id: Option<i64>,
    pub month: String, // YYYY-MM, derived from date
}

/// A movement that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub date: NaiveDate,
    pub concept: String,
    pub amount: Decimal,
    pub account_id: i64,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub notes: Option<String>,
    pub recurring: bool,
    pub template_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: i64,
    pub owner: String,
    pub concept: String,
    pub amount: Decimal,
    pub day_of_month: u32,
    pub account_id: i64,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub notes: Option<String>,
    pub active: bool,
    pub is_transfer: bool,
    pub destination_account_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub id: i64,
    pub owner: String,
    pub account_id: i64,
    pub monthly_topup: Decimal,
    pub topup_day: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetWorthSnapshot {
    pub id: i64,
    pub owner: String,
    pub month: String, // YYYY-MM
    pub account_id: i64,
    pub registered_balance: Option<Decimal>,
    pub calculated_balance: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    pub kind: SnapshotKind,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub primary_currency: String,
    pub default_account_id: Option<i64>,
    pub preferences: serde_json::Value,
    pub onboarding_completed: bool,
}

/// Partial-update marker: `Keep` leaves the stored value alone, `Set` writes
/// the given value (including `None`, which clears it).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Set(Option<T>),
}

impl<T> FieldUpdate<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, FieldUpdate::Set(_))
    }

    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Set(v) => v,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: FieldUpdate<String>,
    pub avatar_url: FieldUpdate<String>,
}
