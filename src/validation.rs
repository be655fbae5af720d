// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Per-entity form rules, checked before anything is written.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::errors::{PocketError, ValidationErrors};
use crate::models::{AccountKind, CategoryKind, NewMovement};
use crate::queries::CatalogIndex;

pub const CONCEPT_MAX: usize = 200;
pub const NOTES_MAX: usize = 500;
pub const ACCOUNT_NAME_MAX: usize = 100;
pub const CATEGORY_NAME_MAX: usize = 50;
pub const DISPLAY_NAME_MAX: usize = 100;

static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());
static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());

fn check_text(
    errs: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    label: &str,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        errs.push(field, format!("{} is required", label));
    } else if len > max {
        errs.push(field, format!("{} cannot exceed {} characters", label, max));
    }
}

fn check_notes(errs: &mut ValidationErrors, notes: Option<&str>) {
    if notes.is_some_and(|n| n.chars().count() > NOTES_MAX) {
        errs.push(
            "notes",
            format!("Notes cannot exceed {} characters", NOTES_MAX),
        );
    }
}

fn check_amount(errs: &mut ValidationErrors, amount: Decimal) {
    if amount.is_zero() {
        errs.push("amount", "Amount cannot be 0");
    }
}

fn check_day(errs: &mut ValidationErrors, field: &'static str, day: u32) {
    if !(1..=31).contains(&day) {
        errs.push(field, "Day must be between 1 and 31");
    }
}

fn check_currency(errs: &mut ValidationErrors, currency: &str) {
    if !CURRENCY_RE.is_match(currency) {
        errs.push("currency", "Currency must be a 3-letter ISO code");
    }
}

fn check_color(errs: &mut ValidationErrors, color: &str) {
    if !COLOR_RE.is_match(color) {
        errs.push("color", format!("Invalid colour '{}', expected #RRGGBB", color));
    }
}

/// The category/subcategory pair of a movement or template must exist and
/// the subcategory must hang from the chosen category.
fn check_classification(
    errs: &mut ValidationErrors,
    index: &CatalogIndex,
    category_id: i64,
    subcategory_id: Option<i64>,
) {
    match index.category(category_id) {
        None => errs.push("category", "Select a category"),
        Some(cat) if cat.is_subcategory() => {
            errs.push("category", "Pick a top-level category; use subcategory for children")
        }
        Some(_) => {}
    }
    if let Some(sub_id) = subcategory_id {
        match index.category(sub_id) {
            Some(sub) if sub.parent_id == Some(category_id) => {}
            Some(_) => errs.push("subcategory", "Subcategory does not belong to the category"),
            None => errs.push("subcategory", "Unknown subcategory"),
        }
    }
}

pub fn validate_movement(m: &NewMovement, index: &CatalogIndex) -> Result<(), PocketError> {
    let mut errs = ValidationErrors::default();
    check_text(&mut errs, "concept", &m.concept, "Concept", CONCEPT_MAX);
    check_amount(&mut errs, m.amount);
    if index.account(m.account_id).is_none() {
        errs.push("account", "Select an account");
    }
    check_classification(&mut errs, index, m.category_id, m.subcategory_id);
    check_notes(&mut errs, m.notes.as_deref());
    errs.into_result()
}

#[derive(Debug, Clone)]
pub struct AccountForm {
    pub name: String,
    pub kind: AccountKind,
    pub currency: String,
    pub initial_balance: Decimal,
    pub color: String,
    pub monthly_topup: Option<Decimal>,
    pub topup_day: Option<u32>,
}

impl Default for AccountForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: AccountKind::Current,
            currency: "EUR".into(),
            initial_balance: Decimal::ZERO,
            color: "#3B82F6".into(),
            monthly_topup: None,
            topup_day: None,
        }
    }
}

pub fn validate_account(form: &AccountForm) -> Result<(), PocketError> {
    let mut errs = ValidationErrors::default();
    check_text(&mut errs, "name", &form.name, "Name", ACCOUNT_NAME_MAX);
    check_currency(&mut errs, &form.currency);
    check_color(&mut errs, &form.color);
    if let Some(topup) = form.monthly_topup {
        if topup <= Decimal::ZERO {
            errs.push("monthly_topup", "Top-up must be positive");
        }
        if form.kind != AccountKind::Wallet {
            errs.push("monthly_topup", "Only wallet accounts have a monthly top-up");
        }
    }
    if let Some(day) = form.topup_day {
        check_day(&mut errs, "topup_day", day);
    }
    errs.into_result()
}

#[derive(Debug, Clone)]
pub struct CategoryForm {
    pub name: String,
    pub kind: CategoryKind,
    pub parent_id: Option<i64>,
    pub icon: Option<String>,
    pub color: String,
}

/// `editing` is the id of the category being edited, if any.
pub fn validate_category(
    form: &CategoryForm,
    index: &CatalogIndex,
    editing: Option<i64>,
) -> Result<(), PocketError> {
    let mut errs = ValidationErrors::default();
    check_text(&mut errs, "name", &form.name, "Name", CATEGORY_NAME_MAX);
    check_color(&mut errs, &form.color);
    if let Some(pid) = form.parent_id {
        match index.category(pid) {
            None => errs.push("parent", "Unknown parent category"),
            Some(p) if p.is_subcategory() => {
                errs.push("parent", "Subcategories cannot have children")
            }
            Some(_) if editing == Some(pid) => {
                errs.push("parent", "A category cannot be its own parent")
            }
            Some(_) => {}
        }
        if let Some(id) = editing {
            if !index.children_of(id).is_empty() {
                errs.push("parent", "A category with subcategories cannot become one");
            }
        }
    }
    errs.into_result()
}

#[derive(Debug, Clone)]
pub struct TemplateForm {
    pub concept: String,
    pub amount: Decimal,
    pub day_of_month: u32,
    pub account_id: i64,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub notes: Option<String>,
    pub is_transfer: bool,
    pub destination_account_id: Option<i64>,
}

pub fn validate_template(form: &TemplateForm, index: &CatalogIndex) -> Result<(), PocketError> {
    let mut errs = ValidationErrors::default();
    check_text(&mut errs, "concept", &form.concept, "Concept", CONCEPT_MAX);
    check_amount(&mut errs, form.amount);
    check_day(&mut errs, "day_of_month", form.day_of_month);
    if index.account(form.account_id).is_none() {
        errs.push("account", "Select an account");
    }
    check_classification(&mut errs, index, form.category_id, form.subcategory_id);
    check_notes(&mut errs, form.notes.as_deref());
    if form.is_transfer {
        let ok = form
            .destination_account_id
            .is_some_and(|d| d != form.account_id && index.account(d).is_some());
        if !ok {
            errs.push(
                "destination_account",
                "Select a destination account different from the source account",
            );
        }
    }
    errs.into_result()
}

pub fn validate_display_name(name: Option<&str>) -> Result<(), PocketError> {
    let mut errs = ValidationErrors::default();
    if name.is_some_and(|n| n.trim().chars().count() > DISPLAY_NAME_MAX) {
        errs.push(
            "display_name",
            format!("Display name cannot exceed {} characters", DISPLAY_NAME_MAX),
        );
    }
    errs.into_result()
}

pub fn validate_currency(currency: &str) -> Result<(), PocketError> {
    let mut errs = ValidationErrors::default();
    check_currency(&mut errs, currency);
    errs.into_result()
}
