// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use thiserror::Error;

/// One failed rule on one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every failed rule of a single form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), PocketError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PocketError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum PocketError {
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),
    #[error("Category '{name}' has {count} movements; reassign or delete them first")]
    CategoryHasMovements { name: String, count: i64 },
    #[error("Category '{name}' has subcategories; delete them first")]
    CategoryHasChildren { name: String },
    #[error("Category '{name}' is used by {count} recurring templates")]
    CategoryHasTemplates { name: String, count: i64 },
    #[error("Category '{name}' is used by {count} movements or templates; its parent and kind are fixed")]
    CategoryInUse { name: String, count: i64 },
    #[error("Account '{name}' has {count} movements; pass --cascade to delete them too")]
    AccountHasMovements { name: String, count: i64 },
    #[error("No recurring generation on offer for {month}")]
    BannerNotOffered { month: String },
    #[error("Onboarding not completed for user '{user}'; run `pocketpal onboard` first")]
    NotOnboarded { user: String },
    #[error("{what} '{key}' not found")]
    NotFound { what: &'static str, key: String },
}
