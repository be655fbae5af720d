// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::commands::recurring::RecurringBanner;
use crate::commands::snapshots::{AutoSnapshotOutcome, generate_auto};
use crate::errors::PocketError;
use crate::queries::load_profile;
use crate::utils::{get_setting, month_of};

pub const DEFAULT_USER: &str = "local";
pub const CURRENT_USER_KEY: &str = "current_user";

/// State scoped to one invocation: who is acting, what "today" is, and the
/// once-per-session guards. Nothing here outlives the process.
#[derive(Debug)]
pub struct Session {
    pub user_id: String,
    pub today: NaiveDate,
    auto_snapshot_ran: bool,
    banners: HashMap<String, RecurringBanner>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            today,
            auto_snapshot_ran: false,
            banners: HashMap::new(),
        }
    }

    /// Resolves the acting user: explicit flag/env value, then the stored
    /// `current_user` setting, then [`DEFAULT_USER`].
    pub fn resolve(conn: &Connection, explicit: Option<&str>, today: NaiveDate) -> Result<Self> {
        let user = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(u) => u.to_string(),
            None => get_setting(conn, CURRENT_USER_KEY)?.unwrap_or_else(|| DEFAULT_USER.into()),
        };
        Ok(Self::new(user, today))
    }

    pub fn current_month(&self) -> String {
        month_of(self.today)
    }

    pub fn auto_snapshot_ran(&self) -> bool {
        self.auto_snapshot_ran
    }

    /// Runs the monthly snapshot generator at most once per session. Failures
    /// are logged and swallowed; the caller's command goes on regardless.
    pub fn run_auto_snapshot(&mut self, conn: &Connection) -> Option<AutoSnapshotOutcome> {
        if self.auto_snapshot_ran {
            return None;
        }
        self.auto_snapshot_ran = true;
        match generate_auto(conn, &self.user_id, self.today) {
            Ok(outcome) => {
                info!(user = %self.user_id, ?outcome, "auto snapshot");
                Some(outcome)
            }
            Err(err) => {
                warn!(user = %self.user_id, error = %err, "auto snapshot failed");
                None
            }
        }
    }

    /// The recurring-generation banner for `month`, created idle on first use.
    pub fn banner(&mut self, month: &str) -> &mut RecurringBanner {
        self.banners
            .entry(month.to_string())
            .or_insert_with(|| RecurringBanner::new(month))
    }

    /// Route guard: users must finish onboarding before using the ledger.
    pub fn require_onboarded(&self, conn: &Connection) -> Result<()> {
        let done = load_profile(conn, &self.user_id)?
            .map(|p| p.onboarding_completed)
            .unwrap_or(false);
        if !done {
            return Err(PocketError::NotOnboarded {
                user: self.user_id.clone(),
            }
            .into());
        }
        Ok(())
    }
}
