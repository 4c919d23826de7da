//! User entitlement domain model.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Length of the free trial that starts on first observation of a user.
pub const TRIAL_DAYS: i64 = 3;

/// Paid plan confirmed by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Basic,
    Pro,
}

impl SubscriptionPlan {
    /// Position in the upgrade order; plans only move to a higher rank.
    pub fn rank(self) -> u8 {
        match self {
            SubscriptionPlan::Basic => 1,
            SubscriptionPlan::Pro => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Pro => "pro",
        }
    }
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(SubscriptionPlan::Basic),
            "pro" => Ok(SubscriptionPlan::Pro),
            other => Err(format!("Unknown plan: {}", other)),
        }
    }
}

/// Effective tier of a user at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Trial,
    Free,
    Basic,
    Pro,
    AdminOverride,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Trial => "trial",
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::AdminOverride => "admin_override",
        }
    }

    /// Whether the tier is a paid plan or the admin override.
    pub fn is_paid(&self) -> bool {
        matches!(self, Tier::Basic | Tier::Pro | Tier::AdminOverride)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usage counter for a single UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub count: u32,
}

/// Stored entitlement and usage state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntitlement {
    pub user_id: String,
    pub email: Option<String>,
    pub plan: Option<SubscriptionPlan>,
    pub is_admin: bool,
    pub trial_started_at: DateTime<Utc>,
    /// Only the current day is kept; a different date means zero usage today.
    pub daily_usage: Option<DailyUsage>,
    /// ISO week key (see [`iso_week_key`]) to analyses consumed that week.
    pub weekly_usage: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserEntitlement {
    /// Creates the entitlement for a first-seen user, starting the trial now.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            plan: None,
            is_admin: false,
            trial_started_at: now,
            daily_usage: None,
            weekly_usage: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn trial_ends_at(&self) -> DateTime<Utc> {
        self.trial_started_at + Duration::days(TRIAL_DAYS)
    }

    pub fn trial_active(&self, now: DateTime<Utc>) -> bool {
        now < self.trial_ends_at()
    }

    /// Resolves the effective tier. The admin flag is checked first.
    pub fn tier(&self, now: DateTime<Utc>) -> Tier {
        if self.is_admin {
            return Tier::AdminOverride;
        }
        match self.plan {
            Some(SubscriptionPlan::Pro) => Tier::Pro,
            Some(SubscriptionPlan::Basic) => Tier::Basic,
            None if self.trial_active(now) => Tier::Trial,
            None => Tier::Free,
        }
    }

    pub fn daily_count(&self, today: NaiveDate) -> u32 {
        match self.daily_usage {
            Some(usage) if usage.date == today => usage.count,
            _ => 0,
        }
    }

    pub fn weekly_count(&self, week_key: &str) -> u32 {
        self.weekly_usage.get(week_key).copied().unwrap_or(0)
    }
}

/// Formats the ISO week of a date as `YYYY-Www`, keyed by ISO year.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}
