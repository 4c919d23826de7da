//! Quota policy.
//!
//! Pure decision logic over a [`UserEntitlement`]: whether one more analysis
//! may run and what allowance remains. Consumption is strict: a unit is only
//! counted when it fits under the cap, so stored counters never exceed it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::models::entitlement::{iso_week_key, DailyUsage, Tier, UserEntitlement};

/// Analyses per UTC day while the trial is active.
pub const TRIAL_DAILY_LIMIT: u32 = 3;

/// Analyses per ISO week on the basic plan.
pub const BASIC_WEEKLY_LIMIT: u32 = 10;

/// Remaining allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Limited(u32),
    Unbounded,
}

impl Remaining {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Remaining::Limited(0))
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Limited(n) => serializer.serialize_u32(*n),
            Remaining::Unbounded => serializer.serialize_str("unlimited"),
        }
    }
}

/// Outcome of evaluating the policy for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    pub tier: Tier,
    pub allowed: bool,
    pub remaining: Remaining,
}

/// Counter window a consumed unit was charged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageWindow {
    Daily(NaiveDate),
    Weekly(String),
    Unmetered,
}

/// Proof of one consumed unit, used to refund it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReceipt {
    pub window: UsageWindow,
    pub remaining: Remaining,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("Analysis quota exhausted for {tier} tier")]
    Exceeded { tier: Tier },
}

/// Evaluates the policy without changing state.
pub fn evaluate(entitlement: &UserEntitlement, now: DateTime<Utc>) -> QuotaDecision {
    let tier = entitlement.tier(now);
    let remaining = match tier {
        Tier::AdminOverride | Tier::Pro => Remaining::Unbounded,
        Tier::Basic => {
            let used = entitlement.weekly_count(&iso_week_key(now.date_naive()));
            Remaining::Limited(BASIC_WEEKLY_LIMIT.saturating_sub(used))
        }
        Tier::Trial => {
            let used = entitlement.daily_count(now.date_naive());
            Remaining::Limited(TRIAL_DAILY_LIMIT.saturating_sub(used))
        }
        Tier::Free => Remaining::Limited(0),
    };

    QuotaDecision {
        tier,
        allowed: !remaining.is_exhausted(),
        remaining,
    }
}

/// Charges one unit to the window the current tier is metered on.
pub fn consume(
    entitlement: &mut UserEntitlement,
    now: DateTime<Utc>,
) -> Result<UsageReceipt, QuotaError> {
    let decision = evaluate(entitlement, now);
    if !decision.allowed {
        return Err(QuotaError::Exceeded {
            tier: decision.tier,
        });
    }

    let window = match decision.tier {
        Tier::Basic => {
            let key = iso_week_key(now.date_naive());
            *entitlement.weekly_usage.entry(key.clone()).or_insert(0) += 1;
            UsageWindow::Weekly(key)
        }
        Tier::Trial => {
            let today = now.date_naive();
            let count = entitlement.daily_count(today) + 1;
            entitlement.daily_usage = Some(DailyUsage { date: today, count });
            UsageWindow::Daily(today)
        }
        _ => UsageWindow::Unmetered,
    };
    entitlement.updated_at = now;

    let remaining = match decision.remaining {
        Remaining::Limited(n) => Remaining::Limited(n - 1),
        Remaining::Unbounded => Remaining::Unbounded,
    };

    Ok(UsageReceipt { window, remaining })
}

/// Returns a previously consumed unit to its window.
///
/// Refunds against a window that has since rolled over are ignored.
pub fn refund(entitlement: &mut UserEntitlement, receipt: &UsageReceipt, now: DateTime<Utc>) {
    match &receipt.window {
        UsageWindow::Daily(date) => {
            if let Some(usage) = entitlement.daily_usage.as_mut() {
                if usage.date == *date {
                    usage.count = usage.count.saturating_sub(1);
                }
            }
        }
        UsageWindow::Weekly(key) => {
            if let Some(count) = entitlement.weekly_usage.get_mut(key) {
                *count = count.saturating_sub(1);
            }
        }
        UsageWindow::Unmetered => return,
    }
    entitlement.updated_at = now;
}
