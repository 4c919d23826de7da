//! Entitlement service.
//!
//! Owns every read-modify-write on [`UserEntitlement`] records. Operations on
//! the same user are serialized through a per-user async lock, so the
//! check-then-increment sequence of [`EntitlementService::consume`] is atomic
//! within one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{OwnedMutexGuard, RwLock};

use super::quota::{self, QuotaDecision, QuotaError, Remaining, UsageReceipt};
use crate::models::entitlement::{SubscriptionPlan, Tier, UserEntitlement};

/// Lock table size above which idle entries are dropped.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Durable or in-memory mapping from user id to entitlement state.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<UserEntitlement>, StoreError>;

    /// Inserts or replaces the record for `entitlement.user_id`.
    async fn save(&self, entitlement: &UserEntitlement) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Process-local store. State is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryEntitlementStore {
    records: RwLock<HashMap<String, UserEntitlement>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserEntitlement>, StoreError> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn save(&self, entitlement: &UserEntitlement) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(entitlement.user_id.clone(), entitlement.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One async mutex per key, created on demand.
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                // Only the table holds an idle lock.
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialInfo {
    pub days_left: i64,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicInfo {
    pub weekly_analyses_left: u32,
}

/// Subscription overview reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatus {
    /// One of `pro`, `basic`, `free-trial`, `free`.
    pub subscription: &'static str,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_info: Option<TrialInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_info: Option<BasicInfo>,
}

pub struct EntitlementService {
    store: Arc<dyn EntitlementStore>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl EntitlementService {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn EntitlementStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn EntitlementStore> {
        &self.store
    }

    /// Loads the record, creating and persisting it (which starts the
    /// trial) on first observation. Caller must hold the user's lock.
    async fn load_or_start(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserEntitlement, StoreError> {
        if let Some(existing) = self.store.load(user_id).await? {
            return Ok(existing);
        }
        let created = UserEntitlement::new(user_id, now);
        self.store.save(&created).await?;
        tracing::info!(
            user_id = %user_id,
            trial_ends_at = %created.trial_ends_at(),
            "Started trial for new user"
        );
        Ok(created)
    }

    /// Evaluates the quota without consuming. Starts the trial on first sight.
    pub async fn check(&self, user_id: &str) -> Result<QuotaDecision, EntitlementError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();
        let entitlement = self.load_or_start(user_id, now).await?;
        let decision = quota::evaluate(&entitlement, now);
        record_decision(&decision);
        Ok(decision)
    }

    /// Atomically checks and consumes one analysis unit.
    pub async fn consume(&self, user_id: &str) -> Result<UsageReceipt, EntitlementError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();
        let mut entitlement = self.load_or_start(user_id, now).await?;

        match quota::consume(&mut entitlement, now) {
            Ok(receipt) => {
                self.store.save(&entitlement).await?;
                metrics::counter!(
                    "quota_consumptions_total",
                    "tier" => entitlement.tier(now).as_str(),
                    "outcome" => "consumed"
                )
                .increment(1);
                tracing::debug!(
                    user_id = %user_id,
                    remaining = ?receipt.remaining,
                    "Consumed analysis unit"
                );
                Ok(receipt)
            }
            Err(e) => {
                metrics::counter!(
                    "quota_consumptions_total",
                    "tier" => entitlement.tier(now).as_str(),
                    "outcome" => "rejected"
                )
                .increment(1);
                tracing::info!(user_id = %user_id, error = %e, "Quota exceeded");
                Err(e.into())
            }
        }
    }

    /// Returns a consumed unit after the analysis it paid for failed.
    pub async fn refund(
        &self,
        user_id: &str,
        receipt: &UsageReceipt,
    ) -> Result<(), EntitlementError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();
        if let Some(mut entitlement) = self.store.load(user_id).await? {
            quota::refund(&mut entitlement, receipt, now);
            self.store.save(&entitlement).await?;
            tracing::info!(user_id = %user_id, "Refunded analysis unit");
        }
        Ok(())
    }

    /// Reports the subscription overview. Starts the trial on first sight
    /// and records the email when one is supplied.
    pub async fn subscription_status(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<SubscriptionStatus, EntitlementError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();
        let mut entitlement = self.load_or_start(user_id, now).await?;

        if let Some(email) = email.filter(|e| !e.is_empty()) {
            if entitlement.email.as_deref() != Some(email) {
                entitlement.email = Some(email.to_string());
                entitlement.updated_at = now;
                self.store.save(&entitlement).await?;
            }
        }

        let tier = entitlement.tier(now);
        let status = match tier {
            Tier::AdminOverride => SubscriptionStatus {
                subscription: "pro",
                is_admin: true,
                trial_info: None,
                basic_info: None,
            },
            Tier::Pro => SubscriptionStatus {
                subscription: "pro",
                is_admin: false,
                trial_info: None,
                basic_info: None,
            },
            Tier::Basic => {
                let left = match quota::evaluate(&entitlement, now).remaining {
                    Remaining::Limited(n) => n,
                    Remaining::Unbounded => quota::BASIC_WEEKLY_LIMIT,
                };
                SubscriptionStatus {
                    subscription: "basic",
                    is_admin: false,
                    trial_info: None,
                    basic_info: Some(BasicInfo {
                        weekly_analyses_left: left,
                    }),
                }
            }
            Tier::Trial => {
                let end_date = entitlement.trial_ends_at();
                SubscriptionStatus {
                    subscription: "free-trial",
                    is_admin: false,
                    trial_info: Some(TrialInfo {
                        days_left: (end_date - now).num_days().max(0),
                        end_date,
                    }),
                    basic_info: None,
                }
            }
            Tier::Free => SubscriptionStatus {
                subscription: "free",
                is_admin: false,
                trial_info: None,
                basic_info: None,
            },
        };
        Ok(status)
    }

    /// Applies a plan confirmed by the payment provider.
    ///
    /// Plans only move upward: a plan at or below the current one leaves
    /// the record untouched and returns it as stored.
    pub async fn set_plan(
        &self,
        user_id: &str,
        plan: SubscriptionPlan,
    ) -> Result<UserEntitlement, EntitlementError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();
        let mut entitlement = self.load_or_start(user_id, now).await?;

        if let Some(current) = entitlement.plan {
            if plan.rank() <= current.rank() {
                tracing::info!(
                    user_id = %user_id,
                    current = %current,
                    requested = %plan,
                    "Plan change ignored, not an upgrade"
                );
                return Ok(entitlement);
            }
        }

        let previous = entitlement.plan;
        entitlement.plan = Some(plan);
        entitlement.updated_at = now;
        self.store.save(&entitlement).await?;
        tracing::info!(
            user_id = %user_id,
            previous = ?previous,
            plan = %plan,
            "Subscription plan updated"
        );
        Ok(entitlement)
    }

    /// Sets the admin override flag.
    pub async fn grant_admin(&self, user_id: &str) -> Result<(), EntitlementError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();
        let mut entitlement = self.load_or_start(user_id, now).await?;
        if !entitlement.is_admin {
            entitlement.is_admin = true;
            entitlement.updated_at = now;
            self.store.save(&entitlement).await?;
            tracing::warn!(user_id = %user_id, "Admin override granted");
        }
        Ok(())
    }

    /// Reads the admin flag without creating state.
    pub async fn is_admin(&self, user_id: &str) -> Result<bool, EntitlementError> {
        Ok(self
            .store
            .load(user_id)
            .await?
            .map(|e| e.is_admin)
            .unwrap_or(false))
    }

    /// Effective tier of a known user, without creating state.
    pub async fn tier(&self, user_id: &str) -> Result<Option<Tier>, EntitlementError> {
        let now = self.clock.now();
        Ok(self.store.load(user_id).await?.map(|e| e.tier(now)))
    }
}

fn record_decision(decision: &QuotaDecision) {
    metrics::counter!(
        "quota_decisions_total",
        "tier" => decision.tier.as_str(),
        "allowed" => if decision.allowed { "true" } else { "false" }
    )
    .increment(1);
}
