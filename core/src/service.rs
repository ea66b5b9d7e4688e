//! The [`Courtside`] service: one entry point for every booking, match and
//! waitlist operation.
//!
//! Operations are split by component across `booking`, `matches` and
//! `waitlist`; this module holds the shared plumbing.

use crate::environment::{BookingPolicy, Environment};
use crate::error::Result;
use crate::outbox::Outbox;
use crate::store::{Store, Transaction};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Booking service.
#[derive(Clone)]
pub struct Courtside {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) env: Environment,
    pub(crate) policy: BookingPolicy,
    pub(crate) tz: Tz,
}

impl Courtside {
    /// Assemble the service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, env: Environment, policy: BookingPolicy, tz: Tz) -> Self {
        Self {
            store,
            env,
            policy,
            tz,
        }
    }

    /// Underlying store (readiness checks, admin tooling).
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Operator time zone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Today's date in the operator time zone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.tz).date_naive()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    /// Commit, then dispatch side effects. A failed commit drops the outbox.
    pub(crate) async fn finish(&self, tx: Box<dyn Transaction>, outbox: Outbox) -> Result<()> {
        tx.commit().await?;
        outbox.dispatch(self.store.as_ref(), &self.env).await;
        Ok(())
    }
}

impl std::fmt::Debug for Courtside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Courtside")
            .field("env", &self.env)
            .field("policy", &self.policy)
            .field("tz", &self.tz)
            .finish_non_exhaustive()
    }
}
