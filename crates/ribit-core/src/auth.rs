//! Authorization ledger with escalating denial tiers.
//!
//! Privileged commands are gated on an exact-match identity allow-list.
//! Every denied attempt is remembered per identity and the denial count
//! selects an escalating response tier:
//!
//! ```text
//! Unseen -> DeniedOnce -> DeniedTwice -> DeniedRepeatedly (absorbing)
//! ```
//!
//! A later successful authorization never clears denial history, and no
//! transition returns to `Unseen` -- the count is a reputation signal,
//! not a transient error state. The only way a record goes away is the
//! optional `denial_ttl`: when configured, a record idle past the TTL is
//! discarded before the next attempt, restarting the ladder at tier 1.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::warn;

use ribit_types::directive::Privilege;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The command may proceed.
    Authorized,
    /// Denied; `tier` is the identity's total denial count (1-based).
    /// Tiers 3 and above select the same response message.
    Denied {
        /// Denial count after this attempt.
        tier: u32,
    },
}

/// Denial history for one identity.
struct DenialRecord {
    denied_attempts: u32,
    last_denied_at: Instant,
}

/// Tracks privileged-command attempts per identity.
///
/// Membership checks are exact-match and case-sensitive on the full
/// identity string; there is no wildcard or domain-level matching.
/// Records are owned exclusively by the ledger -- callers only ever see
/// derived values.
pub struct AuthorizationLedger {
    authorized: HashSet<String>,
    records: RwLock<HashMap<String, DenialRecord>>,
    denial_ttl: Option<Duration>,
}

impl AuthorizationLedger {
    /// Create a ledger with the given authorized identities.
    pub fn new(authorized: impl IntoIterator<Item = String>) -> Self {
        Self {
            authorized: authorized.into_iter().collect(),
            records: RwLock::new(HashMap::new()),
            denial_ttl: None,
        }
    }

    /// Builder method to set the optional denial-record expiry.
    pub fn with_denial_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.denial_ttl = ttl;
        self
    }

    /// Whether `identity` is in the authorized set.
    pub fn is_authorized(&self, identity: &str) -> bool {
        self.authorized.contains(identity)
    }

    /// Authorize a command of the given privilege class.
    pub fn authorize(&self, identity: &str, privilege: Privilege) -> AuthOutcome {
        self.authorize_at(identity, privilege, Instant::now())
    }

    /// [`authorize`](Self::authorize) with an explicit clock, for tests.
    pub fn authorize_at(
        &self,
        identity: &str,
        privilege: Privilege,
        now: Instant,
    ) -> AuthOutcome {
        // Public commands are always authorized and leave no trace.
        if privilege == Privilege::Public {
            return AuthOutcome::Authorized;
        }

        // A success does not clear prior denial history.
        if self.authorized.contains(identity) {
            return AuthOutcome::Authorized;
        }

        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(ttl) = self.denial_ttl
            && records
                .get(identity)
                .is_some_and(|r| now.duration_since(r.last_denied_at) >= ttl)
        {
            records.remove(identity);
        }

        let record = records.entry(identity.to_owned()).or_insert(DenialRecord {
            denied_attempts: 0,
            last_denied_at: now,
        });
        record.denied_attempts = record.denied_attempts.saturating_add(1);
        record.last_denied_at = now;

        warn!(
            identity,
            attempts = record.denied_attempts,
            "unauthorized privileged command attempt"
        );

        AuthOutcome::Denied {
            tier: record.denied_attempts,
        }
    }

    /// Total denied attempts recorded for `identity`.
    pub fn denied_attempts(&self, identity: &str) -> u32 {
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.get(identity).map_or(0, |r| r.denied_attempts)
    }
}
