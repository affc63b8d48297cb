//! Error type definitions for the reputation module.

use std::fmt;

use thiserror::Error;

use crate::ledger::SettlementKey;

/// A settlement's reputation deltas were already applied: applying them a
/// second time would double-count every participant's reward or penalty,
/// so the ledger refuses and the caller treats the call as a no-op retry.
#[derive(Debug, PartialEq, Eq, Error)]
#[error("reputation deltas for settlement {key:?} have already been applied")]
pub struct AlreadyApplied<I>
where
    I: fmt::Debug,
{
    /// The settlement key that was replayed
    pub key: SettlementKey<I>,
}
