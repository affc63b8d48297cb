//! Reputation engine
//!
//! Reputation is tracked as an append-only log of deltas per identity with
//! a derived current value, so that the reputation effect of any single
//! settlement is independently auditable, and reversible if an invariant
//! violation is discovered after the fact.

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

pub mod ledger;
pub use ledger::{
    scaled_delta, DeltaCause, ReputationDelta, ReputationLedger, SettlementKey, MAX_REPUTATION,
    NEUTRAL_REPUTATION,
};

/// Module containing error definitions
pub mod error;
