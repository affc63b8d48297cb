//! Data structures for the truth-staking and verdict consensus engine.
//!
//! This crate holds the domain entities (news items, stakes, witness
//! statements, verdicts), the `Drops` minor value unit, and the two
//! append-only trackers that enforce the escrow and testimony invariants:
//! the [`staking::StakeLedger`] and the [`witnesses::WitnessRegistry`].

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

/// Minor value unit of the settlement ledger
pub mod drops;
/// Staking functionality: per-item stake logs, escrow and payout rules
pub mod staking;
/// Core domain types: identities, news items, verdicts
pub mod types;
/// Witness testimony registry
pub mod witnesses;
