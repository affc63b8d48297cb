//! Verdict engine node
//!
//! The embeddable core of the truth-staking service: item lifecycle,
//! stake and testimony intake, resolution, settlement through a ledger
//! gateway, and reputation bookkeeping.

#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

/// The verdict engine and its public API
pub mod engine;
/// Module containing error definitions
pub mod error;
/// Contract against the external settlement ledger
pub mod gateway;

pub use crate::{
    engine::{Evaluation, ReputationRecord, VerdictEngine},
    error::{NodeError, NodeResult},
    gateway::{GatewayError, LedgerGateway, TxProof},
};
