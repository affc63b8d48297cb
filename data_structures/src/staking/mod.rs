//! Staking functionality.
//!
//! Stakes are value commitments predicting TRUE or FALSE for a news item.
//! They are recorded append-only into a per-item log and held in escrow
//! until the verdict engine settles the item, at which point the losing
//! pool is distributed pro rata among the winning stakes.

mod errors;
mod ledger;
mod stake;

pub use errors::StakeError;
pub use ledger::StakeLedger;
pub use stake::{PayoutInstruction, Stake, StakeId};

/// Result type for stake ledger operations
pub type StakesResult<T> = Result<T, StakeError>;
