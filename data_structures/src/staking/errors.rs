use std::sync::PoisonError;

use thiserror::Error;

use crate::{
    drops::Drops,
    types::{ItemId, TxRef},
};

/// All errors related to the staking functionality.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StakeError {
    /// The committed amount is zero. Stakes must carry value.
    #[error("stake amount must be greater than zero")]
    InvalidAmount,
    /// The transaction reference was already used by an accepted stake.
    #[error("transaction {tx_ref} has already been recorded by a previous stake")]
    DuplicateTransaction {
        /// The offending transaction reference
        tx_ref: TxRef,
    },
    /// The item no longer accepts stakes because it has been settled.
    #[error("item {item} is closed to new stakes")]
    ItemClosed {
        /// The item being staked on
        item: ItemId,
    },
    /// The item is not registered in the ledger.
    #[error("item {item} is not registered in the stake ledger")]
    ItemNotFound {
        /// The unknown item
        item: ItemId,
    },
    /// A second settlement was attempted for the same item.
    #[error("item {item} has already been settled")]
    AlreadySettled {
        /// The already settled item
        item: ItemId,
    },
    /// The computed payouts do not add up to the escrowed pool. This is a
    /// bug, not a user error: settlement for the item must halt.
    #[error(
        "payout conservation mismatch for item {item}: pool holds {pool} but payouts sum to {payouts}"
    )]
    ConservationMismatch {
        /// The item being settled
        item: ItemId,
        /// Total value held in escrow
        pool: Drops,
        /// Sum of the computed payouts
        payouts: Drops,
    },
    /// Tried to obtain a lock on a poisoned piece of data.
    #[error("tried to obtain a lock on a poisoned piece of data")]
    PoisonedLock,
}

impl<T> From<PoisonError<T>> for StakeError {
    fn from(_value: PoisonError<T>) -> Self {
        StakeError::PoisonedLock
    }
}
