//! Error type definitions for the verdict engine.

use std::sync::PoisonError;

use thiserror::Error;
use veridict_data_structures::{
    staking::StakeError,
    types::{ItemId, TxRef},
    witnesses::WitnessError,
};
use veridict_storage::error::StorageError;

use crate::gateway::GatewayError;

/// Errors surfaced by the public API of the verdict engine.
#[derive(Debug, Error)]
pub enum NodeError {
    /// An error of the stake ledger
    #[error(transparent)]
    Stake(#[from] StakeError),
    /// An error of the witness registry
    #[error(transparent)]
    Witness(#[from] WitnessError),
    /// An error of the ledger gateway
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// An error of the storage layer
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The item is not known to the engine
    #[error("item {item} is not known to the engine")]
    ItemNotFound {
        /// The unknown item
        item: ItemId,
    },
    /// The item no longer accepts submissions
    #[error("item {item} no longer accepts submissions")]
    ItemClosed {
        /// The closed item
        item: ItemId,
    },
    /// Another caller is already settling the item
    #[error("settlement of item {item} is already in progress")]
    SettlementInProgress {
        /// The item being settled
        item: ItemId,
    },
    /// The item has no settlement in progress to resume
    #[error("item {item} has no settlement in progress to resume")]
    NotSettling {
        /// The item
        item: ItemId,
    },
    /// Settlement of the item was halted after an invariant violation
    #[error("settlement of item {item} is halted pending operator intervention")]
    SettlementHalted {
        /// The halted item
        item: ItemId,
    },
    /// The escrow transaction is not confirmed on the ledger
    #[error("transaction {tx_ref} is not confirmed on the ledger")]
    UnconfirmedTransaction {
        /// The unconfirmed reference
        tx_ref: TxRef,
    },
    /// The on-ledger facts of the escrow transaction do not match the
    /// submitted stake
    #[error("the on-ledger amount or sender of transaction {tx_ref} does not match the stake")]
    TransactionMismatch {
        /// The mismatching reference
        tx_ref: TxRef,
    },
    /// Tried to obtain a lock on a poisoned piece of data
    #[error("tried to obtain a lock on a poisoned piece of data")]
    PoisonedLock,
}

impl<T> From<PoisonError<T>> for NodeError {
    fn from(_value: PoisonError<T>) -> Self {
        NodeError::PoisonedLock
    }
}

/// Result type for verdict engine operations
pub type NodeResult<T> = Result<T, NodeError>;
