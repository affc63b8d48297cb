use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    drops::Drops,
    types::{Identity, ItemId, Position, Timestamp, TxRef},
};

/// Identifier of a recorded stake
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct StakeId(pub u64);

impl fmt::Display for StakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stake-{}", self.0)
    }
}

/// A single value commitment on a news item. Immutable once recorded:
/// corrections are impossible, refunds only happen through settlement.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Stake {
    /// Identifier of this stake
    pub id: StakeId,
    /// The news item being staked on
    pub item: ItemId,
    /// Identity that committed the value
    pub staker: Identity,
    /// Predicted position
    pub position: Position,
    /// Committed amount, strictly positive
    pub amount: Drops,
    /// Reference of the ledger transaction that escrowed the amount
    pub tx_ref: TxRef,
    /// When the stake was accepted
    pub timestamp: Timestamp,
}

/// An instruction to pay an amount back to a participant, produced by
/// settlement. The caller dispatches these through the ledger gateway.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PayoutInstruction {
    /// The stake this payout corresponds to
    pub stake: StakeId,
    /// Identity to pay
    pub destination: Identity,
    /// Amount to pay; principal plus winnings, or a plain refund
    pub amount: Drops,
}
