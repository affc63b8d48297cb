//! Contract against the external settlement ledger.
//!
//! The engine never signs or broadcasts transactions itself. It consumes
//! a [`LedgerGateway`] to check the on-ledger facts of an escrow
//! transaction before accepting a stake, and to dispatch payout
//! transactions at settlement. The real signing flow lives behind the
//! gateway; tests plug in an in-memory double.

use thiserror::Error;
use veridict_data_structures::{
    drops::Drops,
    types::{Identity, TxRef},
};

/// The on-ledger facts of an escrow transaction, as reported by the
/// gateway. The engine compares them against what the staker claims.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxProof {
    /// Whether the transaction is confirmed in a validated ledger
    pub confirmed: bool,
    /// The amount the transaction moved
    pub amount: Drops,
    /// The account the amount came from
    pub sender: Identity,
}

/// Errors reported by a ledger gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The payout account does not hold enough funds
    #[error("the payout account does not hold enough funds")]
    InsufficientFunds,
    /// The ledger could not be reached; worth retrying
    #[error("the settlement ledger is unreachable")]
    NetworkUnavailable,
    /// The referenced transaction does not exist on the ledger
    #[error("transaction {0} is unknown to the ledger")]
    UnknownTransaction(TxRef),
}

impl GatewayError {
    /// Whether the failed call may succeed if simply repeated later
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::NetworkUnavailable)
    }
}

/// Access to the external settlement ledger.
pub trait LedgerGateway {
    /// Look up the on-ledger facts of a transaction reference
    fn verify_transaction(&self, tx: &TxRef) -> Result<TxProof, GatewayError>;

    /// Dispatch one payout, returning the reference of the resulting
    /// ledger transaction
    fn submit_payout(&self, destination: &Identity, amount: Drops) -> Result<TxRef, GatewayError>;
}

// Engines are commonly shared behind an `Arc` together with their
// gateway; forward the contract through it.
impl<G: LedgerGateway + ?Sized> LedgerGateway for std::sync::Arc<G> {
    fn verify_transaction(&self, tx: &TxRef) -> Result<TxProof, GatewayError> {
        (**self).verify_transaction(tx)
    }

    fn submit_payout(&self, destination: &Identity, amount: Drops) -> Result<TxRef, GatewayError> {
        (**self).submit_payout(destination, amount)
    }
}
