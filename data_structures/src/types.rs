use std::fmt;

use serde::{Deserialize, Serialize};

use crate::drops::Drops;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Maximum value of a reputation score or of the automated analysis score.
pub const MAX_SCORE: u8 = 100;

/// An opaque participant identity (an account address on the settlement
/// ledger, e.g. `rNa3BKePPaKxCFhaCRTRzXKGh4XkTYvATT`).
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Identity(String);

impl Identity {
    /// Wrap an address string as an identity
    pub fn new<S: Into<String>>(address: S) -> Self {
        Identity(address.into())
    }

    /// The address string within
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity::new(s)
    }
}

/// Identifier of a news item
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an identifier string
    pub fn new<S: Into<String>>(id: S) -> Self {
        ItemId(id.into())
    }

    /// The identifier string within
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::new(s)
    }
}

/// Reference to a transaction on the settlement ledger.
///
/// The engine treats transaction validity as an externally verified fact:
/// a reference is only accepted after the ledger gateway has confirmed it.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TxRef(String);

impl TxRef {
    /// Wrap a transaction hash string
    pub fn new<S: Into<String>>(hash: S) -> Self {
        TxRef(hash.into())
    }

    /// Build a reference from raw hash bytes, using the uppercase hex
    /// convention of the settlement ledger explorers.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        TxRef(hex::encode_upper(bytes))
    }

    /// The hash string within
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxRef {
    fn from(s: &str) -> Self {
        TxRef::new(s)
    }
}

/// The position a stake or a witness statement takes on a news item
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Position {
    /// The news item is truthful
    #[serde(rename = "TRUE")]
    True,
    /// The news item is misinformation
    #[serde(rename = "FALSE")]
    False,
}

impl Position {
    /// The opposing position
    pub fn opposite(self) -> Self {
        match self {
            Position::True => Position::False,
            Position::False => Position::True,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::True => f.write_str("TRUE"),
            Position::False => f.write_str("FALSE"),
        }
    }
}

/// Lifecycle state of a news item.
///
/// `Submitted → Active → Resolved | Expired`. The two last states are
/// terminal. The transient "resolving" condition while settlement is in
/// flight is a per-item guard inside the verdict engine, not a state of
/// its own.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ItemState {
    /// Just created, automated analysis score not yet attached
    #[serde(rename = "submitted")]
    Submitted,
    /// Open to stakes and testimony
    #[serde(rename = "active")]
    Active,
    /// A verdict has been reached and settled
    #[serde(rename = "resolved")]
    Resolved,
    /// The dispute deadline elapsed without enough evidence; stakes refunded
    #[serde(rename = "expired")]
    Expired,
}

impl ItemState {
    /// Whether this state admits no further transition
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Resolved | ItemState::Expired)
    }
}

/// A news item under public dispute.
///
/// Owned exclusively by the verdict engine: everything except `state` is
/// immutable after creation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NewsItem {
    /// Identifier of this item
    pub id: ItemId,
    /// Headline under dispute
    pub title: String,
    /// URL of the source article
    pub source_url: String,
    /// Identity that reported the item
    pub submitter: Identity,
    /// Automated content analysis score, 0 (fabricated) to 100 (truthful)
    pub analysis_score: u8,
    /// Short summary of why the item was reported
    pub summary: String,
    /// Links to supporting evidence
    pub evidence_links: Vec<String>,
    /// When the item was reported
    pub created_at: Timestamp,
    /// Current lifecycle state
    pub state: ItemState,
}

impl NewsItem {
    /// Create a news item in the `Submitted` state. The analysis score is
    /// capped at [`MAX_SCORE`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ItemId,
        title: String,
        source_url: String,
        submitter: Identity,
        analysis_score: u8,
        summary: String,
        evidence_links: Vec<String>,
        created_at: Timestamp,
    ) -> Self {
        NewsItem {
            id,
            title,
            source_url,
            submitter,
            analysis_score: analysis_score.min(MAX_SCORE),
            summary,
            evidence_links,
            created_at,
            state: ItemState::Submitted,
        }
    }
}

/// The side a news item is resolved to, if any
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum VerdictOutcome {
    /// Resolved as truthful
    #[serde(rename = "TRUE")]
    True,
    /// Resolved as misinformation
    #[serde(rename = "FALSE")]
    False,
    /// An exact tie: the engine refuses to guess and refunds all stakes
    #[serde(rename = "UNRESOLVED")]
    Unresolved,
}

impl VerdictOutcome {
    /// Whether a staked or witnessed position matches this outcome
    pub fn matches(self, position: Position) -> bool {
        match (self, position) {
            (VerdictOutcome::True, Position::True) => true,
            (VerdictOutcome::False, Position::False) => true,
            _ => false,
        }
    }
}

impl From<Position> for VerdictOutcome {
    fn from(position: Position) -> Self {
        match position {
            Position::True => VerdictOutcome::True,
            Position::False => VerdictOutcome::False,
        }
    }
}

impl fmt::Display for VerdictOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictOutcome::True => f.write_str("TRUE"),
            VerdictOutcome::False => f.write_str("FALSE"),
            VerdictOutcome::Unresolved => f.write_str("UNRESOLVED"),
        }
    }
}

/// The relative weights of the three veracity signals.
///
/// An explicit structure rather than embedded constants, so that every
/// historical verdict records exactly which weights produced it.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScoringWeights {
    /// Weight of the automated content analysis signal
    pub analysis_weight: f64,
    /// Weight of the stake-weighted crowd signal
    pub stake_weight: f64,
    /// Weight of the reputation-weighted witness signal
    pub witness_weight: f64,
}

impl ScoringWeights {
    /// The three weights must be non-negative and sum to 1.0 (within a
    /// small epsilon, since they come from a configuration file).
    pub fn is_valid(&self) -> bool {
        let ScoringWeights {
            analysis_weight,
            stake_weight,
            witness_weight,
        } = *self;
        let non_negative =
            analysis_weight >= 0.0 && stake_weight >= 0.0 && witness_weight >= 0.0;
        let sum = analysis_weight + stake_weight + witness_weight;

        non_negative && (sum - 1.0).abs() < 1e-9
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            analysis_weight: 0.3,
            stake_weight: 0.4,
            witness_weight: 0.3,
        }
    }
}

/// The final, immutable record of a resolved dispute. Written exactly once
/// per news item.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Verdict {
    /// The news item this verdict resolves
    pub item: ItemId,
    /// The resolved side
    pub outcome: VerdictOutcome,
    /// Final veracity score in [0, 1]
    pub veracity: f64,
    /// Confidence backing the score at resolution time, in [0, 1]
    pub confidence: f64,
    /// The signal weights that produced the score, kept for auditing
    pub weights: ScoringWeights,
    /// When the verdict was reached
    pub resolved_at: Timestamp,
    /// References of the settlement transactions dispatched for this verdict
    pub settlement_txs: Vec<TxRef>,
}

/// Totals staked on each side of a news item
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StakeTotals {
    /// Total amount staked on TRUE
    pub true_total: Drops,
    /// Total amount staked on FALSE
    pub false_total: Drops,
}

impl StakeTotals {
    /// Combined amount staked on both sides
    pub fn total(&self) -> Drops {
        self.true_total + self.false_total
    }

    /// Amount staked on one side
    pub fn on(&self, position: Position) -> Drops {
        match position {
            Position::True => self.true_total,
            Position::False => self.false_total,
        }
    }
}
