//! Witness testimony registry.
//!
//! Testimony is evidence, not a bet: statements are recorded append-only,
//! never edited or deleted, and corrections are new statements that
//! reference the one they supersede.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Identity, ItemId, Position, Timestamp, MAX_SCORE};

/// Identifier of a witness statement
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct WitnessId(pub u64);

impl fmt::Display for WitnessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "witness-{}", self.0)
    }
}

/// A free-text statement of evidence about a news item, weighted by the
/// reputation the witness held when submitting it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WitnessStatement {
    /// Identifier of this statement
    pub id: WitnessId,
    /// The news item the statement is about
    pub item: ItemId,
    /// Identity of the witness
    pub witness: Identity,
    /// The side the testimony supports
    pub position: Position,
    /// The statement text, non-blank
    pub statement: String,
    /// The witness's reputation score at submission time, 0 to 100
    pub reputation_snapshot: u8,
    /// A prior statement this one corrects, if any
    pub supersedes: Option<WitnessId>,
    /// When the statement was recorded
    pub timestamp: Timestamp,
}

/// The reputation-weighted summary of the testimony on an item, consumed
/// by the score aggregator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WitnessSummary {
    /// The majority-implied position, if the testimony implies one
    pub majority: Option<Position>,
    /// Sum of the reputation snapshots on the majority side, normalized
    /// against the total statement count; in [0, 1]
    pub weight: f64,
    /// Number of statements on the item
    pub count: usize,
}

impl WitnessSummary {
    /// A summary with no testimony at all
    pub fn empty() -> Self {
        WitnessSummary {
            majority: None,
            weight: 0.0,
            count: 0,
        }
    }
}

/// All errors related to witness testimony.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WitnessError {
    /// The statement text is blank.
    #[error("witness statements must not be blank")]
    EmptyStatement,
    /// The identity already testified on this item.
    #[error("identity {witness} has already testified on item {item}")]
    DuplicateWitness {
        /// The item testified on
        item: ItemId,
        /// The repeating witness
        witness: Identity,
    },
    /// The item is not registered in the registry.
    #[error("item {item} is not registered in the witness registry")]
    ItemNotFound {
        /// The unknown item
        item: ItemId,
    },
    /// A correction referenced a statement that does not exist on the item.
    #[error("superseded statement {id} does not exist on item {item}")]
    UnknownSupersededStatement {
        /// The item testified on
        item: ItemId,
        /// The missing prior statement
        id: WitnessId,
    },
    /// Tried to obtain a lock on a poisoned piece of data.
    #[error("tried to obtain a lock on a poisoned piece of data")]
    PoisonedLock,
}

impl<T> From<PoisonError<T>> for WitnessError {
    fn from(_value: PoisonError<T>) -> Self {
        WitnessError::PoisonedLock
    }
}

/// Result type for witness registry operations
pub type WitnessResult<T> = Result<T, WitnessError>;

#[derive(Debug, Default)]
struct ItemTestimony {
    statements: Vec<WitnessStatement>,
    identities: HashSet<Identity>,
}

/// Registry of testimony across all news items, enforcing at most one
/// statement per (item, identity) pair. Entries are reference counted and
/// write-locked per item, so testimony on unrelated items never contends.
#[derive(Debug, Default)]
pub struct WitnessRegistry {
    by_item: RwLock<HashMap<ItemId, Arc<RwLock<ItemTestimony>>>>,
    next_witness_id: AtomicU64,
}

impl WitnessRegistry {
    /// Build an empty registry
    pub fn new() -> Self {
        WitnessRegistry {
            by_item: RwLock::default(),
            next_witness_id: AtomicU64::new(1),
        }
    }

    /// Open a per-item testimony log. Idempotent.
    pub fn register_item(&self, item: &ItemId) -> WitnessResult<()> {
        let mut by_item = self.by_item.write()?;
        by_item.entry(item.clone()).or_default();

        Ok(())
    }

    fn entry(&self, item: &ItemId) -> WitnessResult<Arc<RwLock<ItemTestimony>>> {
        self.by_item
            .read()?
            .get(item)
            .cloned()
            .ok_or_else(|| WitnessError::ItemNotFound { item: item.clone() })
    }

    /// Record a statement against an item.
    ///
    /// `reputation_snapshot` is the reputation the witness holds right now,
    /// as read from the reputation store by the caller; it is frozen into
    /// the statement and never updated afterwards.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_testimony(
        &self,
        item: &ItemId,
        witness: Identity,
        position: Position,
        statement: String,
        reputation_snapshot: u8,
        supersedes: Option<WitnessId>,
        timestamp: Timestamp,
    ) -> WitnessResult<WitnessId> {
        if statement.trim().is_empty() {
            return Err(WitnessError::EmptyStatement);
        }

        let entry = self.entry(item)?;
        let mut entry = entry.write()?;
        if entry.identities.contains(&witness) {
            return Err(WitnessError::DuplicateWitness {
                item: item.clone(),
                witness,
            });
        }
        if let Some(prior) = supersedes {
            if !entry.statements.iter().any(|s| s.id == prior) {
                return Err(WitnessError::UnknownSupersededStatement {
                    item: item.clone(),
                    id: prior,
                });
            }
        }

        let id = WitnessId(self.next_witness_id.fetch_add(1, Ordering::SeqCst));
        entry.identities.insert(witness.clone());
        entry.statements.push(WitnessStatement {
            id,
            item: item.clone(),
            witness,
            position,
            statement,
            reputation_snapshot: reputation_snapshot.min(MAX_SCORE),
            supersedes,
            timestamp,
        });
        debug!("item {item}: recorded {id} supporting {position}");

        Ok(id)
    }

    /// All statements recorded on an item, in submission order.
    pub fn witnesses_for(&self, item: &ItemId) -> WitnessResult<Vec<WitnessStatement>> {
        Ok(self.entry(item)?.read()?.statements.clone())
    }

    /// Number of statements recorded on an item.
    pub fn witness_count(&self, item: &ItemId) -> WitnessResult<usize> {
        Ok(self.entry(item)?.read()?.statements.len())
    }

    /// The credibility summary of an item's testimony.
    ///
    /// The majority position is decided by statement count, falling back
    /// to summed reputation snapshots on a count tie; a full tie implies
    /// no majority and zero weight. The weight is the majority side's
    /// reputation sum normalized against the total statement count.
    pub fn credibility(&self, item: &ItemId) -> WitnessResult<WitnessSummary> {
        let entry = self.entry(item)?;
        let entry = entry.read()?;
        let count = entry.statements.len();
        if count == 0 {
            return Ok(WitnessSummary::empty());
        }

        let mut counts = (0usize, 0usize);
        let mut rep_sums = (0u64, 0u64);
        for statement in &entry.statements {
            match statement.position {
                Position::True => {
                    counts.0 += 1;
                    rep_sums.0 += u64::from(statement.reputation_snapshot);
                }
                Position::False => {
                    counts.1 += 1;
                    rep_sums.1 += u64::from(statement.reputation_snapshot);
                }
            }
        }

        let majority = if counts.0 != counts.1 {
            if counts.0 > counts.1 {
                Some(Position::True)
            } else {
                Some(Position::False)
            }
        } else if rep_sums.0 != rep_sums.1 {
            if rep_sums.0 > rep_sums.1 {
                Some(Position::True)
            } else {
                Some(Position::False)
            }
        } else {
            None
        };

        let weight = match majority {
            Some(Position::True) => rep_sums.0,
            Some(Position::False) => rep_sums.1,
            None => 0,
        };
        // Each snapshot is at most 100, so this normalization lands in [0, 1]
        let weight = (weight as f64 / (count as f64 * f64::from(MAX_SCORE))).min(1.0);

        Ok(WitnessSummary {
            majority,
            weight,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_item(item: &ItemId) -> WitnessRegistry {
        let registry = WitnessRegistry::new();
        registry.register_item(item).unwrap();
        registry
    }

    fn testify(
        registry: &WitnessRegistry,
        item: &ItemId,
        witness: &str,
        position: Position,
        reputation: u8,
    ) -> WitnessResult<WitnessId> {
        registry.submit_testimony(
            item,
            Identity::from(witness),
            position,
            "I can confirm the data contradicts official records.".into(),
            reputation,
            None,
            0,
        )
    }

    #[test]
    fn blank_statement_is_rejected() {
        let item = ItemId::from("news-1");
        let registry = registry_with_item(&item);
        assert_eq!(
            registry.submit_testimony(
                &item,
                Identity::from("rAlice"),
                Position::False,
                "  \n\t ".into(),
                50,
                None,
                0,
            ),
            Err(WitnessError::EmptyStatement)
        );
    }

    #[test]
    fn one_statement_per_identity_per_item() {
        let item = ItemId::from("news-1");
        let registry = registry_with_item(&item);
        testify(&registry, &item, "rAlice", Position::False, 60).unwrap();
        assert_eq!(
            testify(&registry, &item, "rAlice", Position::True, 60),
            Err(WitnessError::DuplicateWitness {
                item: item.clone(),
                witness: Identity::from("rAlice"),
            })
        );
        assert_eq!(registry.witness_count(&item).unwrap(), 1);

        // The same identity may testify on a different item
        let other = ItemId::from("news-2");
        registry.register_item(&other).unwrap();
        testify(&registry, &other, "rAlice", Position::True, 60).unwrap();
    }

    #[test]
    fn supersession_references_must_exist() {
        let item = ItemId::from("news-1");
        let registry = registry_with_item(&item);
        let prior = testify(&registry, &item, "rAlice", Position::False, 60).unwrap();

        assert_eq!(
            registry.submit_testimony(
                &item,
                Identity::from("rBob"),
                Position::False,
                "Correcting a detail in the earlier statement.".into(),
                40,
                Some(WitnessId(999)),
                1,
            ),
            Err(WitnessError::UnknownSupersededStatement {
                item: item.clone(),
                id: WitnessId(999),
            })
        );

        let correction = registry
            .submit_testimony(
                &item,
                Identity::from("rBob"),
                Position::False,
                "Correcting a detail in the earlier statement.".into(),
                40,
                Some(prior),
                1,
            )
            .unwrap();
        let statements = registry.witnesses_for(&item).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].id, correction);
        assert_eq!(statements[1].supersedes, Some(prior));
    }

    #[test]
    fn no_testimony_means_no_majority() {
        let item = ItemId::from("news-1");
        let registry = registry_with_item(&item);
        assert_eq!(registry.credibility(&item).unwrap(), WitnessSummary::empty());
    }

    #[test]
    fn majority_by_count() {
        let item = ItemId::from("news-1");
        let registry = registry_with_item(&item);
        testify(&registry, &item, "rAlice", Position::False, 80).unwrap();
        testify(&registry, &item, "rBob", Position::False, 40).unwrap();
        testify(&registry, &item, "rCarol", Position::True, 100).unwrap();

        let summary = registry.credibility(&item).unwrap();
        assert_eq!(summary.majority, Some(Position::False));
        assert_eq!(summary.count, 3);
        // (80 + 40) / (3 * 100)
        assert!((summary.weight - 0.4).abs() < 1e-12);
    }

    #[test]
    fn count_tie_falls_back_to_reputation() {
        let item = ItemId::from("news-1");
        let registry = registry_with_item(&item);
        testify(&registry, &item, "rAlice", Position::False, 90).unwrap();
        testify(&registry, &item, "rBob", Position::True, 30).unwrap();

        let summary = registry.credibility(&item).unwrap();
        assert_eq!(summary.majority, Some(Position::False));
        // 90 / (2 * 100)
        assert!((summary.weight - 0.45).abs() < 1e-12);
    }

    #[test]
    fn full_tie_implies_no_majority() {
        let item = ItemId::from("news-1");
        let registry = registry_with_item(&item);
        testify(&registry, &item, "rAlice", Position::False, 70).unwrap();
        testify(&registry, &item, "rBob", Position::True, 70).unwrap();

        let summary = registry.credibility(&item).unwrap();
        assert_eq!(summary.majority, None);
        assert_eq!(summary.weight, 0.0);
        assert_eq!(summary.count, 2);
    }
}
