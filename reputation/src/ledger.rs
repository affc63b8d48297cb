//! Reputation delta ledger

use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    hash::Hash,
};

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::AlreadyApplied;

/// Upper bound of a reputation score
pub const MAX_REPUTATION: u8 = 100;
/// The score every identity starts from, and the center the regression
/// pulls toward
pub const NEUTRAL_REPUTATION: u8 = 50;
// Distance from the neutral score to either bound
const SPAN: u8 = MAX_REPUTATION - NEUTRAL_REPUTATION;

/// Why a reputation delta was applied
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeltaCause {
    /// Staked on the side the verdict confirmed
    AccurateStake,
    /// Staked against the verdict
    InaccurateStake,
    /// Testified on the side the verdict confirmed. Testimony against the
    /// verdict is not penalized: it is evidence, not a bet.
    VerifiedWitness,
}

impl DeltaCause {
    /// Whether this cause moves reputation up
    pub fn is_gain(self) -> bool {
        match self {
            DeltaCause::AccurateStake | DeltaCause::VerifiedWitness => true,
            DeltaCause::InaccurateStake => false,
        }
    }
}

/// Identifies one settlement event: the item plus the instant its verdict
/// was reached. Reputation deltas are applied at most once per key.
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SettlementKey<I> {
    /// The settled news item
    pub item: I,
    /// Unix timestamp of the resolution
    pub resolved_at: i64,
}

/// One entry in an identity's append-only reputation history.
///
/// `change` is the effective change after clamping to the score bounds,
/// so the neutral score plus the sum of an identity's changes always
/// reconstructs its current score.
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReputationDelta<I> {
    /// Why the delta was applied
    pub cause: DeltaCause,
    /// Signed, effective score change
    pub change: i16,
    /// The settlement that produced the delta
    pub settlement: SettlementKey<I>,
    /// When the delta was applied
    pub applied_at: i64,
}

/// Scale a base delta by how much room is left between the current score
/// and the bound it is moving toward, measured past the neutral score.
///
/// A score at or below neutral gains the full base; a score already at the
/// maximum gains nothing. Symmetrically for losses. This regression toward
/// the mean prevents runaway scores at either end.
pub fn scaled_delta(current: u8, base: u8, gain: bool) -> u8 {
    let excess = if gain {
        current.saturating_sub(NEUTRAL_REPUTATION)
    } else {
        NEUTRAL_REPUTATION.saturating_sub(current)
    };
    let headroom = SPAN - excess.min(SPAN);

    (u16::from(base) * u16::from(headroom) / u16::from(SPAN)) as u8
}

/// Reputation Ledger
///
/// Keeps, for every identity `K`, an append-only history of reputation
/// deltas caused by settlements of items `I`, together with a cache of the
/// derived current score. Identities absent from the cache hold the
/// neutral score.
///
/// Deltas are only ever produced by settlements, and every settlement key
/// is accepted exactly once, so retrying a half-failed settlement cannot
/// double-apply anyone's reward or penalty.
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[derive(Clone, Debug, Default)]
pub struct ReputationLedger<K, I>
where
    K: Clone + Eq + Hash,
    I: Clone + Eq + Hash,
{
    // A cache of <identity: current score>; identities not in the cache
    // hold the neutral score
    scores: HashMap<K, u8>,
    // The append-only per-identity histories
    history: HashMap<K, Vec<ReputationDelta<I>>>,
    // Settlement keys already applied
    applied: HashSet<SettlementKey<I>>,
}

impl<K, I> ReputationLedger<K, I>
where
    K: Clone + Debug + Eq + Hash,
    I: Clone + Debug + Eq + Hash,
{
    /// Builds a new empty ledger
    pub fn new() -> Self {
        ReputationLedger {
            scores: HashMap::new(),
            history: HashMap::new(),
            applied: HashSet::new(),
        }
    }

    /// Get the current reputation of an identity. Identities that never
    /// participated hold the neutral score.
    pub fn get(&self, id: &K) -> u8 {
        self.scores.get(id).copied().unwrap_or(NEUTRAL_REPUTATION)
    }

    /// The full delta history of an identity, oldest first.
    pub fn history(&self, id: &K) -> &[ReputationDelta<I>] {
        self.history.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of identities whose score differs from their history default
    pub fn num_identities(&self) -> usize {
        self.history.len()
    }

    /// Whether the deltas of a settlement have already been applied
    pub fn is_applied(&self, key: &SettlementKey<I>) -> bool {
        self.applied.contains(key)
    }

    /// Recompute an identity's score from its history alone. Always equal
    /// to [`ReputationLedger::get`]; exists so auditors do not have to
    /// trust the cache.
    pub fn derived_score(&self, id: &K) -> u8 {
        let sum = self
            .history(id)
            .iter()
            .fold(i32::from(NEUTRAL_REPUTATION), |acc, delta| {
                acc + i32::from(delta.change)
            });

        u8::try_from(sum).unwrap_or_else(|_| {
            // The effective changes are clamped on application, so the sum
            // cannot leave the bounds unless the history was tampered with
            panic!("reputation history sums to {sum}, outside score bounds")
        })
    }

    /// Apply the reputation effect of one settlement: for every
    /// (identity, cause) adjustment, a delta scaled from `base` by the
    /// identity's distance past neutral, clamped to the score bounds.
    ///
    /// Returns the effective changes. Replaying an already-applied key
    /// fails with [`AlreadyApplied`] and changes nothing.
    pub fn apply_settlement<A>(
        &mut self,
        key: SettlementKey<I>,
        adjustments: A,
        base: u8,
        now: i64,
    ) -> Result<Vec<(K, i16)>, AlreadyApplied<I>>
    where
        A: IntoIterator<Item = (K, DeltaCause)>,
    {
        if self.applied.contains(&key) {
            return Err(AlreadyApplied { key });
        }
        self.applied.insert(key.clone());

        let mut changes = Vec::new();
        for (id, cause) in adjustments {
            let current = self.get(&id);
            let magnitude = scaled_delta(current, base, cause.is_gain());
            let change = if cause.is_gain() {
                i16::from(magnitude.min(MAX_REPUTATION - current))
            } else {
                -i16::from(magnitude.min(current))
            };

            let updated = u8::try_from(i16::from(current) + change)
                .expect("clamped change cannot leave score bounds");
            self.scores.insert(id.clone(), updated);
            self.history
                .entry(id.clone())
                .or_default()
                .push(ReputationDelta {
                    cause,
                    change,
                    settlement: key.clone(),
                    applied_at: now,
                });
            debug!("{id:?}: reputation {current} -> {updated} ({cause:?})");
            changes.push((id, change));
        }

        Ok(changes)
    }
}
