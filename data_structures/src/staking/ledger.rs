use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use itertools::{Either, Itertools};
use log::{debug, warn};

use super::{
    errors::StakeError,
    stake::{PayoutInstruction, Stake, StakeId},
    StakesResult,
};
use crate::{
    drops::Drops,
    types::{Identity, ItemId, Position, StakeTotals, Timestamp, TxRef},
};

/// The stakes recorded against a single news item, plus the running totals
/// derived from them. The log is append-only; the totals per position can
/// only grow until the item is settled and closed.
#[derive(Debug, Default)]
struct ItemStakes {
    stakes: Vec<Stake>,
    totals: StakeTotals,
    settled: bool,
}

/// The escrow ledger for all news items under dispute.
///
/// Entries are reference counted and write-locked individually, so stakes
/// on unrelated items never contend with each other: the only shared locks
/// are the item index (write-locked just to register a new item) and the
/// transaction reference index that enforces at-most-one accepted stake
/// per ledger transaction.
#[derive(Debug, Default)]
pub struct StakeLedger {
    /// Per-item stake logs, indexed by item identifier
    by_item: RwLock<HashMap<ItemId, Arc<RwLock<ItemStakes>>>>,
    /// Every transaction reference ever accepted, across all items
    tx_refs: RwLock<HashSet<TxRef>>,
    /// Source of unique stake identifiers
    next_stake_id: AtomicU64,
}

impl StakeLedger {
    /// Build an empty ledger
    pub fn new() -> Self {
        StakeLedger {
            by_item: RwLock::default(),
            tx_refs: RwLock::default(),
            next_stake_id: AtomicU64::new(1),
        }
    }

    /// Open a per-item stake log. Registering the same item twice is a
    /// no-op and keeps the existing log.
    pub fn register_item(&self, item: &ItemId) -> StakesResult<()> {
        let mut by_item = self.by_item.write()?;
        by_item.entry(item.clone()).or_default();

        Ok(())
    }

    fn entry(&self, item: &ItemId) -> StakesResult<Arc<RwLock<ItemStakes>>> {
        self.by_item
            .read()?
            .get(item)
            .cloned()
            .ok_or_else(|| StakeError::ItemNotFound { item: item.clone() })
    }

    /// Record a stake against an item.
    ///
    /// The stake becomes irrevocable the moment its transaction reference
    /// is recorded here: there is no failure path after that point, so a
    /// rejected submission never leaves a reference behind.
    pub fn place_stake(
        &self,
        item: &ItemId,
        staker: Identity,
        position: Position,
        amount: Drops,
        tx_ref: TxRef,
        timestamp: Timestamp,
    ) -> StakesResult<StakeId> {
        if amount == Drops::zero() {
            return Err(StakeError::InvalidAmount);
        }

        let entry = self.entry(item)?;
        let mut entry = entry.write()?;
        if entry.settled {
            return Err(StakeError::ItemClosed { item: item.clone() });
        }

        // The reference index decides acceptance: check and insert under
        // one write lock so two submissions with the same reference cannot
        // both pass.
        {
            let mut tx_refs = self.tx_refs.write()?;
            if tx_refs.contains(&tx_ref) {
                return Err(StakeError::DuplicateTransaction { tx_ref });
            }
            tx_refs.insert(tx_ref.clone());
        }

        let id = StakeId(self.next_stake_id.fetch_add(1, Ordering::SeqCst));
        match position {
            Position::True => entry.totals.true_total += amount,
            Position::False => entry.totals.false_total += amount,
        }
        entry.stakes.push(Stake {
            id,
            item: item.clone(),
            staker,
            position,
            amount,
            tx_ref,
            timestamp,
        });
        debug!("item {item}: recorded {id} of {amount} on {position}");

        Ok(id)
    }

    /// Current totals per position. A pure read against a consistent
    /// snapshot of the per-item log.
    pub fn totals_for(&self, item: &ItemId) -> StakesResult<StakeTotals> {
        Ok(self.entry(item)?.read()?.totals)
    }

    /// The full append-only stake log of an item.
    pub fn stakes_for(&self, item: &ItemId) -> StakesResult<Vec<Stake>> {
        Ok(self.entry(item)?.read()?.stakes.clone())
    }

    /// Whether the item has been settled and is closed to new stakes.
    pub fn is_settled(&self, item: &ItemId) -> StakesResult<bool> {
        Ok(self.entry(item)?.read()?.settled)
    }

    /// Settle an item in favor of `winning`: every winning stake gets its
    /// principal back plus a pro-rata share of the losing pool, floored to
    /// the drop; losing stakes forfeit their principal into that pool.
    ///
    /// The rounding remainder goes to the largest winning stake (earliest
    /// recorded on equal amounts), so that the payouts sum to the escrowed
    /// pool exactly. A mismatch is a bug and is reported as
    /// [`StakeError::ConservationMismatch`] without closing the item.
    pub fn settle(
        &self,
        item: &ItemId,
        winning: Position,
    ) -> StakesResult<Vec<PayoutInstruction>> {
        let entry = self.entry(item)?;
        let mut entry = entry.write()?;
        if entry.settled {
            return Err(StakeError::AlreadySettled { item: item.clone() });
        }

        let pool = entry.totals.total();
        let winning_total = entry.totals.on(winning).drops();
        let losing_total = entry.totals.on(winning.opposite()).drops();

        // A verdict against every staker leaves nobody to receive the
        // forfeited pool, so the only non-leaking settlement is a refund.
        if winning_total == 0 {
            if losing_total > 0 {
                warn!("item {item}: empty winning pool, refunding all stakes");
            }
            let payouts = principal_refunds(&entry.stakes);
            entry.settled = true;
            return Ok(payouts);
        }

        let (winners, _losers): (Vec<&Stake>, Vec<&Stake>) = entry
            .stakes
            .iter()
            .partition_map(|stake| {
                if stake.position == winning {
                    Either::Left(stake)
                } else {
                    Either::Right(stake)
                }
            });

        let mut payouts = Vec::with_capacity(winners.len());
        let mut paid: u64 = 0;
        let mut largest: Option<(usize, Drops)> = None;
        for stake in winners {
            let principal = stake.amount.drops();
            // 128-bit intermediate: principal * losing_total can overflow u64
            let winnings =
                u128::from(principal) * u128::from(losing_total) / u128::from(winning_total);
            let amount = principal + u64::try_from(winnings).expect("winnings exceed pool");
            paid += amount;
            match largest {
                Some((_, best)) if stake.amount <= best => {}
                _ => largest = Some((payouts.len(), stake.amount)),
            }
            payouts.push(PayoutInstruction {
                stake: stake.id,
                destination: stake.staker.clone(),
                amount: Drops::from_drops(amount),
            });
        }

        // Flooring leaves at most (winners - 1) drops unassigned; they go
        // to the largest winning stake so no value leaks.
        let remainder = pool.drops() - paid;
        if remainder > 0 {
            // The winning pool is non-empty here, so an index was chosen
            let (index, _) = largest.expect("non-empty winning pool");
            payouts[index].amount += Drops::from_drops(remainder);
        }

        let payout_sum: Drops = payouts.iter().map(|payout| payout.amount).sum();
        if payout_sum != pool {
            return Err(StakeError::ConservationMismatch {
                item: item.clone(),
                pool,
                payouts: payout_sum,
            });
        }

        entry.settled = true;
        debug!(
            "item {item}: settled {} in {} payouts for {winning}",
            pool,
            payouts.len()
        );

        Ok(payouts)
    }

    /// Refund every stake its principal and close the item. Used when an
    /// item expires without resolution or resolves to an exact tie.
    pub fn refund(&self, item: &ItemId) -> StakesResult<Vec<PayoutInstruction>> {
        let entry = self.entry(item)?;
        let mut entry = entry.write()?;
        if entry.settled {
            return Err(StakeError::AlreadySettled { item: item.clone() });
        }

        let payouts = principal_refunds(&entry.stakes);
        entry.settled = true;
        debug!("item {item}: refunded {} stakes", payouts.len());

        Ok(payouts)
    }
}

fn principal_refunds(stakes: &[Stake]) -> Vec<PayoutInstruction> {
    stakes
        .iter()
        .map(|stake| PayoutInstruction {
            stake: stake.id,
            destination: stake.staker.clone(),
            amount: stake.amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_item(item: &ItemId) -> StakeLedger {
        let ledger = StakeLedger::new();
        ledger.register_item(item).unwrap();
        ledger
    }

    fn place(
        ledger: &StakeLedger,
        item: &ItemId,
        staker: &str,
        position: Position,
        drops: u64,
        tx: &str,
    ) -> StakesResult<StakeId> {
        ledger.place_stake(
            item,
            Identity::from(staker),
            position,
            Drops::from_drops(drops),
            TxRef::from(tx),
            0,
        )
    }

    #[test]
    fn unknown_item_is_rejected() {
        let ledger = StakeLedger::new();
        let item = ItemId::from("news-1");
        assert_eq!(
            place(&ledger, &item, "rAlice", Position::True, 100, "TX-A"),
            Err(StakeError::ItemNotFound { item: item.clone() })
        );
        assert_eq!(
            ledger.totals_for(&item),
            Err(StakeError::ItemNotFound { item })
        );
    }

    #[test]
    fn zero_amount_is_rejected() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        assert_eq!(
            place(&ledger, &item, "rAlice", Position::True, 0, "TX-A"),
            Err(StakeError::InvalidAmount)
        );
    }

    #[test]
    fn duplicate_transaction_leaves_totals_unchanged() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        place(&ledger, &item, "rAlice", Position::True, 1_000, "TX-A").unwrap();

        // Same reference, different staker and amount: still a duplicate
        assert_eq!(
            place(&ledger, &item, "rBob", Position::False, 500, "TX-A"),
            Err(StakeError::DuplicateTransaction {
                tx_ref: TxRef::from("TX-A")
            })
        );
        let totals = ledger.totals_for(&item).unwrap();
        assert_eq!(totals.true_total, Drops::from_drops(1_000));
        assert_eq!(totals.false_total, Drops::zero());
    }

    #[test]
    fn totals_grow_monotonically() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        let mut previous = Drops::zero();
        for (i, amount) in [500u64, 1, 10_000, 42].iter().enumerate() {
            place(
                &ledger,
                &item,
                "rAlice",
                Position::True,
                *amount,
                &format!("TX-{i}"),
            )
            .unwrap();
            let totals = ledger.totals_for(&item).unwrap();
            assert!(totals.true_total > previous);
            previous = totals.true_total;
        }
    }

    #[test]
    fn settle_worked_example() {
        // trueTotal = 1_000_000, falseTotal = 400_000, resolved TRUE:
        // a 200_000 TRUE stake receives 200_000 + 200_000 * 400_000 / 1_000_000
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        place(&ledger, &item, "rAlice", Position::True, 800_000, "TX-A").unwrap();
        let bob = place(&ledger, &item, "rBob", Position::True, 200_000, "TX-B").unwrap();
        place(&ledger, &item, "rCarol", Position::False, 400_000, "TX-C").unwrap();

        let payouts = ledger.settle(&item, Position::True).unwrap();
        let to_bob = payouts.iter().find(|p| p.stake == bob).unwrap();
        assert_eq!(to_bob.amount, Drops::from_drops(280_000));

        let paid: Drops = payouts.iter().map(|p| p.amount).sum();
        assert_eq!(paid, Drops::from_drops(1_400_000));
    }

    #[test]
    fn rounding_remainder_goes_to_largest_winner() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        // Three equal TRUE stakes of 1 drop against 1 FALSE drop: each
        // winner gets floor(1 * 1 / 3) = 0 winnings, and the whole
        // remainder of 1 drop goes to the earliest of the equals.
        let first = place(&ledger, &item, "rAlice", Position::True, 1, "TX-A").unwrap();
        place(&ledger, &item, "rBob", Position::True, 1, "TX-B").unwrap();
        place(&ledger, &item, "rCarol", Position::True, 1, "TX-C").unwrap();
        place(&ledger, &item, "rDave", Position::False, 1, "TX-D").unwrap();

        let payouts = ledger.settle(&item, Position::True).unwrap();
        let paid: Drops = payouts.iter().map(|p| p.amount).sum();
        assert_eq!(paid, Drops::from_drops(4));
        assert_eq!(
            payouts.iter().find(|p| p.stake == first).unwrap().amount,
            Drops::from_drops(2)
        );
    }

    #[test]
    fn conservation_under_skewed_pools() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        let amounts = [1u64, 7, 999_999, 13, 70_000_001, 3];
        for (i, amount) in amounts.iter().enumerate() {
            let position = if i % 2 == 0 {
                Position::True
            } else {
                Position::False
            };
            place(&ledger, &item, "rAlice", position, *amount, &format!("TX-{i}")).unwrap();
        }
        let totals = ledger.totals_for(&item).unwrap();
        let payouts = ledger.settle(&item, Position::True).unwrap();
        let paid: Drops = payouts.iter().map(|p| p.amount).sum();
        assert_eq!(paid, totals.total());
    }

    #[test]
    fn single_staker_gets_everything() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        place(&ledger, &item, "rAlice", Position::True, 123_456, "TX-A").unwrap();

        let payouts = ledger.settle(&item, Position::True).unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].amount, Drops::from_drops(123_456));
    }

    #[test]
    fn empty_winning_pool_refunds_losers() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        place(&ledger, &item, "rAlice", Position::False, 1_000, "TX-A").unwrap();
        place(&ledger, &item, "rBob", Position::False, 2_000, "TX-B").unwrap();

        // Resolved TRUE with nobody on TRUE: value must not leak
        let payouts = ledger.settle(&item, Position::True).unwrap();
        let paid: Drops = payouts.iter().map(|p| p.amount).sum();
        assert_eq!(paid, Drops::from_drops(3_000));
        assert!(payouts.iter().all(|p| p.amount > Drops::zero()));
    }

    #[test]
    fn settled_item_is_closed() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        place(&ledger, &item, "rAlice", Position::True, 100, "TX-A").unwrap();
        ledger.settle(&item, Position::True).unwrap();

        assert!(ledger.is_settled(&item).unwrap());
        assert_eq!(
            place(&ledger, &item, "rBob", Position::False, 100, "TX-B"),
            Err(StakeError::ItemClosed { item: item.clone() })
        );
        assert_eq!(
            ledger.settle(&item, Position::True),
            Err(StakeError::AlreadySettled { item: item.clone() })
        );
        assert_eq!(
            ledger.refund(&item),
            Err(StakeError::AlreadySettled { item })
        );
    }

    #[test]
    fn refund_returns_every_principal() {
        let item = ItemId::from("news-1");
        let ledger = ledger_with_item(&item);
        place(&ledger, &item, "rAlice", Position::True, 1_000, "TX-A").unwrap();
        place(&ledger, &item, "rBob", Position::False, 400, "TX-B").unwrap();

        let payouts = ledger.refund(&item).unwrap();
        assert_eq!(payouts.len(), 2);
        assert_eq!(payouts[0].amount, Drops::from_drops(1_000));
        assert_eq!(payouts[1].amount, Drops::from_drops(400));
        assert!(ledger.is_settled(&item).unwrap());
    }

    #[test]
    fn tx_refs_are_deduplicated_across_items() {
        let first = ItemId::from("news-1");
        let second = ItemId::from("news-2");
        let ledger = ledger_with_item(&first);
        ledger.register_item(&second).unwrap();

        place(&ledger, &first, "rAlice", Position::True, 100, "TX-A").unwrap();
        assert_eq!(
            place(&ledger, &second, "rAlice", Position::True, 100, "TX-A"),
            Err(StakeError::DuplicateTransaction {
                tx_ref: TxRef::from("TX-A")
            })
        );
    }
}
