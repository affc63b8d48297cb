//! The verdict engine.
//!
//! Owns the lifecycle of every news item: accepts stakes and testimony
//! while an item is active, decides when the dispute may resolve, and
//! drives settlement through the ledger gateway. Each item has its own
//! lock, so disputes over different items never contend; resolution of a
//! single item is won by exactly one caller.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    thread,
    time::Duration,
};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use veridict_config::{Config, ConfigError};
use veridict_data_structures::{
    drops::Drops,
    staking::{PayoutInstruction, StakeError, StakeId, StakeLedger},
    types::{
        Identity, ItemId, ItemState, NewsItem, Position, StakeTotals, Timestamp, TxRef, Verdict,
        VerdictOutcome,
    },
    witnesses::{WitnessId, WitnessRegistry, WitnessStatement},
};
use veridict_reputation::{DeltaCause, ReputationDelta, ReputationLedger, SettlementKey};
use veridict_storage::{Storage, StorageHelper};
use veridict_validations::{compute_veracity, outcome_from_score, Veracity};

use crate::{
    error::{NodeError, NodeResult},
    gateway::{GatewayError, LedgerGateway},
};

/// Storage keys, one namespace per entity kind
mod keys {
    use veridict_data_structures::types::{Identity, ItemId};

    pub fn news(item: &ItemId) -> Vec<u8> {
        format!("news/{item}").into_bytes()
    }

    pub fn stakes(item: &ItemId) -> Vec<u8> {
        format!("stakes/{item}").into_bytes()
    }

    pub fn witnesses(item: &ItemId) -> Vec<u8> {
        format!("witnesses/{item}").into_bytes()
    }

    pub fn verdict(item: &ItemId) -> Vec<u8> {
        format!("verdict/{item}").into_bytes()
    }

    pub fn reputation(id: &Identity) -> Vec<u8> {
        format!("reputation/{id}").into_bytes()
    }
}

/// The persisted reputation state of one identity.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReputationRecord {
    /// Current score
    pub score: u8,
    /// Append-only delta history, oldest first
    pub history: Vec<ReputationDelta<ItemId>>,
}

/// The outcome of one call to [`VerdictEngine::evaluate`] or
/// [`VerdictEngine::retry_settlement`].
#[derive(Clone, Debug)]
pub enum Evaluation {
    /// The resolution conditions are not met yet
    Pending,
    /// The item resolved and settled completely
    Resolved(Verdict),
    /// The deadline passed without enough confidence; every stake was
    /// refunded and no verdict was recorded
    Expired,
    /// The outcome is decided but some payouts could not be dispatched.
    /// [`VerdictEngine::retry_settlement`] resumes where this stopped.
    SettlementPending,
}

// What settlement still has to do for an item. Lives inside the item's
// slot so a resumed settlement picks up exactly where a failed one
// stopped, and never pays an instruction twice.
#[derive(Clone, Debug)]
struct SettlementJob {
    outcome: VerdictOutcome,
    veracity: f64,
    confidence: f64,
    resolved_at: Timestamp,
    // Expiry refunds without recording a verdict or touching reputation
    expired: bool,
    // Instructions not yet dispatched, in payout order
    pending: Vec<PayoutInstruction>,
    // References of the dispatched payout transactions
    dispatched: Vec<TxRef>,
    // Whether some thread is currently driving this job
    in_flight: bool,
}

#[derive(Clone, Debug)]
enum Phase {
    /// Accepting stakes and testimony
    Open,
    /// An outcome was decided; settlement is running or awaiting resume
    Resolving(SettlementJob),
    /// Settled, or expired and refunded
    Done,
    /// An invariant violation stopped settlement for good
    Halted,
}

#[derive(Clone, Debug)]
struct ItemSlot {
    record: NewsItem,
    phase: Phase,
}

/// The engine. Generic over the gateway so tests can plug in a double.
pub struct VerdictEngine<G> {
    config: Config,
    gateway: G,
    storage: Arc<dyn Storage + Send + Sync>,
    stakes: StakeLedger,
    witnesses: WitnessRegistry,
    reputation: Mutex<ReputationLedger<Identity, ItemId>>,
    items: RwLock<HashMap<ItemId, Arc<RwLock<ItemSlot>>>>,
    next_item_id: AtomicU64,
}

impl<G: LedgerGateway> VerdictEngine<G> {
    /// Build an engine over a validated configuration.
    pub fn new(
        config: Config,
        gateway: G,
        storage: Arc<dyn Storage + Send + Sync>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(VerdictEngine {
            config,
            gateway,
            storage,
            stakes: StakeLedger::new(),
            witnesses: WitnessRegistry::new(),
            reputation: Mutex::new(ReputationLedger::new()),
            items: RwLock::new(HashMap::new()),
            next_item_id: AtomicU64::new(1),
        })
    }

    /// Accept a news item accused of misinformation.
    ///
    /// The analysis score arrives with the submission, so the item opens
    /// for staking immediately: it is created `Submitted` and advanced to
    /// `Active` in the same call.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_item(
        &self,
        title: String,
        source_url: String,
        submitter: Identity,
        analysis_score: u8,
        summary: String,
        evidence_links: Vec<String>,
        now: Timestamp,
    ) -> NodeResult<ItemId> {
        let id = ItemId::new(format!(
            "item-{}",
            self.next_item_id.fetch_add(1, Ordering::SeqCst)
        ));
        let mut record = NewsItem::new(
            id.clone(),
            title,
            source_url,
            submitter,
            analysis_score,
            summary,
            evidence_links,
            now,
        );
        debug!(
            "item {id}: submitted with analysis score {}",
            record.analysis_score
        );
        record.state = ItemState::Active;

        self.stakes.register_item(&id)?;
        self.witnesses.register_item(&id)?;
        self.storage.put_t(keys::news(&id), &record)?;
        let slot = Arc::new(RwLock::new(ItemSlot {
            record,
            phase: Phase::Open,
        }));
        self.items.write()?.insert(id.clone(), slot);
        info!("item {id}: active");

        Ok(id)
    }

    /// Accept a stake after checking its escrow transaction against the
    /// ledger: the transaction must be confirmed, and its on-ledger
    /// amount and sender must match what the staker claims.
    pub fn submit_stake(
        &self,
        item: &ItemId,
        staker: Identity,
        position: Position,
        amount: Drops,
        tx_ref: TxRef,
        now: Timestamp,
    ) -> NodeResult<StakeId> {
        self.ensure_open(item)?;

        let proof = self.gateway.verify_transaction(&tx_ref)?;
        if !proof.confirmed {
            return Err(NodeError::UnconfirmedTransaction { tx_ref });
        }
        if proof.amount != amount || proof.sender != staker {
            warn!(
                "item {item}: stake by {staker} does not match the on-ledger facts of {tx_ref}"
            );
            return Err(NodeError::TransactionMismatch { tx_ref });
        }

        let id = self
            .stakes
            .place_stake(item, staker, position, amount, tx_ref, now)?;
        self.persist_stakes(item)?;

        Ok(id)
    }

    /// Accept witness testimony, freezing the witness's current
    /// reputation into the statement.
    pub fn submit_testimony(
        &self,
        item: &ItemId,
        witness: Identity,
        position: Position,
        statement: String,
        supersedes: Option<WitnessId>,
        now: Timestamp,
    ) -> NodeResult<WitnessId> {
        self.ensure_open(item)?;

        let snapshot = self.reputation.lock()?.get(&witness);
        let id = self.witnesses.submit_testimony(
            item, witness, position, statement, snapshot, supersedes, now,
        )?;
        self.persist_witnesses(item)?;

        Ok(id)
    }

    /// The current veracity of an item, recomputed from the latest
    /// committed stake totals and testimony. A pure read.
    pub fn veracity(&self, item: &ItemId) -> NodeResult<Veracity> {
        let slot = self.slot(item)?;
        let guard = slot.read()?;

        self.veracity_of(&guard.record)
    }

    /// Decide whether an item may leave the `Active` state, and if so,
    /// settle it.
    ///
    /// Resolution requires the confidence threshold and the dispute
    /// window; without them the item expires once the deadline passes,
    /// refunding every stake. Exactly one caller wins the transition:
    /// concurrent attempts observe [`NodeError::SettlementInProgress`].
    pub fn evaluate(&self, item: &ItemId, now: Timestamp) -> NodeResult<Evaluation> {
        let slot = self.slot(item)?;
        {
            let mut guard = slot.write()?;
            match &guard.phase {
                Phase::Open => {}
                Phase::Resolving(_) => {
                    return Err(NodeError::SettlementInProgress { item: item.clone() })
                }
                Phase::Halted => return Err(NodeError::SettlementHalted { item: item.clone() }),
                Phase::Done => return Err(NodeError::ItemClosed { item: item.clone() }),
            }

            let veracity = self.veracity_of(&guard.record)?;
            let age = now - guard.record.created_at;
            let resolution = &self.config.resolution;
            let job = if veracity.confidence >= resolution.confidence_threshold
                && age >= resolution.min_dispute_window_secs as i64
            {
                let outcome = outcome_from_score(veracity.score);
                info!(
                    "item {item}: resolving {outcome} (score {:.3}, confidence {:.3})",
                    veracity.score, veracity.confidence
                );
                SettlementJob {
                    outcome,
                    veracity: veracity.score,
                    confidence: veracity.confidence,
                    resolved_at: now,
                    expired: false,
                    pending: Vec::new(),
                    dispatched: Vec::new(),
                    in_flight: true,
                }
            } else if age >= resolution.expiry_deadline_secs as i64 {
                info!(
                    "item {item}: expiry deadline passed at confidence {:.3}, refunding",
                    veracity.confidence
                );
                SettlementJob {
                    outcome: VerdictOutcome::Unresolved,
                    veracity: veracity.score,
                    confidence: veracity.confidence,
                    resolved_at: now,
                    expired: true,
                    pending: Vec::new(),
                    dispatched: Vec::new(),
                    in_flight: true,
                }
            } else {
                return Ok(Evaluation::Pending);
            };
            guard.phase = Phase::Resolving(job);
        }

        self.prepare_payouts(item, &slot)?;
        self.run_settlement(item, &slot)
    }

    /// Resume a settlement whose payouts could not all be dispatched.
    ///
    /// The verdict, the payout set and any reputation deltas of the
    /// original decision stand; only undelivered payouts are retried.
    pub fn retry_settlement(&self, item: &ItemId) -> NodeResult<Evaluation> {
        let slot = self.slot(item)?;
        {
            let mut guard = slot.write()?;
            match &mut guard.phase {
                Phase::Resolving(job) => {
                    if job.in_flight {
                        return Err(NodeError::SettlementInProgress { item: item.clone() });
                    }
                    job.in_flight = true;
                }
                Phase::Halted => return Err(NodeError::SettlementHalted { item: item.clone() }),
                _ => return Err(NodeError::NotSettling { item: item.clone() }),
            }
        }

        self.run_settlement(item, &slot)
    }

    /// The latest committed record of an item, if the engine knows it.
    pub fn get_news_item(&self, item: &ItemId) -> NodeResult<Option<NewsItem>> {
        match self.items.read()?.get(item) {
            Some(slot) => Ok(Some(slot.read()?.record.clone())),
            None => Ok(None),
        }
    }

    /// Current stake totals per position.
    pub fn get_stake_totals(&self, item: &ItemId) -> NodeResult<StakeTotals> {
        Ok(self.stakes.totals_for(item)?)
    }

    /// All testimony recorded on an item, oldest first.
    pub fn get_witnesses(&self, item: &ItemId) -> NodeResult<Vec<WitnessStatement>> {
        Ok(self.witnesses.witnesses_for(item)?)
    }

    /// The verdict of an item, if one has been recorded.
    pub fn get_verdict(&self, item: &ItemId) -> NodeResult<Option<Verdict>> {
        Ok(self.storage.get_t(&keys::verdict(item))?)
    }

    /// The current reputation of an identity.
    pub fn get_reputation(&self, id: &Identity) -> NodeResult<u8> {
        Ok(self.reputation.lock()?.get(id))
    }

    fn slot(&self, item: &ItemId) -> NodeResult<Arc<RwLock<ItemSlot>>> {
        self.items
            .read()?
            .get(item)
            .cloned()
            .ok_or_else(|| NodeError::ItemNotFound { item: item.clone() })
    }

    fn ensure_open(&self, item: &ItemId) -> NodeResult<()> {
        let slot = self.slot(item)?;
        let guard = slot.read()?;
        match &guard.phase {
            Phase::Open if guard.record.state == ItemState::Active => Ok(()),
            Phase::Resolving(_) => Err(NodeError::SettlementInProgress { item: item.clone() }),
            Phase::Halted => Err(NodeError::SettlementHalted { item: item.clone() }),
            _ => Err(NodeError::ItemClosed { item: item.clone() }),
        }
    }

    fn veracity_of(&self, record: &NewsItem) -> NodeResult<Veracity> {
        let totals = self.stakes.totals_for(&record.id)?;
        let summary = self.witnesses.credibility(&record.id)?;

        Ok(compute_veracity(
            record.analysis_score,
            &totals,
            &summary,
            &self.config.scoring,
        ))
    }

    // Turn the decided outcome into payout instructions. Runs outside the
    // slot lock; the stake ledger's own settled flag is the second gate
    // against paying a pool out twice.
    fn prepare_payouts(&self, item: &ItemId, slot: &Arc<RwLock<ItemSlot>>) -> NodeResult<()> {
        let (outcome, expired) = {
            let guard = slot.read()?;
            match &guard.phase {
                Phase::Resolving(job) => (job.outcome, job.expired),
                _ => return Err(NodeError::NotSettling { item: item.clone() }),
            }
        };

        let result = if expired {
            self.stakes.refund(item)
        } else {
            match outcome {
                VerdictOutcome::True => self.stakes.settle(item, Position::True),
                VerdictOutcome::False => self.stakes.settle(item, Position::False),
                // An exact tie: nobody wins against the escrowed pool
                VerdictOutcome::Unresolved => self.stakes.refund(item),
            }
        };

        match result {
            Ok(payouts) => {
                let mut guard = slot.write()?;
                if let Phase::Resolving(job) = &mut guard.phase {
                    job.pending = payouts;
                }

                Ok(())
            }
            Err(
                fatal @ (StakeError::ConservationMismatch { .. } | StakeError::AlreadySettled { .. }),
            ) => {
                error!("item {item}: settlement halted: {fatal}");
                slot.write()?.phase = Phase::Halted;

                Err(fatal.into())
            }
            Err(other) => Err(other.into()),
        }
    }

    // Dispatch pending payouts one by one, recording progress after each
    // so a resumed settlement never pays an instruction twice, then
    // finalize. On an undeliverable payout the job is parked for
    // retry_settlement.
    fn run_settlement(&self, item: &ItemId, slot: &Arc<RwLock<ItemSlot>>) -> NodeResult<Evaluation> {
        loop {
            let next = {
                let guard = slot.read()?;
                match &guard.phase {
                    Phase::Resolving(job) => job.pending.first().cloned(),
                    _ => return Err(NodeError::NotSettling { item: item.clone() }),
                }
            };
            let Some(instruction) = next else { break };

            match self.dispatch_with_backoff(&instruction) {
                Ok(tx) => {
                    let mut guard = slot.write()?;
                    if let Phase::Resolving(job) = &mut guard.phase {
                        job.pending.remove(0);
                        job.dispatched.push(tx);
                    }
                }
                Err(e) => {
                    warn!(
                        "item {item}: payout of {} to {} undeliverable for now: {e}",
                        instruction.amount, instruction.destination
                    );
                    let mut guard = slot.write()?;
                    if let Phase::Resolving(job) = &mut guard.phase {
                        job.in_flight = false;
                    }

                    return Ok(Evaluation::SettlementPending);
                }
            }
        }

        self.finalize(item, slot)
    }

    fn dispatch_with_backoff(&self, instruction: &PayoutInstruction) -> Result<TxRef, GatewayError> {
        let settlement = &self.config.settlement;
        let mut attempt = 0;
        loop {
            match self
                .gateway
                .submit_payout(&instruction.destination, instruction.amount)
            {
                Ok(tx) => return Ok(tx),
                Err(e) if e.is_retryable() && attempt < settlement.max_retries => {
                    let delay = settlement
                        .backoff_base_ms
                        .saturating_mul(1u64 << attempt.min(16));
                    debug!("payout attempt {attempt} failed ({e}), backing off {delay}ms");
                    thread::sleep(Duration::from_millis(delay));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // All payouts are dispatched: apply reputation, record the verdict,
    // commit the terminal state.
    fn finalize(&self, item: &ItemId, slot: &Arc<RwLock<ItemSlot>>) -> NodeResult<Evaluation> {
        let job = {
            let guard = slot.read()?;
            match &guard.phase {
                Phase::Resolving(job) => job.clone(),
                _ => return Err(NodeError::NotSettling { item: item.clone() }),
            }
        };

        if job.expired {
            let record = {
                let mut guard = slot.write()?;
                guard.record.state = ItemState::Expired;
                guard.phase = Phase::Done;
                guard.record.clone()
            };
            self.storage.put_t(keys::news(item), &record)?;
            info!("item {item}: expired, {} stakes refunded", job.dispatched.len());

            return Ok(Evaluation::Expired);
        }

        // An unresolved verdict refunds everyone and judges nobody
        if job.outcome != VerdictOutcome::Unresolved {
            self.apply_reputation(item, &job)?;
        }

        let verdict = Verdict {
            item: item.clone(),
            outcome: job.outcome,
            veracity: job.veracity,
            confidence: job.confidence,
            weights: self.config.scoring.weights,
            resolved_at: job.resolved_at,
            settlement_txs: job.dispatched,
        };
        self.storage.put_t(keys::verdict(item), &verdict)?;

        let record = {
            let mut guard = slot.write()?;
            guard.record.state = ItemState::Resolved;
            guard.phase = Phase::Done;
            guard.record.clone()
        };
        self.storage.put_t(keys::news(item), &record)?;
        info!(
            "item {item}: resolved {} with {} payouts",
            verdict.outcome,
            verdict.settlement_txs.len()
        );

        Ok(Evaluation::Resolved(verdict))
    }

    fn apply_reputation(&self, item: &ItemId, job: &SettlementJob) -> NodeResult<()> {
        let mut adjustments: Vec<(Identity, DeltaCause)> = Vec::new();
        for stake in self.stakes.stakes_for(item)? {
            let cause = if job.outcome.matches(stake.position) {
                DeltaCause::AccurateStake
            } else {
                DeltaCause::InaccurateStake
            };
            adjustments.push((stake.staker, cause));
        }
        // Testimony against the verdict is not penalized
        for statement in self.witnesses.witnesses_for(item)? {
            if job.outcome.matches(statement.position) {
                adjustments.push((statement.witness, DeltaCause::VerifiedWitness));
            }
        }

        let key = SettlementKey {
            item: item.clone(),
            resolved_at: job.resolved_at,
        };
        let touched: Vec<Identity> = adjustments.iter().map(|(id, _)| id.clone()).collect();
        let mut reputation = self.reputation.lock()?;
        match reputation.apply_settlement(
            key,
            adjustments,
            self.config.resolution.reputation_base_delta,
            job.resolved_at,
        ) {
            Ok(changes) => debug!("item {item}: {} reputation deltas applied", changes.len()),
            // A resumed settlement reaches this point again; the deltas
            // of the first pass stand.
            Err(already) => debug!("item {item}: {already}"),
        }
        for id in touched {
            let record = ReputationRecord {
                score: reputation.get(&id),
                history: reputation.history(&id).to_vec(),
            };
            self.storage.put_t(keys::reputation(&id), &record)?;
        }

        Ok(())
    }

    fn persist_stakes(&self, item: &ItemId) -> NodeResult<()> {
        let log = self.stakes.stakes_for(item)?;
        self.storage.put_t(keys::stakes(item), &log)?;

        Ok(())
    }

    fn persist_witnesses(&self, item: &ItemId) -> NodeResult<()> {
        let log = self.witnesses.witnesses_for(item)?;
        self.storage.put_t(keys::witnesses(item), &log)?;

        Ok(())
    }
}
