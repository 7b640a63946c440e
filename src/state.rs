// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use block_lottery::{
    DrawRecord, LotteryConfig, LotteryError, LotteryResult, OpenRound, PurchaseReceipt,
    TicketBatch, TICKET_HISTORY_ROUNDS,
};
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use linera_sdk::views::{linera_views, MapView, RegisterView, RootView, ViewStorageContext};

/// The application state for the Block Lottery.
#[derive(RootView)]
#[view(context = ViewStorageContext)]
pub struct LotteryState {
    /// Set once at instantiation
    pub config: RegisterView<LotteryConfig>,
    /// The only round accepting purchases
    pub round: RegisterView<OpenRound>,
    /// Ticket batches: (round_id, purchase number) -> consecutive entries of one buyer
    pub batches: MapView<(u64, u64), TicketBatch>,
    /// Number of entries per owner: (round_id, owner) -> tickets
    pub holdings: MapView<(u64, AccountOwner), u64>,
    /// Outcome of every drawn round, never pruned
    pub draws: MapView<u64, DrawRecord>,
}

// Mutations are only reachable from the contract.
#[allow(dead_code)]
impl LotteryState {
    /// Stores the configuration and opens round 1.
    pub fn initialize(&mut self, config: LotteryConfig, tick: u64) -> LotteryResult<OpenRound> {
        let round = OpenRound::genesis(&config, tick)?;
        self.config.set(config);
        self.round.set(round);
        Ok(round)
    }

    /// Appends `ticket_count` entries for `buyer` to the open round.
    /// Every check runs before the first write.
    pub async fn purchase(
        &mut self,
        buyer: AccountOwner,
        ticket_count: u64,
        payment: Amount,
        tick: u64,
    ) -> LotteryResult<PurchaseReceipt> {
        let config = *self.config.get();
        let mut round = *self.round.get();
        round.check_purchase(&config, ticket_count, payment, tick)?;

        let held = self
            .holdings
            .get(&(round.id, buyer))
            .await?
            .unwrap_or_default();
        let held = held
            .checked_add(ticket_count)
            .ok_or(LotteryError::MathOverflow)?;
        let purchase_number = round.purchases;
        let batch = round.record_purchase(buyer, ticket_count)?;

        self.batches.insert(&(round.id, purchase_number), batch)?;
        self.holdings.insert(&(round.id, buyer), held)?;
        self.round.set(round);

        Ok(PurchaseReceipt {
            buyer,
            ticket_count,
            round_id: round.id,
            first_index: batch.first_index,
            amount_paid: payment,
        })
    }

    /// Draws the open round and opens the next one.
    ///
    /// `payout` is invoked with the winner and the full pot before anything is
    /// written; if it fails, the round stays open and undrawn.
    pub async fn draw<P>(&mut self, tick: u64, seed: u64, payout: P) -> LotteryResult<DrawRecord>
    where
        P: FnOnce(AccountOwner, Amount) -> LotteryResult<()>,
    {
        let config = *self.config.get();
        let round = *self.round.get();
        round.check_draw(tick)?;
        let next = round.next(&config, tick)?;

        let (winner, winning_index, amount_won) = match round.winning_index(seed) {
            Some(index) => {
                let owner = self
                    .entry_owner(round.id, round.purchases, index)
                    .await?
                    .ok_or(LotteryError::MissingTicket {
                        round_id: round.id,
                        index,
                    })?;
                (Some(owner), Some(index), round.pot(&config)?)
            }
            None => (None, None, Amount::ZERO),
        };

        if let Some(owner) = winner {
            payout(owner, amount_won)?;
        }

        let record = DrawRecord {
            round_id: round.id,
            winner,
            amount_won,
            winning_index,
            tickets_sold: round.tickets_sold,
            purchases: round.purchases,
            deadline: round.deadline,
            drawn_at: tick,
        };
        self.draws.insert(&round.id, record.clone())?;
        self.round.set(next);
        self.prune_expired_tickets(round.id).await?;

        Ok(record)
    }

    /// Owner of entry `index`, found by bisecting the round's `purchases` batches.
    async fn entry_owner(
        &self,
        round_id: u64,
        purchases: u64,
        index: u64,
    ) -> LotteryResult<Option<AccountOwner>> {
        let (mut low, mut high) = (0, purchases);
        while low < high {
            let middle = low + (high - low) / 2;
            let Some(batch) = self.batches.get(&(round_id, middle)).await? else {
                return Ok(None);
            };
            if index < batch.first_index {
                high = middle;
            } else if batch.contains(index) {
                return Ok(Some(batch.owner));
            } else {
                low = middle + 1;
            }
        }
        Ok(None)
    }

    /// Drops the ticket list of the round that just left the history window.
    async fn prune_expired_tickets(&mut self, drawn_round_id: u64) -> LotteryResult<()> {
        let expired = match drawn_round_id.checked_sub(TICKET_HISTORY_ROUNDS) {
            Some(round_id) if round_id > 0 => round_id,
            _ => return Ok(()),
        };
        let Some(record) = self.draws.get(&expired).await? else {
            return Ok(());
        };

        for purchase_number in 0..record.purchases {
            if let Some(batch) = self.batches.get(&(expired, purchase_number)).await? {
                self.holdings.remove(&(expired, batch.owner))?;
            }
            self.batches.remove(&(expired, purchase_number))?;
        }
        Ok(())
    }

    pub fn config(&self) -> LotteryConfig {
        *self.config.get()
    }

    pub fn current_round(&self) -> OpenRound {
        *self.round.get()
    }

    /// Funds collected by the open round so far.
    pub fn pot(&self) -> LotteryResult<Amount> {
        self.round.get().pot(self.config.get())
    }

    /// Owner of a ticket entry, `None` when out of range or already pruned.
    pub async fn ticket_at(&self, round_id: u64, index: u64) -> LotteryResult<Option<AccountOwner>> {
        let round = self.round.get();
        let purchases = if round_id == round.id {
            round.purchases
        } else {
            match self.draws.get(&round_id).await? {
                Some(record) => record.purchases,
                None => return Ok(None),
            }
        };
        self.entry_owner(round_id, purchases, index).await
    }

    pub async fn tickets_held(&self, round_id: u64, owner: AccountOwner) -> LotteryResult<u64> {
        Ok(self
            .holdings
            .get(&(round_id, owner))
            .await?
            .unwrap_or_default())
    }

    pub async fn draw_record(&self, round_id: u64) -> LotteryResult<Option<DrawRecord>> {
        Ok(self.draws.get(&round_id).await?)
    }

    /// All drawn rounds, oldest first.
    pub async fn draw_history(&self) -> LotteryResult<Vec<DrawRecord>> {
        let current = self.round.get().id;
        let mut records = Vec::with_capacity(current.saturating_sub(1) as usize);
        for round_id in 1..current {
            if let Some(record) = self.draws.get(&round_id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
