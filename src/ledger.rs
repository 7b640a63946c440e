// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Round rules of the lottery, independent of storage and of the chain runtime.
//!
//! Every function takes the current tick explicitly. Nothing here reads a clock
//! or touches funds; callers apply the outcome to their own state.

use async_graphql::SimpleObject;
use linera_sdk::linera_base_types::{AccountOwner, Amount};
use serde::{Deserialize, Serialize};

use crate::{LotteryConfig, LotteryError, LotteryResult};

/// The round currently accepting tickets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct OpenRound {
    pub id: u64,
    /// Tick at which the round was opened.
    pub opened_at: u64,
    /// Purchases are accepted strictly before this tick, draws at or after it.
    pub deadline: u64,
    pub tickets_sold: u64,
    /// Number of accepted purchases, each stored as one `TicketBatch`.
    pub purchases: u64,
}

impl OpenRound {
    /// Opens round 1 at the genesis tick.
    pub fn genesis(config: &LotteryConfig, tick: u64) -> LotteryResult<Self> {
        config.validate()?;
        Self::open(1, config, tick)
    }

    fn open(id: u64, config: &LotteryConfig, tick: u64) -> LotteryResult<Self> {
        let deadline = tick
            .checked_add(config.round_length)
            .ok_or(LotteryError::MathOverflow)?;
        Ok(OpenRound {
            id,
            opened_at: tick,
            deadline,
            tickets_sold: 0,
            purchases: 0,
        })
    }

    pub fn accepts_purchases(&self, tick: u64) -> bool {
        tick < self.deadline
    }

    pub fn accepts_draw(&self, tick: u64) -> bool {
        tick >= self.deadline
    }

    /// Validates a purchase against this round. The first failing check wins:
    /// quantity, then timing, then payment.
    pub fn check_purchase(
        &self,
        config: &LotteryConfig,
        ticket_count: u64,
        payment: Amount,
        tick: u64,
    ) -> LotteryResult<()> {
        if ticket_count == 0 {
            return Err(LotteryError::InvalidQuantity);
        }
        if !self.accepts_purchases(tick) {
            return Err(LotteryError::RoundClosed {
                round_id: self.id,
                deadline: self.deadline,
                tick,
            });
        }
        if ticket_cost(config, ticket_count) != Some(payment) {
            return Err(LotteryError::IncorrectPayment {
                ticket_count,
                payment,
            });
        }
        // The pot must stay representable after the purchase.
        let tickets_sold = self
            .tickets_sold
            .checked_add(ticket_count)
            .ok_or(LotteryError::MathOverflow)?;
        ticket_cost(config, tickets_sold).ok_or(LotteryError::MathOverflow)?;
        Ok(())
    }

    /// Appends `ticket_count` entries for `owner` and returns them as one batch.
    /// Only call after `check_purchase` succeeded.
    pub fn record_purchase(
        &mut self,
        owner: AccountOwner,
        ticket_count: u64,
    ) -> LotteryResult<TicketBatch> {
        let first_index = self.tickets_sold;
        let tickets_sold = first_index
            .checked_add(ticket_count)
            .ok_or(LotteryError::MathOverflow)?;
        let purchases = self
            .purchases
            .checked_add(1)
            .ok_or(LotteryError::MathOverflow)?;
        self.tickets_sold = tickets_sold;
        self.purchases = purchases;
        Ok(TicketBatch {
            owner,
            first_index,
            ticket_count,
        })
    }

    pub fn check_draw(&self, tick: u64) -> LotteryResult<()> {
        if !self.accepts_draw(tick) {
            return Err(LotteryError::TooEarly {
                round_id: self.id,
                deadline: self.deadline,
                tick,
            });
        }
        Ok(())
    }

    /// Sum of all payments accepted in this round.
    pub fn pot(&self, config: &LotteryConfig) -> LotteryResult<Amount> {
        ticket_cost(config, self.tickets_sold).ok_or(LotteryError::MathOverflow)
    }

    /// Index of the winning ticket entry, uniform over entries for a uniform seed.
    pub fn winning_index(&self, seed: u64) -> Option<u64> {
        (self.tickets_sold > 0).then(|| seed % self.tickets_sold)
    }

    /// The round that replaces this one once it is drawn at `tick`.
    pub fn next(&self, config: &LotteryConfig, tick: u64) -> LotteryResult<OpenRound> {
        let id = self.id.checked_add(1).ok_or(LotteryError::MathOverflow)?;
        Self::open(id, config, tick)
    }
}

/// Consecutive ticket entries bought by one purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketBatch {
    pub owner: AccountOwner,
    pub first_index: u64,
    pub ticket_count: u64,
}

impl TicketBatch {
    pub fn contains(&self, index: u64) -> bool {
        index >= self.first_index && index - self.first_index < self.ticket_count
    }
}

/// Exact price of `ticket_count` tickets, `None` if it does not fit in an `Amount`.
pub fn ticket_cost(config: &LotteryConfig, ticket_count: u64) -> Option<Amount> {
    u128::from(config.ticket_price)
        .checked_mul(u128::from(ticket_count))
        .map(Amount::from_attos)
}

/// Block data the draw seed is derived from.
///
/// All of these are public and a block proposer can influence them, so the
/// resulting draw is only as fair as the proposer is honest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawEntropy {
    pub timestamp_micros: u64,
    pub block_height: u64,
    pub round_id: u64,
    pub tickets_sold: u64,
}

impl DrawEntropy {
    pub fn seed(&self) -> u64 {
        [
            self.timestamp_micros,
            self.block_height,
            self.round_id,
            self.tickets_sold,
        ]
        .iter()
        .fold(0x6c6f_7474_6572_7921, |state, input| splitmix64(state ^ input))
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config() -> LotteryConfig {
        LotteryConfig {
            round_length: 20,
            ticket_price: Amount::from_millis(1),
        }
    }

    fn buyer(byte: u8) -> AccountOwner {
        AccountOwner::Address20([byte; 20])
    }

    #[test]
    fn genesis_round() {
        let round = OpenRound::genesis(&config(), 1).unwrap();
        assert_eq!(round.id, 1);
        assert_eq!(round.deadline, 21);
        assert_eq!(round.tickets_sold, 0);
        assert_eq!(round.pot(&config()).unwrap(), Amount::ZERO);
    }

    #[test]
    fn genesis_rejects_empty_config() {
        let zero_length = LotteryConfig {
            round_length: 0,
            ..config()
        };
        let free = LotteryConfig {
            ticket_price: Amount::ZERO,
            ..config()
        };
        assert_matches!(
            OpenRound::genesis(&zero_length, 1),
            Err(LotteryError::InvalidConfig(_))
        );
        assert_matches!(
            OpenRound::genesis(&free, 1),
            Err(LotteryError::InvalidConfig(_))
        );
    }

    #[test]
    fn zero_tickets_is_invalid_whatever_the_payment() {
        let round = OpenRound::genesis(&config(), 1).unwrap();
        for payment in [Amount::ZERO, Amount::from_millis(1), Amount::from_tokens(5)] {
            assert_eq!(
                round.check_purchase(&config(), 0, payment, 2),
                Err(LotteryError::InvalidQuantity)
            );
        }
        // Quantity is checked before timing.
        assert_eq!(
            round.check_purchase(&config(), 0, Amount::ZERO, 500),
            Err(LotteryError::InvalidQuantity)
        );
    }

    #[test]
    fn timing_is_checked_before_payment() {
        let round = OpenRound::genesis(&config(), 1).unwrap();
        assert_eq!(
            round.check_purchase(&config(), 3, Amount::from_millis(2), 21),
            Err(LotteryError::RoundClosed {
                round_id: 1,
                deadline: 21,
                tick: 21
            })
        );
    }

    #[test]
    fn payment_must_be_exact() {
        let round = OpenRound::genesis(&config(), 1).unwrap();
        for payment in [Amount::from_millis(2), Amount::from_millis(4), Amount::ZERO] {
            assert_eq!(
                round.check_purchase(&config(), 3, payment, 2),
                Err(LotteryError::IncorrectPayment {
                    ticket_count: 3,
                    payment
                })
            );
        }
        assert_eq!(
            round.check_purchase(&config(), 3, Amount::from_millis(3), 2),
            Ok(())
        );
    }

    #[test]
    fn unrepresentable_cost_is_an_incorrect_payment() {
        let config = LotteryConfig {
            round_length: 20,
            ticket_price: Amount::from_attos(u128::MAX),
        };
        let round = OpenRound::genesis(&config, 1).unwrap();
        assert_matches!(
            round.check_purchase(&config, 2, Amount::from_attos(u128::MAX), 2),
            Err(LotteryError::IncorrectPayment { ticket_count: 2, .. })
        );
    }

    #[test]
    fn pot_must_stay_representable() {
        let config = LotteryConfig {
            round_length: 20,
            ticket_price: Amount::from_attos(u128::MAX),
        };
        let mut round = OpenRound::genesis(&config, 1).unwrap();
        round.check_purchase(&config, 1, Amount::from_attos(u128::MAX), 2).unwrap();
        round.record_purchase(buyer(1), 1).unwrap();
        assert_eq!(
            round.check_purchase(&config, 1, Amount::from_attos(u128::MAX), 3),
            Err(LotteryError::MathOverflow)
        );
    }

    #[test]
    fn last_purchase_tick_and_first_draw_tick() {
        let round = OpenRound::genesis(&config(), 1).unwrap();
        assert!(round
            .check_purchase(&config(), 1, Amount::from_millis(1), 20)
            .is_ok());
        assert_matches!(
            round.check_purchase(&config(), 1, Amount::from_millis(1), 21),
            Err(LotteryError::RoundClosed { .. })
        );
        assert_eq!(
            round.check_draw(20),
            Err(LotteryError::TooEarly {
                round_id: 1,
                deadline: 21,
                tick: 20
            })
        );
        assert_eq!(round.check_draw(21), Ok(()));
        assert_eq!(round.check_draw(1_000), Ok(()));
    }

    #[test]
    fn pot_tracks_every_accepted_ticket() {
        let mut round = OpenRound::genesis(&config(), 1).unwrap();
        let mut accepted = Amount::ZERO;
        for (count, tick) in [(2, 2), (3, 5), (1, 20)] {
            let payment = ticket_cost(&config(), count).unwrap();
            round.check_purchase(&config(), count, payment, tick).unwrap();
            let batch = round.record_purchase(buyer(1), count).unwrap();
            assert_eq!(batch.first_index + count, round.tickets_sold);
            accepted = accepted.saturating_add(payment);
        }
        assert_eq!(round.tickets_sold, 6);
        assert_eq!(round.purchases, 3);
        assert_eq!(round.pot(&config()).unwrap(), accepted);
        assert_eq!(accepted, Amount::from_millis(6));
    }

    #[test]
    fn next_round_starts_empty_at_draw_tick() {
        let mut round = OpenRound::genesis(&config(), 1).unwrap();
        round.record_purchase(buyer(1), 4).unwrap();
        let next = round.next(&config(), 33).unwrap();
        assert_eq!(
            next,
            OpenRound {
                id: 2,
                opened_at: 33,
                deadline: 53,
                tickets_sold: 0,
                purchases: 0
            }
        );
    }

    #[test]
    fn batches_cover_consecutive_entries() {
        let mut round = OpenRound::genesis(&config(), 1).unwrap();
        let first = round.record_purchase(buyer(1), 1).unwrap();
        let second = round.record_purchase(buyer(2), 3).unwrap();
        assert_eq!(
            second,
            TicketBatch {
                owner: buyer(2),
                first_index: 1,
                ticket_count: 3
            }
        );
        assert!(first.contains(0));
        assert!(!first.contains(1));
        assert!((1..4).all(|index| second.contains(index)));
        assert!(!second.contains(0));
        assert!(!second.contains(4));
        assert!(!second.contains(u64::MAX));
    }

    #[test]
    fn one_batch_per_purchase_whatever_its_size() {
        let config = LotteryConfig {
            round_length: 20,
            ticket_price: Amount::from_attos(1),
        };
        let mut round = OpenRound::genesis(&config, 1).unwrap();
        let count = 1_000_000_000;
        round
            .check_purchase(&config, count, Amount::from_attos(count.into()), 2)
            .unwrap();
        let batch = round.record_purchase(buyer(1), count).unwrap();
        assert_eq!(round.purchases, 1);
        assert_eq!(round.tickets_sold, count);
        assert!(batch.contains(count - 1));
    }

    #[test]
    fn deadline_overflow_is_reported() {
        let round = OpenRound::genesis(&config(), 1).unwrap();
        assert_eq!(
            round.next(&config(), u64::MAX),
            Err(LotteryError::MathOverflow)
        );
    }

    #[test]
    fn empty_round_has_no_winner() {
        let round = OpenRound::genesis(&config(), 1).unwrap();
        assert_eq!(round.winning_index(12345), None);
    }

    #[test]
    fn selection_is_exact_over_a_full_seed_cycle() {
        // Buyer 0 holds 3 entries, buyer 1 holds 1, buyer 2 holds 6.
        let entries = [0, 0, 0, 1, 2, 2, 2, 2, 2, 2];
        let round = OpenRound {
            id: 1,
            opened_at: 0,
            deadline: 20,
            tickets_sold: entries.len() as u64,
            purchases: 3,
        };
        let mut wins = [0u64; 3];
        for seed in 1_000..1_000 + entries.len() as u64 * 7 {
            let index = round.winning_index(seed).unwrap();
            wins[entries[index as usize]] += 1;
        }
        assert_eq!(wins, [21, 7, 42]);
    }

    #[test]
    fn selection_weights_entries_not_buyers() {
        let round = OpenRound {
            id: 1,
            opened_at: 0,
            deadline: 20,
            tickets_sold: 4,
            purchases: 2,
        };
        let draws = 40_000u64;
        let mut single_ticket_wins = 0u64;
        for draw in 0..draws {
            let entropy = DrawEntropy {
                timestamp_micros: 1_700_000_000_000_000 + draw * 250_000,
                block_height: 21 + draw,
                round_id: draw + 1,
                tickets_sold: 4,
            };
            // Entry 0 belongs to the single-ticket buyer, entries 1..4 to the other.
            if round.winning_index(entropy.seed()) == Some(0) {
                single_ticket_wins += 1;
            }
        }
        let share = single_ticket_wins as f64 / draws as f64;
        assert!((share - 0.25).abs() < 0.02, "share was {}", share);
    }

    #[test]
    fn seed_depends_on_every_input() {
        let entropy = DrawEntropy {
            timestamp_micros: 42,
            block_height: 21,
            round_id: 1,
            tickets_sold: 6,
        };
        let seed = entropy.seed();
        assert_eq!(seed, entropy.seed());
        let variants = [
            DrawEntropy {
                timestamp_micros: 43,
                ..entropy
            },
            DrawEntropy {
                block_height: 22,
                ..entropy
            },
            DrawEntropy {
                round_id: 2,
                ..entropy
            },
            DrawEntropy {
                tickets_sold: 7,
                ..entropy
            },
        ];
        for variant in variants {
            assert_ne!(variant.seed(), seed);
        }
    }
}
