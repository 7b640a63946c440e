// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! ABI of the Block Lottery Application */

mod error;
pub mod ledger;

use async_graphql::{Request, Response, SimpleObject};
use linera_sdk::linera_base_types::{AccountOwner, Amount, ContractAbi, ServiceAbi};
use serde::{Deserialize, Serialize};

pub use self::error::{LotteryError, LotteryResult};
pub use self::ledger::{OpenRound, TicketBatch};

/// Name of the stream carrying `LotteryEvent`s.
pub const LOTTERY_STREAM_NAME: &[u8] = b"block_lottery";

/// Number of drawn rounds whose ticket lists are kept before being pruned.
pub const TICKET_HISTORY_ROUNDS: u64 = 5;

/// About one day worth of blocks.
pub const DEFAULT_ROUND_LENGTH: u64 = 6350;

pub struct LotteryAbi;

impl ContractAbi for LotteryAbi {
    type Operation = LotteryOperation;
    type Response = LotteryResponse;
}

impl ServiceAbi for LotteryAbi {
    type Query = Request;
    type QueryResponse = Response;
}

/// Game configuration, supplied once when the application is created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, SimpleObject)]
pub struct LotteryConfig {
    /// Number of blocks a round stays open for purchases.
    pub round_length: u64,
    /// Price of a single ticket.
    pub ticket_price: Amount,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        LotteryConfig {
            round_length: DEFAULT_ROUND_LENGTH,
            ticket_price: Amount::from_millis(1),
        }
    }
}

impl LotteryConfig {
    pub fn validate(&self) -> LotteryResult<()> {
        if self.round_length == 0 {
            return Err(LotteryError::InvalidConfig("round length must be positive"));
        }
        if self.ticket_price == Amount::ZERO {
            return Err(LotteryError::InvalidConfig("ticket price must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub enum LotteryOperation {
    /// Buy `ticket_count` tickets in the open round, paying exactly `payment`
    /// from the authenticated signer's account.
    Purchase { ticket_count: u64, payment: Amount },
    /// Draw the open round once its deadline has been reached. Anyone may call this.
    Draw,
    /// Get the open round
    CurrentRound,
}

#[derive(Debug, Deserialize, Serialize)]
pub enum LotteryResponse {
    Purchased(PurchaseReceipt),
    Drawn(DrawRecord),
    Round(OpenRound),
}

/// Outcome of an accepted purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct PurchaseReceipt {
    pub buyer: AccountOwner,
    pub ticket_count: u64,
    pub round_id: u64,
    /// Index of the first ticket entry appended by this purchase.
    pub first_index: u64,
    pub amount_paid: Amount,
}

/// Permanent record of a drawn round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct DrawRecord {
    pub round_id: u64,
    /// `None` when the round sold no tickets.
    pub winner: Option<AccountOwner>,
    pub amount_won: Amount,
    pub winning_index: Option<u64>,
    pub tickets_sold: u64,
    /// Number of purchases in the round, which locates its ticket batches until pruned.
    pub purchases: u64,
    pub deadline: u64,
    pub drawn_at: u64,
}

/// Values emitted on the `LOTTERY_STREAM_NAME` stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotteryEvent {
    Purchase {
        buyer: AccountOwner,
        ticket_count: u64,
        round_id: u64,
    },
    Draw {
        winner: Option<AccountOwner>,
        amount_won: Amount,
        round_id: u64,
    },
}

impl From<&PurchaseReceipt> for LotteryEvent {
    fn from(receipt: &PurchaseReceipt) -> Self {
        LotteryEvent::Purchase {
            buyer: receipt.buyer,
            ticket_count: receipt.ticket_count,
            round_id: receipt.round_id,
        }
    }
}

impl From<&DrawRecord> for LotteryEvent {
    fn from(record: &DrawRecord) -> Self {
        LotteryEvent::Draw {
            winner: record.winner,
            amount_won: record.amount_won,
            round_id: record.round_id,
        }
    }
}
