// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::{
    linera_base_types::{AccountOwner, Amount},
    views::ViewError,
};
use thiserror::Error;

/// Every way a ledger operation can be refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LotteryError {
    #[error("minimum one ticket")]
    InvalidQuantity,
    #[error("round {round_id} closed at tick {deadline}; purchases are no longer accepted (tick {tick})")]
    RoundClosed { round_id: u64, deadline: u64, tick: u64 },
    #[error("payment of {payment} does not match the price of {ticket_count} ticket(s)")]
    IncorrectPayment { ticket_count: u64, payment: Amount },
    #[error("draw window of round {round_id} opens at tick {deadline} (tick {tick})")]
    TooEarly { round_id: u64, deadline: u64, tick: u64 },
    #[error("payout of {amount} to {winner} failed: {reason}")]
    PayoutFailed {
        winner: AccountOwner,
        amount: Amount,
        reason: String,
    },
    #[error("invalid lottery configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("math overflow")]
    MathOverflow,
    #[error("ticket {index} of round {round_id} is missing")]
    MissingTicket { round_id: u64, index: u64 },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<ViewError> for LotteryError {
    fn from(error: ViewError) -> Self {
        LotteryError::Storage(format!("{:?}", error))
    }
}

pub type LotteryResult<T> = Result<T, LotteryError>;
