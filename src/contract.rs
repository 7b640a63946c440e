// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use block_lottery::{
    ledger::DrawEntropy, LotteryAbi, LotteryConfig, LotteryError, LotteryEvent, LotteryOperation,
    LotteryResponse, LotteryResult, LOTTERY_STREAM_NAME,
};
use linera_sdk::{
    linera_base_types::{Account, AccountOwner, Amount, StreamName, WithContractAbi},
    views::{RootView, View},
    Contract, ContractRuntime,
};
use self::state::LotteryState;

pub struct LotteryContract {
    state: LotteryState,
    runtime: ContractRuntime<Self>,
}

linera_sdk::contract!(LotteryContract);

impl WithContractAbi for LotteryContract {
    type Abi = LotteryAbi;
}

impl Contract for LotteryContract {
    type Message = ();
    type Parameters = ();
    type InstantiationArgument = LotteryConfig;
    type EventValue = LotteryEvent;

    async fn load(runtime: ContractRuntime<Self>) -> Self {
        let state = LotteryState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        LotteryContract { state, runtime }
    }

    async fn instantiate(&mut self, config: Self::InstantiationArgument) {
        let tick = self.current_tick();
        match self.state.initialize(config, tick) {
            Ok(round) => eprintln!(
                "Lottery instantiated: round {} open until tick {}, ticket price {}",
                round.id, round.deadline, config.ticket_price
            ),
            Err(e) => panic!("Failed to instantiate lottery: {}", e),
        }
    }

    async fn execute_operation(&mut self, operation: Self::Operation) -> Self::Response {
        match operation {
            LotteryOperation::Purchase {
                ticket_count,
                payment,
            } => {
                let buyer = self
                    .runtime
                    .authenticated_signer()
                    .expect("Purchasing tickets requires an authenticated signer");
                let tick = self.current_tick();

                let receipt = match self.state.purchase(buyer, ticket_count, payment, tick).await {
                    Ok(receipt) => receipt,
                    Err(e) => panic!("Failed to purchase tickets: {}", e),
                };

                // Collect the payment into the pot; a short balance rejects the whole block.
                let pot_account = self.pot_account();
                self.runtime.transfer(buyer, pot_account, payment);
                self.runtime.emit(
                    StreamName::from(LOTTERY_STREAM_NAME),
                    &LotteryEvent::from(&receipt),
                );

                eprintln!(
                    "Purchase: {} bought {} ticket(s) in round {} at tick {}",
                    buyer, ticket_count, receipt.round_id, tick
                );
                LotteryResponse::Purchased(receipt)
            }

            LotteryOperation::Draw => {
                let tick = self.current_tick();
                let round = self.state.current_round();
                let entropy = DrawEntropy {
                    timestamp_micros: self.runtime.system_time().micros(),
                    block_height: tick,
                    round_id: round.id,
                    tickets_sold: round.tickets_sold,
                };
                let pot_owner = self.pot_owner();
                let runtime = &mut self.runtime;

                let record = match self
                    .state
                    .draw(tick, entropy.seed(), |winner, amount| {
                        pay_winner(runtime, pot_owner, winner, amount)
                    })
                    .await
                {
                    Ok(record) => record,
                    Err(e) => panic!("Failed to draw round {}: {}", round.id, e),
                };

                self.runtime.emit(
                    StreamName::from(LOTTERY_STREAM_NAME),
                    &LotteryEvent::from(&record),
                );

                match record.winner {
                    Some(winner) => eprintln!(
                        "Draw: round {} won by {} (ticket {:?} of {}), prize {}",
                        record.round_id,
                        winner,
                        record.winning_index,
                        record.tickets_sold,
                        record.amount_won
                    ),
                    None => eprintln!("Draw: round {} had no tickets", record.round_id),
                }
                LotteryResponse::Drawn(record)
            }

            LotteryOperation::CurrentRound => LotteryResponse::Round(self.state.current_round()),
        }
    }

    async fn execute_message(&mut self, _message: Self::Message) {
        panic!("Block lottery doesn't support any cross-chain messages");
    }

    async fn store(mut self) {
        self.state.save().await.expect("Failed to save state");
    }
}

impl LotteryContract {
    fn current_tick(&mut self) -> u64 {
        self.runtime.block_height().0
    }

    /// The application's own account holds the pot between purchase and draw.
    fn pot_owner(&mut self) -> AccountOwner {
        AccountOwner::from(self.runtime.application_id().forget_abi())
    }

    fn pot_account(&mut self) -> Account {
        Account {
            chain_id: self.runtime.chain_id(),
            owner: self.pot_owner(),
        }
    }
}

fn pay_winner(
    runtime: &mut ContractRuntime<LotteryContract>,
    pot_owner: AccountOwner,
    winner: AccountOwner,
    amount: Amount,
) -> LotteryResult<()> {
    let available = runtime.owner_balance(pot_owner);
    if available < amount {
        return Err(LotteryError::PayoutFailed {
            winner,
            amount,
            reason: format!("pot account holds only {}", available),
        });
    }
    let destination = Account {
        chain_id: runtime.chain_id(),
        owner: winner,
    };
    runtime.transfer(pot_owner, destination, amount);
    Ok(())
}
