// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use std::sync::Arc;

use async_graphql::{EmptySubscription, Object, Request, Response, Schema};
use block_lottery::{DrawRecord, LotteryAbi, LotteryConfig, LotteryOperation, OpenRound};
use linera_sdk::{
    linera_base_types::{AccountOwner, Amount, WithServiceAbi},
    views::View,
    Service, ServiceRuntime,
};
use self::state::LotteryState;

pub struct LotteryService {
    state: Arc<LotteryState>,
    runtime: Arc<ServiceRuntime<Self>>,
}

linera_sdk::service!(LotteryService);

impl WithServiceAbi for LotteryService {
    type Abi = LotteryAbi;
}

impl Service for LotteryService {
    type Parameters = ();

    async fn new(runtime: ServiceRuntime<Self>) -> Self {
        let state = LotteryState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        LotteryService {
            state: Arc::new(state),
            runtime: Arc::new(runtime),
        }
    }

    async fn handle_query(&self, request: Request) -> Response {
        let schema = Schema::build(
            QueryRoot {
                state: self.state.clone(),
            },
            MutationRoot {
                runtime: self.runtime.clone(),
            },
            EmptySubscription,
        )
        .finish();
        schema.execute(request).await
    }
}

struct QueryRoot {
    state: Arc<LotteryState>,
}

#[Object]
impl QueryRoot {
    /// The round currently accepting tickets
    async fn current_round(&self) -> OpenRound {
        self.state.current_round()
    }

    async fn round_id(&self) -> u64 {
        self.state.current_round().id
    }

    /// Block at or after which the open round can be drawn
    async fn deadline(&self) -> u64 {
        self.state.current_round().deadline
    }

    async fn round_length(&self) -> u64 {
        self.state.config().round_length
    }

    async fn ticket_price(&self) -> Amount {
        self.state.config().ticket_price
    }

    async fn config(&self) -> LotteryConfig {
        self.state.config()
    }

    /// Funds collected by the open round
    async fn pot(&self) -> async_graphql::Result<Amount> {
        Ok(self.state.pot()?)
    }

    /// Owner of ticket `index` in round `round_id`, null when out of range
    async fn ticket(&self, round_id: u64, index: u64) -> async_graphql::Result<Option<AccountOwner>> {
        Ok(self.state.ticket_at(round_id, index).await?)
    }

    async fn tickets_held(&self, round_id: u64, owner: AccountOwner) -> async_graphql::Result<u64> {
        Ok(self.state.tickets_held(round_id, owner).await?)
    }

    /// Outcome of a drawn round
    async fn draw(&self, round_id: u64) -> async_graphql::Result<Option<DrawRecord>> {
        Ok(self.state.draw_record(round_id).await?)
    }

    /// Every drawn round, oldest first
    async fn draws(&self) -> async_graphql::Result<Vec<DrawRecord>> {
        Ok(self.state.draw_history().await?)
    }
}

struct MutationRoot {
    runtime: Arc<ServiceRuntime<LotteryService>>,
}

#[Object]
impl MutationRoot {
    /// Buy tickets in the open round; `payment` must equal `ticket_count` times the price
    async fn purchase(&self, ticket_count: u64, payment: Amount) -> String {
        self.runtime.schedule_operation(&LotteryOperation::Purchase {
            ticket_count,
            payment,
        });
        format!("Purchase of {} ticket(s) scheduled", ticket_count)
    }

    /// Draw the open round once its deadline has passed
    async fn draw(&self) -> String {
        self.runtime.schedule_operation(&LotteryOperation::Draw);
        "Draw operation scheduled".to_string()
    }
}
