//! Simulated exchange client for dry-run trading.
//!
//! Orders acknowledge as `SIMULATED` and are treated as filled at the
//! requested price by the executor's dry-run path; books are whatever the
//! feed last published. No network, no money.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::clob::{
    AckStatus, Book, BookClient, ClobError, OrderRequest, PlacedOrder, RawOrder,
};
use crate::data_source::BookUpdate;

/// In-memory stand-in for the CLOB client.
#[derive(Debug, Default)]
pub struct SimClient {
    books: DashMap<String, Book>,
    next_order: AtomicU64,
}

impl SimClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror a feed book update so monitor polls see current marks.
    pub fn apply_book_update(&self, update: &BookUpdate) {
        self.books.insert(
            update.token_id.clone(),
            Book {
                token_id: update.token_id.clone(),
                best_bid: update.best_bid,
                best_ask: update.best_ask,
                bid_depth: update.bid_depth,
                ask_depth: update.ask_depth,
                mid: update.mid,
                timestamp_ms: update.timestamp_ms,
            },
        );
    }
}

#[async_trait]
impl BookClient for SimClient {
    async fn fetch_orderbook(&self, token_id: &str) -> Result<Option<Book>, ClobError> {
        Ok(self.books.get(token_id).map(|entry| entry.value().clone()))
    }

    async fn place_order(&self, _request: &OrderRequest) -> Result<PlacedOrder, ClobError> {
        let n = self.next_order.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PlacedOrder {
            id: format!("sim-{}", n),
            status: AckStatus::Simulated,
        })
    }

    async fn get_order(&self, _order_id: &str) -> Result<RawOrder, ClobError> {
        Ok(RawOrder {
            status: "MATCHED".to_string(),
            ..RawOrder::default()
        })
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<(), ClobError> {
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), ClobError> {
        Ok(())
    }
}
