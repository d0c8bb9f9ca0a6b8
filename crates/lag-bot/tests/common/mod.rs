//! Shared test fixtures: a scriptable exchange client and signal builders.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use lag_common::Direction;
use lag_bot::clob::{
    AckStatus, Book, BookClient, ClobError, OrderRequest, PlacedOrder, RawOrder,
};
use lag_bot::strategy::Signal;

/// Build a RawOrder from literal JSON, as the wire would deliver it.
pub fn raw_order(value: Value) -> RawOrder {
    serde_json::from_value(value).expect("raw order fixture")
}

/// Scriptable exchange client.
///
/// Orders are assigned ids `ord-1`, `ord-2`, ... in placement order.
/// `get_order` responses are scripted per order id; the last response
/// repeats once the queue drains. Unscripted orders report OPEN forever.
#[derive(Default)]
pub struct ScriptedClient {
    next_order: AtomicU64,
    pub placed: Mutex<Vec<(String, OrderRequest)>>,
    pub cancelled: Mutex<Vec<String>>,
    pub cancel_all_calls: AtomicU64,
    responses: Mutex<HashMap<String, VecDeque<RawOrder>>>,
    last_response: Mutex<HashMap<String, RawOrder>>,
    books: DashMap<String, Book>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a `get_order` response for an order id.
    pub fn script_order(&self, order_id: &str, response: RawOrder) {
        self.responses
            .lock()
            .entry(order_id.to_string())
            .or_default()
            .push_back(response);
    }

    /// Publish a book the monitor will see for a token.
    pub fn set_book(&self, token_id: &str, bid: Decimal, ask: Decimal) {
        self.books.insert(
            token_id.to_string(),
            Book {
                token_id: token_id.to_string(),
                best_bid: bid,
                best_ask: ask,
                bid_depth: dec!(500),
                ask_depth: dec!(500),
                mid: (bid + ask) / Decimal::TWO,
                timestamp_ms: 0,
            },
        );
    }

    pub fn placed_count(&self) -> usize {
        self.placed.lock().len()
    }

    pub fn was_cancelled(&self, order_id: &str) -> bool {
        self.cancelled.lock().iter().any(|id| id == order_id)
    }
}

#[async_trait]
impl BookClient for ScriptedClient {
    async fn fetch_orderbook(&self, token_id: &str) -> Result<Option<Book>, ClobError> {
        Ok(self.books.get(token_id).map(|entry| entry.value().clone()))
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, ClobError> {
        let n = self.next_order.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("ord-{}", n);
        self.placed.lock().push((id.clone(), request.clone()));
        Ok(PlacedOrder {
            id,
            status: AckStatus::Open,
        })
    }

    async fn get_order(&self, order_id: &str) -> Result<RawOrder, ClobError> {
        if let Some(response) = self
            .responses
            .lock()
            .get_mut(order_id)
            .and_then(|queue| queue.pop_front())
        {
            self.last_response
                .lock()
                .insert(order_id.to_string(), response.clone());
            return Ok(response);
        }
        if let Some(last) = self.last_response.lock().get(order_id) {
            return Ok(last.clone());
        }
        Ok(raw_order(json!({ "status": "OPEN" })))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ClobError> {
        self.cancelled.lock().push(order_id.to_string());
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), ClobError> {
        self.cancel_all_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A plausible latency-arb signal; tweak fields per test.
pub fn signal(label: &str) -> Signal {
    Signal {
        token_id: "tok-yes".into(),
        direction: Direction::BuyYes,
        entry_price: dec!(0.55),
        size: dec!(5.50),
        edge: 0.08,
        model_prob: 0.75,
        contract_price: dec!(0.55),
        spot_price: dec!(100000),
        strike_price: dec!(99900),
        feed_lag_ms: 2_000,
        available_liquidity: dec!(100),
        hours_to_expiry: 0.05,
        label: label.to_string(),
        is_certainty: false,
        expires_at: None,
    }
}
