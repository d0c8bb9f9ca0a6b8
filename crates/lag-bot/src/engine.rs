//! Engine: routes market data to per-market strategies and signals to
//! execution.
//!
//! One strategy instance exists per (asset × window) pair. The engine owns
//! the tokenId → strategy routing table, fans spot ticks out to every
//! strategy on that asset, and replaces bindings atomically when market
//! discovery rotates a pair onto a new contract. Signals pass through the
//! per-market stacking gate and the risk manager before reaching the
//! executor.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use lag_common::{CryptoAsset, WindowDuration};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::data_source::{BookUpdate, DataSource, MarketEvent, MarketRotation, SpotUpdate};
use crate::executor::Executor;
use crate::risk::RiskManager;
use crate::state_store::StateStore;
use crate::strategy::{MarketStrategy, Signal, StrategyConfig};

/// Feed subscription commands sent to the contract book client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionCommand {
    Subscribe(String),
    Unsubscribe(String),
}

/// The signal-to-execution router.
pub struct Engine {
    /// Strategy per (asset, window) family.
    strategies: HashMap<(CryptoAsset, WindowDuration), Arc<Mutex<MarketStrategy>>>,
    /// Live tokenId bindings; replaced atomically on rotation.
    routes: DashMap<String, Arc<Mutex<MarketStrategy>>>,
    risk: Arc<Mutex<RiskManager>>,
    executor: Arc<Executor>,
    /// Book-feed subscription channel, when the client wants one.
    subscriptions: Option<mpsc::UnboundedSender<SubscriptionCommand>>,
}

impl Engine {
    /// Build an engine with one strategy per requested (asset, window)
    /// pair. Each strategy sizes against the risk manager's live bankroll.
    pub fn new(
        risk: Arc<Mutex<RiskManager>>,
        executor: Arc<Executor>,
        pairs: Vec<(CryptoAsset, WindowDuration, StrategyConfig)>,
    ) -> Self {
        let mut strategies = HashMap::new();
        for (asset, window, cfg) in pairs {
            let bankroll = {
                let risk = risk.clone();
                Arc::new(move || risk.lock().bankroll())
            };
            let strategy = Arc::new(Mutex::new(MarketStrategy::new(asset, cfg, bankroll)));
            strategies.insert((asset, window), strategy);
        }
        Self {
            strategies,
            routes: DashMap::new(),
            risk,
            executor,
            subscriptions: None,
        }
    }

    /// Attach the book-feed subscription channel.
    pub fn with_subscriptions(
        mut self,
        tx: mpsc::UnboundedSender<SubscriptionCommand>,
    ) -> Self {
        self.subscriptions = Some(tx);
        self
    }

    #[inline]
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Whether a token currently routes to a strategy.
    pub fn is_routed(&self, token_id: &str) -> bool {
        self.routes.contains_key(token_id)
    }

    /// Drain the data source until it ends.
    pub async fn run(&self, mut source: impl DataSource) {
        info!(
            strategies = self.strategies.len(),
            "engine started"
        );
        loop {
            match source.next_event().await {
                Ok(Some(event)) => self.handle_event(event).await,
                Ok(None) => {
                    info!("data source ended");
                    return;
                }
                Err(e) => {
                    warn!("data source error: {}", e);
                    self.note_unhandled_error();
                }
            }
        }
    }

    /// Dispatch a single market event.
    pub async fn handle_event(&self, event: MarketEvent) {
        match event {
            MarketEvent::Spot(update) => self.on_spot(update).await,
            MarketEvent::Book(update) => self.on_book(update).await,
            MarketEvent::Rotation(rotation) => self.on_rotation(rotation).await,
        }
    }

    /// Fan a spot tick out to every strategy trading this asset.
    async fn on_spot(&self, update: SpotUpdate) {
        let signals: Vec<Signal> = self
            .strategies
            .iter()
            .filter(|((asset, _), _)| *asset == update.asset)
            .filter_map(|(_, strategy)| strategy.lock().on_spot_update(&update))
            .collect();
        for signal in signals {
            self.submit_signal(signal).await;
        }
    }

    /// Route a book update to the strategy bound to its token.
    async fn on_book(&self, update: BookUpdate) {
        let strategy = match self.routes.get(&update.token_id) {
            Some(entry) => entry.value().clone(),
            None => {
                debug!(token = %update.token_id, "book update for unrouted token");
                return;
            }
        };
        let signal = strategy.lock().on_contract_update(&update);
        if let Some(signal) = signal {
            self.submit_signal(signal).await;
        }
    }

    /// Rebind an (asset, window) family onto its next contract.
    ///
    /// Old token routes are removed, the strategy rotates, new routes are
    /// inserted, the feed re-subscribes, and only the expiring market's
    /// open orders are cancelled.
    async fn on_rotation(&self, rotation: MarketRotation) {
        let Some(strategy) = self.strategies.get(&(rotation.asset, rotation.window)) else {
            debug!(label = %rotation.label, "rotation for untracked pair");
            return;
        };

        let (old_yes, old_no, old_label) = {
            let s = strategy.lock();
            (
                s.token_id_yes().to_string(),
                s.token_id_no().to_string(),
                s.label().to_string(),
            )
        };

        for old_token in [&old_yes, &old_no] {
            if !old_token.is_empty() {
                self.routes.remove(old_token.as_str());
                self.send_subscription(SubscriptionCommand::Unsubscribe(old_token.clone()));
            }
        }

        strategy.lock().set_market(&rotation);

        self.routes
            .insert(rotation.token_id_yes.clone(), strategy.clone());
        self.routes
            .insert(rotation.token_id_no.clone(), strategy.clone());
        self.send_subscription(SubscriptionCommand::Subscribe(rotation.token_id_yes.clone()));
        self.send_subscription(SubscriptionCommand::Subscribe(rotation.token_id_no.clone()));

        info!(
            label = %rotation.label,
            yes = %rotation.token_id_yes,
            no = %rotation.token_id_no,
            "market rotated"
        );

        if !old_label.is_empty() {
            self.executor.cancel_orders_for_label(&old_label).await;
        }
    }

    /// Gate a signal and hand it to the executor.
    ///
    /// The per-market stacking check lives here rather than in risk
    /// because risk is market-agnostic.
    pub async fn submit_signal(&self, signal: Signal) {
        if self.executor.has_open_for_label(&signal.label) {
            debug!(label = %signal.label, "signal rejected: already open for market");
            return;
        }

        let decision = self.risk.lock().can_trade(&signal);
        if !decision.allowed {
            debug!(
                label = %signal.label,
                reasons = ?decision.reasons,
                "signal rejected by risk"
            );
            return;
        }

        // Entry runs in its own task so fill polling never stalls the
        // router; the cooldown reservation above already serializes entries.
        let executor = self.executor.clone();
        tokio::spawn(async move {
            executor.execute(signal).await;
        });
    }

    /// Count a process-level unhandled error toward the storm kill.
    pub fn note_unhandled_error(&self) {
        self.risk.lock().note_unhandled_rejection();
    }

    /// Shutdown: flatten everything and persist final state.
    pub async fn shutdown(&self, store: &StateStore) {
        info!("engine shutting down");
        self.executor.cancel_all_orders().await;
        let state = crate::state_store::PersistedState::capture(
            &self.risk.lock(),
            self.executor.open_snapshot(),
        );
        store.save(&state);
    }

    fn send_subscription(&self, command: SubscriptionCommand) {
        if let Some(tx) = &self.subscriptions {
            let _ = tx.send(command);
        }
    }
}
