use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::chain::{ChainContext, ChainReader, ChainResult};
use crate::history::HistoryAggregator;
use crate::models::{Balances, ChartMode, CurveState, PriceSeries, Timeframe, TradeDirection, TradeQuote};
use crate::quote::QuoteEngine;
use crate::units;

use super::trigger::RefreshTrigger;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Price history refresh period (default 30s).
    pub history_interval: Duration,
    /// Market stats refresh period (default 30s).
    pub stats_interval: Duration,
    /// Account balance refresh period (default 15s).
    pub balance_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            history_interval: Duration::from_secs(30),
            stats_interval: Duration::from_secs(30),
            balance_interval: Duration::from_secs(15),
        }
    }
}

/// What the user is currently asking a quote for. `amount: None` means there
/// is nothing to quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteInput {
    pub direction: TradeDirection,
    pub amount: Option<Decimal>,
}

impl Default for QuoteInput {
    fn default() -> Self {
        Self {
            direction: TradeDirection::Buy,
            amount: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySelection {
    pub timeframe: Timeframe,
    pub mode: ChartMode,
}

impl Default for HistorySelection {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::OneDay,
            mode: ChartMode::Line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Concern {
    History,
    Stats,
    Balances,
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concern::History => write!(f, "history"),
            Concern::Stats => write!(f, "stats"),
            Concern::Balances => write!(f, "balances"),
        }
    }
}

/// Monotonic trigger counter. A result may be published only while its ticket
/// is still the latest one handed out.
#[derive(Debug, Default)]
struct Generation(AtomicU64);

impl Generation {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.0.load(Ordering::SeqCst) == ticket
    }
}

struct Shared {
    quotes: Arc<QuoteEngine>,
    history: Arc<HistoryAggregator>,
    reader: Arc<dyn ChainReader>,

    subject: watch::Sender<Option<ChainContext>>,
    quote_input: watch::Sender<QuoteInput>,
    selection: watch::Sender<HistorySelection>,

    quote_tx: watch::Sender<Option<TradeQuote>>,
    series_tx: watch::Sender<Option<PriceSeries>>,
    stats_tx: watch::Sender<Option<CurveState>>,
    balances_tx: watch::Sender<Option<Balances>>,

    quote_gen: Generation,
    history_gen: Generation,
    stats_gen: Generation,
    balances_gen: Generation,
}

impl Shared {
    fn current_subject(&self) -> Option<ChainContext> {
        *self.subject.borrow()
    }

    /// Store `value` if `ticket` is still the latest for its concern. The check
    /// runs under the channel's write lock so an older result can never
    /// overwrite a newer one.
    fn publish<T>(
        &self,
        generation: &Generation,
        ticket: u64,
        tx: &watch::Sender<Option<T>>,
        value: Option<T>,
        concern: &str,
    ) -> bool {
        let published = tx.send_if_modified(|slot| {
            if generation.is_current(ticket) {
                *slot = value;
                true
            } else {
                false
            }
        });
        if !published {
            counter!("stale_results_discarded_total").increment(1);
            tracing::debug!(concern, ticket, "Discarding superseded result");
        }
        published
    }

    /// Invalidate everything in flight and clear visible state.
    ///
    /// The subject is swapped before the generations move. A trigger takes its
    /// ticket before reading the subject, so a ticket that is still current
    /// always belongs to the subject it read.
    fn reset(&self, subject: Option<ChainContext>) {
        self.subject.send_replace(subject);

        self.quote_gen.next();
        self.history_gen.next();
        self.stats_gen.next();
        self.balances_gen.next();

        self.quote_tx.send_replace(None);
        self.series_tx.send_replace(None);
        self.stats_tx.send_replace(None);
        self.balances_tx.send_replace(None);
    }

    /// Quote the current input in the background.
    fn spawn_quote(self: &Arc<Self>) {
        let ticket = self.quote_gen.next();
        let input = *self.quote_input.borrow();

        let Some(ctx) = self.current_subject() else {
            return;
        };
        let Some(amount) = input.amount.filter(|a| *a > Decimal::ZERO) else {
            self.publish(&self.quote_gen, ticket, &self.quote_tx, None, "quote");
            return;
        };

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let value = match shared.quotes.quote(&ctx, input.direction, amount).await {
                Ok(quote) => Some(quote),
                Err(e) => {
                    tracing::warn!(
                        market = %ctx.market,
                        direction = %input.direction,
                        amount = %amount,
                        error = %e,
                        "Quote refresh failed"
                    );
                    None
                }
            };
            shared.publish(&shared.quote_gen, ticket, &shared.quote_tx, value, "quote");
        });
    }

    fn spawn_refresh(self: &Arc<Self>, concern: Concern) {
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.refresh(concern).await });
    }

    fn generation(&self, concern: Concern) -> &Generation {
        match concern {
            Concern::History => &self.history_gen,
            Concern::Stats => &self.stats_gen,
            Concern::Balances => &self.balances_gen,
        }
    }

    async fn refresh(&self, concern: Concern) {
        // ticket first, then the subject it applies to
        let ticket = self.generation(concern).next();
        let Some(ctx) = self.current_subject() else {
            return;
        };
        match concern {
            Concern::History => self.refresh_history(ctx, ticket).await,
            Concern::Stats => self.refresh_stats(ctx, ticket).await,
            Concern::Balances => self.refresh_balances(ctx, ticket).await,
        }
    }

    async fn refresh_history(&self, ctx: ChainContext, ticket: u64) {
        let selection = *self.selection.borrow();

        match self.history.history(&ctx, selection.timeframe, selection.mode).await {
            Ok(series) => {
                self.publish(&self.history_gen, ticket, &self.series_tx, Some(series), "history");
            }
            Err(e) => {
                tracing::warn!(market = %ctx.market, error = %e, "History refresh failed");
            }
        }
    }

    async fn refresh_stats(&self, ctx: ChainContext, ticket: u64) {
        match self.read_stats(&ctx).await {
            Ok(stats) => {
                self.publish(&self.stats_gen, ticket, &self.stats_tx, Some(stats), "stats");
            }
            Err(e) => {
                tracing::warn!(market = %ctx.market, error = %e, "Stats refresh failed");
            }
        }
    }

    async fn read_stats(&self, ctx: &ChainContext) -> ChainResult<CurveState> {
        let (price, supply, contract_native_balance) = tokio::try_join!(
            self.reader.current_price(ctx.market),
            self.reader.supply(ctx.market),
            self.reader.native_balance(ctx.market),
        )?;

        Ok(CurveState {
            current_price: units::from_wei(price)?,
            total_supply: supply.total_supply,
            total_sold: supply.total_sold,
            contract_native_balance,
        })
    }

    async fn refresh_balances(&self, ctx: ChainContext, ticket: u64) {
        let Some(account) = ctx.account else {
            self.publish(&self.balances_gen, ticket, &self.balances_tx, None, "balances");
            return;
        };

        let result = tokio::try_join!(
            self.reader.native_balance(account),
            self.reader.token_balance(ctx.market, account),
        );
        match result {
            Ok((native, token)) => {
                let balances = Balances { native, token };
                self.publish(&self.balances_gen, ticket, &self.balances_tx, Some(balances), "balances");
            }
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "Balance refresh failed");
            }
        }
    }
}

/// Keeps quote, price history, market stats and balances current for one
/// subject (chain + market + account).
///
/// Each concern is single-flight with last-trigger-wins semantics: a result is
/// published only if no newer trigger for the same concern was issued while it
/// was in flight. Periodic timers live for as long as the subject does.
pub struct RefreshScheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
    trigger: RefreshTrigger,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        quotes: Arc<QuoteEngine>,
        history: Arc<HistoryAggregator>,
        reader: Arc<dyn ChainReader>,
        config: SchedulerConfig,
    ) -> Self {
        let shared = Shared {
            quotes,
            history,
            reader,
            subject: watch::Sender::new(None),
            quote_input: watch::Sender::new(QuoteInput::default()),
            selection: watch::Sender::new(HistorySelection::default()),
            quote_tx: watch::Sender::new(None),
            series_tx: watch::Sender::new(None),
            stats_tx: watch::Sender::new(None),
            balances_tx: watch::Sender::new(None),
            quote_gen: Generation::default(),
            history_gen: Generation::default(),
            stats_gen: Generation::default(),
            balances_gen: Generation::default(),
        };

        Self {
            shared: Arc::new(shared),
            config,
            trigger: RefreshTrigger::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn start(&self, ctx: ChainContext) {
        self.set_subject(ctx);
    }

    /// Switch to a new subject: cancel the timers, drop everything in flight,
    /// clear visible state, then restart the timers and re-quote the current
    /// input against the new subject.
    pub fn set_subject(&self, ctx: ChainContext) {
        self.stop_timers();
        self.shared.reset(Some(ctx));

        let handles = vec![
            self.spawn_timer(Concern::History, self.config.history_interval),
            self.spawn_timer(Concern::Stats, self.config.stats_interval),
            self.spawn_timer(Concern::Balances, self.config.balance_interval),
            self.spawn_trigger_loop(),
        ];
        *self.tasks.lock().unwrap_or_else(PoisonError::into_inner) = handles;

        self.shared.spawn_quote();

        tracing::info!(
            chain_id = ctx.chain_id,
            market = %ctx.market,
            account = ?ctx.account,
            "Refresh scheduler started"
        );
    }

    /// Stop all timers and clear state. In-flight results are discarded.
    pub fn shutdown(&self) {
        self.stop_timers();
        self.shared.reset(None);
        tracing::info!("Refresh scheduler stopped");
    }

    /// Set the quote input from user-entered text. Empty or invalid text clears
    /// the quote.
    pub fn set_quote_input(&self, direction: TradeDirection, amount: &str) {
        self.set_quote_amount(direction, units::parse_token_amount(amount).ok());
    }

    pub fn set_quote_amount(&self, direction: TradeDirection, amount: Option<Decimal>) {
        self.shared
            .quote_input
            .send_replace(QuoteInput { direction, amount });
        self.shared.spawn_quote();
    }

    /// Re-quote the current input.
    pub fn requote(&self) {
        self.shared.spawn_quote();
    }

    pub fn set_timeframe(&self, timeframe: Timeframe) {
        self.shared.selection.send_modify(|s| s.timeframe = timeframe);
        self.shared.spawn_refresh(Concern::History);
    }

    pub fn set_chart_mode(&self, mode: ChartMode) {
        self.shared.selection.send_modify(|s| s.mode = mode);
        self.shared.spawn_refresh(Concern::History);
    }

    /// Handle for requesting an immediate balance, stats and history refresh.
    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    pub fn refresh_now(&self) {
        self.trigger.fire();
    }

    pub fn subject(&self) -> Option<ChainContext> {
        self.shared.current_subject()
    }

    pub fn quote_input(&self) -> QuoteInput {
        *self.shared.quote_input.borrow()
    }

    pub fn selection(&self) -> HistorySelection {
        *self.shared.selection.borrow()
    }

    pub fn quote(&self) -> Option<TradeQuote> {
        self.shared.quote_tx.borrow().clone()
    }

    pub fn series(&self) -> Option<PriceSeries> {
        self.shared.series_tx.borrow().clone()
    }

    pub fn stats(&self) -> Option<CurveState> {
        self.shared.stats_tx.borrow().clone()
    }

    pub fn balances(&self) -> Option<Balances> {
        *self.shared.balances_tx.borrow()
    }

    pub fn subscribe_quote(&self) -> watch::Receiver<Option<TradeQuote>> {
        self.shared.quote_tx.subscribe()
    }

    pub fn subscribe_series(&self) -> watch::Receiver<Option<PriceSeries>> {
        self.shared.series_tx.subscribe()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<Option<CurveState>> {
        self.shared.stats_tx.subscribe()
    }

    pub fn subscribe_balances(&self) -> watch::Receiver<Option<Balances>> {
        self.shared.balances_tx.subscribe()
    }

    fn spawn_timer(&self, concern: Concern, period: Duration) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(%concern, period_secs = period.as_secs(), "Refresh timer started");

            loop {
                ticker.tick().await;
                shared.refresh(concern).await;
            }
        })
    }

    fn spawn_trigger_loop(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let trigger = self.trigger.clone();
        tokio::spawn(async move {
            loop {
                trigger.notified().await;
                tracing::debug!("Immediate refresh requested");
                tokio::join!(
                    shared.refresh(Concern::Balances),
                    shared.refresh(Concern::Stats),
                    shared.refresh(Concern::History),
                );
            }
        })
    }

    fn stop_timers(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop_timers();
    }
}
