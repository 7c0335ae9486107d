use crate::feed::buffer::TimeSeriesBuffer;
use crate::feed::subscription::ActiveSubscription;
use crate::feed::types::{FeedMessage, InstrumentDelta, RateSnapshot};
use crate::render::{ListenerSet, PairDisplay};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

/// Routes classified feed messages to the candle buffer, the rate snapshot,
/// and the render listeners. Deltas for symbols other than the active
/// subscription still reach the buffer but never the current-pair readout.
pub struct UpdateDispatcher {
    buffer: Arc<TimeSeriesBuffer>,
    subscription: ActiveSubscription,
    display: Arc<Mutex<PairDisplay>>,
    rates: RwLock<RateSnapshot>,
    listeners: Arc<ListenerSet>,
}

impl UpdateDispatcher {
    pub fn new(
        buffer: Arc<TimeSeriesBuffer>,
        subscription: ActiveSubscription,
        display: Arc<Mutex<PairDisplay>>,
        listeners: Arc<ListenerSet>,
    ) -> Self {
        Self {
            buffer,
            subscription,
            display,
            rates: RwLock::new(RateSnapshot::new()),
            listeners,
        }
    }

    pub fn dispatch(&self, message: FeedMessage) {
        match message {
            FeedMessage::FullBroadcast(snapshot) => self.apply_full_broadcast(snapshot),
            FeedMessage::InstrumentDelta(delta) => self.apply_instrument_delta(delta),
        }
    }

    fn apply_full_broadcast(&self, snapshot: RateSnapshot) {
        debug!(symbols = snapshot.len(), "applying full broadcast");

        if let Some(active) = self.subscription.get() {
            if let Some(rate) = snapshot.get(&active) {
                self.display.lock().apply_rate(*rate);
            }
        }

        {
            let mut writable = self.rates.write();
            *writable = snapshot.clone();
        }

        self.listeners.notify_full_snapshot(&snapshot);
    }

    fn apply_instrument_delta(&self, delta: InstrumentDelta) {
        debug!(pair = %delta.pair, has_candle = delta.last_candle.is_some(), "applying delta");

        if let Some(candle) = delta.last_candle {
            self.buffer.append(&delta.pair, candle.clone());
            self.listeners.notify_candle_appended(&delta.pair, &candle);
        }

        if self.subscription.matches(&delta.pair) {
            self.display.lock().apply_rate(delta.current_rate);
        }
    }

    /// Copy of the latest full-broadcast snapshot for table pulls.
    pub fn rates(&self) -> RateSnapshot {
        self.rates.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::Candle;
    use crate::render::{RenderListener, PLACEHOLDER_TEXT};

    #[derive(Default)]
    struct RecordingListener {
        snapshots: Mutex<Vec<RateSnapshot>>,
        candles: Mutex<Vec<(String, Candle)>>,
    }

    impl RenderListener for RecordingListener {
        fn on_full_snapshot(&self, rates: &RateSnapshot) {
            self.snapshots.lock().push(rates.clone());
        }

        fn on_candle_appended(&self, symbol: &str, candle: &Candle) {
            self.candles.lock().push((symbol.to_string(), candle.clone()));
        }
    }

    struct Harness {
        dispatcher: UpdateDispatcher,
        buffer: Arc<TimeSeriesBuffer>,
        subscription: ActiveSubscription,
        display: Arc<Mutex<PairDisplay>>,
        listener: Arc<RecordingListener>,
    }

    fn harness() -> Harness {
        let buffer = Arc::new(TimeSeriesBuffer::new(100));
        let subscription = ActiveSubscription::default();
        let display = Arc::new(Mutex::new(PairDisplay::default()));
        let listener = Arc::new(RecordingListener::default());
        let listeners = Arc::new(ListenerSet::new(vec![Arc::clone(&listener) as _]));
        let dispatcher = UpdateDispatcher::new(
            Arc::clone(&buffer),
            subscription.clone(),
            Arc::clone(&display),
            listeners,
        );

        Harness {
            dispatcher,
            buffer,
            subscription,
            display,
            listener,
        }
    }

    fn sample_candle(timestamp: i64, close: f64) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close + 0.01,
            low: close - 0.01,
            close,
            volume: 5.0,
        }
    }

    fn broadcast(entries: &[(&str, f64)]) -> FeedMessage {
        FeedMessage::FullBroadcast(
            entries
                .iter()
                .map(|(symbol, rate)| (symbol.to_string(), *rate))
                .collect(),
        )
    }

    fn delta(pair: &str, rate: f64, candle: Option<Candle>) -> FeedMessage {
        FeedMessage::InstrumentDelta(InstrumentDelta {
            pair: pair.to_string(),
            current_rate: rate,
            last_candle: candle,
        })
    }

    #[test]
    fn broadcast_rebuilds_snapshot_wholesale() {
        let h = harness();
        h.dispatcher
            .dispatch(broadcast(&[("EURUSD", 1.1), ("GBPUSD", 1.5)]));
        h.dispatcher.dispatch(broadcast(&[("EURUSD", 1.2)]));

        let rates = h.dispatcher.rates();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates.get("EURUSD"), Some(&1.2));
        assert_eq!(h.listener.snapshots.lock().len(), 2);
    }

    #[test]
    fn broadcast_updates_display_for_active_pair() {
        let h = harness();
        h.subscription.set(Some("EURUSD".to_string()));
        h.display.lock().select_pair(Some("EURUSD"));

        h.dispatcher.dispatch(broadcast(&[("EURUSD", 1.2345)]));

        let display = h.display.lock();
        assert_eq!(display.price_text(), "1.234500");
        assert_eq!(display.change_text(), "+0.0000%");
    }

    #[test]
    fn broadcast_computes_change_against_previous_display() {
        let h = harness();
        h.subscription.set(Some("EURUSD".to_string()));
        h.display.lock().select_pair(Some("EURUSD"));

        h.dispatcher.dispatch(broadcast(&[("EURUSD", 1.0)]));
        h.dispatcher.dispatch(broadcast(&[("EURUSD", 1.01)]));

        assert_eq!(h.display.lock().change_text(), "+1.0000%");
    }

    #[test]
    fn broadcast_without_active_pair_leaves_display_alone() {
        let h = harness();
        h.dispatcher.dispatch(broadcast(&[("EURUSD", 1.2345)]));

        assert_eq!(h.display.lock().price_text(), PLACEHOLDER_TEXT);
    }

    #[test]
    fn delta_appends_candle_and_notifies() {
        let h = harness();
        h.subscription.set(Some("EURUSD".to_string()));

        h.dispatcher
            .dispatch(delta("EURUSD", 1.24, Some(sample_candle(60_000, 1.24))));

        assert_eq!(h.buffer.len("EURUSD"), 1);
        let recorded = h.listener.candles.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "EURUSD");
        assert_eq!(h.display.lock().price_text(), "1.240000");
    }

    #[test]
    fn delta_for_other_symbol_updates_buffer_not_display() {
        let h = harness();
        h.subscription.set(Some("EURUSD".to_string()));
        h.display.lock().select_pair(Some("EURUSD"));
        h.dispatcher.dispatch(broadcast(&[("EURUSD", 1.2)]));

        h.dispatcher
            .dispatch(delta("GBPUSD", 1.55, Some(sample_candle(60_000, 1.55))));

        assert_eq!(h.buffer.len("GBPUSD"), 1);
        assert_eq!(h.buffer.len("EURUSD"), 0);
        assert_eq!(h.display.lock().price_text(), "1.200000");
    }

    #[test]
    fn delta_without_candle_leaves_buffer_unchanged() {
        let h = harness();
        h.subscription.set(Some("EURUSD".to_string()));

        h.dispatcher.dispatch(delta("EURUSD", 1.26, None));

        assert_eq!(h.buffer.len("EURUSD"), 0);
        assert!(h.listener.candles.lock().is_empty());
        assert_eq!(h.display.lock().price_text(), "1.260000");
    }
}
