use crate::feed::types::{Candle, ConnectionState, RateSnapshot};
use std::sync::Arc;

/// Render-side consumer of dashboard state. Implementations (chart, rates
/// table, status bar) register at construction time and own no ingestion
/// logic.
pub trait RenderListener: Send + Sync {
    fn on_full_snapshot(&self, _rates: &RateSnapshot) {}
    fn on_candle_appended(&self, _symbol: &str, _candle: &Candle) {}
    fn on_connection_state_changed(&self, _state: ConnectionState) {}
    fn on_error(&self, _message: &str) {}
}

/// Registered render listeners. Fixed at construction; every notification
/// fans out to all of them in registration order.
pub struct ListenerSet {
    entries: Vec<Arc<dyn RenderListener>>,
}

impl ListenerSet {
    pub fn new(entries: Vec<Arc<dyn RenderListener>>) -> Self {
        Self { entries }
    }

    pub fn notify_full_snapshot(&self, rates: &RateSnapshot) {
        for listener in &self.entries {
            listener.on_full_snapshot(rates);
        }
    }

    pub fn notify_candle_appended(&self, symbol: &str, candle: &Candle) {
        for listener in &self.entries {
            listener.on_candle_appended(symbol, candle);
        }
    }

    pub fn notify_connection_state(&self, state: ConnectionState) {
        for listener in &self.entries {
            listener.on_connection_state_changed(state);
        }
    }

    pub fn notify_error(&self, message: &str) {
        for listener in &self.entries {
            listener.on_error(message);
        }
    }
}

pub const PLACEHOLDER_TEXT: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTone {
    Positive,
    Negative,
}

/// View model for the "current pair" readout: fixed-precision rate text and
/// percent change relative to the previously displayed rate.
#[derive(Debug, Clone)]
pub struct PairDisplay {
    pair: Option<String>,
    previous_rate: Option<f64>,
    price_text: String,
    change_text: String,
    tone: ChangeTone,
}

impl Default for PairDisplay {
    fn default() -> Self {
        Self {
            pair: None,
            previous_rate: None,
            price_text: PLACEHOLDER_TEXT.to_string(),
            change_text: PLACEHOLDER_TEXT.to_string(),
            tone: ChangeTone::Positive,
        }
    }
}

impl PairDisplay {
    /// Switch the readout to another pair (or none), resetting the texts and
    /// the percent-change baseline.
    pub fn select_pair(&mut self, pair: Option<&str>) {
        self.pair = pair.map(str::to_string);
        self.previous_rate = None;
        self.price_text = PLACEHOLDER_TEXT.to_string();
        self.change_text = PLACEHOLDER_TEXT.to_string();
        self.tone = ChangeTone::Positive;
    }

    pub fn apply_rate(&mut self, rate: f64) {
        let previous = self.previous_rate.unwrap_or(rate);
        let change = ((rate - previous) / previous) * 100.0;

        self.price_text = format_rate(rate);
        self.change_text = format_percent_change(change);
        self.tone = if change >= 0.0 {
            ChangeTone::Positive
        } else {
            ChangeTone::Negative
        };
        self.previous_rate = Some(rate);
    }

    pub fn pair(&self) -> Option<&str> {
        self.pair.as_deref()
    }

    pub fn price_text(&self) -> &str {
        &self.price_text
    }

    pub fn change_text(&self) -> &str {
        &self.change_text
    }

    pub fn tone(&self) -> ChangeTone {
        self.tone
    }
}

pub fn format_rate(rate: f64) -> String {
    format!("{rate:.6}")
}

pub fn format_percent_change(change: f64) -> String {
    if change >= 0.0 {
        format!("+{change:.4}%")
    } else {
        format!("{change:.4}%")
    }
}
