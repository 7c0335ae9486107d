use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_FEED_BASE_URL: &str = "https://forex-charting-backend-zl1y.onrender.com";
pub const DEFAULT_CANDLE_CAPACITY: usize = 100;
pub const MIN_CANDLE_CAPACITY: usize = 10;
pub const MAX_CANDLE_CAPACITY: usize = 10_000;

/// Latest known rate per instrument symbol, rebuilt wholesale on each full
/// broadcast. Ordered so table consumers iterate deterministically.
pub type RateSnapshot = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
}

/// One OHLCV sample. Immutable once appended to a series.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandleWire {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl TryFrom<CandleWire> for Candle {
    type Error = AppError;

    fn try_from(value: CandleWire) -> Result<Self, Self::Error> {
        let prices = [value.open, value.high, value.low, value.close];
        if prices.iter().any(|price| !price.is_finite() || *price <= 0.0) {
            return Err(AppError::MalformedMessage(
                "candle prices must be finite and positive".to_string(),
            ));
        }
        if !value.volume.is_finite() || value.volume < 0.0 {
            return Err(AppError::MalformedMessage(
                "candle volume must be finite and non-negative".to_string(),
            ));
        }
        if value.low > value.open.min(value.close) || value.high < value.open.max(value.close) {
            return Err(AppError::MalformedMessage(
                "candle low/high must bound open and close".to_string(),
            ));
        }

        Ok(Self {
            timestamp: value.timestamp,
            open: value.open,
            high: value.high,
            low: value.low,
            close: value.close,
            volume: value.volume,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRateWire {
    pub current_rate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairDataWire {
    pub current_rate: f64,
    pub last_candle: Option<CandleWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairUpdateWire {
    pub pair: String,
    pub pair_data: PairDataWire,
}

/// Inbound frames, tagged by the `event` field with the payload under `data`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum FeedMessageWire {
    ForexUpdate(HashMap<String, PairRateWire>),
    PairUpdate(PairUpdateWire),
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
enum OutboundFrameWire<'a> {
    Subscribe(&'a str),
}

/// Per-instrument delta: the latest rate plus, when the feed has one, a full
/// candle for the chart buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentDelta {
    pub pair: String,
    pub current_rate: f64,
    pub last_candle: Option<Candle>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    FullBroadcast(RateSnapshot),
    InstrumentDelta(InstrumentDelta),
}

impl TryFrom<FeedMessageWire> for FeedMessage {
    type Error = AppError;

    fn try_from(value: FeedMessageWire) -> Result<Self, Self::Error> {
        match value {
            FeedMessageWire::ForexUpdate(rates) => {
                let mut snapshot = RateSnapshot::new();
                for (symbol, pair_rate) in rates {
                    snapshot.insert(symbol, validate_rate(pair_rate.current_rate)?);
                }
                Ok(Self::FullBroadcast(snapshot))
            }
            FeedMessageWire::PairUpdate(update) => {
                let last_candle = update
                    .pair_data
                    .last_candle
                    .map(Candle::try_from)
                    .transpose()?;
                Ok(Self::InstrumentDelta(InstrumentDelta {
                    pair: update.pair,
                    current_rate: validate_rate(update.pair_data.current_rate)?,
                    last_candle,
                }))
            }
        }
    }
}

fn validate_rate(rate: f64) -> Result<f64, AppError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AppError::MalformedMessage(
            "rate must be finite and positive".to_string(),
        ));
    }
    Ok(rate)
}

pub fn parse_feed_message(payload: &mut [u8]) -> Result<FeedMessage, AppError> {
    let wire: FeedMessageWire = simd_json::serde::from_slice(payload)?;
    wire.try_into()
}

pub fn encode_subscribe(symbol: &str) -> Result<String, AppError> {
    Ok(simd_json::serde::to_string(&OutboundFrameWire::Subscribe(
        symbol,
    ))?)
}

pub fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidArgument(
            "symbol must be non-empty alphanumeric ASCII".to_string(),
        ));
    }
    Ok(symbol)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfigArgs {
    pub base_url: Option<String>,
    pub candle_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub candle_capacity: usize,
}

impl FeedConfigArgs {
    pub fn normalize(self) -> Result<FeedConfig, AppError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_FEED_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(AppError::InvalidArgument(
                "baseUrl must start with http:// or https://".to_string(),
            ));
        }

        let candle_capacity = self.candle_capacity.unwrap_or(DEFAULT_CANDLE_CAPACITY);
        if !(MIN_CANDLE_CAPACITY..=MAX_CANDLE_CAPACITY).contains(&candle_capacity) {
            return Err(AppError::InvalidArgument(format!(
                "candleCapacity must be between {MIN_CANDLE_CAPACITY} and {MAX_CANDLE_CAPACITY}"
            )));
        }

        Ok(FeedConfig {
            base_url,
            candle_capacity,
        })
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            candle_capacity: DEFAULT_CANDLE_CAPACITY,
        }
    }
}
