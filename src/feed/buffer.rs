use crate::feed::types::Candle;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// Per-instrument bounded candle history with strict FIFO eviction.
///
/// Series are created lazily on first append and live for the process
/// lifetime. The buffer performs no deduplication: identical candles append
/// twice, keeping every append O(1) amortized. Readers get snapshot copies,
/// never a live reference into the map.
pub struct TimeSeriesBuffer {
    series: RwLock<HashMap<String, VecDeque<Candle>>>,
    capacity: usize,
}

impl TimeSeriesBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `candle` to the tail of `symbol`'s series, evicting the oldest
    /// element when the series would exceed capacity.
    pub fn append(&self, symbol: &str, candle: Candle) {
        let mut map = self.series.write();
        let ring = map
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity + 1));

        ring.push_back(candle);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// Ordered copy of `symbol`'s series, oldest first. Empty for unknown
    /// symbols.
    pub fn snapshot(&self, symbol: &str) -> Vec<Candle> {
        let map = self.series.read();
        map.get(symbol)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, symbol: &str) -> usize {
        let map = self.series.read();
        map.get(symbol).map_or(0, VecDeque::len)
    }

    /// Clear one symbol's series, or every series when no symbol is given
    /// (full chart reset).
    pub fn clear(&self, symbol: Option<&str>) {
        let mut map = self.series.write();
        match symbol {
            Some(symbol) => {
                map.remove(symbol);
            }
            None => map.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle(timestamp: i64, close: f64) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close + 0.01,
            low: close - 0.01,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let buffer = TimeSeriesBuffer::new(3);
        for (step, close) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            buffer.append("EURUSD", sample_candle(step as i64 * 60_000, close));
        }

        let closes: Vec<f64> = buffer
            .snapshot("EURUSD")
            .iter()
            .map(|candle| candle.close)
            .collect();
        assert_eq!(closes, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let buffer = TimeSeriesBuffer::new(5);
        for step in 0..200 {
            buffer.append("EURUSD", sample_candle(step * 60_000, 1.0 + step as f64));
        }

        assert_eq!(buffer.len("EURUSD"), 5);
        let snapshot = buffer.snapshot("EURUSD");
        assert_eq!(snapshot.first().map(|candle| candle.close), Some(196.0));
        assert_eq!(snapshot.last().map(|candle| candle.close), Some(200.0));
    }

    #[test]
    fn isolates_series_per_symbol() {
        let buffer = TimeSeriesBuffer::new(2);
        buffer.append("EURUSD", sample_candle(0, 1.1));
        buffer.append("EURUSD", sample_candle(60_000, 1.2));
        buffer.append("GBPUSD", sample_candle(0, 1.5));
        buffer.append("EURUSD", sample_candle(120_000, 1.3));

        assert_eq!(buffer.len("GBPUSD"), 1);
        assert_eq!(buffer.snapshot("GBPUSD")[0].close, 1.5);
        let closes: Vec<f64> = buffer
            .snapshot("EURUSD")
            .iter()
            .map(|candle| candle.close)
            .collect();
        assert_eq!(closes, vec![1.2, 1.3]);
    }

    #[test]
    fn keeps_duplicate_timestamps() {
        let buffer = TimeSeriesBuffer::new(10);
        buffer.append("EURUSD", sample_candle(60_000, 1.1));
        buffer.append("EURUSD", sample_candle(60_000, 1.1));

        assert_eq!(buffer.len("EURUSD"), 2);
    }

    #[test]
    fn snapshot_of_unknown_symbol_is_empty() {
        let buffer = TimeSeriesBuffer::new(3);
        assert!(buffer.snapshot("XAUUSD").is_empty());
        assert_eq!(buffer.len("XAUUSD"), 0);
    }

    #[test]
    fn clears_one_symbol_or_all() {
        let buffer = TimeSeriesBuffer::new(3);
        buffer.append("EURUSD", sample_candle(0, 1.1));
        buffer.append("GBPUSD", sample_candle(0, 1.5));

        buffer.clear(Some("EURUSD"));
        assert_eq!(buffer.len("EURUSD"), 0);
        assert_eq!(buffer.len("GBPUSD"), 1);

        buffer.clear(None);
        assert_eq!(buffer.len("GBPUSD"), 0);
    }
}
