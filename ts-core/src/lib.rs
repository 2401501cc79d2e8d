use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Milliseconds since Unix epoch.
pub type Timestamp = i64;

/// Number of milliseconds in common units.
pub const MS: i64 = 1_000;
pub const MINUTE_MS: i64 = 60 * MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// One price observation. Only close and volume are charted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: Timestamp,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// A plot point; `y == None` marks a gap (e.g. moving-average warm-up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: Timestamp,
    pub y: Option<f64>,
}

impl Point {
    pub fn new(x: Timestamp, y: f64) -> Self {
        Self { x, y: Some(y) }
    }

    pub fn gap(x: Timestamp) -> Self {
        Self { x, y: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Volume bar tagged with the close-to-close direction of its bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    pub x: Timestamp,
    pub y: f64,
    pub direction: Direction,
}

/// Raw quote sample from an external index feed; `close` may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotePoint {
    pub ts: Timestamp,
    pub close: Option<f64>,
}

pub trait HasTimestamp {
    fn ts(&self) -> Timestamp;
}

impl HasTimestamp for Bar {
    fn ts(&self) -> Timestamp {
        self.time
    }
}

impl HasTimestamp for Point {
    fn ts(&self) -> Timestamp {
        self.x
    }
}

impl HasTimestamp for QuotePoint {
    fn ts(&self) -> Timestamp {
        self.ts
    }
}

/// Index of the first sample whose timestamp is `>= ts`. `data` must be time-ascending.
pub fn lower_bound<T: HasTimestamp>(data: &[T], ts: Timestamp) -> usize {
    data.partition_point(|s| s.ts() < ts)
}

pub fn is_time_ordered<T: HasTimestamp>(data: &[T]) -> bool {
    data.windows(2).all(|w| w[0].ts() <= w[1].ts())
}

// ---------- range tokens ----------------------------------------------------

/// Coarse lookback selector used by the range buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeToken {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "ALL")]
    All,
}

impl RangeToken {
    pub const ALL_TOKENS: [RangeToken; 7] = [
        RangeToken::OneDay,
        RangeToken::OneWeek,
        RangeToken::OneMonth,
        RangeToken::ThreeMonths,
        RangeToken::SixMonths,
        RangeToken::OneYear,
        RangeToken::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeToken::OneDay => "1D",
            RangeToken::OneWeek => "1W",
            RangeToken::OneMonth => "1M",
            RangeToken::ThreeMonths => "3M",
            RangeToken::SixMonths => "6M",
            RangeToken::OneYear => "1Y",
            RangeToken::All => "ALL",
        }
    }

    /// Lookback measured back from the newest bar; `None` means unbounded.
    pub fn lookback_ms(&self) -> Option<i64> {
        match self {
            RangeToken::OneDay => Some(DAY_MS),
            RangeToken::OneWeek => Some(7 * DAY_MS),
            RangeToken::OneMonth => Some(31 * DAY_MS),
            RangeToken::ThreeMonths => Some(92 * DAY_MS),
            RangeToken::SixMonths => Some(183 * DAY_MS),
            RangeToken::OneYear | RangeToken::All => None,
        }
    }

    /// Lower time bound for a window anchored at `now` (the last bar, not wall-clock).
    pub fn threshold(&self, now: Timestamp) -> Timestamp {
        match self.lookback_ms() {
            Some(ms) => now.saturating_sub(ms),
            None => Timestamp::MIN,
        }
    }

    /// Calendar days requested when the candle source is asked directly (watchlist path).
    pub fn lookback_days(&self) -> u32 {
        match self {
            RangeToken::OneDay => 1,
            RangeToken::OneWeek => 7,
            RangeToken::OneMonth => 30,
            RangeToken::ThreeMonths => 90,
            _ => 365,
        }
    }
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown range token: {0}")]
pub struct ParseRangeError(pub String);

impl FromStr for RangeToken {
    type Err = ParseRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1D" => Ok(RangeToken::OneDay),
            "1W" => Ok(RangeToken::OneWeek),
            "1M" => Ok(RangeToken::OneMonth),
            "3M" => Ok(RangeToken::ThreeMonths),
            "6M" => Ok(RangeToken::SixMonths),
            "1Y" => Ok(RangeToken::OneYear),
            "ALL" | "MAX" => Ok(RangeToken::All),
            _ => Err(ParseRangeError(s.to_string())),
        }
    }
}

/// Time-windowed suffix of `bars` for `token`, anchored at the last bar's time.
///
/// The result borrows from the input; an empty input yields an empty slice.
pub fn filter_by_range(bars: &[Bar], token: RangeToken) -> &[Bar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    debug_assert!(is_time_ordered(bars), "bars must be time-ascending");
    let threshold = token.threshold(last.time);
    &bars[lower_bound(bars, threshold)..]
}

// ---------- series mapping --------------------------------------------------

/// Price line: one `(time, close)` point per bar.
pub fn to_series(bars: &[Bar]) -> Vec<Point> {
    bars.iter().map(|b| Point::new(b.time, b.close)).collect()
}

/// Volume bars colored by close-to-close direction. Equal closes count as up,
/// and the first bar (no predecessor) is up.
pub fn to_volume_series(bars: &[Bar]) -> Vec<VolumePoint> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| {
            let prev = if i == 0 { b.close } else { bars[i - 1].close };
            let direction = if b.close >= prev {
                Direction::Up
            } else {
                Direction::Down
            };
            VolumePoint {
                x: b.time,
                y: b.volume,
                direction,
            }
        })
        .collect()
}

/// Largest volume in the series, floored at zero.
pub fn max_volume(volume: &[VolumePoint]) -> f64 {
    volume.iter().map(|v| v.y).fold(0.0_f64, f64::max)
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Rescale an index series so its first valid close lands on the primary's first price.
///
/// Samples without a close are dropped, never interpolated. Returns `None` when
/// either anchor is missing or zero so callers omit the overlay entirely.
pub fn normalize_benchmark(primary: &[Point], secondary: &[QuotePoint]) -> Option<Vec<Point>> {
    let anchor = usable(primary.first().and_then(|p| p.y))?;
    let first = secondary
        .iter()
        .find_map(|q| q.close.filter(|c| c.is_finite()))?;
    let base = usable(Some(first))?;
    let scaled = secondary
        .iter()
        .filter_map(|q| {
            let close = q.close.filter(|c| c.is_finite())?;
            Some(Point::new(q.ts, close / base * anchor))
        })
        .collect();
    Some(scaled)
}

// ---------- events ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Earnings,
    Dividend,
    #[default]
    #[serde(other)]
    Other,
}

/// Calendar event as delivered by the data cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: EventKind,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Text(String),
    Millis(i64),
    Float(f64),
    Other(IgnoredAny),
}

/// Numbers are taken as epoch milliseconds; any other non-string becomes `None`.
fn lenient_date<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match RawDate::deserialize(de)? {
        RawDate::Text(s) => Some(s),
        RawDate::Millis(ms) => Some(ms.to_string()),
        RawDate::Float(ms) if ms.is_finite() => Some((ms.trunc() as i64).to_string()),
        RawDate::Float(_) | RawDate::Other(_) => None,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKind {
    Known(EventKind),
    Other(IgnoredAny),
}

fn lenient_kind<'de, D: Deserializer<'de>>(de: D) -> Result<EventKind, D::Error> {
    Ok(match RawKind::deserialize(de)? {
        RawKind::Known(kind) => kind,
        RawKind::Other(_) => EventKind::Other,
    })
}

impl Event {
    pub fn new(date: impl Into<String>, kind: EventKind) -> Self {
        Self {
            date: Some(date.into()),
            kind,
        }
    }

    /// Parsed event time; `None` for a missing or unparseable date.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.date.as_deref().and_then(parse_event_date)
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS[.fff]` (UTC), `YYYY-MM-DD` (UTC
/// midnight) or an integer string of epoch milliseconds.
pub fn parse_event_date(raw: &str) -> Option<Timestamp> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Per-symbol cache entry: time-ascending bars plus calendar events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolCache {
    #[serde(default)]
    pub chart: Vec<Bar>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl SymbolCache {
    pub fn new(chart: Vec<Bar>, events: Vec<Event>) -> Self {
        Self { chart, events }
    }

    pub fn is_empty(&self) -> bool {
        self.chart.is_empty()
    }
}

/// Compact human form: `1.2B`, `3.4M`, `5.6K`, otherwise a rounded integer.
/// Used by the host for volume and market-cap labels.
pub fn format_compact(num: f64) -> String {
    if !num.is_finite() {
        return "0".to_string();
    }
    if num >= 1e9 {
        format!("{:.1}B", num / 1e9)
    } else if num >= 1e6 {
        format!("{:.1}M", num / 1e6)
    } else if num >= 1e3 {
        format!("{:.1}K", num / 1e3)
    } else {
        format!("{num:.0}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_bar(time: i64, close: f64) -> Bar {
        Bar {
            time,
            close,
            volume: 100.0,
        }
    }

    fn daily(n: i64) -> Vec<Bar> {
        (0..n).map(|i| mk_bar(i * DAY_MS, 100.0 + i as f64)).collect()
    }

    #[test]
    fn range_filter_returns_suffix_for_every_token() {
        let bars = daily(400);
        for token in RangeToken::ALL_TOKENS {
            let out = filter_by_range(&bars, token);
            assert!(!out.is_empty(), "{token} produced nothing");
            assert_eq!(out.last(), bars.last());
            let start = bars.len() - out.len();
            assert_eq!(out, &bars[start..]);
        }
    }

    #[test]
    fn range_filter_thresholds_match_table() {
        let bars = daily(400);
        assert_eq!(filter_by_range(&bars, RangeToken::OneDay).len(), 2);
        assert_eq!(filter_by_range(&bars, RangeToken::OneWeek).len(), 8);
        assert_eq!(filter_by_range(&bars, RangeToken::OneMonth).len(), 32);
        assert_eq!(filter_by_range(&bars, RangeToken::ThreeMonths).len(), 93);
        assert_eq!(filter_by_range(&bars, RangeToken::SixMonths).len(), 184);
        assert_eq!(filter_by_range(&bars, RangeToken::OneYear).len(), 400);
        assert_eq!(filter_by_range(&bars, RangeToken::All).len(), 400);
    }

    #[test]
    fn range_filter_empty_input() {
        assert!(filter_by_range(&[], RangeToken::OneMonth).is_empty());
    }

    #[test]
    fn range_filter_boundary_is_inclusive() {
        let bars = vec![
            Bar {
                time: 0,
                close: 10.0,
                volume: 100.0,
            },
            Bar {
                time: 86_400_000,
                close: 12.0,
                volume: 150.0,
            },
        ];
        let out = filter_by_range(&bars, RangeToken::OneDay);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn range_filter_anchors_on_last_bar_not_clock() {
        // Year-2001 data still yields a non-empty recent window.
        let base = 978_307_200_000;
        let bars: Vec<Bar> = (0..10).map(|i| mk_bar(base + i * HOUR_MS, 1.0)).collect();
        assert_eq!(filter_by_range(&bars, RangeToken::OneDay).len(), 10);
    }

    #[test]
    fn range_token_parses_and_displays() {
        for token in RangeToken::ALL_TOKENS {
            assert_eq!(token.as_str().parse::<RangeToken>(), Ok(token));
        }
        assert_eq!("3m".parse::<RangeToken>(), Ok(RangeToken::ThreeMonths));
        assert!("2Y".parse::<RangeToken>().is_err());
        let json = serde_json::to_string(&RangeToken::SixMonths).unwrap();
        assert_eq!(json, "\"6M\"");
    }

    #[test]
    fn price_series_is_one_to_one() {
        let bars = daily(5);
        let pts = to_series(&bars);
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[3], Point::new(3 * DAY_MS, 103.0));
    }

    #[test]
    fn volume_direction_increasing_and_decreasing() {
        let up: Vec<Bar> = (0..5).map(|i| mk_bar(i, i as f64)).collect();
        assert!(to_volume_series(&up)
            .iter()
            .all(|v| v.direction == Direction::Up));

        let down: Vec<Bar> = (0..5).map(|i| mk_bar(i, 10.0 - i as f64)).collect();
        let vol = to_volume_series(&down);
        assert_eq!(vol[0].direction, Direction::Up);
        assert!(vol[1..].iter().all(|v| v.direction == Direction::Down));
    }

    #[test]
    fn volume_direction_tie_counts_as_up() {
        let bars = vec![mk_bar(0, 5.0), mk_bar(1, 4.0), mk_bar(2, 4.0)];
        let vol = to_volume_series(&bars);
        assert_eq!(vol[1].direction, Direction::Down);
        assert_eq!(vol[2].direction, Direction::Up);
        assert_eq!(max_volume(&vol), 100.0);
    }

    #[test]
    fn benchmark_normalization_skips_leading_null() {
        let primary = vec![Point::new(0, 100.0), Point::new(1, 101.0)];
        let secondary = vec![
            QuotePoint { ts: 10, close: None },
            QuotePoint {
                ts: 20,
                close: Some(50.0),
            },
            QuotePoint {
                ts: 30,
                close: Some(100.0),
            },
        ];
        let out = normalize_benchmark(&primary, &secondary).unwrap();
        assert_eq!(out, vec![Point::new(20, 100.0), Point::new(30, 200.0)]);
    }

    #[test]
    fn benchmark_normalization_needs_both_anchors() {
        let secondary = vec![QuotePoint {
            ts: 1,
            close: Some(5.0),
        }];
        assert!(normalize_benchmark(&[], &secondary).is_none());
        let primary = vec![Point::new(0, 10.0)];
        let empty = vec![QuotePoint { ts: 1, close: None }];
        assert!(normalize_benchmark(&primary, &empty).is_none());
    }

    #[test]
    fn benchmark_normalization_skips_zero_base() {
        let primary = vec![Point::new(0, 10.0)];
        let secondary: Vec<QuotePoint> = [0.0, 50.0, 100.0]
            .iter()
            .enumerate()
            .map(|(i, c)| QuotePoint {
                ts: i as i64,
                close: Some(*c),
            })
            .collect();
        assert!(normalize_benchmark(&primary, &secondary).is_none());
    }

    #[test]
    fn event_dates_parse_in_supported_shapes() {
        assert_eq!(parse_event_date("1970-01-02"), Some(DAY_MS));
        assert_eq!(parse_event_date("1970-01-01T01:00:00Z"), Some(HOUR_MS));
        assert_eq!(parse_event_date("1970-01-01T00:01:00"), Some(MINUTE_MS));
        assert_eq!(parse_event_date("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(parse_event_date("next tuesday"), None);
        assert_eq!(parse_event_date("  "), None);
        let missing = Event {
            date: None,
            kind: EventKind::Earnings,
        };
        assert_eq!(missing.timestamp(), None);
    }

    #[test]
    fn symbol_cache_deserializes_cache_shape() {
        let json = r#"{
            "chart": [{"time": 1, "close": 2.5, "volume": 10}, {"time": 2, "close": 3.0}],
            "events": [{"date": "2024-01-01", "type": "earnings"}, {"date": "2024-02-01", "type": "split"}]
        }"#;
        let cache: SymbolCache = serde_json::from_str(json).unwrap();
        assert_eq!(cache.chart.len(), 2);
        assert_eq!(cache.chart[1].volume, 0.0);
        assert_eq!(cache.events[0].kind, EventKind::Earnings);
        assert_eq!(cache.events[1].kind, EventKind::Other);
    }

    #[test]
    fn symbol_cache_keeps_chart_despite_odd_events() {
        let json = r#"{
            "chart": [{"time": 1, "close": 2.5}],
            "events": [
                {"date": 1700000000000, "type": "dividend"},
                {"date": "2024-01-01", "type": 7},
                {"date": {"y": 2024}, "type": "earnings"},
                {"date": null}
            ]
        }"#;
        let cache: SymbolCache = serde_json::from_str(json).unwrap();
        assert_eq!(cache.chart.len(), 1);
        assert_eq!(cache.events.len(), 4);
        assert_eq!(cache.events[0].timestamp(), Some(1_700_000_000_000));
        assert_eq!(cache.events[0].kind, EventKind::Dividend);
        assert_eq!(cache.events[1].kind, EventKind::Other);
        assert!(cache.events[1].timestamp().is_some());
        assert_eq!(cache.events[2].date, None);
        assert_eq!(cache.events[3].timestamp(), None);
    }

    #[test]
    fn compact_formatting() {
        assert_eq!(format_compact(1_234_000_000.0), "1.2B");
        assert_eq!(format_compact(3_460_000.0), "3.5M");
        assert_eq!(format_compact(5_600.0), "5.6K");
        assert_eq!(format_compact(42.4), "42");
        assert_eq!(format_compact(f64::NAN), "0");
    }
}
