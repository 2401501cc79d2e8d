//! Compact per-symbol chart shown inside a watchlist row.

use chrono::DateTime;
use tracing::{debug, warn};
use ts_core::{lower_bound, Bar, RangeToken, Timestamp, DAY_MS};

use crate::config::{
    Axis, ChartConfig, ChartData, ChartKind, ChartOptions, Dataset, DatasetStyle, Grid, Legend,
    Paint, Plugins, Scales, SeriesData, Ticks, Tooltip,
};
use crate::renderer::{
    ChartBackend, ChartRenderer, RenderError, RenderOutcome, RenderSummary, SkipReason,
};
use crate::theme;

pub const EMPTY_PLACEHOLDER: &str = "データなし";
pub const WATCHLIST_RANGES: [RangeToken; 5] = [
    RangeToken::OneDay,
    RangeToken::OneWeek,
    RangeToken::OneMonth,
    RangeToken::ThreeMonths,
    RangeToken::OneYear,
];
pub const DEFAULT_RANGE: RangeToken = RangeToken::OneYear;

pub fn sanitize_symbol(symbol: &str) -> String {
    symbol.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub fn canvas_id(symbol: &str) -> String {
    format!("wl-chart-{}", sanitize_symbol(symbol))
}

pub fn section_id(symbol: &str) -> String {
    format!("chart-sec-{}", sanitize_symbol(symbol))
}

/// Short Japanese month/day label, e.g. `3月7日`.
pub fn day_label(ts: Timestamp) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.format("%-m月%-d日").to_string())
        .unwrap_or_default()
}

/// Bars from the last `days` calendar days, counted back from the final bar.
pub fn trailing_days(bars: &[Bar], days: u32) -> &[Bar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    let cutoff = last.time.saturating_sub(i64::from(days) * DAY_MS);
    &bars[lower_bound(bars, cutoff)..]
}

pub fn watchlist_config(bars: &[Bar]) -> ChartConfig {
    let ticks = |max| Ticks {
        color: Some(theme::WATCHLIST_TICK.to_string()),
        font: None,
        max_ticks_limit: max,
    };
    ChartConfig {
        kind: ChartKind::Line,
        data: ChartData {
            labels: bars.iter().map(|b| day_label(b.time)).collect(),
            datasets: vec![Dataset {
                label: String::new(),
                kind: None,
                data: SeriesData::Values(bars.iter().map(|b| b.close).collect()),
                style: DatasetStyle {
                    border_color: Some(theme::PRIMARY_LINE.to_string()),
                    background_color: Some(Paint::Solid(theme::WATCHLIST_FILL.to_string())),
                    border_width: Some(2.0),
                    fill: Some(true),
                    point_radius: Some(0.0),
                    point_hover_radius: Some(4.0),
                    tension: Some(0.3),
                    ..Default::default()
                },
                y_axis_id: None,
                order: None,
            }],
        },
        options: ChartOptions {
            responsive: true,
            maintain_aspect_ratio: false,
            animation: None,
            interaction: None,
            plugins: Plugins {
                legend: Legend { display: false },
                annotation: None,
                tooltip: Tooltip {
                    mode: Some("index".to_string()),
                    intersect: Some(false),
                    ..Default::default()
                },
            },
            scales: Scales {
                x: Axis {
                    display: Some(true),
                    grid: Grid {
                        color: Some(theme::WATCHLIST_GRID_X.to_string()),
                        display: None,
                    },
                    ticks: Some(ticks(Some(6))),
                    ..Default::default()
                },
                y: Axis {
                    position: Some("right".to_string()),
                    grid: Grid {
                        color: Some(theme::WATCHLIST_GRID_Y.to_string()),
                        display: None,
                    },
                    ticks: Some(ticks(None)),
                    ..Default::default()
                },
                y1: None,
            },
        },
    }
}

/// Render the watchlist chart for `symbol`, or the empty placeholder.
pub async fn render_watchlist<B: ChartBackend>(
    renderer: &ChartRenderer<B>,
    symbol: &str,
    bars: &[Bar],
    range: RangeToken,
) -> Result<RenderOutcome, RenderError> {
    let target = canvas_id(symbol);
    let ticket = renderer.begin(&target).await;
    let window = trailing_days(bars, range.lookback_days());
    if window.is_empty() {
        warn!(symbol, %range, "no watchlist data");
        return Ok(renderer
            .skip(&ticket, SkipReason::NoData, Some(EMPTY_PLACEHOLDER))
            .await);
    }
    let config = watchlist_config(window);
    let outcome = renderer
        .commit(&ticket, &config, |chart| RenderSummary {
            chart,
            points: window.len(),
            markers: 0,
            overlays: 0,
        })
        .await?;
    debug!(symbol, %range, points = window.len(), "watchlist chart rendered");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::JsonBackend;
    use ts_core::HOUR_MS;

    fn daily(days: i64) -> Vec<Bar> {
        (0..days)
            .map(|i| Bar {
                time: i * DAY_MS,
                close: 10.0 + i as f64,
                volume: 0.0,
            })
            .collect()
    }

    #[test]
    fn ids_strip_punctuation() {
        assert_eq!(canvas_id("BRK.B"), "wl-chart-BRKB");
        assert_eq!(section_id("^GSPC"), "chart-sec-GSPC");
        assert_eq!(sanitize_symbol("7203.T"), "7203T");
    }

    #[test]
    fn labels_use_month_day() {
        // 2024-03-07T12:00:00Z
        assert_eq!(day_label(1_709_812_800_000), "3月7日");
        assert_eq!(day_label(0), "1月1日");
    }

    #[test]
    fn trailing_window_is_inclusive() {
        let bars = daily(400);
        assert_eq!(trailing_days(&bars, 7).len(), 8);
        assert_eq!(trailing_days(&bars, 365).len(), 366);
        assert!(trailing_days(&[], 30).is_empty());

        let intraday: Vec<Bar> = (0..48)
            .map(|i| Bar {
                time: i * HOUR_MS,
                close: 1.0,
                volume: 0.0,
            })
            .collect();
        assert_eq!(trailing_days(&intraday, 1).len(), 25);

        let early = [Bar {
            time: i64::MIN + DAY_MS,
            close: 1.0,
            volume: 0.0,
        }];
        assert_eq!(trailing_days(&early, 365).len(), 1);
    }

    #[test]
    fn config_uses_category_labels() {
        let bars = daily(3);
        let json = serde_json::to_value(watchlist_config(&bars)).unwrap();
        assert_eq!(json["data"]["labels"][0], "1月1日");
        assert_eq!(json["data"]["datasets"][0]["data"][2], 12.0);
        assert_eq!(json["data"]["datasets"][0]["tension"], 0.3);
        assert_eq!(json["options"]["scales"]["x"]["ticks"]["maxTicksLimit"], 6);
        assert!(json["options"]["plugins"].get("annotation").is_none());
    }

    #[tokio::test]
    async fn empty_history_shows_placeholder() {
        let renderer = ChartRenderer::new(JsonBackend::new());
        let outcome = render_watchlist(&renderer, "MU", &[], DEFAULT_RANGE)
            .await
            .unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::NoData));
        assert_eq!(
            renderer.backend().placeholder("wl-chart-MU").as_deref(),
            Some(EMPTY_PLACEHOLDER)
        );
    }

    #[tokio::test]
    async fn one_instance_per_symbol() {
        let renderer = ChartRenderer::new(JsonBackend::new());
        let bars = daily(100);
        for range in WATCHLIST_RANGES {
            render_watchlist(&renderer, "BRK.B", &bars, range).await.unwrap();
        }
        render_watchlist(&renderer, "MU", &bars, DEFAULT_RANGE)
            .await
            .unwrap();
        assert_eq!(renderer.backend().live_count(), 2);
        assert_eq!(renderer.backend().destroyed_count(), 4);
        assert!(renderer.mounted("wl-chart-BRKB").await.is_some());
    }
}
