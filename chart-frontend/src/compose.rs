use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ta_engine::{LinePattern, LineStyle, MovingAverage};
use ts_core::{
    filter_by_range, max_volume, to_series, to_volume_series, Direction, Point, RangeToken,
    SymbolCache, Timestamp, VolumePoint,
};

use crate::annotations::{build_annotations, events_since, AnnotationSpec};
use crate::config::{
    AnnotationPlugin, Axis, ChartConfig, ChartData, ChartKind, ChartOptions, Dataset,
    DatasetStyle, Font, Grid, Interaction, Legend, LineAnnotation, Paint, Plugins, Scales,
    SeriesData, Ticks, TimeScale, TimeUnit, Tooltip,
};
use crate::theme;

pub const PRIMARY_ORDER: i32 = 0;
pub const BENCHMARK_ORDER: i32 = 1;
pub const VOLUME_ORDER: i32 = 2;

/// Optional overlays, one switch each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartFeatures {
    pub show_ma20: bool,
    pub show_ma50: bool,
    pub show_volume: bool,
    pub show_benchmarks: bool,
    pub show_events: bool,
}

impl Default for ChartFeatures {
    fn default() -> Self {
        Self {
            show_ma20: true,
            show_ma50: true,
            show_volume: true,
            show_benchmarks: false,
            show_events: true,
        }
    }
}

impl ChartFeatures {
    pub fn none() -> Self {
        Self {
            show_ma20: false,
            show_ma50: false,
            show_volume: false,
            show_benchmarks: false,
            show_events: false,
        }
    }

    pub fn all() -> Self {
        Self {
            show_benchmarks: true,
            ..Self::default()
        }
    }

    pub fn moving_averages(&self) -> Vec<MovingAverage> {
        let mut out = Vec::new();
        if self.show_ma20 {
            out.push(MovingAverage::ma20());
        }
        if self.show_ma50 {
            out.push(MovingAverage::ma50());
        }
        out
    }
}

/// A benchmark index drawn as a dashed, rescaled comparison line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkIndex {
    pub symbol: String,
    pub label: String,
    pub color: String,
}

impl BenchmarkIndex {
    pub fn new(
        symbol: impl Into<String>,
        label: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            label: label.into(),
            color: color.into(),
        }
    }

    pub fn defaults() -> Vec<BenchmarkIndex> {
        vec![
            BenchmarkIndex::new("^GSPC", "S&P 500", theme::SP500_LINE),
            BenchmarkIndex::new("^IXIC", "Nasdaq", theme::NASDAQ_LINE),
        ]
    }
}

/// A normalized benchmark series ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkOverlay {
    pub label: String,
    pub color: String,
    pub points: Vec<Point>,
}

/// Everything derivable from the cache without I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChart {
    pub symbol: String,
    pub range: RangeToken,
    pub price: Vec<Point>,
    pub volume: Vec<VolumePoint>,
    pub averages: Vec<(MovingAverage, Vec<Point>)>,
    pub markers: BTreeMap<String, AnnotationSpec>,
    pub show_volume: bool,
}

impl PreparedChart {
    pub fn build(
        symbol: &str,
        cache: &SymbolCache,
        range: RangeToken,
        features: &ChartFeatures,
    ) -> Self {
        let bars = filter_by_range(&cache.chart, range);
        let price = to_series(bars);
        let volume = to_volume_series(bars);
        let averages = features
            .moving_averages()
            .into_iter()
            .map(|ma| {
                let line = ma.apply(&price);
                (ma, line)
            })
            .collect();

        let markers = match (features.show_events, bars.first(), bars.last()) {
            (true, Some(first), Some(last)) => {
                let threshold = cache
                    .chart
                    .last()
                    .map_or(Timestamp::MIN, |b| range.threshold(b.time));
                let recent = events_since(&cache.events, threshold);
                build_annotations(&recent, (first.time, last.time))
            }
            _ => BTreeMap::new(),
        };

        Self {
            symbol: symbol.to_string(),
            range,
            price,
            volume,
            averages,
            markers,
            show_volume: features.show_volume,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_empty()
    }

    pub fn first_price(&self) -> Option<f64> {
        self.price.first().and_then(|p| p.y)
    }
}

/// Tick unit for the time axis: hours for a single day, days for a week, months beyond.
pub fn time_unit(range: RangeToken) -> TimeUnit {
    match range {
        RangeToken::OneDay => TimeUnit::Hour,
        RangeToken::OneWeek => TimeUnit::Day,
        _ => TimeUnit::Month,
    }
}

fn line_style(style: &LineStyle) -> DatasetStyle {
    DatasetStyle {
        border_color: Some(style.color.clone()),
        border_width: Some(style.width),
        border_dash: style.pattern.dash(),
        fill: Some(false),
        point_radius: Some(0.0),
        tension: Some(0.1),
        ..Default::default()
    }
}

fn volume_dataset(volume: &[VolumePoint]) -> Dataset {
    let colors = volume
        .iter()
        .map(|v| match v.direction {
            Direction::Up => theme::VOLUME_UP.to_string(),
            Direction::Down => theme::VOLUME_DOWN.to_string(),
        })
        .collect();
    Dataset {
        label: "Volume".to_string(),
        kind: Some(ChartKind::Bar),
        data: SeriesData::Points(volume.iter().map(|v| Point::new(v.x, v.y)).collect()),
        style: DatasetStyle {
            background_color: Some(Paint::PerPoint(colors)),
            bar_thickness: Some("flex".to_string()),
            max_bar_thickness: Some(4.0),
            ..Default::default()
        },
        y_axis_id: Some("y1".to_string()),
        order: Some(VOLUME_ORDER),
    }
}

fn small_ticks() -> Ticks {
    Ticks {
        color: Some(theme::TICK.to_string()),
        font: Some(Font {
            size: 10,
            weight: None,
        }),
        max_ticks_limit: None,
    }
}

fn scales(range: RangeToken, volume: &[VolumePoint]) -> Scales {
    let display_formats = [("hour", "HH:mm"), ("day", "MM/dd"), ("month", "MM/dd")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let grid = Grid {
        color: Some(theme::GRID.to_string()),
        display: None,
    };
    Scales {
        x: Axis {
            kind: Some("time".to_string()),
            time: Some(TimeScale {
                unit: time_unit(range),
                display_formats,
            }),
            grid: grid.clone(),
            ticks: Some(small_ticks()),
            ..Default::default()
        },
        y: Axis {
            position: Some("right".to_string()),
            grid,
            ticks: Some(small_ticks()),
            ..Default::default()
        },
        // Volume sits in the bottom quarter of the plot.
        y1: Some(Axis {
            position: Some("right".to_string()),
            display: Some(false),
            grid: Grid {
                color: None,
                display: Some(false),
            },
            min: Some(0.0),
            suggested_max: Some(max_volume(volume) * 4.0),
            ..Default::default()
        }),
    }
}

/// Compose the modal chart: price on top, moving averages, volume behind, then benchmarks.
pub fn compose(prepared: &PreparedChart, benchmarks: &[BenchmarkOverlay]) -> ChartConfig {
    let mut datasets = vec![Dataset {
        label: prepared.symbol.clone(),
        kind: None,
        data: SeriesData::Points(prepared.price.clone()),
        style: DatasetStyle {
            border_color: Some(theme::PRIMARY_LINE.to_string()),
            background_color: Some(Paint::Solid(theme::PRIMARY_FILL.to_string())),
            border_width: Some(2.0),
            fill: Some(true),
            point_radius: Some(0.0),
            tension: Some(0.1),
            ..Default::default()
        },
        y_axis_id: Some("y".to_string()),
        order: Some(PRIMARY_ORDER),
    }];

    for (ma, line) in &prepared.averages {
        datasets.push(Dataset {
            label: ma.label.clone(),
            kind: None,
            data: SeriesData::Points(line.clone()),
            style: line_style(&ma.style),
            y_axis_id: None,
            order: None,
        });
    }

    if prepared.show_volume && !prepared.volume.is_empty() {
        datasets.push(volume_dataset(&prepared.volume));
    }

    for overlay in benchmarks {
        let style = LineStyle {
            color: overlay.color.clone(),
            width: 1.5,
            pattern: LinePattern::Dashed,
        };
        datasets.push(Dataset {
            label: overlay.label.clone(),
            kind: None,
            data: SeriesData::Points(overlay.points.clone()),
            style: line_style(&style),
            y_axis_id: None,
            order: Some(BENCHMARK_ORDER),
        });
    }

    let annotations = prepared
        .markers
        .iter()
        .map(|(id, spec)| (id.clone(), LineAnnotation::from_spec(spec)))
        .collect();

    ChartConfig {
        kind: ChartKind::Line,
        data: ChartData {
            labels: Vec::new(),
            datasets,
        },
        options: ChartOptions {
            responsive: true,
            maintain_aspect_ratio: false,
            animation: Some(false),
            interaction: Some(Interaction {
                intersect: false,
                mode: "index".to_string(),
            }),
            plugins: Plugins {
                legend: Legend { display: false },
                annotation: Some(AnnotationPlugin {
                    annotations,
                    clip: false,
                }),
                tooltip: Tooltip {
                    background_color: Some(theme::TOOLTIP_BACKGROUND.to_string()),
                    title_color: Some(theme::TOOLTIP_TITLE.to_string()),
                    body_color: Some(theme::TOOLTIP_BODY.to_string()),
                    border_color: Some(theme::TOOLTIP_BORDER.to_string()),
                    border_width: Some(1.0),
                    ..Default::default()
                },
            },
            scales: scales(prepared.range, &prepared.volume),
        },
    }
}
