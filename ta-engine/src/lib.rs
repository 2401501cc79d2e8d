use serde::{Deserialize, Serialize};
use ts_core::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinePattern {
    Solid,
    Dashed,
    Dotted,
}

impl LinePattern {
    /// Dash array understood by canvas-style renderers; empty for solid lines.
    pub fn dash(&self) -> Vec<u32> {
        match self {
            LinePattern::Solid => Vec::new(),
            LinePattern::Dashed => vec![4, 4],
            LinePattern::Dotted => vec![1, 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: String,
    pub width: f64,
    pub pattern: LinePattern,
}

impl LineStyle {
    pub fn solid(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
            pattern: LinePattern::Solid,
        }
    }
}

/// Simple moving average over `points`, same length as the input.
///
/// The first `window - 1` outputs are gaps; a window that exceeds the input (or
/// is zero) yields an all-gap series. A gap inside a window makes that output a
/// gap as well.
pub fn sma(points: &[Point], window: usize) -> Vec<Point> {
    if window == 0 || window > points.len() {
        return points.iter().map(|p| Point::gap(p.x)).collect();
    }
    let mut out: Vec<Point> = points[..window - 1]
        .iter()
        .map(|p| Point::gap(p.x))
        .collect();
    out.reserve(points.len() + 1 - window);
    for slice in points.windows(window) {
        let x = slice[window - 1].x;
        let sum = slice
            .iter()
            .try_fold(0.0_f64, |acc, p| p.y.map(|y| acc + y));
        out.push(Point {
            x,
            y: sum.map(|s| s / window as f64),
        });
    }
    out
}

/// A moving-average overlay: label, lookback and line style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub label: String,
    pub period: usize,
    pub style: LineStyle,
}

impl MovingAverage {
    pub fn new(period: usize, style: LineStyle) -> Self {
        Self {
            label: format!("MA{period}"),
            period,
            style,
        }
    }

    pub fn ma20() -> Self {
        Self::new(20, LineStyle::solid("rgba(245, 158, 11, 0.8)", 1.5))
    }

    pub fn ma50() -> Self {
        Self::new(50, LineStyle::solid("rgba(139, 92, 246, 0.8)", 1.5))
    }

    pub fn apply(&self, points: &[Point]) -> Vec<Point> {
        sma(points, self.period)
    }
}
