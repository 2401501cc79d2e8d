//! Dark-theme palette shared by the modal and watchlist charts.

pub const PRIMARY_LINE: &str = "#3b82f6";
pub const PRIMARY_FILL: &str = "rgba(59, 130, 246, 0.08)";
pub const WATCHLIST_FILL: &str = "rgba(59, 130, 246, 0.1)";

pub const VOLUME_UP: &str = "rgba(16, 185, 129, 0.5)";
pub const VOLUME_DOWN: &str = "rgba(239, 68, 68, 0.5)";

pub const EARNINGS_MARKER: &str = "rgba(236, 72, 153, 0.9)";
pub const EVENT_MARKER: &str = "rgba(16, 185, 129, 0.9)";
pub const MARKER_TEXT: &str = "#ffffff";
pub const EARNINGS_GLYPH: &str = "📊";
pub const EVENT_GLYPH: &str = "💰";

pub const SP500_LINE: &str = "rgba(148, 163, 184, 0.6)";
pub const NASDAQ_LINE: &str = "rgba(232, 121, 249, 0.6)";

pub const GRID: &str = "rgba(255,255,255,0.04)";
pub const TICK: &str = "#64748b";
pub const WATCHLIST_GRID_X: &str = "rgba(255,255,255,0.05)";
pub const WATCHLIST_GRID_Y: &str = "rgba(255,255,255,0.1)";
pub const WATCHLIST_TICK: &str = "#888";

pub const TOOLTIP_BACKGROUND: &str = "rgba(17, 24, 39, 0.95)";
pub const TOOLTIP_TITLE: &str = "#f1f5f9";
pub const TOOLTIP_BODY: &str = "#94a3b8";
pub const TOOLTIP_BORDER: &str = "rgba(255,255,255,0.1)";
