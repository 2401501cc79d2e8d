//! Chart composition and chart instance lifecycle for the screener.
//!
//! Pure preparation (`compose`, `annotations`, `watchlist_config`) turns cached
//! bars into a serializable chart description; `ChartRenderer` binds those
//! descriptions to canvas targets through a [`ChartBackend`].

pub mod annotations;
pub mod compose;
pub mod config;
pub mod renderer;
pub mod theme;
pub mod watchlist;

pub use annotations::{build_annotations, events_since, AnnotationSpec, MarkerCategory};
pub use compose::{
    compose, time_unit, BenchmarkIndex, BenchmarkOverlay, ChartFeatures, PreparedChart,
};
pub use config::{tooltip_label, ChartConfig, TimeUnit};
pub use renderer::{
    BackendError, ChartBackend, ChartId, ChartRenderer, JsonBackend, ModalRequest, RenderError,
    RenderOutcome, RenderSummary, RenderTicket, SkipReason,
};
pub use watchlist::{render_watchlist, watchlist_config, EMPTY_PLACEHOLDER};
