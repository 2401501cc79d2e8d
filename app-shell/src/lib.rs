//! Screener application shell.
//!
//! [`ScreenerContext`] replaces ambient global state: it is built once by the
//! host and handed to every render and AI call.

pub mod context;
pub mod settings;

pub use context::{ScreenerContext, ShellError};
pub use settings::{ScreenerSettings, SettingsError};
