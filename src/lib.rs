// Library surface for the binary, headless capture tests and reuse.
pub mod analysis;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod history;
pub mod keystroke;
pub mod notify;
pub mod report;
pub mod runtime;
pub mod session;
pub mod ui;
pub mod util;

pub use analysis::{analyze, AnalysisError, AnalysisResult, AnalyzerConfig};
pub use error::KeydynError;
pub use keystroke::KeystrokeEvent;

/// Redraw interval of the capture screen
pub const TICK_RATE_MS: u64 = 100;
