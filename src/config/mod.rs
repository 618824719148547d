//! Process-wide configuration
//!
//! Settings are loaded once at startup (defaults < config file < environment)
//! and then shared read-only between requests.

pub mod loader;
pub mod settings;

pub use loader::load_config;
pub use settings::{DiagramMode, DiagramSettings, FetchSettings, LlmSettings, ScanSettings, Settings};
