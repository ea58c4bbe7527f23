/// Cirrus CLI - configuration and local preference storage for the `cirrus` binary
pub mod config;
pub mod preferences;

pub use config::AppConfig;
pub use preferences::JsonFilePreferenceStore;
