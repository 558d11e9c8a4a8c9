//! Project-level configuration (`.valve.toml`).

pub mod settings;

pub use settings::Settings;
