//! Configuration management for Omsorg.

mod settings;

pub use settings::Settings;
