//! Configuration: display, behavior and server settings loaded from a
//! TOML file under the platform config directory.

pub mod config;

pub use config::Config;
