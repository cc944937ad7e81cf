//! Agent wiring: configuration from the environment

pub mod config;

pub use config::AgentConfig;
