//! NDVI-by-crop-class pipeline for the Tres Arroyos study area.
//!
//! The `agro` binary exposes each step as a subcommand; this library holds
//! the steps, their configuration and the console reports so they can be
//! driven from tests.

pub mod commands;
pub mod config;
pub mod progress;
pub mod publish;
pub mod report;

pub use config::PipelineConfig;
pub use progress::BarProgress;
