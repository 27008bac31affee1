//! Data-driven scenario loading for hexflow.
//!
//! Reads a directory of RON, TOML or JSON files into a ready-to-run
//! [`hexflow_core::engine::Engine`]. See [`loader`] for the directory layout.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, Format, Scenario, load_engine, load_scenario};
