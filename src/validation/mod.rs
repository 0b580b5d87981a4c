//! Input sanitation and error types

pub mod data;
pub mod error;

pub use data::{validate_readings, ValidatedReadings};
pub use error::{ConfigError, GraphError, NavError, Result};
