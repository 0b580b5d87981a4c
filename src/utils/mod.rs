//! Configuration utilities

pub mod config;

pub use config::{
    ConfigurationManager, EngineConfig, KalmanConfig, PositioningConfig, RoutingConfig,
    ValidationReport,
};
