use crate::core::{EstimatorKind, TransitionType, DEFAULT_PATH_LOSS_EXPONENT, MIN_KALMAN_DT_S};
use crate::validation::ConfigError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub positioning: PositioningConfig,
    pub kalman: KalmanConfig,
    pub routing: RoutingConfig,
}

/// Signal conversion and estimator selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    /// Slope of the log-distance path-loss law
    pub path_loss_exponent: f64,
    /// Weight of the new fused position against the previous one (1.0 = no blend)
    pub smoothing_factor: f64,
    /// Estimator run each cycle
    pub estimator: EstimatorKind,
    /// Neighbours averaged by fingerprint matching
    pub fingerprint_k: usize,
    /// Apply per-source exponential smoothing to RSSI
    pub rssi_smoothing: bool,
    /// Weight of a new RSSI sample in the moving average
    pub rssi_alpha: f64,
}

/// Per-axis Kalman filter tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise added to the covariance each step
    pub process_noise: f64,
    /// Velocity variance assigned when a track starts (m²/s²)
    pub initial_velocity_variance: f64,
    /// Smallest time step used for prediction (seconds)
    pub min_dt_s: f64,
    /// Input gap after which the filter restarts (milliseconds)
    pub max_gap_ms: i64,
}

/// Route search and rerouting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub prefer_accessible_routes: bool,
    pub preferred_transition_type: Option<TransitionType>,
    /// Off-path distance that triggers a reroute (meters)
    pub deviation_threshold_m: f64,
    pub cache_capacity: usize,
    /// Upper bound on the heuristic's per-floor penalty
    pub floor_heuristic_penalty: f64,
    /// Transition base factor when accessible routes are preferred
    pub accessible_base_factor: f64,
    pub stairs_factor: f64,
    pub escalator_factor: f64,
    pub elevator_factor: f64,
    /// Multiplier for transitions of the preferred type
    pub preferred_discount: f64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            path_loss_exponent: DEFAULT_PATH_LOSS_EXPONENT,
            smoothing_factor: 1.0,
            estimator: EstimatorKind::Fusion,
            fingerprint_k: 1,
            rssi_smoothing: true,
            rssi_alpha: 0.3,
        }
    }
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.05,
            initial_velocity_variance: 1.0,
            min_dt_s: MIN_KALMAN_DT_S,
            max_gap_ms: 5000,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            prefer_accessible_routes: false,
            preferred_transition_type: None,
            deviation_threshold_m: 10.0,
            cache_capacity: 8,
            floor_heuristic_penalty: 10.0,
            accessible_base_factor: 1.5,
            stairs_factor: 1.0,
            escalator_factor: 1.2,
            elevator_factor: 1.5,
            preferred_discount: 0.8,
        }
    }
}

/// Outcome of validating a configuration
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any
    pub fn into_result(self) -> Result<(), ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn check_positive(report: &mut ValidationReport, parameter: &str, value: f64) {
    if !value.is_finite() || value <= 0.0 {
        report.errors.push(ConfigError::invalid(
            parameter,
            value,
            "must be a positive finite number",
        ));
    }
}

fn check_unit_interval(report: &mut ValidationReport, parameter: &str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        report
            .errors
            .push(ConfigError::invalid(parameter, value, "must be in (0, 1]"));
    }
}

impl EngineConfig {
    /// Check every parameter; errors make the configuration unusable
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let p = &self.positioning;
        let k = &self.kalman;
        let r = &self.routing;

        check_positive(&mut report, "path_loss_exponent", p.path_loss_exponent);
        if p.path_loss_exponent.is_finite() && !(1.5..=6.0).contains(&p.path_loss_exponent) {
            report.warnings.push(format!(
                "path_loss_exponent {} is outside the usual indoor range 1.5-6.0",
                p.path_loss_exponent
            ));
        }
        check_unit_interval(&mut report, "smoothing_factor", p.smoothing_factor);
        check_unit_interval(&mut report, "rssi_alpha", p.rssi_alpha);
        if p.fingerprint_k == 0 {
            report
                .errors
                .push(ConfigError::invalid("fingerprint_k", 0, "must be at least 1"));
        }

        if !k.process_noise.is_finite() || k.process_noise < 0.0 {
            report.errors.push(ConfigError::invalid(
                "process_noise",
                k.process_noise,
                "must be non-negative",
            ));
        }
        check_positive(&mut report, "initial_velocity_variance", k.initial_velocity_variance);
        check_positive(&mut report, "min_dt_s", k.min_dt_s);
        if k.max_gap_ms <= 0 {
            report
                .errors
                .push(ConfigError::invalid("max_gap_ms", k.max_gap_ms, "must be positive"));
        }

        check_positive(&mut report, "deviation_threshold_m", r.deviation_threshold_m);
        if r.cache_capacity == 0 {
            report
                .errors
                .push(ConfigError::invalid("cache_capacity", 0, "must be at least 1"));
        }
        if !r.floor_heuristic_penalty.is_finite() || r.floor_heuristic_penalty < 0.0 {
            report.errors.push(ConfigError::invalid(
                "floor_heuristic_penalty",
                r.floor_heuristic_penalty,
                "must be non-negative",
            ));
        }
        check_positive(&mut report, "accessible_base_factor", r.accessible_base_factor);
        if r.accessible_base_factor.is_finite() && r.accessible_base_factor < 1.0 {
            report
                .warnings
                .push("accessible_base_factor below 1.0 makes floor changes cheaper".to_string());
        }
        check_positive(&mut report, "stairs_factor", r.stairs_factor);
        check_positive(&mut report, "escalator_factor", r.escalator_factor);
        check_positive(&mut report, "elevator_factor", r.elevator_factor);
        if !(r.stairs_factor <= r.escalator_factor && r.escalator_factor <= r.elevator_factor) {
            report
                .warnings
                .push("transition factors are not ordered stairs <= escalator <= elevator".to_string());
        }
        check_unit_interval(&mut report, "preferred_discount", r.preferred_discount);

        report
    }
}

/// Owns the active configuration and tracks runtime changes to it
pub struct ConfigurationManager {
    config: EngineConfig,
    is_modified: bool,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    /// Manager holding the default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            is_modified: false,
        }
    }

    /// Manager holding a caller-supplied configuration, validated up front
    pub fn with_config(config: EngineConfig) -> Result<Self, ConfigError> {
        let report = config.validate();
        for warning in &report.warnings {
            warn!("[Config] {}", warning);
        }
        report.into_result()?;
        Ok(Self {
            config,
            is_modified: false,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Load and validate a JSON configuration file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| {
            ConfigError::Io(format!("failed to read config file '{}': {}", path_str, e))
        })?;
        let config: EngineConfig = serde_json::from_str(&content).map_err(|e| {
            ConfigError::Serialization(format!("failed to parse config file '{}': {}", path_str, e))
        })?;

        let report = config.validate();
        for warning in &report.warnings {
            warn!("[Config] {}: {}", path_str, warning);
        }
        report.into_result()?;

        debug!("[Config] loaded {}", path_str);
        self.config = config;
        self.is_modified = false;
        Ok(())
    }

    /// Write the configuration as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| ConfigError::Serialization(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content).map_err(|e| {
            ConfigError::Io(format!("failed to write config file '{}': {}", path_str, e))
        })?;

        debug!("[Config] saved {}", path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Returns the previous exponent
    pub fn set_path_loss_exponent(&mut self, exponent: f64) -> Result<f64, ConfigError> {
        if !exponent.is_finite() || exponent <= 0.0 {
            return Err(ConfigError::invalid(
                "path_loss_exponent",
                exponent,
                "must be a positive finite number",
            ));
        }
        let old = self.config.positioning.path_loss_exponent;
        self.config.positioning.path_loss_exponent = exponent;
        self.is_modified = true;
        Ok(old)
    }

    /// Returns the previous smoothing factor
    pub fn set_smoothing_factor(&mut self, factor: f64) -> Result<f64, ConfigError> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(ConfigError::invalid("smoothing_factor", factor, "must be in (0, 1]"));
        }
        let old = self.config.positioning.smoothing_factor;
        self.config.positioning.smoothing_factor = factor;
        self.is_modified = true;
        Ok(old)
    }

    /// Returns the previous threshold
    pub fn set_deviation_threshold(&mut self, threshold_m: f64) -> Result<f64, ConfigError> {
        if !threshold_m.is_finite() || threshold_m <= 0.0 {
            return Err(ConfigError::invalid(
                "deviation_threshold_m",
                threshold_m,
                "must be a positive finite number",
            ));
        }
        let old = self.config.routing.deviation_threshold_m;
        self.config.routing.deviation_threshold_m = threshold_m;
        self.is_modified = true;
        Ok(old)
    }

    pub fn set_estimator(&mut self, estimator: EstimatorKind) -> EstimatorKind {
        let old = self.config.positioning.estimator;
        self.config.positioning.estimator = estimator;
        self.is_modified = true;
        old
    }

    pub fn set_route_preferences(
        &mut self,
        prefer_accessible_routes: bool,
        preferred_transition_type: Option<TransitionType>,
    ) {
        self.config.routing.prefer_accessible_routes = prefer_accessible_routes;
        self.config.routing.preferred_transition_type = preferred_transition_type;
        self.is_modified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let report = EngineConfig::default().validate();
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_invalid_exponent_fails_fast() {
        let mut config = EngineConfig::default();
        config.positioning.path_loss_exponent = f64::NAN;
        assert!(ConfigurationManager::with_config(config.clone()).is_err());

        config.positioning.path_loss_exponent = -2.0;
        let err = ConfigurationManager::with_config(config).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidParameter { ref parameter, .. } if parameter == "path_loss_exponent"));
    }

    #[test]
    fn test_out_of_range_exponent_only_warns() {
        let mut config = EngineConfig::default();
        config.positioning.path_loss_exponent = 0.8;
        let report = config.validate();
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = EngineConfig::default();
        config.positioning.smoothing_factor = 0.0;
        config.positioning.fingerprint_k = 0;
        config.routing.cache_capacity = 0;
        config.routing.deviation_threshold_m = -1.0;
        assert_eq!(config.validate().errors.len(), 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"positioning": {"path_loss_exponent": 3.0}, "routing": {"preferred_transition_type": "elevator"}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.positioning.path_loss_exponent, 3.0);
        assert_eq!(config.positioning.estimator, EstimatorKind::Fusion);
        assert_eq!(config.routing.preferred_transition_type, Some(TransitionType::Elevator));
        assert_eq!(config.kalman, KalmanConfig::default());
    }

    #[test]
    fn test_runtime_setters_validate() {
        let mut manager = ConfigurationManager::new();
        assert_eq!(manager.set_path_loss_exponent(3.0).unwrap(), 2.0);
        assert!(manager.set_path_loss_exponent(0.0).is_err());
        assert!(manager.set_smoothing_factor(1.5).is_err());
        assert_eq!(manager.set_smoothing_factor(0.5).unwrap(), 1.0);
        assert_eq!(manager.set_deviation_threshold(5.0).unwrap(), 10.0);
        assert!(manager.is_modified());
        assert_eq!(manager.config().positioning.path_loss_exponent, 3.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("indoor_nav_config_{}.json", std::process::id()));

        let mut manager = ConfigurationManager::new();
        manager.set_route_preferences(true, Some(TransitionType::Elevator));
        assert!(manager.is_modified());
        manager.save_to_file(&path).unwrap();
        assert!(!manager.is_modified());

        let loaded = ConfigurationManager::from_file(&path).unwrap();
        assert!(loaded.config().routing.prefer_accessible_routes);
        assert_eq!(loaded.config(), manager.config());

        fs::write(&path, r#"{"positioning": {"smoothing_factor": 2.0}}"#).unwrap();
        let err = ConfigurationManager::from_file(&path).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_into_config() {
        let mut manager = ConfigurationManager::new();
        manager.set_estimator(EstimatorKind::Kalman);
        assert_eq!(manager.into_config().positioning.estimator, EstimatorKind::Kalman);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigurationManager::from_file("/nonexistent/indoor_nav.json").err().unwrap();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
