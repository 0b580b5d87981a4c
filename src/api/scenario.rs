//! Replayable scenario files
//!
//! A scenario bundles everything a session needs plus recorded frames of
//! readings, so a walk through a building can be replayed offline.

use super::session::{CycleOutput, NavigationSession};
use crate::algorithms::FingerprintDatabase;
use crate::core::{AnchorRegistry, SignalReading};
use crate::navigation::{GraphDefinition, NavigationGraph};
use crate::utils::EngineConfig;
use crate::validation::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Readings captured at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFrame {
    pub timestamp_ms: i64,
    pub readings: Vec<SignalReading>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    pub anchors: AnchorRegistry,
    #[serde(default)]
    pub fingerprints: Option<FingerprintDatabase>,
    pub graph: GraphDefinition,
    /// Node id to route toward, if any
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub frames: Vec<ScenarioFrame>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| NavError::Scenario(format!("invalid scenario: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| NavError::Scenario(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Build a session with the destination already set
    pub fn build_session(&self) -> Result<NavigationSession> {
        let graph = NavigationGraph::from_definition(self.graph.clone())?;
        let mut session = NavigationSession::new(
            self.config.clone(),
            self.anchors.clone(),
            self.fingerprints.clone(),
            graph,
        )?;
        if let Some(destination) = &self.destination {
            session.set_destination(destination)?;
        }
        Ok(session)
    }

    /// Run every frame through a fresh session
    pub fn replay(&self) -> Result<Vec<(i64, CycleOutput)>> {
        let mut session = self.build_session()?;
        Ok(self
            .frames
            .iter()
            .map(|frame| (frame.timestamp_ms, session.cycle(&frame.readings, frame.timestamp_ms)))
            .collect())
    }
}
