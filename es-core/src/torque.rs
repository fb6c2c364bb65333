//! Torque estimate and the derived status readout.
//!
//! The engine model has no combustion, so torque is inferred from shaft
//! speed through a [`TorqueModel`]. Horsepower follows the usual workshop
//! formula:
//!
//! ```text
//! hp = torque · rpm / 5252
//! ```

use serde::Serialize;

use crate::config::EngineConfig;
use crate::diagnostics::DiagnosticFlags;
use crate::types::{constants, SimulationState};

/// Source of the instantaneous torque estimate.
pub trait TorqueModel {
    /// Torque delivered at the current state.
    fn torque(&self, state: &SimulationState, config: &EngineConfig) -> f64;
}

/// Torque proportional to shaft speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaftTorque {
    /// N·m per rad/s of crank speed
    pub newton_metres_per_rad_s: f64,
}

impl Default for ShaftTorque {
    fn default() -> Self {
        Self {
            newton_metres_per_rad_s: constants::TORQUE_PER_RAD_S,
        }
    }
}

impl TorqueModel for ShaftTorque {
    fn torque(&self, state: &SimulationState, _config: &EngineConfig) -> f64 {
        self.newton_metres_per_rad_s * state.angular_velocity
    }
}

/// Numbers shown in the status panel, recomputed every frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReadout {
    pub rpm: f64,
    pub torque: f64,
    pub horsepower: f64,
    pub displacement: f64,
    pub warnings: Vec<&'static str>,
}

impl StatusReadout {
    pub fn compute(
        state: &SimulationState,
        config: &EngineConfig,
        torque: f64,
        flags: DiagnosticFlags,
    ) -> Self {
        let rpm = state.rpm().round();
        Self {
            rpm,
            torque,
            horsepower: torque * rpm / constants::HP_CONSTANT,
            displacement: config.displacement(),
            warnings: flags.iter().map(|d| d.message()).collect(),
        }
    }

    /// Status panel lines, one per quantity followed by any warnings.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("RPM: {}", self.rpm),
            format!("Torque: {:.1}", self.torque),
            format!("Horsepower: {}", self.horsepower.round()),
            format!("Displacement: {:.0}", self.displacement),
        ];
        lines.extend(self.warnings.iter().map(|w| format!("WARNING: {}", w)));
        lines
    }
}

// =============================================================================
// Tests
// =============================================================================
