//! Advisory warnings derived from the current state.
//!
//! Flags are recomputed from scratch every frame and never feed back into
//! the simulation.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::types::{Fuel, SimulationState};

/// A single warning condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Diagnostic {
    /// Shaft is spinning faster than the configured rev limit.
    OverRpm,
    /// Ceramic pistons under more torque than they can take.
    MaterialFragile,
    /// Diesel at wide-open throttle.
    FuelMismatch,
}

impl Diagnostic {
    pub const ALL: [Diagnostic; 3] = [
        Diagnostic::OverRpm,
        Diagnostic::MaterialFragile,
        Diagnostic::FuelMismatch,
    ];

    fn bit(self) -> u8 {
        match self {
            Diagnostic::OverRpm => 1 << 0,
            Diagnostic::MaterialFragile => 1 << 1,
            Diagnostic::FuelMismatch => 1 << 2,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Diagnostic::OverRpm => "engine speed above rev limit",
            Diagnostic::MaterialFragile => "ceramic pistons overstressed",
            Diagnostic::FuelMismatch => "diesel at full throttle: no spark ignition",
        }
    }
}

/// Set of active warnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DiagnosticFlags(u8);

impl DiagnosticFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, diagnostic: Diagnostic) {
        self.0 |= diagnostic.bit();
    }

    pub fn contains(&self, diagnostic: Diagnostic) -> bool {
        self.0 & diagnostic.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Active warnings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Diagnostic> + '_ {
        Diagnostic::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    /// Derive every flag from the latest state.
    pub fn evaluate(state: &SimulationState, config: &EngineConfig, torque: f64) -> Self {
        let mut flags = Self::empty();
        // Compared in rad/s so a shaft sitting exactly on the limiter is not flagged.
        if state.angular_velocity > config.max_angular_velocity() {
            flags.insert(Diagnostic::OverRpm);
        }
        if config.material.properties().is_overstressed(torque) {
            flags.insert(Diagnostic::MaterialFragile);
        }
        if config.fuel == Fuel::Diesel && state.throttle >= 1.0 {
            flags.insert(Diagnostic::FuelMismatch);
        }
        flags
    }
}

// =============================================================================
// Tests
// =============================================================================
