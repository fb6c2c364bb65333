//! Lookup tables mapping configuration variants to their behaviour.
//!
//! Piston materials carry a display colour, a density for the info panel,
//! and the torque above which they are at risk of cracking. Exhaust
//! hardware scales how much gas leaves the engine and how fast it moves.
//!
//! Every table is an exhaustive `match`, so adding a variant fails to compile
//! until it has an entry here.

use serde::Serialize;

use crate::types::{constants, ExhaustKind, Material};

/// Physical and display properties of a piston material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaterialProperties {
    pub name: &'static str,
    /// Display colour (sRGB)
    pub color_rgb: [u8; 3],
    /// Density in g/cm³
    pub density: f64,
    /// Torque above which the piston is considered fragile (N·m).
    /// `f64::INFINITY` for materials that never crack in this model.
    pub fragile_torque: f64,
}

impl MaterialProperties {
    /// Forged steel piston
    pub const fn steel() -> Self {
        Self {
            name: "Steel",
            color_rgb: [0xee, 0xee, 0xee],
            density: 7.85,
            fragile_torque: f64::INFINITY,
        }
    }

    /// Cast aluminium alloy piston
    pub const fn aluminum() -> Self {
        Self {
            name: "Aluminum",
            color_rgb: [0xc8, 0xcc, 0xd4],
            density: 2.70,
            fragile_torque: f64::INFINITY,
        }
    }

    /// Ceramic-composite piston: light and heat resistant, brittle under load
    pub const fn ceramic() -> Self {
        Self {
            name: "Ceramic",
            color_rgb: [0xf4, 0xec, 0xd8],
            density: 3.20,
            fragile_torque: constants::CERAMIC_FRAGILE_TORQUE,
        }
    }

    /// Whether a piston of this material is at risk at the given torque.
    pub fn is_overstressed(&self, torque: f64) -> bool {
        torque > self.fragile_torque
    }
}

impl Material {
    pub fn properties(&self) -> MaterialProperties {
        match self {
            Material::Steel => MaterialProperties::steel(),
            Material::Aluminum => MaterialProperties::aluminum(),
            Material::Ceramic => MaterialProperties::ceramic(),
        }
    }
}

/// How an exhaust fitting shapes the visible gas flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExhaustFlow {
    /// Multiplier on the ambient spawn rate
    pub rate_scale: f64,
    /// Multiplier on exhaust particle speed
    pub speed_scale: f64,
}

impl ExhaustKind {
    pub fn flow(&self) -> ExhaustFlow {
        match self {
            ExhaustKind::None => ExhaustFlow {
                rate_scale: 1.0,
                speed_scale: 1.0,
            },
            ExhaustKind::Muffler => ExhaustFlow {
                rate_scale: 0.6,
                speed_scale: 0.7,
            },
            ExhaustKind::Turbo => ExhaustFlow {
                rate_scale: 1.5,
                speed_scale: 1.4,
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
