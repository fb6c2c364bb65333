//! Core types for the engine simulation.
//!
//! Units:
//! - Lengths: schematic units (the renderer maps them to pixels 1:1)
//! - Angles: radians
//! - Angular velocity: radians per second (rad/s)
//! - Speed: revolutions per minute (RPM) where noted
//!
//! Screen convention: X grows to the right, Y grows downward, so a piston
//! that travels "up" has a smaller Y.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use std::str::FromStr;

use crate::error::Error;

// =============================================================================
// Vec2 - 2D Vector
// =============================================================================

/// A 2D vector used for positions and velocities on the schematic plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (radians).
    pub fn from_angle(angle: f64) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).magnitude()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Default for Vec2 {
    fn default() -> Self {
        Self::ZERO
    }
}

// =============================================================================
// Configuration enums
// =============================================================================

/// Normalised form of an external tag: trimmed and lowercased.
fn normalize_tag(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn unknown_variant(field: &'static str, value: &str) -> Error {
    Error::UnknownVariant {
        field,
        value: value.to_string(),
    }
}

/// Number of piston strokes per combustion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeType {
    Two,
    Four,
}

impl StrokeType {
    /// Crank rotation covered by one full cycle: 2π for two-stroke, 4π for four-stroke.
    pub fn cycle_length(&self) -> f64 {
        match self {
            StrokeType::Two => 2.0 * PI,
            StrokeType::Four => 4.0 * PI,
        }
    }

    /// Crankshaft revolutions per combustion cycle.
    pub fn revolutions_per_cycle(&self) -> u32 {
        match self {
            StrokeType::Two => 1,
            StrokeType::Four => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrokeType::Two => "two",
            StrokeType::Four => "four",
        }
    }
}

impl FromStr for StrokeType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "two" | "2" | "2-stroke" | "two-stroke" => Ok(StrokeType::Two),
            "four" | "4" | "4-stroke" | "four-stroke" => Ok(StrokeType::Four),
            _ => Err(unknown_variant("stroke_type", s)),
        }
    }
}

/// Arrangement of the cylinders around the crankshaft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Inline,
    V,
    Boxer,
}

impl Layout {
    /// Tilt of a cylinder's bank from vertical, for drawing the block.
    ///
    /// Even-indexed cylinders lean left (negative), odd-indexed lean right.
    pub fn bank_angle(&self, index: usize) -> f64 {
        let side = if index % 2 == 0 { -1.0 } else { 1.0 };
        match self {
            Layout::Inline => 0.0,
            Layout::V => side * constants::V_BANK_ANGLE / 2.0,
            Layout::Boxer => side * PI / 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Inline => "inline",
            Layout::V => "v",
            Layout::Boxer => "boxer",
        }
    }
}

impl FromStr for Layout {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "inline" | "straight" | "i" => Ok(Layout::Inline),
            "v" | "vee" => Ok(Layout::V),
            "boxer" | "flat" => Ok(Layout::Boxer),
            _ => Err(unknown_variant("layout", s)),
        }
    }
}

/// Piston material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Steel,
    Aluminum,
    Ceramic,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Material::Steel => "steel",
            Material::Aluminum => "aluminum",
            Material::Ceramic => "ceramic",
        }
    }
}

impl FromStr for Material {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "steel" => Ok(Material::Steel),
            "aluminum" | "aluminium" => Ok(Material::Aluminum),
            "ceramic" => Ok(Material::Ceramic),
            _ => Err(unknown_variant("material", s)),
        }
    }
}

/// Exhaust hardware fitted to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustKind {
    None,
    Muffler,
    Turbo,
}

impl ExhaustKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhaustKind::None => "none",
            ExhaustKind::Muffler => "muffler",
            ExhaustKind::Turbo => "turbo",
        }
    }
}

impl FromStr for ExhaustKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "none" | "open" | "straight-pipe" => Ok(ExhaustKind::None),
            "muffler" => Ok(ExhaustKind::Muffler),
            "turbo" | "turbocharger" => Ok(ExhaustKind::Turbo),
            _ => Err(unknown_variant("exhaust", s)),
        }
    }
}

/// Fuel burned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fuel {
    Gasoline,
    Diesel,
}

impl Fuel {
    /// Diesel is compression-ignited and never needs a spark event.
    pub fn needs_spark(&self) -> bool {
        match self {
            Fuel::Gasoline => true,
            Fuel::Diesel => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Fuel::Gasoline => "gasoline",
            Fuel::Diesel => "diesel",
        }
    }
}

impl FromStr for Fuel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "gasoline" | "gas" | "petrol" => Ok(Fuel::Gasoline),
            "diesel" => Ok(Fuel::Diesel),
            _ => Err(unknown_variant("fuel", s)),
        }
    }
}

// =============================================================================
// Simulation State
// =============================================================================

/// Rotational state of the crankshaft.
///
/// `crank_angle` is an unbounded accumulator; callers wanting the geometric
/// angle take it modulo 2π. `angular_velocity` never goes negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub crank_angle: f64,
    pub angular_velocity: f64,
    pub throttle: f64,
    pub running: bool,
}

impl SimulationState {
    /// Engine at rest, switched off.
    pub fn stopped() -> Self {
        Self {
            crank_angle: 0.0,
            angular_velocity: 0.0,
            throttle: 0.0,
            running: false,
        }
    }

    /// Current speed in RPM.
    pub fn rpm(&self) -> f64 {
        rad_per_sec_to_rpm(self.angular_velocity)
    }

    /// Switch the engine on, seeding the shaft at idle speed.
    pub fn start(&mut self, idle_angular_velocity: f64) {
        self.running = true;
        self.angular_velocity = idle_angular_velocity;
    }

    /// Switch the engine off. Spin-down happens in later updates.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Level-triggered throttle: pressed is full throttle, released is closed.
    pub fn set_throttle(&mut self, pressed: bool) {
        self.throttle = if pressed { 1.0 } else { 0.0 };
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::stopped()
    }
}

// =============================================================================
// Derived per-frame records
// =============================================================================

/// Geometric pose of one cylinder for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CylinderPose {
    pub index: usize,
    /// Crank angle plus this cylinder's offset, wrapped to [0, 2π).
    pub phase: f64,
    /// Crank centre for this cylinder after the layout offset.
    pub center: Vec2,
    /// Rod big end
    pub crank_pin: Vec2,
    /// Rod small end
    pub piston: Vec2,
    pub layout_offset_x: f64,
    /// Tilt of the bank, used only for drawing.
    pub bank_angle: f64,
}

/// Which valve an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Valve {
    Intake,
    Exhaust,
}

/// Discrete timing event produced by one cylinder in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum CycleEvent {
    #[default]
    None,
    ValveOpen(Valve),
    ValveClosed(Valve),
    Spark,
    PortOpenIntake,
    PortOpenExhaust,
}

impl CycleEvent {
    /// Rank used when several events fire in the same frame; higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            CycleEvent::None => 0,
            CycleEvent::ValveClosed(_) => 1,
            CycleEvent::ValveOpen(_) => 2,
            CycleEvent::PortOpenIntake => 3,
            CycleEvent::PortOpenExhaust => 4,
            CycleEvent::Spark => 5,
        }
    }
}

/// Stroke currently under way in a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stroke {
    Intake,
    Compression,
    Power,
    Exhaust,
}

impl fmt::Display for Stroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stroke::Intake => "intake",
            Stroke::Compression => "compression",
            Stroke::Power => "power",
            Stroke::Exhaust => "exhaust",
        };
        f.write_str(name)
    }
}

/// Flow direction of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParticleKind {
    Intake,
    Exhaust,
}

/// A short-lived gas particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Remaining life in seconds, starts at 1 and is removed once it reaches 0.
    pub life: f64,
    pub kind: ParticleKind,
}

// =============================================================================
// Conversions
// =============================================================================

/// RPM to rad/s.
pub fn rpm_to_rad_per_sec(rpm: f64) -> f64 {
    rpm * 2.0 * PI / 60.0
}

/// rad/s to RPM.
pub fn rad_per_sec_to_rpm(omega: f64) -> f64 {
    omega * 60.0 / (2.0 * PI)
}

// =============================================================================
// Constants
// =============================================================================

/// Design constants of the simulation.
pub mod constants {
    use std::f64::consts::PI;

    /// Gain pulling the shaft towards the throttle target while running (1/s).
    pub const APPROACH_GAIN: f64 = 2.0;

    /// Friction gain spinning the shaft down once stopped (1/s).
    pub const SPIN_DOWN_GAIN: f64 = 1.5;

    /// Largest time step the core integrates in one go (s).
    pub const MAX_DT: f64 = 0.1;

    /// Included angle between the two banks of a V engine.
    pub const V_BANK_ANGLE: f64 = PI / 2.0;

    /// Half-width of the spark window (±3°).
    pub const SPARK_TOLERANCE: f64 = 3.0 * PI / 180.0;

    /// Half-width of a four-stroke valve window (±30°).
    pub const VALVE_HALF_WIDTH: f64 = 30.0 * PI / 180.0;

    /// Half-width of the two-stroke exhaust port window around BDC (±60°).
    pub const EXHAUST_PORT_HALF_WIDTH: f64 = 60.0 * PI / 180.0;

    /// Half-width of the two-stroke transfer (intake) port window around BDC (±45°).
    pub const INTAKE_PORT_HALF_WIDTH: f64 = 45.0 * PI / 180.0;

    /// Torque per unit of shaft speed for the default torque model (N·m per rad/s).
    pub const TORQUE_PER_RAD_S: f64 = 0.5;

    /// Torque above which a ceramic piston is considered at risk (N·m).
    pub const CERAMIC_FRAGILE_TORQUE: f64 = 300.0;

    /// Horsepower constant for torque in lb·ft and speed in RPM.
    pub const HP_CONSTANT: f64 = 5252.0;

    /// Small value for floating-point comparisons
    pub const EPSILON: f64 = 1e-10;
}

// =============================================================================
// Tests
// =============================================================================
