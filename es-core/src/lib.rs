//! # ES Core
//!
//! Simulation core for an interactive reciprocating piston engine.
//!
//! ## Architecture
//!
//! - `types`: Core data structures (Vec2, engine enums, state, cycle events)
//! - `config`: Engine configuration, clamping setters and YAML presets
//! - `materials`: Piston material and exhaust flow properties
//! - `dynamics`: Crankshaft speed toward the throttle target (exponential approach)
//! - `kinematics`: Slider-crank geometry for every cylinder
//! - `cycle`: Edge-triggered spark, valve and port events
//! - `particles`: Intake and exhaust gas particles
//! - `torque`: Torque model and status readout
//! - `diagnostics`: Advisory warning flags
//! - `simulation`: Main orchestrator
//! - `error`: Error type shared by the fallible entry points

pub mod config;
pub mod cycle;
pub mod diagnostics;
pub mod dynamics;
pub mod error;
pub mod kinematics;
pub mod materials;
pub mod particles;
pub mod simulation;
pub mod torque;
pub mod types;

pub use error::{Error, Result};
