//! Main orchestrator.
//!
//! The host drives the simulation with one `tick(dt)` per frame. Input
//! arrives as [`Command`]s that are queued and applied at the start of the
//! next tick, so nothing changes halfway through a frame:
//!
//! ```text
//! commands ─▶ dynamics ─▶ kinematics ─▶ cycle events ─▶ particles ─▶ diagnostics
//!                                                                        │
//!                                                         snapshot ◀─────┘
//! ```
//!
//! Renderers and audio read the [`Snapshot`] after `tick` returns; the core
//! never calls into them.

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{ConfigCommand, EngineConfig};
use crate::cycle::{CycleEventDetector, CycleReport};
use crate::diagnostics::DiagnosticFlags;
use crate::dynamics::RotationalDynamics;
use crate::error::Result;
use crate::kinematics::{anchors, Anchors, CylinderKinematics};
use crate::particles::{ParticleSettings, ParticleSystem};
use crate::torque::{ShaftTorque, StatusReadout, TorqueModel};
use crate::types::{constants, CylinderPose, Particle, SimulationState};

/// External input, applied at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetConfig(ConfigCommand),
    Start,
    Stop,
    SetThrottle(bool),
}

/// Everything the renderer needs for one cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CylinderFrame {
    pub pose: CylinderPose,
    pub cycle: CycleReport,
    pub anchors: Anchors,
}

/// Read-only view of the simulation after a tick.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Snapshot<'a> {
    pub time: f64,
    pub crank_angle: f64,
    pub state: &'a SimulationState,
    pub config: &'a EngineConfig,
    pub cylinders: &'a [CylinderFrame],
    pub particles: &'a VecDeque<Particle>,
    pub diagnostics: DiagnosticFlags,
    pub status: &'a StatusReadout,
}

/// Clamp a host-provided time step into something safe to integrate.
///
/// Negative and NaN steps become zero; anything longer than `max_dt`
/// (a stalled tab, a breakpoint) is cut down to `max_dt`.
pub fn sanitize_dt(dt: f64, max_dt: f64) -> f64 {
    if dt.is_nan() || dt < 0.0 {
        warn!("ignoring invalid time step {}", dt);
        return 0.0;
    }
    if dt > max_dt {
        warn!("clamping time step {} to {}", dt, max_dt);
        return max_dt;
    }
    dt
}

/// Turns host timestamps into time steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    last_ms: Option<f64>,
    pub max_dt: f64,
}

impl FrameClock {
    pub fn new(max_dt: f64) -> Self {
        Self {
            last_ms: None,
            max_dt,
        }
    }

    /// Seconds since the previous call. The first call returns 0.
    pub fn advance(&mut self, now_ms: f64) -> f64 {
        let dt = match self.last_ms {
            Some(last) => (now_ms - last) / 1000.0,
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        sanitize_dt(dt, self.max_dt)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(constants::MAX_DT)
    }
}

/// The simulation core: owns all state and advances it one frame at a time.
pub struct Simulation<T: TorqueModel = ShaftTorque> {
    config: EngineConfig,
    state: SimulationState,
    dynamics: RotationalDynamics,
    detector: CycleEventDetector,
    particles: ParticleSystem,
    torque_model: T,
    pending: VecDeque<Command>,
    time: f64,
    max_dt: f64,
    cylinders: Vec<CylinderFrame>,
    diagnostics: DiagnosticFlags,
    status: StatusReadout,
}

impl Simulation<ShaftTorque> {
    /// Create a stopped engine. `seed` makes particle spawning reproducible.
    pub fn new(config: EngineConfig, seed: Option<u64>) -> Self {
        Self::with_torque_model(config, seed, ShaftTorque::default())
    }
}

impl Default for Simulation<ShaftTorque> {
    fn default() -> Self {
        Self::new(EngineConfig::default(), None)
    }
}

impl<T: TorqueModel> Simulation<T> {
    pub fn with_torque_model(config: EngineConfig, seed: Option<u64>, torque_model: T) -> Self {
        let config = config.sanitized();
        let mut sim = Self {
            detector: CycleEventDetector::new(&config),
            config,
            state: SimulationState::stopped(),
            dynamics: RotationalDynamics::default(),
            particles: ParticleSystem::new(ParticleSettings::default(), seed),
            torque_model,
            pending: VecDeque::new(),
            time: 0.0,
            max_dt: constants::MAX_DT,
            cylinders: Vec::new(),
            diagnostics: DiagnosticFlags::empty(),
            status: StatusReadout::default(),
        };
        sim.refresh(0.0);
        sim
    }

    // -------------------------------------------------------------------------
    // Input
    // -------------------------------------------------------------------------

    /// Queue a command for the next tick.
    pub fn submit(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    pub fn start(&mut self) {
        self.submit(Command::Start);
    }

    pub fn stop(&mut self) {
        self.submit(Command::Stop);
    }

    pub fn set_throttle(&mut self, pressed: bool) {
        self.submit(Command::SetThrottle(pressed));
    }

    pub fn set_config(&mut self, command: ConfigCommand) {
        self.submit(Command::SetConfig(command));
    }

    /// Queue a configuration change given as UI strings.
    ///
    /// A rejected field or tag is logged and returned; the configuration
    /// keeps its previous value.
    pub fn set_config_str(&mut self, field: &str, value: &str) -> Result<()> {
        match ConfigCommand::parse(field, value) {
            Ok(command) => {
                self.set_config(command);
                Ok(())
            }
            Err(e) => {
                warn!("rejected config {}={:?}: {}", field, value, e);
                Err(e)
            }
        }
    }

    /// Commands waiting for the next tick.
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    pub fn set_max_dt(&mut self, max_dt: f64) {
        if max_dt.is_finite() && max_dt > 0.0 {
            self.max_dt = max_dt;
        }
    }

    pub fn set_max_particles(&mut self, max_particles: usize) {
        self.particles.set_max_particles(max_particles);
    }

    // -------------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------------

    /// Advance the simulation by one frame.
    pub fn tick(&mut self, dt: f64) {
        let dt = sanitize_dt(dt, self.max_dt);
        while let Some(command) = self.pending.pop_front() {
            self.apply(command);
        }
        self.dynamics.update(&mut self.state, &self.config, dt);
        self.particles.update(dt);
        self.refresh(dt);
        self.time += dt;
    }

    /// Run several ticks of the same length.
    pub fn tick_n(&mut self, dt: f64, steps: usize) {
        for _ in 0..steps {
            self.tick(dt);
        }
    }

    /// Back to a stopped engine at angle zero with no particles.
    /// Configuration and queued commands are kept.
    pub fn reset(&mut self) {
        self.state = SimulationState::stopped();
        self.particles.clear();
        self.detector.reset(&self.config);
        self.time = 0.0;
        self.refresh(0.0);
    }

    fn apply(&mut self, command: Command) {
        debug!("applying {:?}", command);
        match command {
            Command::Start => {
                if self.state.running {
                    debug!("start ignored, engine already running");
                } else {
                    self.state.start(self.config.idle_angular_velocity());
                    info!("engine started at {} rpm", self.config.idle_rpm);
                }
            }
            Command::Stop => {
                if self.state.running {
                    info!("engine stopped at {:.0} rpm", self.state.rpm());
                }
                self.state.stop();
            }
            Command::SetThrottle(pressed) => self.state.set_throttle(pressed),
            Command::SetConfig(change) => {
                let topology = (self.config.cylinder_count, self.config.stroke_type);
                self.config.apply(change);
                if topology != (self.config.cylinder_count, self.config.stroke_type) {
                    self.detector.reset(&self.config);
                }
            }
        }
    }

    /// Recompute every derived per-frame value from the current state.
    fn refresh(&mut self, dt: f64) {
        let poses = CylinderKinematics::poses(self.state.crank_angle, &self.config);
        let reports = self.detector.detect(self.state.crank_angle, &self.config);

        self.cylinders.clear();
        for (pose, cycle) in poses.into_iter().zip(reports) {
            let anchors = anchors(&pose, &self.config);
            self.particles
                .emit(dt, &self.state, &self.config, &anchors, &cycle);
            self.cylinders.push(CylinderFrame {
                pose,
                cycle,
                anchors,
            });
        }

        let torque = self.torque_model.torque(&self.state, &self.config);
        self.diagnostics = DiagnosticFlags::evaluate(&self.state, &self.config, torque);
        self.status = StatusReadout::compute(&self.state, &self.config, torque, self.diagnostics);
    }

    // -------------------------------------------------------------------------
    // Output
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            time: self.time,
            crank_angle: self.state.crank_angle,
            state: &self.state,
            config: &self.config,
            cylinders: &self.cylinders,
            particles: self.particles.particles(),
            diagnostics: self.diagnostics,
            status: &self.status,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn cylinders(&self) -> &[CylinderFrame] {
        &self.cylinders
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn diagnostics(&self) -> DiagnosticFlags {
        self.diagnostics
    }

    pub fn status(&self) -> &StatusReadout {
        &self.status
    }
}

// =============================================================================
// Tests
// =============================================================================
