//! Python bindings for the es-core engine simulation.
//!
//! Provides a simple Python API:
//!
//! ```python
//! from engine_sim import Simulation
//!
//! sim = Simulation()
//! sim.set_config("cylinders", "4")
//! sim.start()
//! sim.press_throttle()
//!
//! for _ in range(60):
//!     sim.tick(1 / 60)
//!     print(f"{sim.rpm:.0f} rpm, events {sim.events()}")
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use es_core::config::{EngineConfig, PresetLoader};
use es_core::simulation::{FrameClock, Simulation as CoreSimulation};
use es_core::types::{CycleEvent, ParticleKind, Valve, Vec2 as CoreVec2};

/// 2D point on the schematic plane.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Vec2 {
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
}

#[pymethods]
impl Vec2 {
    #[new]
    fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn __repr__(&self) -> String {
        format!("Vec2({:.3}, {:.3})", self.x, self.y)
    }

    fn to_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl From<CoreVec2> for Vec2 {
    fn from(v: CoreVec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Geometry of one cylinder for the current frame.
#[pyclass(get_all)]
#[derive(Clone)]
pub struct CylinderPose {
    pub index: usize,
    pub phase: f64,
    pub crank_pin: Vec2,
    pub piston: Vec2,
    pub center: Vec2,
    pub bank_angle: f64,
    pub intake_anchor: Vec2,
    pub exhaust_anchor: Vec2,
    pub stroke: String,
    pub intake_open: bool,
    pub exhaust_open: bool,
}

#[pymethods]
impl CylinderPose {
    fn __repr__(&self) -> String {
        format!(
            "CylinderPose(index={}, phase={:.3}, stroke={})",
            self.index, self.phase, self.stroke
        )
    }
}

fn event_name(event: CycleEvent) -> Option<&'static str> {
    match event {
        CycleEvent::None => None,
        CycleEvent::Spark => Some("spark"),
        CycleEvent::ValveOpen(Valve::Intake) => Some("intake_valve_open"),
        CycleEvent::ValveOpen(Valve::Exhaust) => Some("exhaust_valve_open"),
        CycleEvent::ValveClosed(Valve::Intake) => Some("intake_valve_closed"),
        CycleEvent::ValveClosed(Valve::Exhaust) => Some("exhaust_valve_closed"),
        CycleEvent::PortOpenIntake => Some("intake_port_open"),
        CycleEvent::PortOpenExhaust => Some("exhaust_port_open"),
    }
}

/// Main simulation class.
///
/// Input methods queue commands; they take effect on the next `tick`.
#[pyclass]
pub struct Simulation {
    inner: CoreSimulation,
    clock: FrameClock,
}

#[pymethods]
impl Simulation {
    /// Create a stopped single-cylinder engine with default settings.
    #[new]
    #[pyo3(signature = (seed=None))]
    fn new(seed: Option<u64>) -> Self {
        Self {
            inner: CoreSimulation::new(EngineConfig::default(), seed),
            clock: FrameClock::default(),
        }
    }

    /// Create a simulation from a YAML preset in `directory`.
    #[staticmethod]
    #[pyo3(signature = (directory, name, seed=None))]
    fn from_preset(directory: &str, name: &str, seed: Option<u64>) -> PyResult<Self> {
        let config = PresetLoader::new(directory)
            .load(name)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self {
            inner: CoreSimulation::new(config, seed),
            clock: FrameClock::default(),
        })
    }

    /// Names of the presets available in `directory`.
    #[staticmethod]
    fn list_presets(directory: &str) -> PyResult<Vec<String>> {
        PresetLoader::new(directory)
            .list()
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Simulated seconds since creation or the last reset.
    #[getter]
    fn time(&self) -> f64 {
        self.inner.time()
    }

    #[getter]
    fn rpm(&self) -> f64 {
        self.inner.state().rpm()
    }

    #[getter]
    fn crank_angle(&self) -> f64 {
        self.inner.state().crank_angle
    }

    #[getter]
    fn running(&self) -> bool {
        self.inner.state().running
    }

    #[getter]
    fn throttle(&self) -> f64 {
        self.inner.state().throttle
    }

    fn start(&mut self) {
        self.inner.start();
    }

    fn stop(&mut self) {
        self.inner.stop();
    }

    fn press_throttle(&mut self) {
        self.inner.set_throttle(true);
    }

    fn release_throttle(&mut self) {
        self.inner.set_throttle(false);
    }

    /// Change one configuration field, e.g. `set_config("layout", "v")`.
    ///
    /// Raises ValueError for an unknown field or value.
    fn set_config(&mut self, field: &str, value: &str) -> PyResult<()> {
        self.inner
            .set_config_str(field, value)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Reset to a stopped engine at angle zero.
    fn reset(&mut self) {
        self.inner.reset();
    }

    /// Advance simulation by dt seconds.
    fn tick(&mut self, dt: f64) {
        self.inner.tick(dt);
    }

    /// Advance using a host timestamp in milliseconds.
    ///
    /// Returns the time step that was applied.
    fn tick_at(&mut self, now_ms: f64) -> f64 {
        let dt = self.clock.advance(now_ms);
        self.inner.tick(dt);
        dt
    }

    /// Run multiple ticks at once (more efficient).
    fn tick_n(&mut self, dt: f64, steps: usize) {
        self.inner.tick_n(dt, steps);
    }

    /// Per-cylinder geometry and valve state.
    fn poses(&self) -> Vec<CylinderPose> {
        self.inner
            .cylinders()
            .iter()
            .map(|frame| CylinderPose {
                index: frame.pose.index,
                phase: frame.pose.phase,
                crank_pin: frame.pose.crank_pin.into(),
                piston: frame.pose.piston.into(),
                center: frame.pose.center.into(),
                bank_angle: frame.pose.bank_angle,
                intake_anchor: frame.anchors.intake.into(),
                exhaust_anchor: frame.anchors.exhaust.into(),
                stroke: frame.cycle.stroke.to_string(),
                intake_open: frame.cycle.intake_open,
                exhaust_open: frame.cycle.exhaust_open,
            })
            .collect()
    }

    /// Every event of the last tick as `(cylinder, name)` pairs, highest priority first.
    fn events(&self) -> Vec<(usize, &'static str)> {
        let stroke_type = self.inner.config().stroke_type;
        self.inner
            .cylinders()
            .iter()
            .flat_map(|frame| {
                frame
                    .cycle
                    .events(stroke_type)
                    .into_iter()
                    .filter_map(move |event| event_name(event).map(|name| (frame.pose.index, name)))
            })
            .collect()
    }

    /// Live particles as `(x, y, life, kind)` tuples, oldest first.
    fn particles(&self) -> Vec<(f64, f64, f64, &'static str)> {
        self.inner
            .particles()
            .iter()
            .map(|p| {
                let kind = match p.kind {
                    ParticleKind::Intake => "intake",
                    ParticleKind::Exhaust => "exhaust",
                };
                (p.pos.x, p.pos.y, p.life, kind)
            })
            .collect()
    }

    /// Status panel lines (RPM, torque, horsepower, warnings).
    fn status_lines(&self) -> Vec<String> {
        self.inner.status().lines()
    }

    /// Active warning messages.
    fn warnings(&self) -> Vec<&'static str> {
        self.inner.status().warnings.clone()
    }

    /// Get current state as dict for easy inspection.
    fn state_dict(&self) -> PyResult<PyObject> {
        Python::with_gil(|py| {
            let status = self.inner.status();
            let config = self.inner.config();
            let dict = PyDict::new_bound(py);
            dict.set_item("time", self.inner.time())?;
            dict.set_item("crank_angle", self.inner.state().crank_angle)?;
            dict.set_item("angular_velocity", self.inner.state().angular_velocity)?;
            dict.set_item("running", self.inner.state().running)?;
            dict.set_item("throttle", self.inner.state().throttle)?;
            dict.set_item("rpm", status.rpm)?;
            dict.set_item("torque", status.torque)?;
            dict.set_item("horsepower", status.horsepower)?;
            dict.set_item("displacement", status.displacement)?;
            dict.set_item("warnings", status.warnings.clone())?;
            dict.set_item("stroke_type", config.stroke_type.as_str())?;
            dict.set_item("layout", config.layout.as_str())?;
            dict.set_item("cylinder_count", config.cylinder_count)?;
            dict.set_item("material", config.material.as_str())?;
            dict.set_item("exhaust", config.exhaust.as_str())?;
            dict.set_item("fuel", config.fuel.as_str())?;
            dict.set_item("particle_count", self.inner.particles().len())?;
            Ok(dict.into())
        })
    }
}

/// Python module definition.
#[pymodule]
fn engine_sim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vec2>()?;
    m.add_class::<CylinderPose>()?;
    m.add_class::<Simulation>()?;
    Ok(())
}
