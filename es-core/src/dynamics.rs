//! Rotational dynamics of the crankshaft.
//!
//! The engine has a single degree of freedom: the crank angle. Instead of
//! summing torques, the shaft speed relaxes exponentially towards a target
//! set by the throttle:
//!
//! ```text
//! target   = idle + (max - idle) * throttle            (RPM → rad/s)
//! running: ω += (target - ω) * k1 * dt,  ω ∈ [idle, max]
//! stopped: ω += (0 - ω) * k2 * dt,       ω ≥ 0
//! θ += ω * dt
//! ```
//!
//! With `k1 = 2/s` the shaft covers most of the idle-to-redline gap within
//! the first half second of full throttle.

use crate::config::EngineConfig;
use crate::types::{constants, SimulationState};

/// Exponential-approach integrator for the crankshaft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationalDynamics {
    /// Pull towards the throttle target while running (1/s)
    pub approach_gain: f64,
    /// Friction pulling the shaft to rest once stopped (1/s)
    pub spin_down_gain: f64,
}

impl Default for RotationalDynamics {
    fn default() -> Self {
        Self {
            approach_gain: constants::APPROACH_GAIN,
            spin_down_gain: constants::SPIN_DOWN_GAIN,
        }
    }
}

impl RotationalDynamics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the shaft by one time step.
    ///
    /// # Arguments
    /// * `state` - Current rotational state
    /// * `config` - Engine configuration (idle and max speed)
    /// * `dt` - Time step in seconds; negative, NaN or infinite values count as zero
    ///
    /// # Returns
    /// New state after the time step.
    pub fn step(&self, state: &SimulationState, config: &EngineConfig, dt: f64) -> SimulationState {
        let mut next = *state;
        if !dt.is_finite() || dt <= 0.0 {
            return next;
        }

        let idle = config.idle_angular_velocity();
        let max = config.max_angular_velocity();
        let omega = state.angular_velocity;

        next.angular_velocity = if state.running {
            let target = config.target_angular_velocity(state.throttle.clamp(0.0, 1.0));
            // A factor above 1 would overshoot the target.
            let blend = (self.approach_gain * dt).min(1.0);
            (omega + (target - omega) * blend).clamp(idle, max)
        } else {
            let blend = (self.spin_down_gain * dt).min(1.0);
            (omega - omega * blend).max(0.0)
        };

        next.crank_angle = state.crank_angle + next.angular_velocity * dt;
        next
    }

    /// In-place variant of [`RotationalDynamics::step`].
    pub fn update(&self, state: &mut SimulationState, config: &EngineConfig, dt: f64) {
        *state = self.step(state, config, dt);
    }

    /// Advance by `substeps` steps of `dt` each.
    pub fn step_n(
        &self,
        state: &SimulationState,
        config: &EngineConfig,
        dt: f64,
        substeps: usize,
    ) -> SimulationState {
        let mut current = *state;
        for _ in 0..substeps {
            current = self.step(&current, config, dt);
        }
        current
    }
}

// =============================================================================
// Tests
// =============================================================================
