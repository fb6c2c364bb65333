//! Intake and exhaust gas particles.
//!
//! Particles are purely visual: they move in straight lines, lose one unit of
//! life per second and vanish once their life runs out. Nothing interacts, so
//! update order does not matter.
//!
//! The collection is capped. Once full, spawning a new particle drops the
//! oldest one.

use std::collections::VecDeque;

use rand::{rng, rngs::StdRng, Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::cycle::CycleReport;
use crate::kinematics::Anchors;
use crate::types::{Particle, ParticleKind, SimulationState, StrokeType, Vec2};

/// Tuning for the particle system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSettings {
    /// Upper bound on live particles
    pub max_particles: usize,
    /// Expected ambient spawns per cylinder per second at full throttle
    pub ambient_rate: f64,
    /// Particles released by one cycle event
    pub burst_size: usize,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            max_particles: 512,
            ambient_rate: 10.0,
            burst_size: 3,
        }
    }
}

/// Owner of every live particle.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: VecDeque<Particle>,
    settings: ParticleSettings,
    rng: StdRng,
}

impl ParticleSystem {
    /// Create an empty system. `seed` makes spawning reproducible; `None` seeds from entropy.
    pub fn new(settings: ParticleSettings, seed: Option<u64>) -> Self {
        let rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };
        Self {
            particles: VecDeque::with_capacity(settings.max_particles.min(1024)),
            settings,
            rng,
        }
    }

    pub fn settings(&self) -> &ParticleSettings {
        &self.settings
    }

    /// Change the cap, dropping the oldest particles if already over it.
    pub fn set_max_particles(&mut self, max_particles: usize) {
        self.settings.max_particles = max_particles;
        while self.particles.len() > max_particles {
            self.particles.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Live particles, oldest first.
    pub fn particles(&self) -> &VecDeque<Particle> {
        &self.particles
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Append one particle with full life.
    pub fn spawn(&mut self, pos: Vec2, vel: Vec2, kind: ParticleKind) {
        if self.settings.max_particles == 0 {
            return;
        }
        if self.particles.len() >= self.settings.max_particles {
            self.particles.pop_front();
        }
        self.particles.push_back(Particle {
            pos,
            vel,
            life: 1.0,
            kind,
        });
    }

    /// Move every particle and drop the ones whose life ran out.
    pub fn update(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        for p in self.particles.iter_mut() {
            p.pos += p.vel * dt;
            p.life -= dt;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    /// Spawn this frame's particles for one cylinder.
    ///
    /// While running with the throttle open, one intake and one exhaust
    /// particle appear with probability proportional to `dt`. Ignition, an
    /// intake opening and a two-stroke exhaust port opening each release a
    /// burst regardless of throttle.
    pub fn emit(
        &mut self,
        dt: f64,
        state: &SimulationState,
        config: &EngineConfig,
        anchors: &Anchors,
        report: &CycleReport,
    ) {
        if !state.running {
            return;
        }

        if state.throttle > 0.0 && dt.is_finite() && dt > 0.0 {
            let flow = config.exhaust.flow();
            let chance = (dt
                * self.settings.ambient_rate
                * state.throttle
                * flow.rate_scale
                * config.smoke_density)
                .min(1.0);
            if self.rng.random::<f64>() < chance {
                self.spawn_kind(ParticleKind::Intake, config, anchors);
                self.spawn_kind(ParticleKind::Exhaust, config, anchors);
            }
        }

        // Read the window edges, not `report.event`: near redline one frame
        // crosses every window and only the spark would survive.
        let exhaust_burst = report.ignited
            || (config.stroke_type == StrokeType::Two && report.exhaust_opened);
        let intake_burst = report.intake_opened;
        for _ in 0..self.settings.burst_size {
            if exhaust_burst {
                self.spawn_kind(ParticleKind::Exhaust, config, anchors);
            }
            if intake_burst {
                self.spawn_kind(ParticleKind::Intake, config, anchors);
            }
        }
    }

    fn spawn_kind(&mut self, kind: ParticleKind, config: &EngineConfig, anchors: &Anchors) {
        let vy = self.rng.random_range(-10.0..10.0);
        let (pos, vx) = match kind {
            ParticleKind::Exhaust => {
                let speed = self.rng.random_range(40.0..60.0) * config.exhaust.flow().speed_scale;
                (anchors.exhaust, anchors.outward * speed)
            }
            ParticleKind::Intake => {
                let speed = self.rng.random_range(30.0..40.0);
                (anchors.intake, -anchors.outward * speed)
            }
        };
        self.spawn(pos, Vec2::new(vx, vy), kind);
    }
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(ParticleSettings::default(), None)
    }
}

// =============================================================================
// Tests
// =============================================================================
