//! Property tests for the simulation invariants.

use std::f64::consts::PI;

use proptest::prelude::*;

use es_core::config::EngineConfig;
use es_core::kinematics::CylinderKinematics;
use es_core::particles::{ParticleSettings, ParticleSystem};
use es_core::simulation::Simulation;
use es_core::types::{ParticleKind, Vec2};

#[derive(Debug, Clone)]
enum Input {
    Start,
    Stop,
    Throttle(bool),
    Tick(f64),
}

fn input() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just(Input::Start),
        Just(Input::Stop),
        any::<bool>().prop_map(Input::Throttle),
        (0.0f64..0.2).prop_map(Input::Tick),
        (0.0f64..0.2).prop_map(Input::Tick),
        (0.0f64..0.2).prop_map(Input::Tick),
    ]
}

proptest! {
    #[test]
    fn running_speed_stays_within_limits(
        idle in 500.0f64..3000.0,
        max in 4000.0f64..12000.0,
        inputs in prop::collection::vec(input(), 1..200),
    ) {
        let mut config = EngineConfig::default();
        config.set_idle_rpm(idle);
        config.set_max_rpm(max);
        let mut sim = Simulation::new(config, Some(0));

        for step in inputs {
            match step {
                Input::Start => sim.start(),
                Input::Stop => sim.stop(),
                Input::Throttle(pressed) => sim.set_throttle(pressed),
                Input::Tick(dt) => sim.tick(dt),
            }
            let state = sim.state();
            prop_assert!(state.angular_velocity >= 0.0);
            if state.running {
                prop_assert!(state.angular_velocity >= sim.config().idle_angular_velocity() - 1e-9);
                prop_assert!(state.angular_velocity <= sim.config().max_angular_velocity() + 1e-9);
            }
        }
    }

    #[test]
    fn crank_angle_never_decreases(
        dts in prop::collection::vec(-1.0f64..1.0, 1..200),
        throttle in any::<bool>(),
    ) {
        let mut sim = Simulation::new(EngineConfig::default(), Some(0));
        sim.start();
        sim.set_throttle(throttle);
        let mut previous = sim.state().crank_angle;
        for dt in dts {
            sim.tick(dt);
            prop_assert!(sim.state().crank_angle >= previous);
            previous = sim.state().crank_angle;
        }
    }

    #[test]
    fn phases_are_evenly_spaced(
        count in 1usize..=12,
        crank_angle in 0.0f64..1000.0,
    ) {
        let spacing = 2.0 * PI / count as f64;
        for i in 0..count {
            let phase = CylinderKinematics::phase(crank_angle, i, count);
            prop_assert!((0.0..2.0 * PI).contains(&phase));
            let expected = (crank_angle + i as f64 * spacing).rem_euclid(2.0 * PI);
            prop_assert!((phase - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn piston_never_goes_below_crank(
        crank_angle in -100.0f64..100.0,
        radius in 1.0f64..100.0,
        rod in 1.0f64..300.0,
    ) {
        let mut config = EngineConfig::default();
        config.set_crank_radius(radius);
        config.set_rod_length(rod);
        let pose = CylinderKinematics::pose(crank_angle, 0, &config);
        prop_assert!(pose.piston.is_finite());
        prop_assert!(pose.piston.y <= config.crank_center.y);
    }

    #[test]
    fn particle_life_strictly_decreases(
        dts in prop::collection::vec(0.001f64..0.3, 1..50),
    ) {
        let mut system = ParticleSystem::new(ParticleSettings::default(), Some(1));
        for i in 0..10 {
            system.spawn(Vec2::new(i as f64, 0.0), Vec2::new(1.0, 1.0), ParticleKind::Exhaust);
        }
        let mut elapsed = 0.0;
        for dt in dts {
            system.update(dt);
            elapsed += dt;
            for p in system.iter() {
                prop_assert!(p.life > 0.0);
                prop_assert!((p.life - (1.0 - elapsed)).abs() < 1e-9);
            }
            if elapsed >= 1.0 + 1e-9 {
                prop_assert!(system.is_empty());
            }
        }
    }
}
