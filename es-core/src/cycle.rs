//! Cycle timing: spark, valve and port events.
//!
//! A cycle spans two crank revolutions (4π) on a four-stroke engine and one
//! (2π) on a two-stroke. Events are tied to angular windows inside that
//! cycle and tracked on the unbounded cylinder angle, never on the wrapped
//! phase, so a four-stroke cylinder sparks every other revolution.
//!
//! ```text
//! four-stroke  0 ──── π ────── 2π ────── 3π ────── 4π
//!              intake  compress  power     exhaust
//!                ▲ intake valve  ▲ spark     ▲ exhaust valve
//!
//! two-stroke   0 ──────── π ──────── 2π
//!              ▲ ports    ▲ spark
//!              (BDC)      (TDC)
//! ```
//!
//! ## Edge triggering
//!
//! Each window keeps the index of the last cycle in which it was entered.
//! An event fires when that index grows, which means:
//!
//! - Several samples inside one window fire once.
//! - A step that jumps clean over the window still fires once.
//! - A step spanning several cycles fires once, not once per cycle.
//! - Leaving and re-entering the same window does not fire again.

use std::f64::consts::PI;

use log::{debug, trace};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::kinematics::CylinderKinematics;
use crate::types::{constants, CycleEvent, Stroke, StrokeType, Valve};

/// An angular band inside the cycle, `center ± half_width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleWindow {
    pub center: f64,
    pub half_width: f64,
}

impl AngleWindow {
    pub const fn new(center: f64, half_width: f64) -> Self {
        Self { center, half_width }
    }

    /// Index of the most recent cycle whose window start lies at or before `angle`.
    fn entry_index(&self, angle: f64, cycle_length: f64) -> i64 {
        ((angle - (self.center - self.half_width)) / cycle_length).floor() as i64
    }

    /// Index of the most recent cycle whose window end lies at or before `angle`.
    fn exit_index(&self, angle: f64, cycle_length: f64) -> i64 {
        ((angle - (self.center + self.half_width)) / cycle_length).floor() as i64
    }

    /// Whether `angle` currently lies inside the window.
    pub fn contains(&self, angle: f64, cycle_length: f64) -> bool {
        (angle - (self.center - self.half_width)).rem_euclid(cycle_length)
            <= 2.0 * self.half_width
    }
}

/// Event angles for one stroke type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleTiming {
    pub cycle_length: f64,
    /// Ignition window around top dead centre
    pub ignition: AngleWindow,
    /// Intake valve (four-stroke) or transfer port (two-stroke)
    pub intake: AngleWindow,
    /// Exhaust valve (four-stroke) or exhaust port (two-stroke)
    pub exhaust: AngleWindow,
}

impl CycleTiming {
    pub fn for_stroke(stroke: StrokeType) -> Self {
        match stroke {
            StrokeType::Four => Self {
                cycle_length: stroke.cycle_length(),
                ignition: AngleWindow::new(2.0 * PI, constants::SPARK_TOLERANCE),
                intake: AngleWindow::new(PI / 2.0, constants::VALVE_HALF_WIDTH),
                exhaust: AngleWindow::new(3.5 * PI, constants::VALVE_HALF_WIDTH),
            },
            StrokeType::Two => Self {
                cycle_length: stroke.cycle_length(),
                ignition: AngleWindow::new(PI, constants::SPARK_TOLERANCE),
                intake: AngleWindow::new(0.0, constants::INTAKE_PORT_HALF_WIDTH),
                exhaust: AngleWindow::new(0.0, constants::EXHAUST_PORT_HALF_WIDTH),
            },
        }
    }

    /// Timing for `config`, with the valve windows widened or narrowed to
    /// its `valve_window`. Two-stroke ports are fixed by the cylinder wall.
    pub fn for_config(config: &EngineConfig) -> Self {
        let mut timing = Self::for_stroke(config.stroke_type);
        if config.stroke_type == StrokeType::Four {
            let half_width = config.valve_window.to_radians();
            timing.intake.half_width = half_width;
            timing.exhaust.half_width = half_width;
        }
        timing
    }

    /// Stroke under way at a wrapped cycle angle.
    pub fn stroke_at(&self, cycle_angle: f64) -> Stroke {
        if self.cycle_length > 2.0 * PI + constants::EPSILON {
            match (cycle_angle / PI).floor() as i64 {
                0 => Stroke::Intake,
                1 => Stroke::Compression,
                2 => Stroke::Power,
                _ => Stroke::Exhaust,
            }
        } else if cycle_angle < PI {
            Stroke::Compression
        } else {
            Stroke::Power
        }
    }
}

/// Edges seen by one window since the previous observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Edges {
    opened: bool,
    closed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct WindowTracker {
    last_entry: Option<i64>,
    last_exit: Option<i64>,
}

impl WindowTracker {
    fn observe(&mut self, window: &AngleWindow, angle: f64, cycle_length: f64) -> Edges {
        let entry = window.entry_index(angle, cycle_length);
        let exit = window.exit_index(angle, cycle_length);
        let (Some(last_entry), Some(last_exit)) = (self.last_entry, self.last_exit) else {
            // A window already open when first seen never reports its close.
            self.last_entry = Some(entry);
            self.last_exit = Some(exit.max(entry));
            return Edges::default();
        };
        let opened = entry > last_entry;
        let closed = exit > last_exit;
        // Never move backwards, so a return into an already-seen window stays silent.
        self.last_entry = Some(last_entry.max(entry));
        self.last_exit = Some(last_exit.max(exit));
        Edges { opened, closed }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CylinderTracker {
    ignition: WindowTracker,
    intake: WindowTracker,
    exhaust: WindowTracker,
}

/// Per-cylinder cycle state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleReport {
    /// Highest-priority event of this frame
    pub event: CycleEvent,
    /// The ignition window was entered this frame, with or without a spark plug
    pub ignited: bool,
    /// Position inside the cycle, wrapped to [0, cycle length)
    pub cycle_angle: f64,
    pub stroke: Stroke,
    pub intake_open: bool,
    pub exhaust_open: bool,
    /// Intake valve or port opened this frame
    pub intake_opened: bool,
    pub intake_closed: bool,
    /// Exhaust valve or port opened this frame
    pub exhaust_opened: bool,
    pub exhaust_closed: bool,
    /// Ignition by spark plug this frame
    pub sparked: bool,
}

impl CycleReport {
    /// Every event of this frame, highest priority first.
    ///
    /// A long frame can cross several windows; `event` keeps only the first
    /// of these.
    pub fn events(&self, stroke_type: StrokeType) -> Vec<CycleEvent> {
        let mut events = Vec::with_capacity(4);
        if self.sparked {
            events.push(CycleEvent::Spark);
        }
        match stroke_type {
            StrokeType::Four => {
                if self.intake_opened {
                    events.push(CycleEvent::ValveOpen(Valve::Intake));
                }
                if self.exhaust_opened {
                    events.push(CycleEvent::ValveOpen(Valve::Exhaust));
                }
                if self.intake_closed {
                    events.push(CycleEvent::ValveClosed(Valve::Intake));
                }
                if self.exhaust_closed {
                    events.push(CycleEvent::ValveClosed(Valve::Exhaust));
                }
            }
            StrokeType::Two => {
                if self.exhaust_opened {
                    events.push(CycleEvent::PortOpenExhaust);
                }
                if self.intake_opened {
                    events.push(CycleEvent::PortOpenIntake);
                }
            }
        }
        events.sort_by_key(|e| std::cmp::Reverse(e.priority()));
        events
    }
}

/// Turns crank angle into discrete per-cylinder events.
#[derive(Debug, Clone)]
pub struct CycleEventDetector {
    stroke: StrokeType,
    timing: CycleTiming,
    trackers: Vec<CylinderTracker>,
}

impl CycleEventDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            stroke: config.stroke_type,
            timing: CycleTiming::for_config(config),
            trackers: vec![CylinderTracker::default(); config.cylinder_count.max(1)],
        }
    }

    pub fn timing(&self) -> &CycleTiming {
        &self.timing
    }

    /// Forget every window edge; the next observation only primes the trackers.
    pub fn reset(&mut self, config: &EngineConfig) {
        debug!(
            "resetting cycle trackers for {} {}-stroke cylinders",
            config.cylinder_count,
            config.stroke_type.as_str()
        );
        *self = Self::new(config);
    }

    /// Classify this frame's events for every cylinder.
    pub fn detect(&mut self, crank_angle: f64, config: &EngineConfig) -> Vec<CycleReport> {
        let n = config.cylinder_count.max(1);
        if self.stroke != config.stroke_type
            || self.trackers.len() != n
            || self.timing != CycleTiming::for_config(config)
        {
            self.reset(config);
        }
        let timing = self.timing;
        let len = timing.cycle_length;
        let needs_spark = config.fuel.needs_spark();
        let stroke = self.stroke;

        self.trackers
            .iter_mut()
            .enumerate()
            .map(|(i, tracker)| {
                let angle = crank_angle + CylinderKinematics::phase_offset(i, n);
                let ignition = tracker.ignition.observe(&timing.ignition, angle, len);
                let intake = tracker.intake.observe(&timing.intake, angle, len);
                let exhaust = tracker.exhaust.observe(&timing.exhaust, angle, len);

                let sparked = ignition.opened && needs_spark;
                if sparked {
                    trace!("cylinder {} spark at {:.3} rad", i, angle);
                }

                let cycle_angle = angle.rem_euclid(len);
                let mut report = CycleReport {
                    event: CycleEvent::None,
                    ignited: ignition.opened,
                    cycle_angle,
                    stroke: timing.stroke_at(cycle_angle),
                    intake_open: timing.intake.contains(angle, len),
                    exhaust_open: timing.exhaust.contains(angle, len),
                    intake_opened: intake.opened,
                    intake_closed: intake.closed,
                    exhaust_opened: exhaust.opened,
                    exhaust_closed: exhaust.closed,
                    sparked,
                };
                report.event = report.events(stroke).first().copied().unwrap_or_default();
                report
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fuel;

    const DEG: f64 = PI / 180.0;

    fn four_stroke() -> EngineConfig {
        EngineConfig::default()
    }

    fn two_stroke() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.set_stroke_type(StrokeType::Two);
        config
    }

    /// Sweep cylinder 0 from `from` to `to` in `step` increments and count events.
    fn count_events(config: &EngineConfig, from: f64, to: f64, step: f64, wanted: CycleEvent) -> usize {
        let mut detector = CycleEventDetector::new(config);
        let mut angle = from;
        let mut count = 0;
        while angle <= to {
            let reports = detector.detect(angle, config);
            if reports[0].event == wanted {
                count += 1;
            }
            angle += step;
        }
        count
    }

    #[test]
    fn test_four_stroke_sparks_every_other_revolution() {
        let sparks = count_events(&four_stroke(), 0.0, 8.0 * PI, 0.5 * DEG, CycleEvent::Spark);
        assert_eq!(sparks, 2);
    }

    #[test]
    fn test_two_stroke_sparks_every_revolution() {
        let sparks = count_events(&two_stroke(), 0.0, 8.0 * PI, 0.5 * DEG, CycleEvent::Spark);
        assert_eq!(sparks, 4);
    }

    #[test]
    fn test_samples_inside_window_fire_once() {
        let config = four_stroke();
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(2.0 * PI - 10.0 * DEG, &config);

        let mut sparks = 0;
        for k in 0..6 {
            let angle = 2.0 * PI - 2.5 * DEG + k as f64 * DEG;
            if detector.detect(angle, &config)[0].event == CycleEvent::Spark {
                sparks += 1;
            }
        }
        assert_eq!(sparks, 1);
    }

    #[test]
    fn test_jump_over_window_fires_once() {
        let config = four_stroke();
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(2.0 * PI - 10.0 * DEG, &config);
        let reports = detector.detect(2.0 * PI + 10.0 * DEG, &config);
        assert_eq!(reports[0].event, CycleEvent::Spark);
        assert!(reports[0].ignited);

        // Spanning three whole cycles still yields a single spark.
        let reports = detector.detect(2.0 * PI + 10.0 * DEG + 3.0 * 4.0 * PI, &config);
        assert_eq!(reports[0].event, CycleEvent::Spark);
        let reports = detector.detect(2.0 * PI + 11.0 * DEG + 3.0 * 4.0 * PI, &config);
        assert_ne!(reports[0].event, CycleEvent::Spark);
    }

    #[test]
    fn test_overshoot_and_return_does_not_refire() {
        let config = four_stroke();
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(2.0 * PI - 10.0 * DEG, &config);
        assert_eq!(detector.detect(2.0 * PI, &config)[0].event, CycleEvent::Spark);
        detector.detect(2.0 * PI - 5.0 * DEG, &config);
        assert_ne!(detector.detect(2.0 * PI + 1.0 * DEG, &config)[0].event, CycleEvent::Spark);
    }

    #[test]
    fn test_first_observation_only_primes() {
        let config = four_stroke();
        let mut detector = CycleEventDetector::new(&config);
        let reports = detector.detect(2.0 * PI, &config);
        assert_eq!(reports[0].event, CycleEvent::None);
    }

    #[test]
    fn test_four_stroke_valves_open_and_close() {
        let config = four_stroke();
        let opens = count_events(&config, 0.0, 4.0 * PI, DEG, CycleEvent::ValveOpen(Valve::Intake));
        let closes = count_events(&config, 0.0, 4.0 * PI, DEG, CycleEvent::ValveClosed(Valve::Intake));
        let exhaust = count_events(&config, 0.0, 4.0 * PI, DEG, CycleEvent::ValveOpen(Valve::Exhaust));
        assert_eq!(opens, 1);
        assert_eq!(closes, 1);
        assert_eq!(exhaust, 1);

        let mut detector = CycleEventDetector::new(&config);
        let inside = detector.detect(PI / 2.0, &config)[0];
        assert!(inside.intake_open);
        assert!(!inside.exhaust_open);
        assert_eq!(inside.stroke, Stroke::Intake);
    }

    #[test]
    fn test_two_stroke_ports() {
        let config = two_stroke();
        let exhaust = count_events(&config, 0.1, 4.0 * PI, DEG, CycleEvent::PortOpenExhaust);
        assert_eq!(exhaust, 2);
        // Ports are uncovered by the piston, never actuated.
        let valves = count_events(&config, 0.1, 4.0 * PI, DEG, CycleEvent::ValveOpen(Valve::Intake));
        assert_eq!(valves, 0);

        let mut detector = CycleEventDetector::new(&config);
        let bdc = detector.detect(2.0 * PI, &config)[0];
        assert!(bdc.intake_open && bdc.exhaust_open);
        let tdc = detector.detect(3.0 * PI, &config)[0];
        assert!(!tdc.intake_open && !tdc.exhaust_open);
    }

    #[test]
    fn test_diesel_ignites_without_spark() {
        let mut config = four_stroke();
        config.set_fuel(Fuel::Diesel);
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(2.0 * PI - 10.0 * DEG, &config);
        let report = detector.detect(2.0 * PI, &config)[0];
        assert!(report.ignited);
        assert_ne!(report.event, CycleEvent::Spark);
    }

    #[test]
    fn test_stroke_classification() {
        let four = CycleTiming::for_stroke(StrokeType::Four);
        assert_eq!(four.stroke_at(0.1), Stroke::Intake);
        assert_eq!(four.stroke_at(1.5 * PI), Stroke::Compression);
        assert_eq!(four.stroke_at(2.5 * PI), Stroke::Power);
        assert_eq!(four.stroke_at(3.9 * PI), Stroke::Exhaust);

        let two = CycleTiming::for_stroke(StrokeType::Two);
        assert_eq!(two.stroke_at(0.5 * PI), Stroke::Compression);
        assert_eq!(two.stroke_at(1.5 * PI), Stroke::Power);
    }

    #[test]
    fn test_cylinders_are_staggered() {
        let mut config = four_stroke();
        config.set_cylinder_count(4);
        let mut detector = CycleEventDetector::new(&config);
        let mut first_spark = [None; 4];
        let mut angle = 0.0;
        let mut step = 0;
        while angle < 4.0 * PI {
            for (i, r) in detector.detect(angle, &config).iter().enumerate() {
                if r.event == CycleEvent::Spark && first_spark[i].is_none() {
                    first_spark[i] = Some(step);
                }
            }
            angle += DEG;
            step += 1;
        }
        assert!(first_spark.iter().all(|s| s.is_some()), "{:?}", first_spark);
        let unique: std::collections::HashSet<_> = first_spark.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_long_frame_reports_every_edge() {
        let config = four_stroke();
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(0.0, &config);
        // More than a whole cycle in one frame, as at redline with 60 Hz ticks.
        let report = detector.detect(4.0 * PI + 0.2, &config)[0];
        assert_eq!(report.event, CycleEvent::Spark);
        assert!(report.intake_opened && report.intake_closed);
        assert!(report.exhaust_opened && report.exhaust_closed);
        assert_eq!(
            report.events(StrokeType::Four),
            vec![
                CycleEvent::Spark,
                CycleEvent::ValveOpen(Valve::Intake),
                CycleEvent::ValveOpen(Valve::Exhaust),
                CycleEvent::ValveClosed(Valve::Intake),
                CycleEvent::ValveClosed(Valve::Exhaust),
            ]
        );

        let config = two_stroke();
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(PI / 2.0, &config);
        let report = detector.detect(2.0 * PI + PI / 2.0, &config)[0];
        assert_eq!(
            report.events(StrokeType::Two),
            vec![CycleEvent::Spark, CycleEvent::PortOpenExhaust, CycleEvent::PortOpenIntake]
        );
    }

    #[test]
    fn test_valve_window_follows_config() {
        let mut config = four_stroke();
        config.set_valve_window(10.0);
        let mut detector = CycleEventDetector::new(&config);
        assert!((detector.timing().intake.half_width - 10.0 * DEG).abs() < 1e-12);

        // 20 degrees before the intake centre: outside ±10, inside the default ±30.
        let early = PI / 2.0 - 20.0 * DEG;
        detector.detect(0.0, &config);
        let report = detector.detect(early, &config)[0];
        assert!(!report.intake_opened && !report.intake_open);
        let report = detector.detect(PI / 2.0 - 5.0 * DEG, &config)[0];
        assert!(report.intake_opened);
        let report = detector.detect(PI / 2.0 + 15.0 * DEG, &config)[0];
        assert!(report.intake_closed && !report.intake_open);

        let mut wide = four_stroke();
        wide.set_valve_window(30.0);
        let mut detector = CycleEventDetector::new(&wide);
        detector.detect(0.0, &wide);
        assert!(detector.detect(early, &wide)[0].intake_opened);

        // Narrowing the window mid-run rebuilds the timing and keeps it across reset.
        detector.detect(early, &config);
        assert!((detector.timing().intake.half_width - 10.0 * DEG).abs() < 1e-12);
        detector.reset(&config);
        assert!((detector.timing().exhaust.half_width - 10.0 * DEG).abs() < 1e-12);
    }

    #[test]
    fn test_two_stroke_ports_ignore_valve_window() {
        let mut config = two_stroke();
        config.set_valve_window(10.0);
        let timing = CycleTiming::for_config(&config);
        assert_eq!(timing, CycleTiming::for_stroke(StrokeType::Two));
    }

    #[test]
    fn test_priming_inside_window_does_not_close() {
        let config = four_stroke();
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(PI / 2.0, &config);

        let mut events = Vec::new();
        let mut angle = PI / 2.0;
        while angle <= PI {
            angle += DEG;
            let event = detector.detect(angle, &config)[0].event;
            if event != CycleEvent::None {
                events.push(event);
            }
        }
        assert!(events.is_empty(), "{:?}", events);

        // The next cycle's window opens and closes normally.
        let opens = detector.detect(4.0 * PI + PI / 2.0, &config)[0];
        assert!(opens.intake_opened && !opens.intake_closed);
        let closes = detector.detect(4.0 * PI + PI, &config)[0];
        assert!(closes.intake_closed);
    }

    #[test]
    fn test_topology_change_resets_trackers() {
        let mut config = four_stroke();
        let mut detector = CycleEventDetector::new(&config);
        detector.detect(2.0 * PI - 10.0 * DEG, &config);
        config.set_cylinder_count(2);
        let reports = detector.detect(2.0 * PI, &config);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].event, CycleEvent::None);
    }
}
