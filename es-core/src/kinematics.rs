//! Slider-crank kinematics.
//!
//! Every cylinder shares one crankshaft. Cylinder `i` of `N` runs
//! `i · 2π/N` ahead of cylinder 0, and its piston is tied to the crank pin by
//! a rod of fixed length:
//!
//! ```text
//!        ┌───┐  piston      y = cy - √(L² - (r·sin φ)²)
//!        └─┬─┘
//!          │    rod (L)
//!          ●    crank pin   (cx + r·cos φ, cy + r·sin φ)
//!      ( · )    crank centre (cx, cy)
//! ```
//!
//! When the throw is longer than the rod (`r > L`) the square root would go
//! negative; the radicand is floored at zero so the piston sits on the crank
//! centre line instead of producing NaN.

use std::f64::consts::PI;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::types::{constants, CylinderPose, Layout, StrokeType, Vec2};

/// Gap between the top of the piston's travel and the cylinder head.
pub const HEAD_CLEARANCE: f64 = 20.0;

/// Pure geometry of the cylinder bank.
pub struct CylinderKinematics;

impl CylinderKinematics {
    /// Crank angle by which cylinder `index` leads cylinder 0.
    pub fn phase_offset(index: usize, cylinder_count: usize) -> f64 {
        index as f64 * (2.0 * PI / cylinder_count.max(1) as f64)
    }

    /// Phase of cylinder `index`, wrapped to [0, 2π).
    pub fn phase(crank_angle: f64, index: usize, cylinder_count: usize) -> f64 {
        (crank_angle + Self::phase_offset(index, cylinder_count)).rem_euclid(2.0 * PI)
    }

    /// Vertical distance from crank centre to piston pin.
    ///
    /// `√(max(0, L² − (r·sin φ)²))`
    pub fn piston_offset(phase: f64, crank_radius: f64, rod_length: f64) -> f64 {
        let lateral = crank_radius * phase.sin();
        (rod_length * rod_length - lateral * lateral).max(0.0).sqrt()
    }

    /// Horizontal position of cylinder `index` relative to the crank centre.
    pub fn layout_offset_x(index: usize, layout: Layout, cylinder_count: usize, spacing: f64) -> f64 {
        let side = if index % 2 == 0 { -1.0 } else { 1.0 };
        match layout {
            Layout::Inline => {
                let middle = (cylinder_count.max(1) as f64 - 1.0) / 2.0;
                (index as f64 - middle) * spacing
            }
            Layout::V => side * spacing * (constants::V_BANK_ANGLE / 2.0).sin(),
            Layout::Boxer => side * spacing,
        }
    }

    /// Full pose of cylinder `index` at the given crank angle.
    pub fn pose(crank_angle: f64, index: usize, config: &EngineConfig) -> CylinderPose {
        let n = config.cylinder_count.max(1);
        let phase = Self::phase(crank_angle, index, n);
        let layout_offset_x =
            Self::layout_offset_x(index, config.layout, n, config.bank_spacing);

        let center = config.crank_center + Vec2::new(layout_offset_x, 0.0);
        let crank_pin = center + Vec2::from_angle(phase) * config.crank_radius;
        let y_offset = Self::piston_offset(phase, config.crank_radius, config.rod_length);
        let piston = Vec2::new(center.x, center.y - y_offset);

        CylinderPose {
            index,
            phase,
            center,
            crank_pin,
            piston,
            layout_offset_x,
            bank_angle: config.layout.bank_angle(index),
        }
    }

    /// Poses of every cylinder, in index order.
    pub fn poses(crank_angle: f64, config: &EngineConfig) -> Vec<CylinderPose> {
        (0..config.cylinder_count.max(1))
            .map(|i| Self::pose(crank_angle, i, config))
            .collect()
    }
}

/// Where gas enters and leaves a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchors {
    pub intake: Vec2,
    pub exhaust: Vec2,
    /// +1 when the exhaust side faces right, -1 when it faces left.
    pub outward: f64,
}

/// Intake and exhaust anchor points for a cylinder.
///
/// Four-stroke heads carry their valves side by side above the piston crown.
/// Two-stroke cylinders have fixed ports in opposite walls of the bore. The
/// exhaust side always faces away from the engine centre.
pub fn anchors(pose: &CylinderPose, config: &EngineConfig) -> Anchors {
    let outward = if pose.layout_offset_x < 0.0 { -1.0 } else { 1.0 };
    let cx = pose.center.x;
    match config.stroke_type {
        StrokeType::Four => {
            let head_y = pose.center.y - config.rod_length - config.crank_radius - HEAD_CLEARANCE;
            let half_gap = config.bore / 4.0;
            Anchors {
                intake: Vec2::new(cx - outward * half_gap, head_y),
                exhaust: Vec2::new(cx + outward * half_gap, head_y),
                outward,
            }
        }
        StrokeType::Two => {
            let port_y = pose.center.y - config.rod_length;
            let half_bore = config.bore / 2.0;
            Anchors {
                intake: Vec2::new(cx - outward * half_bore, port_y),
                exhaust: Vec2::new(cx + outward * half_bore, port_y),
                outward,
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(crank_radius: f64, rod_length: f64) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.set_crank_radius(crank_radius);
        config.set_rod_length(rod_length);
        config
    }

    #[test]
    fn test_piston_at_quarter_turn() {
        let config = config_with(40.0, 120.0);
        let pose = CylinderKinematics::pose(PI / 2.0, 0, &config);
        let expected = 12800.0_f64.sqrt();
        assert!((pose.piston.y - (config.crank_center.y - expected)).abs() < 1e-9);
        assert!((expected - 113.137).abs() < 1e-3);
    }

    #[test]
    fn test_crank_pin_on_circle() {
        let config = config_with(40.0, 120.0);
        for step in 0..16 {
            let angle = step as f64 * PI / 8.0;
            let pose = CylinderKinematics::pose(angle, 0, &config);
            assert!((pose.crank_pin.distance(&pose.center) - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rod_longer_than_reach_is_clamped() {
        let offset = CylinderKinematics::piston_offset(PI / 2.0, 150.0, 100.0);
        assert_eq!(offset, 0.0);
        assert!(!offset.is_nan());
    }

    #[test]
    fn test_phase_is_wrapped() {
        let phase = CylinderKinematics::phase(7.0 * PI, 0, 1);
        assert!((phase - PI).abs() < 1e-9);
        let phase = CylinderKinematics::phase(-PI / 2.0, 0, 1);
        assert!((phase - 1.5 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_phase_offsets_for_four_cylinders() {
        let offsets: Vec<f64> = (0..4)
            .map(|i| CylinderKinematics::phase_offset(i, 4))
            .collect();
        assert_eq!(offsets[0], 0.0);
        assert!((offsets[1] - PI / 2.0).abs() < 1e-12);
        assert!((offsets[3] - 1.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_inline_layout_is_centred() {
        let xs: Vec<f64> = (0..4)
            .map(|i| CylinderKinematics::layout_offset_x(i, Layout::Inline, 4, 10.0))
            .collect();
        assert_eq!(xs, vec![-15.0, -5.0, 5.0, 15.0]);
        assert_eq!(CylinderKinematics::layout_offset_x(0, Layout::Inline, 1, 10.0), 0.0);
    }

    #[test]
    fn test_v_and_boxer_alternate_by_parity() {
        for layout in [Layout::V, Layout::Boxer] {
            let left = CylinderKinematics::layout_offset_x(0, layout, 8, 90.0);
            let right = CylinderKinematics::layout_offset_x(1, layout, 8, 90.0);
            assert!(left < 0.0 && right > 0.0);
            assert!((left + right).abs() < 1e-12);
            assert_eq!(left, CylinderKinematics::layout_offset_x(6, layout, 8, 90.0));
        }
        let v = CylinderKinematics::layout_offset_x(1, Layout::V, 2, 90.0);
        let boxer = CylinderKinematics::layout_offset_x(1, Layout::Boxer, 2, 90.0);
        assert!(v < boxer);
    }

    #[test]
    fn test_poses_cover_every_cylinder() {
        let mut config = EngineConfig::default();
        config.set_cylinder_count(6);
        let poses = CylinderKinematics::poses(0.3, &config);
        assert_eq!(poses.len(), 6);
        for (i, pose) in poses.iter().enumerate() {
            assert_eq!(pose.index, i);
            assert!(pose.piston.y < pose.center.y);
        }
    }

    #[test]
    fn test_anchors_face_outward() {
        let mut config = EngineConfig::default();
        config.set_layout(Layout::Boxer);
        config.set_cylinder_count(2);

        let left = CylinderKinematics::pose(0.0, 0, &config);
        let a = anchors(&left, &config);
        assert_eq!(a.outward, -1.0);
        assert!(a.exhaust.x < a.intake.x);

        let right = CylinderKinematics::pose(0.0, 1, &config);
        let a = anchors(&right, &config);
        assert!(a.exhaust.x > a.intake.x);
    }

    #[test]
    fn test_two_stroke_ports_sit_in_the_bore_walls() {
        let mut config = EngineConfig::default();
        config.set_stroke_type(StrokeType::Two);
        let pose = CylinderKinematics::pose(0.0, 0, &config);
        let a = anchors(&pose, &config);
        assert!((a.exhaust.x - a.intake.x - config.bore).abs() < 1e-9);
        assert_eq!(a.exhaust.y, a.intake.y);
    }
}
