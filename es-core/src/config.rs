//! Engine configuration.
//!
//! Every field of [`EngineConfig`] has a clamping setter. The toolbox UI (or
//! any other host) mutates the configuration only through these setters, or
//! by sending a [`ConfigCommand`] to the simulation, so the configuration is
//! always inside its declared domain.
//!
//! Named presets live as YAML files in a directory:
//!
//! ```text
//! presets/
//! ├── single.yaml
//! ├── inline4.yaml
//! ├── v8.yaml
//! └── boxer2_two_stroke.yaml
//! ```

use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{
    constants, rpm_to_rad_per_sec, ExhaustKind, Fuel, Layout, Material, StrokeType, Vec2,
};

/// Allowed cylinder counts.
pub const CYLINDER_RANGE: RangeInclusive<i64> = 1..=12;
/// Allowed piston ring counts.
pub const RING_RANGE: RangeInclusive<i64> = 0..=5;
/// Allowed idle speeds (RPM).
pub const IDLE_RPM_RANGE: RangeInclusive<f64> = 500.0..=3000.0;
/// Allowed rev limits (RPM). Starts above the idle range, so `idle < max` always holds.
pub const MAX_RPM_RANGE: RangeInclusive<f64> = 4000.0..=12000.0;
/// Allowed smoke density multipliers.
pub const SMOKE_RANGE: RangeInclusive<f64> = 0.0..=2.0;
/// Allowed valve window half-widths (degrees of crank rotation).
pub const VALVE_WINDOW_RANGE: RangeInclusive<f64> = 5.0..=90.0;
/// Shortest geometric length accepted for radii, rods and bores.
pub const MIN_LENGTH: f64 = 1.0;

fn clamp_range(value: f64, range: &RangeInclusive<f64>) -> f64 {
    value.clamp(*range.start(), *range.end())
}

/// Static and adjustable parameters describing the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub stroke_type: StrokeType,
    pub layout: Layout,
    pub cylinder_count: usize,
    pub ring_count: u8,
    pub material: Material,
    pub exhaust: ExhaustKind,
    pub fuel: Fuel,
    pub idle_rpm: f64,
    pub max_rpm: f64,

    /// Crank throw (half the piston stroke)
    pub crank_radius: f64,
    /// Connecting rod length, big end to small end
    pub rod_length: f64,
    /// Piston diameter
    pub bore: f64,
    /// Crankshaft centre on the schematic plane
    pub crank_center: Vec2,
    /// Horizontal distance between neighbouring cylinders
    pub bank_spacing: f64,
    /// Multiplier on ambient particle flow
    pub smoke_density: f64,
    /// Half-width of each four-stroke valve's open window, in degrees
    pub valve_window: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stroke_type: StrokeType::Four,
            layout: Layout::Inline,
            cylinder_count: 1,
            ring_count: 3,
            material: Material::Steel,
            exhaust: ExhaustKind::Muffler,
            fuel: Fuel::Gasoline,
            idle_rpm: 1000.0,
            max_rpm: 8000.0,
            crank_radius: 40.0,
            rod_length: 100.0,
            bore: 40.0,
            crank_center: Vec2::ZERO,
            bank_spacing: 90.0,
            smoke_density: 1.0,
            valve_window: constants::VALVE_HALF_WIDTH.to_degrees(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a preset from YAML text and pull every field into its domain.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Copy of `self` with every field clamped into its domain.
    pub fn sanitized(mut self) -> Self {
        let defaults = EngineConfig::default();
        self.set_cylinder_count(self.cylinder_count as i64);
        self.set_ring_count(self.ring_count as i64);
        let (idle, max) = (self.idle_rpm, self.max_rpm);
        self.idle_rpm = defaults.idle_rpm;
        self.max_rpm = defaults.max_rpm;
        self.set_idle_rpm(idle);
        self.set_max_rpm(max);
        for (value, fallback) in [
            (&mut self.crank_radius, defaults.crank_radius),
            (&mut self.rod_length, defaults.rod_length),
            (&mut self.bore, defaults.bore),
            (&mut self.bank_spacing, defaults.bank_spacing),
        ] {
            *value = if value.is_finite() {
                (*value).max(MIN_LENGTH)
            } else {
                fallback
            };
        }
        if !self.crank_center.is_finite() {
            self.crank_center = defaults.crank_center;
        }
        let smoke = self.smoke_density;
        self.smoke_density = defaults.smoke_density;
        self.set_smoke_density(smoke);
        let window = self.valve_window;
        self.valve_window = defaults.valve_window;
        self.set_valve_window(window);
        self
    }

    // -------------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------------

    pub fn set_stroke_type(&mut self, stroke_type: StrokeType) {
        self.stroke_type = stroke_type;
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    pub fn set_exhaust(&mut self, exhaust: ExhaustKind) {
        self.exhaust = exhaust;
    }

    pub fn set_fuel(&mut self, fuel: Fuel) {
        self.fuel = fuel;
    }

    /// Set the cylinder count, clamped to 1..=12.
    pub fn set_cylinder_count(&mut self, count: i64) {
        let clamped = count.clamp(*CYLINDER_RANGE.start(), *CYLINDER_RANGE.end());
        if clamped != count {
            warn!("cylinder_count {} out of range, using {}", count, clamped);
        }
        self.cylinder_count = clamped as usize;
    }

    /// Set the piston ring count, clamped to 0..=5.
    pub fn set_ring_count(&mut self, count: i64) {
        let clamped = count.clamp(*RING_RANGE.start(), *RING_RANGE.end());
        if clamped != count {
            warn!("ring_count {} out of range, using {}", count, clamped);
        }
        self.ring_count = clamped as u8;
    }

    /// Set the idle speed in RPM, clamped to 500..=3000. Non-finite input is ignored.
    pub fn set_idle_rpm(&mut self, rpm: f64) {
        if let Some(v) = Self::checked_clamp("idle_rpm", rpm, &IDLE_RPM_RANGE) {
            self.idle_rpm = v;
        }
    }

    /// Set the rev limit in RPM, clamped to 4000..=12000. Non-finite input is ignored.
    pub fn set_max_rpm(&mut self, rpm: f64) {
        if let Some(v) = Self::checked_clamp("max_rpm", rpm, &MAX_RPM_RANGE) {
            self.max_rpm = v;
        }
    }

    pub fn set_crank_radius(&mut self, radius: f64) {
        if let Some(v) = Self::checked_length("crank_radius", radius) {
            self.crank_radius = v;
        }
    }

    pub fn set_rod_length(&mut self, length: f64) {
        if let Some(v) = Self::checked_length("rod_length", length) {
            self.rod_length = v;
        }
    }

    pub fn set_bore(&mut self, bore: f64) {
        if let Some(v) = Self::checked_length("bore", bore) {
            self.bore = v;
        }
    }

    pub fn set_bank_spacing(&mut self, spacing: f64) {
        if let Some(v) = Self::checked_length("bank_spacing", spacing) {
            self.bank_spacing = v;
        }
    }

    pub fn set_crank_center(&mut self, center: Vec2) {
        if center.is_finite() {
            self.crank_center = center;
        } else {
            warn!("ignoring non-finite crank_center {:?}", center);
        }
    }

    /// Set the smoke density multiplier, clamped to 0..=2.
    pub fn set_smoke_density(&mut self, density: f64) {
        if let Some(v) = Self::checked_clamp("smoke_density", density, &SMOKE_RANGE) {
            self.smoke_density = v;
        }
    }

    /// Set the valve window half-width in degrees, clamped to 5..=90.
    pub fn set_valve_window(&mut self, degrees: f64) {
        if let Some(v) = Self::checked_clamp("valve_window", degrees, &VALVE_WINDOW_RANGE) {
            self.valve_window = v;
        }
    }

    fn checked_clamp(field: &str, value: f64, range: &RangeInclusive<f64>) -> Option<f64> {
        if !value.is_finite() {
            warn!("ignoring non-finite {} {}", field, value);
            return None;
        }
        let clamped = clamp_range(value, range);
        if clamped != value {
            warn!("{} {} out of range, using {}", field, value, clamped);
        }
        Some(clamped)
    }

    fn checked_length(field: &str, value: f64) -> Option<f64> {
        if !value.is_finite() {
            warn!("ignoring non-finite {} {}", field, value);
            return None;
        }
        if value < MIN_LENGTH {
            warn!("{} {} too small, using {}", field, value, MIN_LENGTH);
        }
        Some(value.max(MIN_LENGTH))
    }

    /// Apply one configuration message.
    pub fn apply(&mut self, command: ConfigCommand) {
        match command {
            ConfigCommand::StrokeType(v) => self.set_stroke_type(v),
            ConfigCommand::Layout(v) => self.set_layout(v),
            ConfigCommand::CylinderCount(v) => self.set_cylinder_count(v),
            ConfigCommand::RingCount(v) => self.set_ring_count(v),
            ConfigCommand::Material(v) => self.set_material(v),
            ConfigCommand::Exhaust(v) => self.set_exhaust(v),
            ConfigCommand::Fuel(v) => self.set_fuel(v),
            ConfigCommand::IdleRpm(v) => self.set_idle_rpm(v),
            ConfigCommand::MaxRpm(v) => self.set_max_rpm(v),
            ConfigCommand::CrankRadius(v) => self.set_crank_radius(v),
            ConfigCommand::RodLength(v) => self.set_rod_length(v),
            ConfigCommand::Bore(v) => self.set_bore(v),
            ConfigCommand::BankSpacing(v) => self.set_bank_spacing(v),
            ConfigCommand::SmokeDensity(v) => self.set_smoke_density(v),
            ConfigCommand::ValveWindow(v) => self.set_valve_window(v),
        }
    }

    // -------------------------------------------------------------------------
    // Derived quantities
    // -------------------------------------------------------------------------

    pub fn idle_angular_velocity(&self) -> f64 {
        rpm_to_rad_per_sec(self.idle_rpm)
    }

    pub fn max_angular_velocity(&self) -> f64 {
        rpm_to_rad_per_sec(self.max_rpm)
    }

    /// Shaft speed the governor aims for at the given throttle opening.
    pub fn target_angular_velocity(&self, throttle: f64) -> f64 {
        let target_rpm = self.idle_rpm + (self.max_rpm - self.idle_rpm) * throttle;
        rpm_to_rad_per_sec(target_rpm)
    }

    /// Swept volume of all cylinders: bore area × stroke × cylinders.
    pub fn displacement(&self) -> f64 {
        let area = std::f64::consts::PI * (self.bore / 2.0).powi(2);
        area * 2.0 * self.crank_radius * self.cylinder_count as f64
    }
}

// =============================================================================
// Configuration messages
// =============================================================================

/// A single `SetConfig(field, value)` message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigCommand {
    StrokeType(StrokeType),
    Layout(Layout),
    CylinderCount(i64),
    RingCount(i64),
    Material(Material),
    Exhaust(ExhaustKind),
    Fuel(Fuel),
    IdleRpm(f64),
    MaxRpm(f64),
    CrankRadius(f64),
    RodLength(f64),
    Bore(f64),
    BankSpacing(f64),
    SmokeDensity(f64),
    ValveWindow(f64),
}

impl ConfigCommand {
    /// Build a message from the string pair a UI widget produces.
    ///
    /// Unknown tags are rejected here, so a bad value never reaches the
    /// configuration and the previous setting stays in place.
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        let command = match field.trim().to_ascii_lowercase().as_str() {
            "stroke" | "stroke_type" => ConfigCommand::StrokeType(value.parse()?),
            "layout" => ConfigCommand::Layout(value.parse()?),
            "cylinders" | "cylinder_count" => {
                ConfigCommand::CylinderCount(parse_count("cylinder_count", value)?)
            }
            "rings" | "ring_count" => ConfigCommand::RingCount(parse_count("ring_count", value)?),
            "material" => ConfigCommand::Material(value.parse()?),
            "exhaust" => ConfigCommand::Exhaust(value.parse()?),
            "fuel" => ConfigCommand::Fuel(value.parse()?),
            "idle_rpm" => ConfigCommand::IdleRpm(parse_number("idle_rpm", value)?),
            "max_rpm" => ConfigCommand::MaxRpm(parse_number("max_rpm", value)?),
            "crank_radius" => ConfigCommand::CrankRadius(parse_number("crank_radius", value)?),
            "rod_length" => ConfigCommand::RodLength(parse_number("rod_length", value)?),
            "bore" => ConfigCommand::Bore(parse_number("bore", value)?),
            "bank_spacing" => ConfigCommand::BankSpacing(parse_number("bank_spacing", value)?),
            "smoke_density" => ConfigCommand::SmokeDensity(parse_number("smoke_density", value)?),
            "valve_window" => ConfigCommand::ValveWindow(parse_number("valve_window", value)?),
            _ => return Err(Error::UnknownField(field.to_string())),
        };
        Ok(command)
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn parse_count(field: &'static str, value: &str) -> Result<i64> {
    let number = parse_number(field, value)?;
    if !number.is_finite() {
        return Err(Error::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    Ok(number.round() as i64)
}

// =============================================================================
// Presets
// =============================================================================

/// Engine preset loader with configurable base directory.
pub struct PresetLoader {
    base_path: PathBuf,
}

impl PresetLoader {
    /// Create a new loader over a directory of `<name>.yaml` files.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Load a preset by name (without .yaml extension).
    ///
    /// # Example
    /// ```ignore
    /// let loader = PresetLoader::new("presets");
    /// let v8 = loader.load("v8")?;
    /// ```
    pub fn load(&self, name: &str) -> Result<EngineConfig> {
        let path = self.base_path.join(format!("{}.yaml", name));
        if !path.exists() {
            return Err(Error::PresetNotFound(name.to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        let config = EngineConfig::from_yaml_str(&contents)?;
        info!("loaded preset {} from {}", name, path.display());
        Ok(config)
    }

    /// List all available presets, sorted by name.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".yaml") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn presets_path() -> PathBuf {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(manifest_dir).join("..").join("presets")
    }

    #[test]
    fn test_default_engine() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.stroke_type, StrokeType::Four);
        assert_eq!(cfg.cylinder_count, 1);
        assert_eq!(cfg.idle_rpm, 1000.0);
        assert_eq!(cfg.max_rpm, 8000.0);
        assert!(cfg.idle_rpm < cfg.max_rpm);
    }

    #[test]
    fn test_cylinder_count_is_clamped() {
        let mut cfg = EngineConfig::default();
        cfg.set_cylinder_count(0);
        assert_eq!(cfg.cylinder_count, 1);
        cfg.set_cylinder_count(-4);
        assert_eq!(cfg.cylinder_count, 1);
        cfg.set_cylinder_count(40);
        assert_eq!(cfg.cylinder_count, 12);
        cfg.set_cylinder_count(6);
        assert_eq!(cfg.cylinder_count, 6);
    }

    #[test]
    fn test_rpm_bounds_are_clamped() {
        let mut cfg = EngineConfig::default();
        cfg.set_idle_rpm(9000.0);
        assert_eq!(cfg.idle_rpm, 3000.0);
        cfg.set_max_rpm(100.0);
        assert_eq!(cfg.max_rpm, 4000.0);
        assert!(cfg.idle_rpm < cfg.max_rpm);

        cfg.set_idle_rpm(f64::NAN);
        assert_eq!(cfg.idle_rpm, 3000.0, "NaN must leave the value untouched");
    }

    #[test]
    fn test_lengths_are_floored() {
        let mut cfg = EngineConfig::default();
        cfg.set_rod_length(-5.0);
        assert_eq!(cfg.rod_length, MIN_LENGTH);
        cfg.set_crank_radius(f64::INFINITY);
        assert_eq!(cfg.crank_radius, 40.0);
    }

    #[test]
    fn test_parse_commands() {
        let cmd = ConfigCommand::parse("layout", "V").unwrap();
        assert_eq!(cmd, ConfigCommand::Layout(Layout::V));

        let cmd = ConfigCommand::parse("cylinders", "4").unwrap();
        assert_eq!(cmd, ConfigCommand::CylinderCount(4));

        let cmd = ConfigCommand::parse("idle_rpm", " 1200 ").unwrap();
        assert_eq!(cmd, ConfigCommand::IdleRpm(1200.0));
    }

    #[test]
    fn test_rejected_tag_keeps_previous_value() {
        let mut cfg = EngineConfig::default();
        cfg.apply(ConfigCommand::Material(Material::Ceramic));

        let result = ConfigCommand::parse("material", "unobtanium");
        assert!(matches!(result, Err(Error::UnknownVariant { .. })));
        if let Ok(cmd) = result {
            cfg.apply(cmd);
        }
        assert_eq!(cfg.material, Material::Ceramic);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConfigCommand::parse("colour", "red"),
            Err(Error::UnknownField(_))
        ));
        assert!(matches!(
            ConfigCommand::parse("max_rpm", "lots"),
            Err(Error::InvalidNumber { field: "max_rpm", .. })
        ));
        assert!(matches!(
            ConfigCommand::parse("cylinders", "inf"),
            Err(Error::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_derived_quantities() {
        let cfg = EngineConfig::default();
        assert!((cfg.idle_angular_velocity() - 104.719_755).abs() < 1e-5);
        assert!((cfg.max_angular_velocity() - 837.758_041).abs() < 1e-5);
        assert!((cfg.target_angular_velocity(0.0) - cfg.idle_angular_velocity()).abs() < 1e-9);
        assert!((cfg.target_angular_velocity(1.0) - cfg.max_angular_velocity()).abs() < 1e-9);

        // π * 20² * 80 * 1
        let expected = std::f64::consts::PI * 400.0 * 80.0;
        assert!((cfg.displacement() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_valve_window_is_clamped() {
        let mut cfg = EngineConfig::default();
        assert!((cfg.valve_window - 30.0).abs() < 1e-9);
        cfg.apply(ConfigCommand::parse("valve_window", "45").unwrap());
        assert_eq!(cfg.valve_window, 45.0);
        cfg.set_valve_window(500.0);
        assert_eq!(cfg.valve_window, 90.0);
        cfg.set_valve_window(f64::NAN);
        assert_eq!(cfg.valve_window, 90.0);

        let cfg = EngineConfig::from_yaml_str("valve_window: 1\n").unwrap();
        assert_eq!(cfg.valve_window, 5.0);
    }

    #[test]
    fn test_yaml_is_sanitized() {
        let cfg = EngineConfig::from_yaml_str(
            "cylinder_count: 0\nidle_rpm: 100\nmax_rpm: 50000\nlayout: boxer\n",
        )
        .unwrap();
        assert_eq!(cfg.cylinder_count, 1);
        assert_eq!(cfg.idle_rpm, 500.0);
        assert_eq!(cfg.max_rpm, 12000.0);
        assert_eq!(cfg.layout, Layout::Boxer);
        assert_eq!(cfg.fuel, Fuel::Gasoline, "missing fields fall back to defaults");
    }

    #[test]
    fn test_yaml_unknown_variant_fails() {
        let result = EngineConfig::from_yaml_str("layout: w16\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_load_preset() {
        let loader = PresetLoader::new(presets_path());
        let cfg = loader.load("inline4");
        assert!(cfg.is_ok(), "Should load inline4: {:?}", cfg.err());
        let cfg = cfg.unwrap();
        assert_eq!(cfg.cylinder_count, 4);
        assert_eq!(cfg.layout, Layout::Inline);
    }

    #[test]
    fn test_load_missing_preset() {
        let loader = PresetLoader::new(presets_path());
        match loader.load("nonexistent_engine_xyz") {
            Err(Error::PresetNotFound(name)) => assert_eq!(name, "nonexistent_engine_xyz"),
            other => panic!("Expected PresetNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_list_presets() {
        let loader = PresetLoader::new(presets_path());
        let names = loader.list().unwrap();
        assert!(names.contains(&"v8".to_string()));
        assert!(names.contains(&"boxer2_two_stroke".to_string()));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
